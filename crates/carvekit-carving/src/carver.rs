//! Orchestration of carving runs across the work area.

use carvekit_geom::{Pt2, Size2};
use carvekit_heightmap::DepthSampler;
use tracing::debug;

use crate::config::{CarveMode, FinishMode};
use crate::error::Result;
use crate::generator::CodeGenerator;
use crate::run::{Axis, CarvingRun};

/// Plans and emits the raster carving job: main X/Y runs at stepped depth,
/// optional finishing runs at full depth with a tighter step-over.
///
/// The carver owns only configuration; the sampler and generator are borrowed
/// for the duration of [`run`](Self::run).
#[derive(Debug)]
pub struct Carver {
    material_dim: Size2,
    material_top: f64,
    carving_bottom_left: Pt2,
    carving_dim: Size2,

    carve_mode: CarveMode,

    /// Carving depth for white samples, relative to the stock top.
    z_white: f64,
    /// Carving depth for black samples, relative to the stock top.
    z_black: f64,
    max_step_down: f64,

    tool_diameter: f64,
    step_over_fraction: f64,

    finishing_enabled: bool,
    finish_step_fraction: f64,
    finish_mode: FinishMode,
    finish_horiz_feed_rate: f64,
}

impl Default for Carver {
    fn default() -> Self {
        Self {
            material_dim: Size2::new(0.0, 0.0),
            material_top: 0.0,
            carving_bottom_left: Pt2::new(0.0, 0.0),
            carving_dim: Size2::new(0.0, 0.0),
            carve_mode: CarveMode::XOnly,
            z_white: 0.0,
            z_black: 0.0,
            max_step_down: 0.5,
            tool_diameter: 3.175,
            step_over_fraction: 0.4,
            finishing_enabled: false,
            finish_step_fraction: 0.5,
            finish_mode: FinishMode::FirstDirectionOnly,
            finish_horiz_feed_rate: 750.0,
        }
    }
}

impl Carver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure_material(
        &mut self,
        material_dim: Size2,
        carving_origin: Pt2,
        carving_dim: Size2,
        material_top: f64,
    ) {
        self.material_dim = material_dim;
        self.carving_bottom_left = carving_origin;
        self.carving_dim = carving_dim;
        self.material_top = material_top;
    }

    pub fn configure_tool(&mut self, tool_diameter: f64) {
        self.tool_diameter = tool_diameter;
    }

    /// Sets the carving strategy. `top_z` and `bottom_z` are absolute; they
    /// are re-expressed relative to the stock top so carving depths are
    /// non-positive.
    pub fn configure_carving_profile(
        &mut self,
        top_z: f64,
        bottom_z: f64,
        step_over_fraction: f64,
        max_step_down: f64,
        mode: CarveMode,
    ) {
        self.carve_mode = mode;
        self.step_over_fraction = step_over_fraction;
        self.z_white = top_z - self.material_top;
        self.z_black = bottom_z - self.material_top;
        self.max_step_down = max_step_down;
    }

    pub fn configure_finishing_pass(
        &mut self,
        enabled: bool,
        step_fraction: f64,
        mode: FinishMode,
        horiz_feed_rate: f64,
    ) {
        self.finishing_enabled = enabled;
        self.finish_step_fraction = step_fraction;
        self.finish_mode = mode;
        self.finish_horiz_feed_rate = horiz_feed_rate;
    }

    /// Carves the whole job into the generator: preamble, X runs, Y runs,
    /// epilogue.
    pub fn run(
        &self,
        sampler: &dyn DepthSampler,
        generator: &mut dyn CodeGenerator,
    ) -> Result<()> {
        generator.start_job()?;
        self.carve_along_x(sampler, generator)?;
        self.carve_along_y(sampler, generator)?;
        generator.end_job()
    }

    fn carve_along_x(
        &self,
        sampler: &dyn DepthSampler,
        generator: &mut dyn CodeGenerator,
    ) -> Result<()> {
        if self.carve_mode != CarveMode::XOnly && self.carve_mode != CarveMode::XThenY {
            return Ok(());
        }

        let mut runs = self.x_runs(sampler, self.step_over_fraction, false);
        debug!(num_runs = runs.len(), "carving along X");
        Self::carve_runs(&mut runs, sampler, generator)?;

        if self.finishing_needed(Axis::X) {
            debug!("finishing pass along X");
            with_horizontal_feed_rate(generator, self.finish_horiz_feed_rate, |generator| {
                let mut runs = self.x_runs(sampler, self.finish_step_fraction, true);
                Self::carve_runs(&mut runs, sampler, generator)
            })?;
        }

        Ok(())
    }

    fn carve_along_y(
        &self,
        sampler: &dyn DepthSampler,
        generator: &mut dyn CodeGenerator,
    ) -> Result<()> {
        if self.carve_mode != CarveMode::YOnly && self.carve_mode != CarveMode::XThenY {
            return Ok(());
        }

        // After an X pass the material is already roughed; the Y pass then
        // cuts straight to full depth.
        let full_depth = self.carve_mode == CarveMode::XThenY;
        let mut runs = self.y_runs(sampler, self.step_over_fraction, full_depth);
        debug!(num_runs = runs.len(), full_depth, "carving along Y");
        Self::carve_runs(&mut runs, sampler, generator)?;

        if self.finishing_needed(Axis::Y) {
            debug!("finishing pass along Y");
            with_horizontal_feed_rate(generator, self.finish_horiz_feed_rate, |generator| {
                let mut runs = self.y_runs(sampler, self.finish_step_fraction, true);
                Self::carve_runs(&mut runs, sampler, generator)
            })?;
        }

        Ok(())
    }

    /// Round-robins over the runs, one pass at a time with alternating scan
    /// direction, until every run is done.
    fn carve_runs(
        runs: &mut [CarvingRun],
        sampler: &dyn DepthSampler,
        generator: &mut dyn CodeGenerator,
    ) -> Result<()> {
        let mut step_dir = 1.0;
        let mut i_run: Option<usize> = None;

        while let Some(next) = Self::next_unfinished_run(i_run, runs) {
            i_run = Some(next);
            runs[next].do_one_pass(step_dir, sampler, generator)?;
            step_dir = -step_dir;
        }

        Ok(())
    }

    /// Finds the next unfinished run after `from`, scanning circularly.
    /// `None` for `from` starts a fresh scan from the first run.
    fn next_unfinished_run(from: Option<usize>, runs: &[CarvingRun]) -> Option<usize> {
        if runs.is_empty() {
            return None;
        }

        let start = from.map_or(0, |f| (f + 1) % runs.len());
        let mut i = start;
        loop {
            if !runs[i].is_done() {
                return Some(i);
            }
            i = (i + 1) % runs.len();
            if i == start {
                return None;
            }
        }
    }

    fn x_runs(
        &self,
        sampler: &dyn DepthSampler,
        step_fraction: f64,
        full_depth: bool,
    ) -> Vec<CarvingRun> {
        let num_runs = self.num_runs_needed(self.carving_dim.h, step_fraction);
        let mut runs = Vec::with_capacity(num_runs);
        if num_runs == 0 {
            return runs;
        }

        let d = self.tool_diameter;
        let y_step = if num_runs > 1 {
            (self.carving_dim.h - d) / (num_runs - 1) as f64
        } else {
            0.0
        };

        for i in 0..num_runs {
            let y = if i == num_runs - 1 {
                // Last run is pinned so the tool rim grazes the boundary.
                self.carving_bottom_left.y + self.carving_dim.h - 0.5 * d
            } else {
                self.carving_bottom_left.y + 0.5 * d + i as f64 * y_step
            };

            let mut run = CarvingRun::new_x(
                sampler,
                self.carving_dim.w - d,
                self.carving_bottom_left.x + 0.5 * d,
                y,
                self.z_white,
                self.z_black,
                self.max_step_down,
            );
            if full_depth {
                run.set_full_depth(true);
            }
            runs.push(run);
        }

        runs
    }

    fn y_runs(
        &self,
        sampler: &dyn DepthSampler,
        step_fraction: f64,
        full_depth: bool,
    ) -> Vec<CarvingRun> {
        let num_runs = self.num_runs_needed(self.carving_dim.w, step_fraction);
        let mut runs = Vec::with_capacity(num_runs);
        if num_runs == 0 {
            return runs;
        }

        let d = self.tool_diameter;
        let x_step = if num_runs > 1 {
            (self.carving_dim.w - d) / (num_runs - 1) as f64
        } else {
            0.0
        };

        for i in 0..num_runs {
            let x = if i == num_runs - 1 {
                self.carving_bottom_left.x + self.carving_dim.w - 0.5 * d
            } else {
                self.carving_bottom_left.x + 0.5 * d + i as f64 * x_step
            };

            let mut run = CarvingRun::new_y(
                sampler,
                self.carving_dim.h - d,
                self.carving_bottom_left.y + 0.5 * d,
                x,
                self.z_white,
                self.z_black,
                self.max_step_down,
            );
            if full_depth {
                run.set_full_depth(true);
            }
            runs.push(run);
        }

        runs
    }

    /// Number of runs needed to cover `dist` perpendicular to the run
    /// direction. The first and last run sit half a tool diameter inside the
    /// carving boundary; together their unshared rims cover exactly one tool
    /// diameter.
    fn num_runs_needed(&self, dist: f64, step_fraction: f64) -> usize {
        let cut_size = self.tool_diameter * step_fraction;
        let num_steps = (dist - self.tool_diameter) / cut_size - 0.001 + 1.0;
        if num_steps < 0.0 {
            0
        } else {
            num_steps.ceil() as usize
        }
    }

    /// Whether a finishing pass applies along `axis` under the current
    /// configuration.
    fn finishing_needed(&self, axis: Axis) -> bool {
        if !self.finishing_enabled {
            return false;
        }
        // A finishing step-over nearly equal to the main one would just
        // re-cut the same cusps.
        if (self.finish_step_fraction - self.step_over_fraction).abs() < 0.02 {
            return false;
        }

        let in_main_carving = match axis {
            Axis::X => matches!(self.carve_mode, CarveMode::XOnly | CarveMode::XThenY),
            Axis::Y => matches!(self.carve_mode, CarveMode::YOnly | CarveMode::XThenY),
        };
        if !in_main_carving {
            return false;
        }

        if self.carve_mode == CarveMode::XThenY {
            match self.finish_mode {
                FinishMode::FirstDirectionOnly => axis == Axis::X,
                FinishMode::LastDirectionOnly => axis == Axis::Y,
                FinishMode::AllDirections => true,
            }
        } else {
            true
        }
    }
}

/// Runs `f` with the generator's horizontal feed rate switched to `rate`,
/// restoring the previous rate on every exit path.
fn with_horizontal_feed_rate<F>(
    generator: &mut dyn CodeGenerator,
    rate: f64,
    f: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn CodeGenerator) -> Result<()>,
{
    let old = generator.change_horizontal_feed_rate(rate);
    let result = f(generator);
    generator.change_horizontal_feed_rate(old);
    result
}
