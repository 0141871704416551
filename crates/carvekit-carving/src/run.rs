//! A single rectilinear carving run and its depth-stepped passes.

use carvekit_geom::{Pt2, Vec2};
use carvekit_heightmap::DepthSampler;

use crate::error::Result;
use crate::generator::CodeGenerator;

/// Minimum step size along a run, in mm. Runs never sample finer than this.
pub(crate) const MIN_STEP_SIZE: f64 = 0.1;

/// Depth slack below the current pass budget before a sample is clipped and
/// another pass is scheduled, in mm.
const CLIP_SLACK: f64 = 0.05;

/// Orientation of a carving run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// One straight scanline of the carving area at a fixed perpendicular
/// coordinate.
///
/// A run usually needs several passes: each pass lowers the depth budget by
/// the step-down amount and emits a polyline whose Z at every step is the
/// shallower of the sampled relief depth and the budget. Samples that had to
/// be clipped to the budget schedule a further pass. In full-depth mode
/// clipping is disabled and a run always completes in a single pass.
#[derive(Debug)]
pub struct CarvingRun {
    axis: Axis,
    num_steps: usize,
    step: Vec2,
    starting_point: Pt2,
    end_point: Pt2,

    /// Carving depth for white samples, <= 0.
    white_depth: f64,
    /// Carving depth for black samples, <= 0.
    black_depth: f64,
    /// Depth budget, starting at the stock top (0) and decreasing per pass.
    current_depth: f64,
    /// Budget decrement per pass, > 0.
    step_down: f64,

    carve_at_full_depth: bool,
    needs_more_passes: bool,
}

impl CarvingRun {
    /// Configures an X-run: a scanline at `run_y` covering
    /// `[x_at_left, x_at_left + carving_width]`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_x(
        sampler: &dyn DepthSampler,
        carving_width: f64,
        x_at_left: f64,
        run_y: f64,
        white_depth: f64,
        black_depth: f64,
        step_down: f64,
    ) -> Self {
        let (x_at_left, carving_width) = if carving_width < 0.0 {
            (x_at_left + carving_width, -carving_width)
        } else {
            (x_at_left, carving_width)
        };

        let p0 = Pt2::new(x_at_left, run_y);
        let p1 = Pt2::new(x_at_left + carving_width, run_y);
        let num_samples = Self::clamp_samples(
            sampler.num_samples_x(p0.x, p1.x),
            carving_width,
        );
        let delta = carving_width / (num_samples - 1) as f64;

        Self::configure(
            Axis::X,
            num_samples,
            Vec2::new(delta, 0.0),
            p0,
            p1,
            white_depth,
            black_depth,
            step_down,
        )
    }

    /// Configures a Y-run: a scanline at `run_x` covering
    /// `[y_at_bottom, y_at_bottom + carving_height]`.
    #[allow(clippy::too_many_arguments)]
    pub fn new_y(
        sampler: &dyn DepthSampler,
        carving_height: f64,
        y_at_bottom: f64,
        run_x: f64,
        white_depth: f64,
        black_depth: f64,
        step_down: f64,
    ) -> Self {
        let (y_at_bottom, carving_height) = if carving_height < 0.0 {
            (y_at_bottom + carving_height, -carving_height)
        } else {
            (y_at_bottom, carving_height)
        };

        let p0 = Pt2::new(run_x, y_at_bottom);
        let p1 = Pt2::new(run_x, y_at_bottom + carving_height);
        let num_samples = Self::clamp_samples(
            sampler.num_samples_y(p0.y, p1.y),
            carving_height,
        );
        let delta = carving_height / (num_samples - 1) as f64;

        Self::configure(
            Axis::Y,
            num_samples,
            Vec2::new(0.0, delta),
            p0,
            p1,
            white_depth,
            black_depth,
            step_down,
        )
    }

    /// At least two samples (one per run end), and never finer than the
    /// minimum step size.
    fn clamp_samples(num_samples: usize, span: f64) -> usize {
        let num_samples = num_samples.max(2);
        let delta = span / (num_samples - 1) as f64;
        if delta < MIN_STEP_SIZE {
            ((span / MIN_STEP_SIZE).ceil() as usize + 1).max(2)
        } else {
            num_samples
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn configure(
        axis: Axis,
        num_samples: usize,
        step: Vec2,
        p0: Pt2,
        p1: Pt2,
        white_depth: f64,
        black_depth: f64,
        step_down: f64,
    ) -> Self {
        let mut run = Self {
            axis,
            num_steps: num_samples - 1,
            step,
            starting_point: p0,
            end_point: p1,
            white_depth,
            black_depth,
            current_depth: 0.0,
            step_down,
            carve_at_full_depth: false,
            needs_more_passes: true,
        };
        run.sanitize();
        run
    }

    /// Clamps the run parameters into a valid configuration.
    fn sanitize(&mut self) {
        if self.num_steps == 0 {
            self.num_steps = 1;
        }
        if self.white_depth > 0.0 {
            self.white_depth = 0.0;
        }
        if self.black_depth > 0.0 {
            self.black_depth = 0.0;
        }
        self.step_down = self.step_down.abs();
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Whether the run has reached its full carving depth and needs no more
    /// passes.
    pub fn is_done(&self) -> bool {
        !self.needs_more_passes
    }

    /// Enables carving at full depth, ignoring the step-down budget.
    pub fn set_full_depth(&mut self, enable: bool) {
        self.carve_at_full_depth = enable;
    }

    /// Generates one carving pass along the run. `delta` must be +1.0 to scan
    /// forward or -1.0 to scan backward. Calling on a finished run is a
    /// no-op.
    pub fn do_one_pass(
        &mut self,
        delta: f64,
        sampler: &dyn DepthSampler,
        generator: &mut dyn CodeGenerator,
    ) -> Result<()> {
        if !self.needs_more_passes {
            return Ok(());
        }

        debug_assert!(delta == 1.0 || delta == -1.0, "delta must be +-1, got {delta}");

        // A pass that never cuts below the previous budget removes no new
        // material and is discarded. This matters mostly on the first pass of
        // shallow regions.
        let old_depth = self.current_depth;
        let mut discard = true;

        self.needs_more_passes = false;
        self.current_depth -= self.step_down;

        let mut origin = self.starting_point;
        for s in 0..self.num_steps {
            if s == 0 {
                // First step: the starting end depends on the direction.
                let pt = if delta < 0.0 {
                    self.end_point
                } else {
                    self.starting_point
                };
                origin = pt;

                let (depth, clipped) = self.carving_depth_at(pt, sampler);
                self.needs_more_passes = self.needs_more_passes || clipped;
                if depth < old_depth {
                    discard = false;
                }

                generator.start_path(pt.x, pt.y, depth);
            } else if s == self.num_steps - 1 {
                // Last step: ends exactly on the opposite end of the run.
                let pt = if delta > 0.0 {
                    self.end_point
                } else {
                    self.starting_point
                };

                let (depth, clipped) = self.carving_depth_at(pt, sampler);
                self.needs_more_passes = self.needs_more_passes || clipped;
                if depth < old_depth {
                    discard = false;
                }

                generator.move_to(pt.x, pt.y, depth);
                generator.end_path(discard)?;
            } else {
                let pt = origin + self.step * (s as f64 * delta);

                let (depth, clipped) = self.carving_depth_at(pt, sampler);
                self.needs_more_passes = self.needs_more_passes || clipped;
                if depth < old_depth {
                    discard = false;
                }

                generator.move_to(pt.x, pt.y, depth);
            }
        }

        Ok(())
    }

    /// Samples the carving depth at `q`, clipping it to the current depth
    /// budget unless full-depth carving is enabled. Returns the depth and
    /// whether it was clipped.
    fn carving_depth_at(&self, q: Pt2, sampler: &dyn DepthSampler) -> (f64, bool) {
        let s = sampler.at(q);
        let d = (1.0 - s) * self.black_depth + s * self.white_depth;

        if self.carve_at_full_depth {
            // Even at full depth the tool never goes above the stock top.
            return (d.min(0.0), false);
        }

        if d < self.current_depth - CLIP_SLACK {
            (self.current_depth, true)
        } else {
            (d, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{ConstantDepthSampler, RecordingGenerator};

    use super::*;

    #[test]
    fn x_run_forward_single_pass() {
        let sampler = ConstantDepthSampler::new(0.0);
        let mut gen = RecordingGenerator::default();
        let mut run = CarvingRun::new_x(&sampler, 100.0, 10.0, 0.0, 0.0, -0.1, 0.2);

        assert!(!run.is_done());
        run.do_one_pass(1.0, &sampler, &mut gen).unwrap();

        assert!(gen.path_completed);
        assert_eq!(gen.first_point, Pt2::new(10.0, 0.0));
        assert_eq!(gen.last_point, Pt2::new(110.0, 0.0));
        assert_eq!(gen.last_depth, -0.1);
        assert_eq!(gen.num_points, 99);
        assert!(run.is_done());
    }

    #[test]
    fn x_run_backward_single_pass() {
        let sampler = ConstantDepthSampler::new(0.0);
        let mut gen = RecordingGenerator::default();
        let mut run = CarvingRun::new_x(&sampler, 100.0, 10.0, 0.0, 0.0, -0.1, 0.2);

        run.do_one_pass(-1.0, &sampler, &mut gen).unwrap();

        assert!(gen.path_completed);
        assert_eq!(gen.first_point, Pt2::new(110.0, 0.0));
        assert_eq!(gen.last_point, Pt2::new(10.0, 0.0));
        assert_eq!(gen.last_depth, -0.1);
        assert_eq!(gen.num_points, 99);
        assert!(run.is_done());
    }

    #[test]
    fn x_run_two_passes_with_clipping() {
        let sampler = ConstantDepthSampler::new(0.0);
        let mut gen = RecordingGenerator::default();
        let mut run = CarvingRun::new_x(&sampler, 100.0, 10.0, 0.0, 0.0, -0.4, 0.25);

        // First pass is clipped to the step-down budget.
        run.do_one_pass(1.0, &sampler, &mut gen).unwrap();
        assert_eq!(gen.first_point, Pt2::new(10.0, 0.0));
        assert_eq!(gen.last_depth, -0.25);
        assert!(!run.is_done());

        // Second pass, reversed, reaches the target depth.
        run.do_one_pass(-1.0, &sampler, &mut gen).unwrap();
        assert_eq!(gen.last_point, Pt2::new(10.0, 0.0));
        assert_eq!(gen.last_depth, -0.4);
        assert!(run.is_done());
    }

    #[test]
    fn y_run_forward_single_pass() {
        let sampler = ConstantDepthSampler::new(0.0);
        let mut gen = RecordingGenerator::default();
        let mut run = CarvingRun::new_y(&sampler, 100.0, 10.0, 0.0, 0.0, -0.1, 0.2);

        assert_eq!(run.axis(), Axis::Y);
        run.do_one_pass(1.0, &sampler, &mut gen).unwrap();

        assert!(gen.path_completed);
        assert_eq!(gen.first_point, Pt2::new(0.0, 10.0));
        assert_eq!(gen.last_point, Pt2::new(0.0, 110.0));
        assert_eq!(gen.last_depth, -0.1);
        assert_eq!(gen.num_points, 99);
        assert!(run.is_done());
    }

    #[test]
    fn finished_run_pass_is_a_no_op() {
        let sampler = ConstantDepthSampler::new(0.0);
        let mut gen = RecordingGenerator::default();
        let mut run = CarvingRun::new_x(&sampler, 100.0, 10.0, 0.0, 0.0, -0.1, 0.2);

        run.do_one_pass(1.0, &sampler, &mut gen).unwrap();
        assert!(run.is_done());
        let points_after_first = gen.num_points;
        let paths_after_first = gen.num_paths;

        run.do_one_pass(-1.0, &sampler, &mut gen).unwrap();
        assert_eq!(gen.num_points, points_after_first);
        assert_eq!(gen.num_paths, paths_after_first);
        assert!(run.is_done());
    }

    #[test]
    fn full_depth_run_finishes_in_one_pass() {
        // Target depth is several step-downs deep, but full-depth mode
        // disables clipping entirely.
        let sampler = ConstantDepthSampler::new(0.0);
        let mut gen = RecordingGenerator::default();
        let mut run = CarvingRun::new_x(&sampler, 100.0, 10.0, 0.0, 0.0, -2.0, 0.25);
        run.set_full_depth(true);

        run.do_one_pass(1.0, &sampler, &mut gen).unwrap();
        assert_eq!(gen.last_depth, -2.0);
        assert!(run.is_done());
    }

    #[test]
    fn full_depth_never_cuts_above_stock() {
        // A sampler value of 1.0 maps to the white depth; sanitisation pins
        // positive depths to the stock top, and full-depth mode clamps the
        // emitted depth to z <= 0.
        let sampler = ConstantDepthSampler::new(1.0);
        let mut gen = RecordingGenerator::default();
        let mut run = CarvingRun::new_x(&sampler, 100.0, 10.0, 0.0, 0.5, -1.0, 0.25);
        run.set_full_depth(true);

        run.do_one_pass(1.0, &sampler, &mut gen).unwrap();
        assert!(gen.max_depth <= 0.0);
        assert!(run.is_done());
    }

    #[test]
    fn negative_width_normalises_to_same_span() {
        let sampler = ConstantDepthSampler::new(0.0);
        let run = CarvingRun::new_x(&sampler, -100.0, 110.0, 0.0, 0.0, -0.1, 0.2);
        assert_eq!(run.starting_point, Pt2::new(10.0, 0.0));
        assert_eq!(run.end_point, Pt2::new(110.0, 0.0));
    }

    #[test]
    fn dense_sampler_is_clamped_to_min_step_size() {
        // 100 samples/mm would step every 0.01 mm; the run coarsens to the
        // 0.1 mm minimum step instead.
        let sampler = ConstantDepthSampler::with_density(0.0, 100.0);
        let run = CarvingRun::new_x(&sampler, 1.0, 0.0, 0.0, 0.0, -0.1, 0.2);
        // 1 mm span at 0.1 mm steps: 11 samples, 10 steps.
        assert_eq!(run.num_steps, 10);
    }

    #[test]
    fn depth_sanitisation() {
        let sampler = ConstantDepthSampler::new(0.0);
        let run = CarvingRun::new_x(&sampler, 100.0, 0.0, 0.0, 1.5, 2.5, -0.3);
        assert_eq!(run.white_depth, 0.0);
        assert_eq!(run.black_depth, 0.0);
        assert_eq!(run.step_down, 0.3);
    }
}
