//! Job entry point: validate the configuration, assemble the sampler chain,
//! run the carver.

use std::io::Write;

use carvekit_geom::XformCache;
use carvekit_heightmap::{DepthSampler, Gray16Image, PixelSampler};
use carvekit_mesh::{MeshSampler, TriangleMesh};
use tracing::{info, warn};

use crate::carver::Carver;
use crate::config::{MachiningConfig, ToolKind};
use crate::error::{CarveError, Result};
use crate::grbl::GrblGenerator;

/// Runs one machining job: carves `height_map` according to `config` and
/// writes the G-code program to `output`.
///
/// Configuration errors are returned before any output byte is written. A
/// write failure aborts the job mid-stream and leaves the partial output
/// as-is; there are no retries.
pub fn do_machining<W: Write>(
    config: &MachiningConfig,
    height_map: &Gray16Image,
    output: W,
) -> Result<()> {
    validate(config, height_map)?;

    let material = &config.material;
    let carving = &config.carving;

    let step_over = carving.step_over_fraction.clamp(0.05, 1.0);

    let mut finishing = carving.finishing.clone();
    if finishing.enabled && (finishing.step_fraction < 0.01 || finishing.step_fraction >= 1.0) {
        warn!(
            step_fraction = finishing.step_fraction,
            "finishing step fraction out of range, finishing disabled"
        );
        finishing.enabled = false;
    }

    // Depths may come in either order; black carves deeper by convention, so
    // a reversed pair swaps and inverts the height map instead.
    let (top_z, bottom_z, invert) = if carving.bottom_z > carving.top_z {
        (carving.bottom_z, carving.top_z, true)
    } else {
        (carving.top_z, carving.bottom_z, false)
    };

    let hm = &carving.height_map;
    let mirrored;
    let img = if hm.mirror_x || hm.mirror_y {
        let mut m = height_map.clone();
        if hm.mirror_x {
            image::imageops::flip_horizontal_in_place(&mut m);
        }
        if hm.mirror_y {
            image::imageops::flip_vertical_in_place(&mut m);
        }
        mirrored = m;
        &mirrored
    } else {
        height_map
    };

    let mut xform = XformCache::new(
        material.carving_dim.w,
        material.carving_dim.h,
        material.carving_origin.x,
        material.carving_origin.y,
        img.width() as usize,
        img.height() as usize,
        hm.mode,
    );

    let mut pixel_sampler = PixelSampler::new(xform.mc_to_nic(), img);
    pixel_sampler.enable_invert(invert);

    // The mesh is built over carver-relative depths (stock top at z = 0).
    let z_white = top_z - material.thickness;
    let z_black = bottom_z - material.thickness;
    let p_min = material.carving_origin;
    let p_max = p_min + material.carving_dim.to_vec2();
    let mesh = TriangleMesh::new(p_min, p_max, z_black, z_white, &pixel_sampler)?;
    let sampler = MeshSampler::with_ball_cutter(mesh, carving.tool.diameter);

    let mut carver = Carver::new();
    carver.configure_material(
        material.dim,
        material.carving_origin,
        material.carving_dim,
        material.thickness,
    );
    carver.configure_tool(carving.tool.diameter);
    carver.configure_carving_profile(
        top_z,
        bottom_z,
        step_over,
        carving.tool.max_step_down.abs(),
        carving.mode,
    );
    carver.configure_finishing_pass(
        finishing.enabled,
        finishing.step_fraction,
        finishing.mode,
        finishing.horiz_feed_rate,
    );

    let mut generator = GrblGenerator::new(
        carving.tool.horiz_feed_rate,
        carving.tool.vert_feed_rate,
        output,
    );

    info!(
        carving_w = material.carving_dim.w,
        carving_h = material.carving_dim.h,
        tool_diameter = carving.tool.diameter,
        mode = ?carving.mode,
        "starting carving job"
    );

    carver.run(&sampler, &mut generator)
}

fn validate(config: &MachiningConfig, height_map: &Gray16Image) -> Result<()> {
    let m = &config.material;
    if m.dim.w <= 0.0 || m.dim.h <= 0.0 {
        return Err(CarveError::InvalidParameters(format!(
            "material dimensions must be positive, got {} x {}",
            m.dim.w, m.dim.h
        )));
    }
    if m.carving_dim.w <= 0.0 || m.carving_dim.h <= 0.0 {
        return Err(CarveError::InvalidParameters(format!(
            "carving dimensions must be positive, got {} x {}",
            m.carving_dim.w, m.carving_dim.h
        )));
    }
    if m.thickness < 0.0 {
        return Err(CarveError::InvalidParameters(format!(
            "material thickness must be non-negative, got {}",
            m.thickness
        )));
    }
    if m.carving_origin.x < 0.0
        || m.carving_origin.y < 0.0
        || m.carving_origin.x + m.carving_dim.w > m.dim.w
        || m.carving_origin.y + m.carving_dim.h > m.dim.h
    {
        return Err(CarveError::InvalidParameters(
            "carving area extends outside the material".to_string(),
        ));
    }

    let tool = &config.carving.tool;
    if tool.kind == ToolKind::Flat {
        return Err(CarveError::UnsupportedTool(
            "flat-end cutter is not supported".to_string(),
        ));
    }
    if tool.diameter <= 0.0 {
        return Err(CarveError::OutOfRange {
            name: "tool.diameter".to_string(),
            value: tool.diameter,
            min: 0.0,
            max: f64::INFINITY,
        });
    }
    if tool.horiz_feed_rate <= 0.0 || tool.vert_feed_rate <= 0.0 {
        return Err(CarveError::InvalidParameters(
            "feed rates must be positive".to_string(),
        ));
    }
    if tool.max_step_down == 0.0 {
        return Err(CarveError::OutOfRange {
            name: "tool.max_step_down".to_string(),
            value: tool.max_step_down,
            min: 0.0,
            max: f64::INFINITY,
        });
    }

    if height_map.width() == 0 || height_map.height() == 0 {
        return Err(CarveError::InvalidParameters(
            "height map image is empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use carvekit_geom::{ImageMode, Pt2, Size2};
    use image::Luma;

    use crate::config::{
        CarveMode, CarvingConfig, FinishingConfig, HeightMapConfig, MaterialConfig, ToolConfig,
    };

    use super::*;

    fn gradient_image() -> Gray16Image {
        let mut img = Gray16Image::new(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                let v = ((x + y) as u32 * u16::MAX as u32 / 14) as u16;
                img.put_pixel(x, y, Luma([v]));
            }
        }
        img
    }

    fn basic_config() -> MachiningConfig {
        MachiningConfig {
            material: MaterialConfig {
                dim: Size2::new(20.0, 20.0),
                carving_origin: Pt2::new(2.0, 2.0),
                carving_dim: Size2::new(16.0, 16.0),
                thickness: 5.0,
            },
            carving: CarvingConfig {
                height_map: HeightMapConfig {
                    mode: ImageMode::Fill,
                    mirror_x: false,
                    mirror_y: false,
                },
                tool: ToolConfig {
                    kind: ToolKind::Ball,
                    diameter: 2.0,
                    horiz_feed_rate: 1000.0,
                    vert_feed_rate: 400.0,
                    max_step_down: 0.5,
                },
                top_z: 5.0,
                bottom_z: 4.0,
                step_over_fraction: 0.5,
                mode: CarveMode::XOnly,
                finishing: FinishingConfig::default(),
            },
        }
    }

    #[test]
    fn job_produces_wrapped_gcode() {
        let config = basic_config();
        let img = gradient_image();
        let mut out = Vec::new();

        do_machining(&config, &img, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("G90\nG17\nG21\nG28 G91 Z0\nG90\n"));
        assert!(text.ends_with("G0 Z25.00\nG28 G91 Z0\nM30\n"));
        // Some actual cutting happened.
        assert!(text.contains("G1 X"));
    }

    #[test]
    fn identical_jobs_produce_identical_output() {
        let config = basic_config();
        let img = gradient_image();

        let mut first = Vec::new();
        do_machining(&config, &img, &mut first).unwrap();
        let mut second = Vec::new();
        do_machining(&config, &img, &mut second).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn reversed_depths_swap_and_invert() {
        // top_z < bottom_z must behave exactly like the swapped depths over
        // the inverted image.
        let mut reversed = basic_config();
        reversed.carving.top_z = 4.0;
        reversed.carving.bottom_z = 5.0;
        let img = gradient_image();
        let mut reversed_out = Vec::new();
        do_machining(&reversed, &img, &mut reversed_out).unwrap();

        let straight = basic_config();
        let mut inverted_img = gradient_image();
        image::imageops::invert(&mut inverted_img);
        let mut straight_out = Vec::new();
        do_machining(&straight, &inverted_img, &mut straight_out).unwrap();

        assert_eq!(reversed_out, straight_out);
    }

    #[test]
    fn mirrored_job_differs_from_plain() {
        let mut mirrored = basic_config();
        mirrored.carving.height_map.mirror_x = true;
        let img = gradient_image();

        let mut plain_out = Vec::new();
        do_machining(&basic_config(), &img, &mut plain_out).unwrap();
        let mut mirrored_out = Vec::new();
        do_machining(&mirrored, &img, &mut mirrored_out).unwrap();

        assert_ne!(plain_out, mirrored_out);
    }

    #[test]
    fn carving_area_outside_material_is_rejected_before_output() {
        let mut config = basic_config();
        config.material.carving_origin = Pt2::new(10.0, 10.0);
        let img = gradient_image();
        let mut out = Vec::new();

        let result = do_machining(&config, &img, &mut out);
        assert!(matches!(result, Err(CarveError::InvalidParameters(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn flat_tool_is_rejected() {
        let mut config = basic_config();
        config.carving.tool.kind = ToolKind::Flat;
        let img = gradient_image();
        let mut out = Vec::new();

        let result = do_machining(&config, &img, &mut out);
        assert!(matches!(result, Err(CarveError::UnsupportedTool(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn zero_step_down_is_rejected() {
        let mut config = basic_config();
        config.carving.tool.max_step_down = 0.0;
        let img = gradient_image();
        let mut out = Vec::new();

        let result = do_machining(&config, &img, &mut out);
        assert!(matches!(result, Err(CarveError::OutOfRange { .. })));
    }

    #[test]
    fn out_of_range_finishing_fraction_disables_finishing() {
        // An absurd finishing fraction must not break the job; it degrades
        // to no finishing pass.
        let mut with_bad_finish = basic_config();
        with_bad_finish.carving.finishing = FinishingConfig {
            enabled: true,
            step_fraction: 1.5,
            ..FinishingConfig::default()
        };
        let img = gradient_image();

        let mut bad_out = Vec::new();
        do_machining(&with_bad_finish, &img, &mut bad_out).unwrap();
        let mut plain_out = Vec::new();
        do_machining(&basic_config(), &img, &mut plain_out).unwrap();

        assert_eq!(bad_out, plain_out);
    }
}
