//! # carvekit
//!
//! A toolpath generator that carves grayscale height maps into G-code for
//! 3-axis CNC routers. The image is treated as a relief over the carving
//! area: white pixels carve shallow, black pixels carve deep, and a
//! ball-nose cutter is simulated against a triangulated reconstruction of
//! the surface so slopes and cusps are honoured instead of gouged.
//!
//! ## Architecture
//!
//! carvekit is organised as a workspace with focused crates:
//!
//! 1. **carvekit-geom** - points, vectors, affine transforms, image placement
//! 2. **carvekit-heightmap** - the depth-sampling contract and pixel sampler
//! 3. **carvekit-mesh** - height-field mesh and cutter-contact simulation
//! 4. **carvekit-carving** - run planning, carver, grbl G-code generation
//! 5. **carvekit** - this crate: the `carvekit` command-line binary
//!
//! One call to [`do_machining`] turns a configuration plus a 16-bit
//! grayscale image into a complete G-code program.

pub use carvekit_carving::{
    do_machining, CarveError, CarveMode, Carver, CarvingConfig, CarvingRun, CodeGenerator,
    FinishMode, FinishingConfig, GrblGenerator, HeightMapConfig, MachiningConfig, MaterialConfig,
    ProgramStats, ToolConfig, ToolKind,
};
pub use carvekit_geom::{ImageMode, Matrix33, Pt2, Pt3, Size2, Vec2, Vec3, XformCache};
pub use carvekit_heightmap::{DepthSampler, PixelSampler};
pub use carvekit_mesh::{Footprint, MeshSampler, Triangle, TriangleMesh};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up a console `tracing` subscriber honouring the `RUST_LOG`
/// environment variable, defaulting to `info`.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .init();

    Ok(())
}
