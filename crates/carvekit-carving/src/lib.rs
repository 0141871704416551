//! Raster toolpath planning and G-code emission.
//!
//! This crate turns a configured carving job into a G-code program. The
//! carving area is covered by parallel rectilinear runs along X and/or Y;
//! each run is traversed in one or more depth-stepped passes until the relief
//! depth is reached, with an optional tighter-step-over finishing pass at
//! full depth. Emitted polylines are simplified (colinear collapse, then
//! XY-proximity merge) before being serialised to the grbl dialect.
//!
//! The crate is single-threaded and batch-oriented: one call to
//! [`do_machining`] produces one G-code program on the output sink.

mod carver;
mod config;
mod error;
mod generator;
mod grbl;
mod machining;
mod run;
mod stats;

#[cfg(test)]
mod test_support;

pub use carver::Carver;
pub use config::{
    CarveMode, CarvingConfig, FinishMode, FinishingConfig, HeightMapConfig, MachiningConfig,
    MaterialConfig, ToolConfig, ToolKind,
};
pub use error::{CarveError, Result};
pub use generator::CodeGenerator;
pub use grbl::GrblGenerator;
pub use machining::do_machining;
pub use run::{Axis, CarvingRun};
pub use stats::ProgramStats;
