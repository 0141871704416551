//! Triangle-mesh reconstruction of the height field and cutter simulation.
//!
//! The carving engine cannot work from raw pixel lookups: a ball-nose tool
//! touching a slope rides higher than the surface directly below its tip, and
//! ignoring that cuts into the relief. This crate rebuilds the sampled height
//! field as a regular triangle mesh with per-cell indexing, then answers the
//! question "how low can the tool go at (x, y) without its body intersecting
//! the surface?" by testing the tool sphere against every triangle whose cell
//! overlaps the tool footprint.
//!
//! [`MeshSampler`] exposes the result through the same
//! [`DepthSampler`](carvekit_heightmap::DepthSampler) contract as the pixel
//! sampler, so the carving engine is oblivious to which one it is driving.

mod contact;
mod error;
mod footprint;
mod mesh;
mod sampler;
mod triangle;

pub use error::{MeshError, Result};
pub use footprint::Footprint;
pub use mesh::{TriangleIter, TriangleMesh};
pub use sampler::MeshSampler;
pub use triangle::Triangle;
