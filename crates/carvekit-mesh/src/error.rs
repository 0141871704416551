//! Error types for mesh construction.

use thiserror::Error;

/// Errors raised while building a triangle mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The requested mesh area has zero width or height.
    #[error("degenerate mesh area: {width} x {height} mm")]
    DegenerateArea { width: f64, height: f64 },
}

/// Result type alias for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
