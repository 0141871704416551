//! Error types for the carving crate.

use std::io;

use carvekit_mesh::MeshError;
use thiserror::Error;

/// Errors that can occur while configuring or running a carving job.
#[derive(Error, Debug)]
pub enum CarveError {
    /// The machining configuration is invalid.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// A parameter value is out of the valid range.
    #[error("parameter '{name}' out of range: {value} (valid: {min}..{max})")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The configured tool is not supported by the toolpath planner.
    #[error("unsupported tool: {0}")]
    UnsupportedTool(String),

    /// Height-field mesh construction failed.
    #[error("mesh error: {0}")]
    Mesh(#[from] MeshError),

    /// Writing to the output sink failed. Fatal to the job; the partial
    /// output is left as-is.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for carving operations.
pub type Result<T> = std::result::Result<T, CarveError>;
