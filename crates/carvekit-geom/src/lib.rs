//! Geometry kernel for the carving toolpath core.
//!
//! Provides the small set of value types the rest of the workspace is built
//! on: 2D/3D points and vectors, a width/height pair, a 3x3 affine transform
//! applied in row-vector convention, and the material-to-image coordinate
//! mapper for the Fill/Fit/Crop placement modes.
//!
//! ## Coordinate frames
//!
//! Material coordinates (MC) are millimetres with (0, 0) at the bottom-left
//! of the stock, +X right, +Y forward, +Z up out of the stock. The carving
//! area is a sub-rectangle of MC. Normalized image coordinates (NIC) span
//! `[0, 1]^2` with (0, 0) at the bottom-left of the displayed image:
//!
//! ```text
//!      Material                          MC: (width, height)
//!      +--------------------------------------+
//!      |        Carving                       |
//!      |        +--------------------+        |
//!      |        |#############  NIC: |        |
//!      |   NIC: |#############  (1,1)|        |
//!      |  (0,0) |#############       |        |
//!      |        +--------------------+        |
//!      |                                      |
//!      +--------------------------------------+
//!    (0, 0)
//! ```

mod matrix;
mod point;
mod size;
mod vector;
mod xform;

pub use matrix::Matrix33;
pub use point::{Pt2, Pt3};
pub use size::Size2;
pub use vector::{Vec2, Vec3};
pub use xform::{ImageMode, XformCache};
