//! Machining job configuration.
//!
//! All lengths are in millimetres, feed rates in mm/min. The configuration is
//! plain serialisable data; validation and sanitisation happen in
//! [`do_machining`](crate::do_machining).

use carvekit_geom::{ImageMode, Pt2, Size2};
use serde::{Deserialize, Serialize};

/// Cutter geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// Ball-nose cutter; tool contact is resolved against the relief mesh.
    Ball,
    /// Flat-end cutter. Declared for configuration completeness; the
    /// toolpath planner rejects it.
    Flat,
}

/// Which directions the raster carving covers, and in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarveMode {
    XOnly,
    YOnly,
    XThenY,
}

/// Which carving directions get a finishing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishMode {
    FirstDirectionOnly,
    LastDirectionOnly,
    AllDirections,
}

/// The stock and the carving sub-rectangle within it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialConfig {
    /// Stock width and height.
    pub dim: Size2,
    /// Bottom-left corner of the carving rectangle, in material coordinates.
    pub carving_origin: Pt2,
    /// Carving rectangle dimensions.
    pub carving_dim: Size2,
    /// Stock thickness; the stock top surface sits at this Z.
    pub thickness: f64,
}

/// Tool parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub kind: ToolKind,
    pub diameter: f64,
    pub horiz_feed_rate: f64,
    pub vert_feed_rate: f64,
    /// Maximum Z decrement per carving pass; must be positive.
    pub max_step_down: f64,
}

/// Height-map placement within the carving rectangle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightMapConfig {
    pub mode: ImageMode,
    pub mirror_x: bool,
    pub mirror_y: bool,
}

impl Default for HeightMapConfig {
    fn default() -> Self {
        Self {
            mode: ImageMode::Fill,
            mirror_x: false,
            mirror_y: false,
        }
    }
}

/// Optional full-depth finishing pass with a tighter step-over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishingConfig {
    pub enabled: bool,
    /// Step-over fraction for the finishing pass; rejected outside
    /// `[0.01, 1.0)` and ignored when within 0.02 of the main step-over.
    pub step_fraction: f64,
    pub mode: FinishMode,
    pub horiz_feed_rate: f64,
}

impl Default for FinishingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            step_fraction: 0.5,
            mode: FinishMode::FirstDirectionOnly,
            horiz_feed_rate: 750.0,
        }
    }
}

/// Carving strategy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarvingConfig {
    pub height_map: HeightMapConfig,
    pub tool: ToolConfig,
    /// Absolute Z carved for white samples.
    pub top_z: f64,
    /// Absolute Z carved for black samples.
    pub bottom_z: f64,
    /// Fraction of the tool diameter between adjacent runs; clamped to
    /// `[0.05, 1.0]`.
    pub step_over_fraction: f64,
    pub mode: CarveMode,
    pub finishing: FinishingConfig,
}

/// Complete configuration for one machining job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachiningConfig {
    pub material: MaterialConfig,
    pub carving: CarvingConfig,
}
