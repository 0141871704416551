//! Width/height pair.

use serde::{Deserialize, Serialize};

use crate::vector::Vec2;

/// A 2D size with width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size2 {
    pub w: f64,
    pub h: f64,
}

impl Size2 {
    pub fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }

    pub fn to_vec2(&self) -> Vec2 {
        Vec2::new(self.w, self.h)
    }
}
