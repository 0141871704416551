//! 2D and 3D point types.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::matrix::Matrix33;
use crate::vector::{Vec2, Vec3};

/// A 2D point. Equality is bitwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pt2 {
    pub x: f64,
    pub y: f64,
}

impl Pt2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Transforms the point by `m` in row-vector convention (`p' = p * m`).
    pub fn xform(&self, m: &Matrix33) -> Pt2 {
        Pt2 {
            x: self.x * m.get(0, 0) + self.y * m.get(1, 0) + m.get(2, 0),
            y: self.x * m.get(0, 1) + self.y * m.get(1, 1) + m.get(2, 1),
        }
    }
}

impl Add<Vec2> for Pt2 {
    type Output = Pt2;

    fn add(self, v: Vec2) -> Pt2 {
        Pt2::new(self.x + v.x, self.y + v.y)
    }
}

impl Sub<Vec2> for Pt2 {
    type Output = Pt2;

    fn sub(self, v: Vec2) -> Pt2 {
        Pt2::new(self.x - v.x, self.y - v.y)
    }
}

impl Sub for Pt2 {
    type Output = Vec2;

    fn sub(self, q: Pt2) -> Vec2 {
        Vec2::new(self.x - q.x, self.y - q.y)
    }
}

/// A 3D point. Equality is bitwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pt3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Pt3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The XY projection of the point.
    pub fn xy(&self) -> Pt2 {
        Pt2::new(self.x, self.y)
    }
}

impl Add<Vec3> for Pt3 {
    type Output = Pt3;

    fn add(self, v: Vec3) -> Pt3 {
        Pt3::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }
}

impl Sub<Vec3> for Pt3 {
    type Output = Pt3;

    fn sub(self, v: Vec3) -> Pt3 {
        Pt3::new(self.x - v.x, self.y - v.y, self.z - v.z)
    }
}

impl Sub for Pt3 {
    type Output = Vec3;

    fn sub(self, q: Pt3) -> Vec3 {
        Vec3::new(self.x - q.x, self.y - q.y, self.z - q.z)
    }
}
