//! A single mesh triangle.

use carvekit_geom::{Pt3, Vec3};

/// One triangle of the height-field mesh with its precomputed unit normal.
///
/// Normals always have a non-negative Z component: the mesh is a function of
/// XY, so no triangle faces downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    vertices: [Pt3; 3],
    normal: Vec3,
}

impl Triangle {
    /// Builds a triangle from its vertices, deriving the unit normal and
    /// flipping it upward if needed.
    pub fn new(vertices: [Pt3; 3]) -> Self {
        let v = vertices[2] - vertices[1];
        let w = vertices[0] - vertices[1];
        let mut normal = v.cross(w).normalized();
        if normal.z < 0.0 {
            normal = -normal;
        }
        Self { vertices, normal }
    }

    /// Builds a triangle with an already-computed unit normal.
    pub(crate) fn with_normal(vertices: [Pt3; 3], normal: Vec3) -> Self {
        Self { vertices, normal }
    }

    pub fn vertex(&self, i: usize) -> Pt3 {
        self.vertices[i.min(2)]
    }

    pub fn unit_normal(&self) -> Vec3 {
        self.normal
    }
}
