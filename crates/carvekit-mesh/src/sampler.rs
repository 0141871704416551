//! Cutter-aware depth sampling over the triangle mesh.

use carvekit_geom::{Pt2, Pt3};
use carvekit_heightmap::DepthSampler;

use crate::contact::{
    drop_point_to_line_distance, drop_point_to_plane_distance, line_point_on_segment,
    plane_point_in_triangle, project_point_to_line,
};
use crate::footprint::Footprint;
use crate::mesh::TriangleMesh;
use crate::triangle::Triangle;

/// Resolves ball-nose tool contact against the mesh and presents the result
/// through the [`DepthSampler`] contract.
///
/// For a query point the sampler drops a sphere of the tool radius down the
/// vertical line through the point and finds the highest position at which the
/// sphere touches any triangle under the tool footprint. The tool tip sits one
/// radius below the sphere centre; its Z is normalised against the mesh
/// Z-extents so `at` stays within `[0, 1]`.
pub struct MeshSampler {
    mesh: TriangleMesh,
    cutter_radius: f64,
}

impl MeshSampler {
    /// Wraps `mesh` with a ball-nose cutter of the given diameter.
    pub fn with_ball_cutter(mesh: TriangleMesh, cutter_diameter: f64) -> Self {
        Self {
            mesh,
            cutter_radius: 0.5 * cutter_diameter,
        }
    }

    /// One sample per mesh cell crossed by a zero-height footprint spanning
    /// the query range through the middle of the mesh.
    fn samples_across(&self, f: Footprint) -> usize {
        self.mesh.triangles_under_footprint(f).len() / 2
    }
}

impl DepthSampler for MeshSampler {
    fn at(&self, p: Pt2) -> f64 {
        let r = self.cutter_radius;
        let mut best: Option<f64> = None;

        for trg in self.mesh.triangles_under_footprint(Footprint::around(p, r)) {
            if let Some(tip) = ball_tip_on_triangle(p, r, &trg) {
                best = Some(best.map_or(tip, |b: f64| b.max(tip)));
            }
        }

        let (z_min, z_max) = self.mesh.z_extents();
        match best {
            // No contact anywhere under the footprint: the tool is off the
            // relief, report the full "above the stock" height.
            None => 1.0,
            Some(tip) => {
                let extent = z_max - z_min;
                if extent <= 0.0 {
                    1.0
                } else {
                    ((tip - z_min) / extent).clamp(0.0, 1.0)
                }
            }
        }
    }

    fn num_samples_x(&self, x0: f64, x1: f64) -> usize {
        let fp = self.mesh.mesh_footprint();
        let mid_y = 0.5 * (fp.p_min.y + fp.p_max.y);
        self.samples_across(Footprint::new(Pt2::new(x0, mid_y), Pt2::new(x1, mid_y)))
    }

    fn num_samples_y(&self, y0: f64, y1: f64) -> usize {
        let fp = self.mesh.mesh_footprint();
        let mid_x = 0.5 * (fp.p_min.x + fp.p_max.x);
        self.samples_across(Footprint::new(Pt2::new(mid_x, y0), Pt2::new(mid_x, y1)))
    }

    /// No-op: inversion is baked into the pixel sampler the mesh was built
    /// from.
    fn enable_invert(&mut self, _invert: bool) {}
}

/// Returns the highest tool-tip Z at which a ball of radius `r`, centred on
/// the vertical line through `p`, touches the triangle. `None` when the
/// sphere misses the triangle entirely.
fn ball_tip_on_triangle(p: Pt2, r: f64, trg: &Triangle) -> Option<f64> {
    let mut best: Option<f64> = None;
    let mut consider = |tip: f64| {
        best = Some(best.map_or(tip, |b: f64| b.max(tip)));
    };

    // Face contact: drop the sphere centre until it is one radius off the
    // triangle's plane, then check the contact point lies within the
    // triangle.
    if let Some(zc) = drop_point_to_plane_distance(Pt3::new(p.x, p.y, 0.0), r, trg) {
        let center = Pt3::new(p.x, p.y, zc);
        let contact = center - trg.unit_normal() * r;
        if plane_point_in_triangle(contact, trg) {
            consider(zc - r);
        }
    }

    // Edge contact: drop the sphere centre until it is one radius off the
    // infinite line through each edge, then check the contact point lies
    // within the edge segment. Vertex contact is covered by the closed
    // endpoints of these checks.
    for (i, j) in [(0, 1), (1, 2), (2, 0)] {
        let q1 = trg.vertex(i);
        let q2 = trg.vertex(j);

        if let Some(zc) = drop_point_to_line_distance(Pt3::new(p.x, p.y, 0.0), r, q1, q2 - q1) {
            let center = Pt3::new(p.x, p.y, zc);
            let contact = project_point_to_line(center, q1, q2);
            if line_point_on_segment(contact, q1, q2) {
                consider(zc - r);
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use carvekit_heightmap::DepthSampler;

    use super::*;

    /// Fixed-resolution sampler for mesh construction in tests.
    struct GridSampler {
        n: usize,
        value: fn(Pt2) -> f64,
    }

    impl DepthSampler for GridSampler {
        fn at(&self, p: Pt2) -> f64 {
            (self.value)(p)
        }

        fn num_samples_x(&self, _x0: f64, _x1: f64) -> usize {
            self.n
        }

        fn num_samples_y(&self, _y0: f64, _y1: f64) -> usize {
            self.n
        }

        fn enable_invert(&mut self, _invert: bool) {}
    }

    fn mesh_from(n: usize, z_black: f64, z_white: f64, value: fn(Pt2) -> f64) -> TriangleMesh {
        let sampler = GridSampler { n, value };
        TriangleMesh::new(
            Pt2::new(0.0, 0.0),
            Pt2::new(100.0, 100.0),
            z_black,
            z_white,
            &sampler,
        )
        .unwrap()
    }

    #[test]
    fn ball_on_slanted_triangle_face() {
        // 45-degree plane dropping along X; surface height at the query
        // point is 0.5, and the ball rides one cusp height above it.
        let trg = Triangle::new([
            Pt3::new(0.0, 0.0, 1.0),
            Pt3::new(0.0, 1.0, 1.0),
            Pt3::new(1.0, 1.0, 0.0),
        ]);

        let tip = ball_tip_on_triangle(Pt2::new(0.5, 0.5), 0.5, &trg).unwrap();
        assert_abs_diff_eq!(tip, 0.5 * 2.0_f64.sqrt(), epsilon = 1e-6);
        // Overshoot above the surface directly below the tip.
        assert_abs_diff_eq!(tip - 0.5, 0.5 * 2.0_f64.sqrt() - 0.5, epsilon = 1e-6);
    }

    #[test]
    fn ball_on_triangle_top_edge() {
        let trg = Triangle::new([
            Pt3::new(0.0, 0.0, 1.0),
            Pt3::new(0.0, 1.0, 1.0),
            Pt3::new(1.0, 1.0, 0.0),
        ]);

        // Tool centred over the vertical edge at x = 0, z = 1: the sphere
        // rests on the edge and the tip comes back level with it.
        let tip = ball_tip_on_triangle(Pt2::new(0.0, 0.5), 0.5, &trg).unwrap();
        assert_abs_diff_eq!(tip, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn ball_barely_grazing_edge() {
        let trg = Triangle::new([
            Pt3::new(0.0, 0.0, 1.0),
            Pt3::new(0.0, 1.0, 1.0),
            Pt3::new(1.0, 1.0, 0.0),
        ]);

        let tip = ball_tip_on_triangle(Pt2::new(-0.4999999, 0.5), 0.5, &trg).unwrap();
        assert_abs_diff_eq!(tip, 0.5, epsilon = 3.2e-4);
    }

    #[test]
    fn ball_missing_triangle() {
        let trg = Triangle::new([
            Pt3::new(0.0, 0.0, 1.0),
            Pt3::new(0.0, 1.0, 1.0),
            Pt3::new(1.0, 1.0, 0.0),
        ]);

        assert_eq!(ball_tip_on_triangle(Pt2::new(-2.0, 0.5), 0.5, &trg), None);
    }

    #[test]
    fn flat_surface_tip_equals_surface_height() {
        // Flat field at s = 1 over z_black = 0, z_white = 10: surface z = 10.
        let mesh = mesh_from(5, 0.0, 10.0, |_| 1.0);
        let sampler = MeshSampler::with_ball_cutter(mesh, 2.0);

        for (x, y) in [(10.0, 10.0), (50.0, 50.0), (33.3, 71.2), (95.0, 5.0)] {
            let s = sampler.at(Pt2::new(x, y));
            // Normalised: (tip - z_min) / (z_max - z_min) must be exactly the
            // surface level.
            assert_abs_diff_eq!(s, 1.0, epsilon = 1e-7);
        }
    }

    #[test]
    fn ball_rides_up_near_a_step() {
        // Step field: deep (s = 0) for x < 50, shallow (s = 1) beyond.
        let mesh = mesh_from(11, -10.0, 0.0, |p| if p.x < 50.0 { 0.0 } else { 1.0 });
        let sampler = MeshSampler::with_ball_cutter(mesh, 8.0);

        // Far from the step the tool reaches the floor.
        let far = sampler.at(Pt2::new(20.0, 50.0));
        assert_abs_diff_eq!(far, 0.0, epsilon = 1e-7);

        // Close to the step wall the ball touches the upper shelf edge and
        // cannot reach the floor.
        let near = sampler.at(Pt2::new(48.0, 50.0));
        assert!(near > far + 0.1, "near = {near}, far = {far}");
    }

    #[test]
    fn off_mesh_query_reports_full_height() {
        let mesh = mesh_from(5, 0.0, 10.0, |_| 0.5);
        let sampler = MeshSampler::with_ball_cutter(mesh, 2.0);
        assert_eq!(sampler.at(Pt2::new(500.0, 500.0)), 1.0);
    }

    #[test]
    fn sample_counts_match_mesh_cells() {
        let mesh = mesh_from(10, 0.0, 10.0, |_| 0.5);
        let sampler = MeshSampler::with_ball_cutter(mesh, 2.0);

        // 9 cells across the full span, one sample per cell.
        assert_eq!(sampler.num_samples_x(0.0, 100.0), 9);
        assert_eq!(sampler.num_samples_y(0.0, 100.0), 9);
        // Partial spans cover proportionally fewer cells.
        assert_eq!(sampler.num_samples_x(0.0, 50.0), 5);
    }
}
