//! Geometric helpers for tool-contact resolution.
//!
//! All functions treat degenerate inputs (near-vertical planes, zero-length
//! edges, negative discriminants) as "no contact" and return `None`; the
//! caller simply moves on to the next candidate.

use carvekit_geom::{Pt2, Pt3, Vec2, Vec3};

use crate::triangle::Triangle;

const EPS: f64 = 1e-6;

/// Moves point `p` vertically until it is at distance `r` from the plane
/// embedding `trg`, and returns the new Z-coordinate. Fails when the plane is
/// (nearly) vertical or `r` is negative.
pub(crate) fn drop_point_to_plane_distance(p: Pt3, r: f64, trg: &Triangle) -> Option<f64> {
    let n = trg.unit_normal();
    if n.z.abs() < EPS || r < 0.0 {
        return None;
    }

    let q = trg.vertex(0);
    let d = (p.xy() - q.xy()).dot(n.xy()).abs();
    Some((r - d) / n.z + q.z)
}

/// Projects `p` onto the plane embedding `trg`.
pub(crate) fn project_point_to_triangle_plane(p: Pt3, trg: &Triangle) -> Pt3 {
    let n = trg.unit_normal();
    let v = p - trg.vertex(0);
    p - n * v.dot(n)
}

/// Returns whether a point known to lie on the triangle's plane is within the
/// triangle bounds. The test works in the XY plane, which is valid because
/// mesh triangle normals always point upward.
pub(crate) fn plane_point_in_triangle(p: Pt3, trg: &Triangle) -> bool {
    let p1 = p.xy();
    let q0 = trg.vertex(0).xy();
    let q1 = trg.vertex(1).xy();
    let q2 = trg.vertex(2).xy();

    // Mesh triangles have one vertical and one horizontal edge; use that to
    // cut the test down to one half-plane check against the diagonal.
    if q0.x == q1.x && q1.y == q2.y {
        // The upper-left triangle: q1 +-+ q2
        //                             |/
        //                          q0 +
        if p1.y > q1.y || p1.x < q0.x {
            return false;
        }

        // w is perpendicular to the diagonal, pointing into the triangle.
        let w = Vec2::new(q0.y - q2.y, q2.x - q0.x);
        return (p1 - q2).dot(w) >= 0.0;
    }

    if q1.x == q2.x && q2.y == q0.y {
        // The lower-right triangle:    + q1
        //                             /|
        //                         q0 +-+ q2
        if p1.y < q0.y || p1.x > q2.x {
            return false;
        }

        let w = Vec2::new(q1.y - q0.y, q0.x - q1.x);
        return (p1 - q1).dot(w) >= 0.0;
    }

    // General triangle: the point is inside iff it is on the inner side of
    // all three edges.
    in_triangle_general(p1, q0, q1, q2)
}

fn in_triangle_general(p: Pt2, q0: Pt2, q1: Pt2, q2: Pt2) -> bool {
    let edge_side = |a: Pt2, b: Pt2, opposite: Pt2| {
        let w = Vec2::new(a.y - b.y, b.x - a.x);
        let inward = (opposite - a).dot(w).signum();
        (p - a).dot(w) * inward >= -EPS
    };
    edge_side(q0, q1, q2) && edge_side(q1, q2, q0) && edge_side(q2, q0, q1)
}

/// Projects `p` onto the line through `q1` and `q2`. A degenerate line
/// (`q1 == q2`) projects everything onto `q1`.
pub(crate) fn project_point_to_line(p: Pt3, q1: Pt3, q2: Pt3) -> Pt3 {
    let w = q2 - q1;
    let d = w.length_sq();
    if d < EPS {
        return q1;
    }

    let v = p - q1;
    let s = v.dot(w) / d;
    q1 + w * s
}

/// Returns whether point `p`, assumed to lie on the line through `q1` and
/// `q2`, lies on or between the two points.
pub(crate) fn line_point_on_segment(p: Pt3, q1: Pt3, q2: Pt3) -> bool {
    let v = p - q1;
    let w = q2 - q1;

    if v.length_sq() > w.length_sq() {
        return false;
    }

    v.dot(w) >= 0.0
}

/// Moves point `p` along +Z until it is at distance `r` from the line defined
/// by point `q` and direction `w`, returning the new Z-coordinate.
///
/// Seeking `p1 = p + lambda * k_hat` with
/// `|p1 - proj_line(p1)|^2 = r^2` has a closed-form quadratic solution; the
/// larger root (highest position) is returned. Fails on a zero-length
/// direction, a negative discriminant, or a vanishing quadratic coefficient.
pub(crate) fn drop_point_to_line_distance(p: Pt3, r: f64, q: Pt3, w: Vec3) -> Option<f64> {
    let v = p - q;
    let l = w.length_sq();
    if l.abs() < EPS {
        return None;
    }

    let m = v.dot(w) / l;
    let s = w.z / l;

    let k = v - w * m;
    let t = Vec3::new(-s * w.x, -s * w.y, 1.0 - s * w.z);

    let a = t.dot(t);
    let b = 2.0 * t.dot(k);
    let c = k.dot(k) - r * r;

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 || a.abs() < EPS {
        return None;
    }

    let den = 1.0 / (2.0 * a);
    let root = disc.sqrt();
    let z1 = p.z + (-b + root) * den;
    let z2 = p.z + (-b - root) * den;

    Some(z1.max(z2))
}
