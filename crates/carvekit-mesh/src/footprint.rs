//! XY bounding rectangle used to index into the mesh.

use carvekit_geom::Pt2;

/// An axis-aligned rectangle in the XY plane with `p_min <= p_max`
/// componentwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub p_min: Pt2,
    pub p_max: Pt2,
}

impl Footprint {
    /// Builds a footprint from two corner points, normalising the corners so
    /// the componentwise ordering invariant holds for any input pair.
    pub fn new(p1: Pt2, p2: Pt2) -> Self {
        Self {
            p_min: Pt2::new(p1.x.min(p2.x), p1.y.min(p2.y)),
            p_max: Pt2::new(p1.x.max(p2.x), p1.y.max(p2.y)),
        }
    }

    /// The axis-aligned square covering a circular tool of radius `r`
    /// centred at `c`.
    pub fn around(c: Pt2, r: f64) -> Self {
        Self::new(
            Pt2::new(c.x - r, c.y - r),
            Pt2::new(c.x + r, c.y + r),
        )
    }
}
