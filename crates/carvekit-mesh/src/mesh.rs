//! Regular triangle mesh over the sampled height field.

use carvekit_geom::{Pt2, Pt3, Vec3};
use carvekit_heightmap::DepthSampler;
use tracing::debug;

use crate::error::{MeshError, Result};
use crate::footprint::Footprint;
use crate::triangle::Triangle;

// Rows of vertices form a grid; each grid cell holds two triangles:
//
//   row i+1: +---+---+---+--
//            |  /|  /|  /|
//            | / | / | / |
//            |/  |/  |/  |
//   row i:   +---+---+---+--
//
// X-coordinates are shared by all rows and stored once in the mesh.
#[derive(Debug)]
struct GridRow {
    /// Y-coordinate for the entire row.
    y: f64,
    /// Z-coordinates, one per X-coordinate.
    z: Vec<f64>,
    /// 2*(N-1) precomputed unit normals for the triangles between this row
    /// and the next.
    normals: Vec<Vec3>,
}

/// A regular triangulated height field.
///
/// Row Y-coordinates and column X-coordinates are strictly increasing, with
/// the first and last pinned exactly to the mesh boundary. Within each cell
/// the two triangles share the diagonal from the bottom-left vertex to the
/// top-right vertex.
#[derive(Debug)]
pub struct TriangleMesh {
    xy_box: Footprint,
    z_min: f64,
    z_max: f64,
    rows: Vec<GridRow>,
    x: Vec<f64>,
}

impl TriangleMesh {
    /// Builds a mesh over `[p_min, p_max]` from the sampler. Grid resolution
    /// follows the sampler's natural sample counts, with a floor of two
    /// vertices per axis. Sampled values map to Z as
    /// `(1 - s) * z_black + s * z_white`.
    pub fn new(
        p_min: Pt2,
        p_max: Pt2,
        z_black: f64,
        z_white: f64,
        sampler: &dyn DepthSampler,
    ) -> Result<Self> {
        if p_min.x == p_max.x || p_min.y == p_max.y {
            return Err(MeshError::DegenerateArea {
                width: p_max.x - p_min.x,
                height: p_max.y - p_min.y,
            });
        }

        let mut mesh = Self {
            xy_box: Footprint::new(p_min, p_max),
            z_min: z_black.min(z_white),
            z_max: z_black.max(z_white),
            rows: Vec::new(),
            x: Vec::new(),
        };
        mesh.build(z_black, z_white, sampler);

        let (nx, ny) = mesh.num_triangles();
        debug!(rows = mesh.rows.len(), nx, ny, "height-field mesh built");

        Ok(mesh)
    }

    /// Returns the mesh Z-extents as `(z_min, z_max)`.
    pub fn z_extents(&self) -> (f64, f64) {
        (self.z_min, self.z_max)
    }

    /// Returns the triangle counts `(nx, ny)`: `nx` triangles along X per
    /// row of cells, `ny` rows of cells along Y.
    pub fn num_triangles(&self) -> (usize, usize) {
        let ny = self.rows.len().saturating_sub(1);
        let nx = if ny > 0 { 2 * (self.x.len() - 1) } else { 0 };
        (nx, ny)
    }

    /// Returns the footprint of the entire mesh.
    pub fn mesh_footprint(&self) -> Footprint {
        self.xy_box
    }

    /// Returns the triangle at index `(ix, iy)` with
    /// `0 <= ix < nx, 0 <= iy < ny`.
    pub fn triangle(&self, ix: usize, iy: usize) -> Triangle {
        let (nx, ny) = self.num_triangles();
        assert!(ix < nx && iy < ny, "triangle index ({ix}, {iy}) out of range");

        // Within a cell, triangle 0 is the upper-left half and triangle 1 the
        // lower-right half:
        //         +---+
        //         |  /|
        //      T0 | / | T1
        //         |/  |
        //         +---+
        //        iv   iv+1
        let iv = ix / 2;
        let x_left = self.x[iv];
        let x_right = self.x[iv + 1];
        let row0 = &self.rows[iy];
        let row1 = &self.rows[iy + 1];

        let vertices = if ix & 1 == 0 {
            [
                Pt3::new(x_left, row0.y, row0.z[iv]),
                Pt3::new(x_left, row1.y, row1.z[iv]),
                Pt3::new(x_right, row1.y, row1.z[iv + 1]),
            ]
        } else {
            [
                Pt3::new(x_left, row0.y, row0.z[iv]),
                Pt3::new(x_right, row1.y, row1.z[iv + 1]),
                Pt3::new(x_right, row0.y, row0.z[iv + 1]),
            ]
        };

        Triangle::with_normal(vertices, row0.normals[ix])
    }

    /// Returns the footprint of the cell owning triangle `(ix, iy)`.
    pub fn footprint_for_triangle(&self, ix: usize, iy: usize) -> Footprint {
        let (nx, ny) = self.num_triangles();
        assert!(ix < nx && iy < ny, "triangle index ({ix}, {iy}) out of range");

        let iv = ix / 2;
        Footprint::new(
            Pt2::new(self.x[iv], self.rows[iy].y),
            Pt2::new(self.x[iv + 1], self.rows[iy + 1].y),
        )
    }

    /// Gathers every triangle whose owning cell intersects footprint `f`.
    ///
    /// The footprint is treated as a closed set: cells that merely abut its
    /// boundary are included. Returns an empty iterator when the footprint
    /// lies entirely outside the mesh.
    pub fn triangles_under_footprint(&self, f: Footprint) -> TriangleIter {
        let Some((i_min_row, i_max_row)) = self.rows_for_footprint(&f) else {
            return TriangleIter::empty();
        };
        let Some((i_min_col, i_max_col)) = self.columns_for_footprint(&f) else {
            return TriangleIter::empty();
        };

        let mut triangles =
            Vec::with_capacity(2 * (i_max_row - i_min_row) * (i_max_col - i_min_col));
        for ic in i_min_col..i_max_col {
            for ir in i_min_row..i_max_row {
                let row0 = &self.rows[ir];
                let row1 = &self.rows[ir + 1];

                triangles.push(Triangle::with_normal(
                    [
                        Pt3::new(self.x[ic], row0.y, row0.z[ic]),
                        Pt3::new(self.x[ic], row1.y, row1.z[ic]),
                        Pt3::new(self.x[ic + 1], row1.y, row1.z[ic + 1]),
                    ],
                    row0.normals[2 * ic],
                ));
                triangles.push(Triangle::with_normal(
                    [
                        Pt3::new(self.x[ic], row0.y, row0.z[ic]),
                        Pt3::new(self.x[ic + 1], row1.y, row1.z[ic + 1]),
                        Pt3::new(self.x[ic + 1], row0.y, row0.z[ic + 1]),
                    ],
                    row0.normals[2 * ic + 1],
                ));
            }
        }

        TriangleIter::new(triangles)
    }

    /// Finds the cell-row range `[i_min, i_max)` overlapping the footprint,
    /// or `None` when the footprint misses the mesh entirely.
    fn rows_for_footprint(&self, f: &Footprint) -> Option<(usize, usize)> {
        if self.rows.is_empty() {
            return None;
        }
        if f.p_max.y < self.xy_box.p_min.y || f.p_min.y > self.xy_box.p_max.y {
            return None;
        }

        let i_top_row = self.rows.len() - 1;

        // First row just below or level with the footprint.
        let mut i_min = 0;
        while i_min != i_top_row - 1 && f.p_min.y > self.rows[i_min + 1].y {
            i_min += 1;
        }

        // First row strictly above the footprint.
        let mut i_max = i_min + 1;
        while i_max != i_top_row && self.rows[i_max].y <= f.p_max.y {
            i_max += 1;
        }

        Some((i_min, i_max))
    }

    /// Column analogue of [`Self::rows_for_footprint`].
    fn columns_for_footprint(&self, f: &Footprint) -> Option<(usize, usize)> {
        if self.rows.is_empty() {
            return None;
        }
        if f.p_max.x < self.xy_box.p_min.x || f.p_min.x > self.xy_box.p_max.x {
            return None;
        }

        let i_last_col = self.x.len() - 1;

        let mut i_min = 0;
        while i_min != i_last_col - 1 && f.p_min.x > self.x[i_min + 1] {
            i_min += 1;
        }

        let mut i_max = i_min + 1;
        while i_max != i_last_col && self.x[i_max] <= f.p_max.x {
            i_max += 1;
        }

        Some((i_min, i_max))
    }

    fn build(&mut self, z_black: f64, z_white: f64, sampler: &dyn DepthSampler) {
        let p_min = self.xy_box.p_min;
        let p_max = self.xy_box.p_max;

        let num_rows = sampler.num_samples_y(p_min.y, p_max.y).max(2);
        let num_vertices_per_row = sampler.num_samples_x(p_min.x, p_max.x).max(2);

        self.x = Self::spread(p_min.x, p_max.x, num_vertices_per_row);

        let ys = Self::spread(p_min.y, p_max.y, num_rows);
        self.rows = Vec::with_capacity(num_rows);
        for (i, &y) in ys.iter().enumerate() {
            let mut row = GridRow {
                y,
                z: Vec::with_capacity(num_vertices_per_row),
                normals: Vec::new(),
            };
            for &x in &self.x {
                let s = sampler.at(Pt2::new(x, y));
                row.z.push((1.0 - s) * z_black + s * z_white);
            }
            self.rows.push(row);

            if i > 0 {
                self.populate_normals_for_row(i - 1);
            }
        }
    }

    /// Evenly spreads `n >= 2` values over `[v0, v1]` with the endpoints
    /// pinned exactly.
    fn spread(v0: f64, v1: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                if i == 0 {
                    v0
                } else if i == n - 1 {
                    v1
                } else {
                    let t = i as f64 / (n - 1) as f64;
                    (1.0 - t) * v0 + t * v1
                }
            })
            .collect()
    }

    /// Computes the two unit normals of every cell between `row_index` and
    /// `row_index + 1`. Both rows must already have their Z values.
    fn populate_normals_for_row(&mut self, row_index: usize) {
        let yi = self.rows[row_index].y;
        let yj = self.rows[row_index + 1].y;

        let num_vertices = self.x.len();
        let mut normals = Vec::with_capacity(2 * (num_vertices - 1));

        for k in 0..num_vertices - 1 {
            let xk = self.x[k];
            let xl = self.x[k + 1];
            let zi = &self.rows[row_index].z;
            let zj = &self.rows[row_index + 1].z;

            let p0 = Pt3::new(xk, yi, zi[k]);
            let p1 = Pt3::new(xk, yj, zj[k]);
            let p2 = Pt3::new(xl, yj, zj[k + 1]);

            let w1 = p1 - p0;
            let w2 = p2 - p0;
            normals.push(Self::upward_unit(w2.cross(w1)));

            let p2 = Pt3::new(xl, yi, zi[k + 1]);
            let w1 = p2 - p0;
            normals.push(Self::upward_unit(w1.cross(w2)));
        }

        self.rows[row_index].normals = normals;
    }

    fn upward_unit(n: Vec3) -> Vec3 {
        let n = n.normalized();
        if n.z < 0.0 {
            -n
        } else {
            n
        }
    }
}

/// Iterator over the triangles selected by a footprint query.
///
/// The triangles are materialised at query time; the iterator owns them and
/// is independent of subsequent queries.
#[derive(Debug)]
pub struct TriangleIter {
    triangles: Vec<Triangle>,
    index: usize,
}

impl TriangleIter {
    fn new(triangles: Vec<Triangle>) -> Self {
        Self { triangles, index: 0 }
    }

    fn empty() -> Self {
        Self::new(Vec::new())
    }
}

impl Iterator for TriangleIter {
    type Item = Triangle;

    fn next(&mut self) -> Option<Triangle> {
        let trg = self.triangles.get(self.index).copied();
        self.index += 1;
        trg
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.triangles.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TriangleIter {}
