//! grbl-dialect G-code generator.
//!
//! Buffers each carving path as a compound of components (polylines and
//! arcs), simplifies the polylines, and serialises to a minimal
//! grbl-compatible dialect: absolute positioning, millimetre units, XY plane,
//! coordinates and feed rates printed with two decimals, duplicate positions
//! elided.

use std::io::Write;

use carvekit_geom::Pt3;

use crate::error::Result;
use crate::generator::CodeGenerator;

const EPSILON: f64 = 1e-5;
const EPSILON_SQ: f64 = EPSILON * EPSILON;

/// Colinear-collapse tolerance for polyline simplification, in mm.
const FLATNESS_TOLERANCE: f64 = 0.04;
const FLATNESS_TOLERANCE_SQ: f64 = FLATNESS_TOLERANCE * FLATNESS_TOLERANCE;

/// XY-proximity merge tolerance for polyline simplification, in mm.
const PROXIMITY_TOLERANCE: f64 = 0.15;
const PROXIMITY_TOLERANCE_SQ: f64 = PROXIMITY_TOLERANCE * PROXIMITY_TOLERANCE;

/// Squared XY distance beyond which repositioning uses a rapid traverse at
/// the high safe height instead of a feed move at the low one.
const FAR_REPOSITION_DIST_SQ: f64 = 2500.0;
const FAR_SAFE_Z: f64 = 5.0;
const NEAR_SAFE_Z: f64 = 1.0;
const EPILOGUE_SAFE_Z: f64 = 25.0;

const GRBL_ABSOLUTE_POSITIONING: &str = "G90";
const GRBL_SELECT_PLANE_XY: &str = "G17";
const GRBL_SET_UNIT_MM: &str = "G21";
const GRBL_HOME: &str = "G28 G91 Z0";
const GRBL_END_PROGRAM: &str = "M30";

const INITIAL_PATH_BUFFER_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArcDirection {
    Clockwise,
    CounterClockwise,
}

/// One component of a compound path. The first point of a component always
/// coincides with the last point of the preceding one.
#[derive(Debug, Clone)]
enum PathComponent {
    Polyline(Vec<Pt3>),
    Arc {
        direction: ArcDirection,
        radius: f64,
        end: Pt3,
    },
}

impl PathComponent {
    fn end_point(&self) -> Pt3 {
        match self {
            // A polyline always holds at least its seed point.
            PathComponent::Polyline(points) => *points.last().expect("empty polyline component"),
            PathComponent::Arc { end, .. } => *end,
        }
    }
}

/// G-code generator for the grbl dialect.
pub struct GrblGenerator<W: Write> {
    horiz_feed_rate: f64,
    vert_feed_rate: f64,

    path: Vec<PathComponent>,
    starting_point: Pt3,

    current_loc: Pt3,
    out: W,
}

impl<W: Write> GrblGenerator<W> {
    pub fn new(horiz_feed_rate: f64, vert_feed_rate: f64, out: W) -> Self {
        Self {
            horiz_feed_rate,
            vert_feed_rate,
            path: Vec::new(),
            starting_point: Pt3::new(0.0, 0.0, 0.0),
            current_loc: Pt3::new(0.0, 0.0, 0.0),
            out,
        }
    }

    /// Consumes the generator, returning the output sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn append_point(&mut self, q: Pt3) {
        let component = self.component_to_append_to();
        let PathComponent::Polyline(points) = component else {
            unreachable!("component_to_append_to always returns a polyline");
        };
        // Successive co-located points carry no information.
        if points.last() != Some(&q) {
            points.push(q);
        }
    }

    /// Returns the polyline component new points go into: the trailing
    /// component if it is a polyline, otherwise a fresh one seeded with the
    /// previous component's end point (or the path starting point).
    fn component_to_append_to(&mut self) -> &mut PathComponent {
        let needs_new = !matches!(self.path.last(), Some(PathComponent::Polyline(_)));
        if needs_new {
            let seed = self
                .path
                .last()
                .map_or(self.starting_point, |c| c.end_point());
            let mut points = Vec::with_capacity(INITIAL_PATH_BUFFER_SIZE);
            points.push(seed);
            self.path.push(PathComponent::Polyline(points));
        }
        self.path.last_mut().expect("path cannot be empty here")
    }

    fn emit_compound_path(&mut self) -> Result<()> {
        let path = std::mem::take(&mut self.path);
        for (i, component) in path.iter().enumerate() {
            match component {
                PathComponent::Polyline(points) => {
                    // The very first component needs a reposition to its
                    // first point; later components start where the previous
                    // one ended, so their seed point is skipped.
                    if i == 0 {
                        self.reposition_to(points[0])?;
                    }
                    for &q in &points[1..] {
                        self.linear_move_xyz(q)?;
                    }
                }
                PathComponent::Arc {
                    direction,
                    radius,
                    end,
                } => {
                    if i == 0 {
                        self.reposition_to(self.starting_point)?;
                    }
                    self.arc_to(*direction, *radius, *end)?;
                }
            }
        }
        Ok(())
    }

    /// Safely repositions the tool to `p`: straight plunge when already over
    /// the target XY, otherwise lift, traverse, plunge. Traverses longer than
    /// 50 mm go as a rapid at the high safe height; short hops stay at feed
    /// rate just above the stock.
    fn reposition_to(&mut self, p: Pt3) -> Result<()> {
        if self.current_loc.x == p.x && self.current_loc.y == p.y {
            return self.linear_move_z(p.z);
        }

        if (self.current_loc - p).length_sq() > FAR_REPOSITION_DIST_SQ {
            self.linear_move_z(FAR_SAFE_Z)?;
            self.rapid_move_xyz(Pt3::new(p.x, p.y, FAR_SAFE_Z))?;
            self.linear_move_z(p.z)
        } else {
            self.linear_move_z(NEAR_SAFE_Z)?;
            self.linear_move_xyz(Pt3::new(p.x, p.y, NEAR_SAFE_Z))?;
            self.linear_move_z(p.z)
        }
    }

    fn emit_preamble(&mut self) -> Result<()> {
        self.write_line(GRBL_ABSOLUTE_POSITIONING)?;
        self.write_line(GRBL_SELECT_PLANE_XY)?;
        self.write_line(GRBL_SET_UNIT_MM)?;
        self.write_line(GRBL_HOME)?;
        self.write_line(GRBL_ABSOLUTE_POSITIONING)
    }

    fn emit_epilogue(&mut self) -> Result<()> {
        self.rapid_move_z(EPILOGUE_SAFE_Z)?;
        self.write_line(GRBL_HOME)?;
        self.write_line(GRBL_END_PROGRAM)
    }

    fn linear_move_z(&mut self, z: f64) -> Result<()> {
        if self.current_loc.z != z {
            writeln!(self.out, "G1 Z{:.2} F{:.2}", z, self.vert_feed_rate)?;
            self.current_loc.z = z;
        }
        Ok(())
    }

    fn linear_move_xyz(&mut self, q: Pt3) -> Result<()> {
        if self.current_loc != q {
            writeln!(
                self.out,
                "G1 X{:.2} Y{:.2} Z{:.2} F{:.2}",
                q.x, q.y, q.z, self.horiz_feed_rate
            )?;
            self.current_loc = q;
        }
        Ok(())
    }

    fn rapid_move_xyz(&mut self, q: Pt3) -> Result<()> {
        if self.current_loc != q {
            writeln!(self.out, "G0 X{:.2} Y{:.2} Z{:.2}", q.x, q.y, q.z)?;
            self.current_loc = q;
        }
        Ok(())
    }

    fn rapid_move_z(&mut self, z: f64) -> Result<()> {
        if self.current_loc.z != z {
            writeln!(self.out, "G0 Z{:.2}", z)?;
            self.current_loc.z = z;
        }
        Ok(())
    }

    fn arc_to(&mut self, direction: ArcDirection, radius: f64, q: Pt3) -> Result<()> {
        if radius <= 0.0 {
            return Ok(());
        }
        let word = match direction {
            ArcDirection::Clockwise => "G2",
            ArcDirection::CounterClockwise => "G3",
        };
        writeln!(
            self.out,
            "{} X{:.2} Y{:.2} Z{:.2} R{:.2} F{:.2}",
            word, q.x, q.y, q.z, radius, self.horiz_feed_rate
        )?;
        self.current_loc = q;
        Ok(())
    }

    fn write_line(&mut self, s: &str) -> Result<()> {
        writeln!(self.out, "{s}")?;
        Ok(())
    }
}

impl<W: Write> CodeGenerator for GrblGenerator<W> {
    fn start_job(&mut self) -> Result<()> {
        self.path.clear();
        self.emit_preamble()
    }

    fn end_job(&mut self) -> Result<()> {
        self.emit_epilogue()
    }

    fn change_horizontal_feed_rate(&mut self, new_rate: f64) -> f64 {
        std::mem::replace(&mut self.horiz_feed_rate, new_rate)
    }

    fn change_vertical_feed_rate(&mut self, new_rate: f64) -> f64 {
        std::mem::replace(&mut self.vert_feed_rate, new_rate)
    }

    fn start_path(&mut self, x: f64, y: f64, depth: f64) {
        self.path.clear();
        self.starting_point = Pt3::new(x, y, depth);
    }

    fn move_to(&mut self, x: f64, y: f64, depth: f64) {
        self.append_point(Pt3::new(x, y, depth));
    }

    fn cw_arc_to(&mut self, x: f64, y: f64, depth: f64, radius: f64) {
        self.path.push(PathComponent::Arc {
            direction: ArcDirection::Clockwise,
            radius,
            end: Pt3::new(x, y, depth),
        });
    }

    fn ccw_arc_to(&mut self, x: f64, y: f64, depth: f64, radius: f64) {
        self.path.push(PathComponent::Arc {
            direction: ArcDirection::CounterClockwise,
            radius,
            end: Pt3::new(x, y, depth),
        });
    }

    fn end_path(&mut self, discard: bool) -> Result<()> {
        if discard {
            self.path.clear();
            return Ok(());
        }

        for component in &mut self.path {
            if let PathComponent::Polyline(points) = component {
                simplify_by_flatness(points);
                simplify_by_proximity(points);
            }
        }

        self.emit_compound_path()
    }
}

/// Collapses runs of (nearly) colinear vertices into single segments.
///
/// Walks a window `[p0, p1]` forward; while every intermediate vertex stays
/// within the flatness tolerance of the chord, the window keeps growing. When
/// a vertex falls out of tolerance the chord is pinned at `p1 - 1` and a new
/// window starts there. Endpoints are always kept.
pub(crate) fn simplify_by_flatness(points: &mut Vec<Pt3>) {
    if points.len() < 3 {
        return;
    }

    let mut keep_index = 0;
    let keep = |points: &mut Vec<Pt3>, keep_index: &mut usize, i: usize| {
        if i != *keep_index {
            points[*keep_index] = points[i];
        }
        *keep_index += 1;
    };

    let mut p0 = 0;
    let mut p1 = 2;
    keep(points, &mut keep_index, p0);
    while p1 < points.len() {
        let mut dist_sq: f64 = 0.0;
        for q in p0 + 1..p1 {
            dist_sq = dist_sq.max(dist_to_segment_sq(points[q], points[p0], points[p1]));
        }

        if dist_sq > FLATNESS_TOLERANCE_SQ {
            // Some vertex between p0 and p1 is out of tolerance: pin the
            // chord at p1 - 1 and start accumulating from there.
            p0 = p1 - 1;
            keep(points, &mut keep_index, p0);
            p1 = p0 + 1;
        }

        p1 += 1;
    }

    // Everything since the last anchor is colinear; keep only the last point.
    p0 += 1;
    if p0 < points.len() {
        keep(points, &mut keep_index, points.len() - 1);
    }

    points.truncate(keep_index);
}

/// Merges consecutive vertices that are within the proximity tolerance in XY,
/// keeping the shallowest Z of the pair (carving Z is non-positive, so the
/// greatest value wins). The path's last vertex keeps its own XY.
pub(crate) fn simplify_by_proximity(points: &mut Vec<Pt3>) {
    if points.len() < 3 {
        return;
    }

    let mut keep_index = 0;
    let keep = |points: &mut Vec<Pt3>, keep_index: &mut usize, q: Pt3| {
        if *keep_index > 0 && points[*keep_index - 1] == q {
            return;
        }
        points[*keep_index] = q;
        *keep_index += 1;
    };
    let update_last = |points: &mut Vec<Pt3>, keep_index: usize, q: Pt3| {
        if keep_index > 0 {
            points[keep_index - 1] = q;
        }
    };

    let n = points.len();
    let mut q0 = points[0];
    keep(points, &mut keep_index, q0);

    for p1 in 1..n {
        let mut q1 = points[p1];

        let d = (q1.xy() - q0.xy()).length_sq();
        if d < PROXIMITY_TOLERANCE_SQ {
            let max_z = q0.z.max(q1.z);
            if p1 == n - 1 {
                // q1 is the last point along the path; its XY wins.
                q1.z = max_z;
                update_last(points, keep_index, q1);
            } else {
                q0.z = max_z;
                update_last(points, keep_index, q0);
            }
        } else {
            keep(points, &mut keep_index, q1);
            q0 = q1;
        }
    }

    points.truncate(keep_index);
}

/// Squared distance from `q` to the line through `p0` and `p1`. Coincident
/// line points degrade to the squared distance from `q` to `p0`.
fn dist_to_segment_sq(q: Pt3, p0: Pt3, p1: Pt3) -> f64 {
    let v = q - p0;
    let w = p1 - p0;
    let l_sq = w.dot(w);

    if l_sq < EPSILON_SQ {
        return v.dot(v);
    }

    let s = v.dot(w) / l_sq;
    let d = v - w * s;
    d.dot(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64, z: f64) -> Pt3 {
        Pt3::new(x, y, z)
    }

    fn gen_into_vec() -> GrblGenerator<Vec<u8>> {
        GrblGenerator::new(100.0, 50.0, Vec::new())
    }

    fn output(gen: GrblGenerator<Vec<u8>>) -> String {
        String::from_utf8(gen.into_inner()).unwrap()
    }

    #[test]
    fn preamble_and_epilogue() {
        let mut gen = gen_into_vec();
        gen.start_job().unwrap();
        gen.end_job().unwrap();
        assert_eq!(
            output(gen),
            "G90\nG17\nG21\nG28 G91 Z0\nG90\nG0 Z25.00\nG28 G91 Z0\nM30\n"
        );
    }

    #[test]
    fn far_reposition_uses_rapid_at_high_safe_z() {
        // From (0, 0, -1), a path starting at (100, 0, -2) is 100 mm away.
        let mut gen = gen_into_vec();
        gen.current_loc = pt(0.0, 0.0, -1.0);
        gen.start_path(100.0, 0.0, -2.0);
        gen.move_to(100.0, 0.0, -2.0);
        gen.move_to(101.0, 0.0, -2.0);
        gen.end_path(false).unwrap();

        let out = output(gen);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            [
                "G1 Z5.00 F50.00",
                "G0 X100.00 Y0.00 Z5.00",
                "G1 Z-2.00 F50.00",
                "G1 X101.00 Y0.00 Z-2.00 F100.00",
            ]
        );
    }

    #[test]
    fn near_reposition_stays_at_feed_rate() {
        // From (0, 0, -1), a path starting at (5, 0, -2) is 5 mm away.
        let mut gen = gen_into_vec();
        gen.current_loc = pt(0.0, 0.0, -1.0);
        gen.start_path(5.0, 0.0, -2.0);
        gen.move_to(5.0, 0.0, -2.0);
        gen.move_to(6.0, 0.0, -2.0);
        gen.end_path(false).unwrap();

        let out = output(gen);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            [
                "G1 Z1.00 F50.00",
                "G1 X5.00 Y0.00 Z1.00 F100.00",
                "G1 Z-2.00 F50.00",
                "G1 X6.00 Y0.00 Z-2.00 F100.00",
            ]
        );
    }

    #[test]
    fn reposition_in_place_only_plunges() {
        let mut gen = gen_into_vec();
        gen.current_loc = pt(2.0, 3.0, 0.0);
        gen.start_path(2.0, 3.0, -1.0);
        gen.move_to(2.0, 3.0, -1.0);
        gen.move_to(4.0, 3.0, -1.0);
        gen.end_path(false).unwrap();

        let out = output(gen);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            ["G1 Z-1.00 F50.00", "G1 X4.00 Y3.00 Z-1.00 F100.00"]
        );
    }

    #[test]
    fn discarded_path_emits_nothing() {
        let mut gen = gen_into_vec();
        gen.start_path(0.0, 0.0, -1.0);
        gen.move_to(10.0, 0.0, -1.0);
        gen.move_to(20.0, 0.0, -1.0);
        gen.end_path(true).unwrap();
        assert_eq!(output(gen), "");
    }

    #[test]
    fn duplicate_positions_are_elided() {
        let mut gen = gen_into_vec();
        gen.start_path(0.0, 0.0, 0.0);
        gen.move_to(0.0, 0.0, 0.0);
        gen.move_to(0.0, 0.0, 0.0);
        gen.move_to(10.0, 0.0, 0.0);
        gen.move_to(10.0, 0.0, 0.0);
        gen.end_path(false).unwrap();

        let out = output(gen);
        assert_eq!(out.matches("G1 X").count(), 1);
    }

    #[test]
    fn arcs_emit_g2_and_g3() {
        let mut gen = gen_into_vec();
        gen.start_path(0.0, 0.0, -1.0);
        gen.cw_arc_to(10.0, 0.0, -1.0, 5.0);
        gen.ccw_arc_to(20.0, 0.0, -1.0, 5.0);
        gen.end_path(false).unwrap();

        let out = output(gen);
        assert!(out.contains("G2 X10.00 Y0.00 Z-1.00 R5.00 F100.00"));
        assert!(out.contains("G3 X20.00 Y0.00 Z-1.00 R5.00 F100.00"));
    }

    #[test]
    fn feed_rate_changes_return_previous_rate() {
        let mut gen = gen_into_vec();
        assert_eq!(gen.change_horizontal_feed_rate(240.0), 100.0);
        assert_eq!(gen.change_horizontal_feed_rate(100.0), 240.0);
        assert_eq!(gen.change_vertical_feed_rate(25.0), 50.0);
    }

    #[test]
    fn simplify_keeps_non_colinear_vertices() {
        let mut points = vec![pt(0.0, 0.0, 0.0), pt(1.0, 1.0, 1.0), pt(0.0, 1.0, 1.0)];
        let expect = points.clone();
        simplify_by_flatness(&mut points);
        assert_eq!(points, expect);
    }

    #[test]
    fn simplify_two_point_path_is_untouched() {
        let mut points = vec![pt(0.0, 0.0, 0.0), pt(1.0, 1.0, 1.0)];
        let expect = points.clone();
        simplify_by_flatness(&mut points);
        assert_eq!(points, expect);
    }

    #[test]
    fn simplify_collapses_colinear_vertices() {
        let mut points = vec![pt(0.0, 0.0, 0.0), pt(1.0, 1.0, 1.0), pt(2.0, 2.0, 2.0)];
        simplify_by_flatness(&mut points);
        assert_eq!(points, [pt(0.0, 0.0, 0.0), pt(2.0, 2.0, 2.0)]);

        let mut points = vec![
            pt(0.0, 0.0, 0.0),
            pt(1.0, 1.0, 1.0),
            pt(2.0, 2.0, 2.0),
            pt(3.0, 3.0, 3.0),
        ];
        simplify_by_flatness(&mut points);
        assert_eq!(points, [pt(0.0, 0.0, 0.0), pt(3.0, 3.0, 3.0)]);
    }

    #[test]
    fn simplify_keeps_outlier() {
        let mut points = vec![
            pt(0.0, 0.0, 0.0),
            pt(1.0, 1.0, 1.0),
            pt(2.0, 2.0, 2.0),
            pt(3.0, 3.0, 3.0),
            pt(4.0, 4.0, 0.0),
        ];
        simplify_by_flatness(&mut points);
        assert_eq!(
            points,
            [pt(0.0, 0.0, 0.0), pt(3.0, 3.0, 3.0), pt(4.0, 4.0, 0.0)]
        );
    }

    #[test]
    fn flatness_simplify_is_idempotent() {
        let mut points = vec![
            pt(0.0, 0.0, 0.0),
            pt(1.0, 1.0, 1.0),
            pt(2.0, 2.0, 2.0),
            pt(3.0, 3.0, 3.0),
            pt(4.0, 4.0, 0.0),
            pt(5.0, 3.0, 0.0),
        ];
        simplify_by_flatness(&mut points);
        let once = points.clone();
        simplify_by_flatness(&mut points);
        assert_eq!(points, once);
    }

    #[test]
    fn simplification_is_a_contraction() {
        let original = vec![
            pt(0.0, 0.0, 0.0),
            pt(0.5, 0.01, -0.1),
            pt(1.0, 0.0, -0.2),
            pt(1.5, -0.01, -0.1),
            pt(2.0, 0.0, 0.0),
            pt(7.0, 5.0, -1.0),
        ];
        let mut points = original.clone();
        simplify_by_flatness(&mut points);
        simplify_by_proximity(&mut points);

        assert!(points.len() <= original.len());
        assert_eq!(points.first(), original.first());
        assert_eq!(points.last(), original.last());
    }

    #[test]
    fn proximity_merge_keeps_shallowest_z() {
        // Middle points are 0.1 mm apart in XY, closer than the tolerance;
        // the merged vertex keeps the greater (shallower) Z.
        let mut points = vec![
            pt(0.0, 0.0, -1.0),
            pt(5.0, 0.0, -2.0),
            pt(5.1, 0.0, -0.5),
            pt(10.0, 0.0, -1.0),
        ];
        simplify_by_proximity(&mut points);
        assert_eq!(
            points,
            [pt(0.0, 0.0, -1.0), pt(5.0, 0.0, -0.5), pt(10.0, 0.0, -1.0)]
        );
    }

    #[test]
    fn proximity_merge_prefers_last_vertex_xy_at_path_end() {
        let mut points = vec![
            pt(0.0, 0.0, -1.0),
            pt(9.9, 0.0, -2.0),
            pt(10.0, 0.0, -0.5),
        ];
        simplify_by_proximity(&mut points);
        assert_eq!(points, [pt(0.0, 0.0, -1.0), pt(10.0, 0.0, -0.5)]);
    }

    #[test]
    fn components_join_across_arcs() {
        // Points after an arc start a fresh polyline seeded with the arc end,
        // so the emitted path stays connected.
        let mut gen = gen_into_vec();
        gen.start_path(0.0, 0.0, -1.0);
        gen.move_to(10.0, 0.0, -1.0);
        gen.cw_arc_to(20.0, 0.0, -1.0, 5.0);
        gen.move_to(30.0, 0.0, -1.0);
        gen.end_path(false).unwrap();

        let out = output(gen);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            [
                "G1 Z-1.00 F50.00",
                "G1 X10.00 Y0.00 Z-1.00 F100.00",
                "G2 X20.00 Y0.00 Z-1.00 R5.00 F100.00",
                "G1 X30.00 Y0.00 Z-1.00 F100.00",
            ]
        );
    }
}
