//! Closed-profile and sweep-path extraction from a solved sketch.
//!
//! Profiles are consumed by the solid operations: a profile is one closed
//! loop of line and arc segments in work-plane coordinates. Holes are not
//! nested here; a through-hole is a second profile removed by a boolean.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::SketchEntity;
use crate::sketch::Sketch;

const JOIN_TOL: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ProfileError {
    #[error("sketch contains no usable profile geometry")]
    Empty,
    #[error("curve chain starting near ({x:.6}, {y:.6}) does not close")]
    OpenChain { x: f64, y: f64 },
    #[error("profile loop has near-zero area")]
    Degenerate,
    #[error("fillet radius {radius} does not fit at corner {corner}")]
    InfeasibleRadius { corner: usize, radius: f64 },
    #[error("path direction jumps at joint {joint} (angle {angle:.4} rad)")]
    TangencyBreak { joint: usize, angle: f64 },
}

/// One segment of a profile or path, in work-plane coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProfileSegment {
    Line {
        a: [f64; 2],
        b: [f64; 2],
    },
    /// Circular arc from `start_angle` to `end_angle`; the signed angle
    /// difference sets the traversal direction.
    Arc {
        center: [f64; 2],
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
}

impl ProfileSegment {
    pub fn start(&self) -> [f64; 2] {
        match self {
            ProfileSegment::Line { a, .. } => *a,
            ProfileSegment::Arc {
                center,
                radius,
                start_angle,
                ..
            } => arc_point(*center, *radius, *start_angle),
        }
    }

    pub fn end(&self) -> [f64; 2] {
        match self {
            ProfileSegment::Line { b, .. } => *b,
            ProfileSegment::Arc {
                center,
                radius,
                end_angle,
                ..
            } => arc_point(*center, *radius, *end_angle),
        }
    }

    /// Unit tangent at the start, in traversal direction.
    pub fn start_tangent(&self) -> [f64; 2] {
        match self {
            ProfileSegment::Line { a, b } => unit(b[0] - a[0], b[1] - a[1]),
            ProfileSegment::Arc { start_angle, .. } => {
                let dir = self.arc_sweep().signum();
                [-start_angle.sin() * dir, start_angle.cos() * dir]
            }
        }
    }

    /// Unit tangent at the end, in traversal direction.
    pub fn end_tangent(&self) -> [f64; 2] {
        match self {
            ProfileSegment::Line { a, b } => unit(b[0] - a[0], b[1] - a[1]),
            ProfileSegment::Arc { end_angle, .. } => {
                let dir = self.arc_sweep().signum();
                [-end_angle.sin() * dir, end_angle.cos() * dir]
            }
        }
    }

    /// Reverse traversal direction. Arcs flip to the complementary sweep by
    /// swapping and re-wrapping their angles.
    fn reversed(&self) -> ProfileSegment {
        match self {
            ProfileSegment::Line { a, b } => ProfileSegment::Line { a: *b, b: *a },
            ProfileSegment::Arc {
                center,
                radius,
                start_angle,
                end_angle,
            } => ProfileSegment::Arc {
                center: *center,
                radius: *radius,
                start_angle: *end_angle,
                end_angle: *start_angle,
            },
        }
    }

    /// CCW sweep from start to end angle, in (0, 2pi]. For a reversed arc the
    /// stored angles run clockwise; polygonization handles both.
    fn arc_sweep(&self) -> f64 {
        match self {
            ProfileSegment::Line { .. } => 0.0,
            ProfileSegment::Arc {
                start_angle,
                end_angle,
                ..
            } => end_angle - start_angle,
        }
    }

    /// Append the polyline for this segment (excluding its start point).
    fn polygonize_into(&self, chord_tol: f64, out: &mut Vec<[f64; 2]>) {
        match self {
            ProfileSegment::Line { b, .. } => out.push(*b),
            ProfileSegment::Arc {
                center,
                radius,
                start_angle,
                ..
            } => {
                let sweep = self.arc_sweep();
                let r = radius.max(1e-12);
                // Chord sagitta bound: step <= 2 acos(1 - tol/r).
                let max_step = 2.0 * (1.0 - (chord_tol / r).min(1.0)).acos();
                let steps = (sweep.abs() / max_step.max(1e-3)).ceil().max(1.0) as usize;
                for i in 1..=steps {
                    let t = *start_angle + sweep * (i as f64) / (steps as f64);
                    out.push(arc_point(*center, r, t));
                }
            }
        }
    }
}

/// A closed loop of connected segments, counterclockwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub segments: Vec<ProfileSegment>,
}

impl Profile {
    /// Flatten to a closed polygon (last point joins the first), with arcs
    /// sampled to the chord tolerance.
    pub fn polygonize(&self, chord_tol: f64) -> Vec<[f64; 2]> {
        let mut out = Vec::new();
        if let Some(first) = self.segments.first() {
            out.push(first.start());
        }
        for seg in &self.segments {
            seg.polygonize_into(chord_tol, &mut out);
        }
        // Drop the duplicated closing point.
        if out.len() > 1 {
            let first = out[0];
            let last = out[out.len() - 1];
            if (first[0] - last[0]).abs() < JOIN_TOL && (first[1] - last[1]).abs() < JOIN_TOL {
                out.pop();
            }
        }
        out
    }

    pub fn signed_area(&self, chord_tol: f64) -> f64 {
        let pts = self.polygonize(chord_tol);
        signed_area(&pts)
    }

    /// Normalize orientation to counterclockwise.
    pub fn ensure_ccw(&mut self, chord_tol: f64) {
        if self.signed_area(chord_tol) < 0.0 {
            self.segments.reverse();
            for seg in &mut self.segments {
                *seg = seg.reversed();
            }
        }
    }
}

/// An open, tangent-continuous chain of segments used as a sweep spine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPath {
    pub segments: Vec<ProfileSegment>,
}

impl SweepPath {
    /// Check G1 continuity at every joint. A crease-free sweep requires the
    /// traversal tangent to be continuous along the whole spine.
    pub fn verify_tangency(&self, angular_tol: f64) -> Result<(), ProfileError> {
        for (i, pair) in self.segments.windows(2).enumerate() {
            let t0 = pair[0].end_tangent();
            let t1 = pair[1].start_tangent();
            let dot = (t0[0] * t1[0] + t0[1] * t1[1]).clamp(-1.0, 1.0);
            let angle = dot.acos();
            if angle > angular_tol {
                return Err(ProfileError::TangencyBreak {
                    joint: i + 1,
                    angle,
                });
            }
        }
        Ok(())
    }

    /// Sample to a polyline with unit tangents at each sample.
    pub fn discretize(&self, chord_tol: f64) -> Vec<([f64; 2], [f64; 2])> {
        let mut out = Vec::new();
        for seg in &self.segments {
            match seg {
                ProfileSegment::Line { a, b } => {
                    let t = unit(b[0] - a[0], b[1] - a[1]);
                    if out.is_empty() {
                        out.push((*a, t));
                    }
                    out.push((*b, t));
                }
                ProfileSegment::Arc {
                    center,
                    radius,
                    start_angle,
                    ..
                } => {
                    let sweep = seg.arc_sweep();
                    let r = radius.max(1e-12);
                    let max_step = 2.0 * (1.0 - (chord_tol / r).min(1.0)).acos();
                    let steps = (sweep.abs() / max_step.max(1e-3)).ceil().max(2.0) as usize;
                    let dir = sweep.signum();
                    let start = if out.is_empty() { 0 } else { 1 };
                    for i in start..=steps {
                        let a = *start_angle + sweep * (i as f64) / (steps as f64);
                        let p = arc_point(*center, r, a);
                        let t = [-a.sin() * dir, a.cos() * dir];
                        out.push((p, t));
                    }
                }
            }
        }
        out
    }
}

/// Extract closed profiles from a solved sketch.
///
/// Construction entities are skipped. Circles become standalone loops, closed
/// polygons become line loops, and loose lines and arcs are chained by
/// endpoint coincidence. Any chain that fails to close is an error naming
/// where it dangles.
pub fn extract_profiles(sketch: &Sketch) -> Result<Vec<Profile>, ProfileError> {
    let params = &sketch.params;
    let mut profiles = Vec::new();
    let mut loose: Vec<ProfileSegment> = Vec::new();

    for (_, entity, construction) in sketch.entities() {
        if construction {
            continue;
        }
        match entity {
            SketchEntity::Point { .. } => {}
            SketchEntity::Line { start, end } => {
                loose.push(ProfileSegment::Line {
                    a: sketch.point_at(*start, params),
                    b: sketch.point_at(*end, params),
                });
            }
            SketchEntity::Circle { center, radius } => {
                let c = sketch.point_at(*center, params);
                profiles.push(Profile {
                    segments: vec![ProfileSegment::Arc {
                        center: c,
                        radius: params[*radius],
                        start_angle: 0.0,
                        end_angle: 2.0 * std::f64::consts::PI,
                    }],
                });
            }
            SketchEntity::Arc {
                center,
                radius,
                start_angle,
                end_angle,
            } => {
                loose.push(ProfileSegment::Arc {
                    center: sketch.point_at(*center, params),
                    radius: params[*radius],
                    start_angle: params[*start_angle],
                    end_angle: params[*end_angle],
                });
            }
            SketchEntity::Polygon { vertices, closed } => {
                let n = vertices.len();
                if n < 2 {
                    continue;
                }
                let edges = if *closed { n } else { n - 1 };
                let mut segments = Vec::with_capacity(edges);
                for k in 0..edges {
                    segments.push(ProfileSegment::Line {
                        a: sketch.point_at(vertices[k], params),
                        b: sketch.point_at(vertices[(k + 1) % n], params),
                    });
                }
                if *closed {
                    profiles.push(Profile { segments });
                } else {
                    loose.extend(segments);
                }
            }
        }
    }

    profiles.extend(chain_loops(loose)?);
    if profiles.is_empty() {
        return Err(ProfileError::Empty);
    }
    for profile in &mut profiles {
        if profile.signed_area(JOIN_TOL.sqrt()).abs() < 1e-12 {
            return Err(ProfileError::Degenerate);
        }
        profile.ensure_ccw(JOIN_TOL.sqrt());
    }
    Ok(profiles)
}

/// Extract a single open, connected curve chain from a sketch, for use as a
/// sweep spine.
///
/// Non-construction lines, arcs, and open polygons contribute segments; the
/// chain is ordered and oriented by endpoint coincidence. Disconnected
/// leftovers are an error naming where the chain dangles. Tangency is not
/// checked here; [`SweepPath::verify_tangency`] runs in the sweep itself.
pub fn extract_path(sketch: &Sketch) -> Result<SweepPath, ProfileError> {
    let params = &sketch.params;
    let mut loose: Vec<ProfileSegment> = Vec::new();
    for (_, entity, construction) in sketch.entities() {
        if construction {
            continue;
        }
        match entity {
            SketchEntity::Point { .. } | SketchEntity::Circle { .. } => {}
            SketchEntity::Line { start, end } => loose.push(ProfileSegment::Line {
                a: sketch.point_at(*start, params),
                b: sketch.point_at(*end, params),
            }),
            SketchEntity::Arc {
                center,
                radius,
                start_angle,
                end_angle,
            } => loose.push(ProfileSegment::Arc {
                center: sketch.point_at(*center, params),
                radius: params[*radius],
                start_angle: params[*start_angle],
                end_angle: params[*end_angle],
            }),
            SketchEntity::Polygon { vertices, closed } => {
                if *closed || vertices.len() < 2 {
                    continue;
                }
                for pair in vertices.windows(2) {
                    loose.push(ProfileSegment::Line {
                        a: sketch.point_at(pair[0], params),
                        b: sketch.point_at(pair[1], params),
                    });
                }
            }
        }
    }
    let first = loose.pop().ok_or(ProfileError::Empty)?;
    let mut chain = std::collections::VecDeque::from(vec![first]);
    // Grow at the tail, then at the head, until nothing connects.
    loop {
        let tail = chain.back().expect("non-empty chain").end();
        if let Some(i) = loose
            .iter()
            .position(|s| close_to(s.start(), tail) || close_to(s.end(), tail))
        {
            let mut seg = loose.swap_remove(i);
            if !close_to(seg.start(), tail) {
                seg = seg.reversed();
            }
            chain.push_back(seg);
            continue;
        }
        let head = chain.front().expect("non-empty chain").start();
        if let Some(i) = loose
            .iter()
            .position(|s| close_to(s.end(), head) || close_to(s.start(), head))
        {
            let mut seg = loose.swap_remove(i);
            if !close_to(seg.end(), head) {
                seg = seg.reversed();
            }
            chain.push_front(seg);
            continue;
        }
        break;
    }
    if let Some(orphan) = loose.first() {
        let [x, y] = orphan.start();
        return Err(ProfileError::OpenChain { x, y });
    }
    Ok(SweepPath {
        segments: chain.into(),
    })
}

/// Greedily chain loose segments into closed loops by endpoint coincidence.
fn chain_loops(mut loose: Vec<ProfileSegment>) -> Result<Vec<Profile>, ProfileError> {
    let mut loops = Vec::new();
    while let Some(first) = loose.pop() {
        let origin = first.start();
        let mut chain = vec![first];
        loop {
            let tail = chain.last().expect("non-empty chain").end();
            if close_to(tail, origin) {
                break;
            }
            let next = loose.iter().position(|s| {
                close_to(s.start(), tail) || close_to(s.end(), tail)
            });
            match next {
                Some(i) => {
                    let mut seg = loose.swap_remove(i);
                    if !close_to(seg.start(), tail) {
                        seg = seg.reversed();
                    }
                    chain.push(seg);
                }
                None => {
                    return Err(ProfileError::OpenChain {
                        x: tail[0],
                        y: tail[1],
                    })
                }
            }
        }
        loops.push(Profile { segments: chain });
    }
    Ok(loops)
}

/// Round selected corners of a closed polygon with arcs of the given radius.
///
/// `corners` are 1-based vertex numbers. The radius must leave room on both
/// adjacent edges; otherwise the corner is reported infeasible.
pub fn fillet_polygon(
    points: &[[f64; 2]],
    corners: &[usize],
    radius: f64,
) -> Result<Profile, ProfileError> {
    let n = points.len();
    if n < 3 {
        return Err(ProfileError::Degenerate);
    }
    if radius <= 0.0 {
        return Err(ProfileError::InfeasibleRadius {
            corner: corners.first().copied().unwrap_or(0),
            radius,
        });
    }
    let rounded: std::collections::HashSet<usize> = corners.iter().copied().collect();
    let mut segments: Vec<ProfileSegment> = Vec::new();
    // Per-vertex setback along each adjacent edge.
    let mut setback = vec![0.0_f64; n];
    let mut arcs: Vec<Option<ProfileSegment>> = vec![None; n];

    for k in 1..=n {
        if !rounded.contains(&k) {
            continue;
        }
        let p = points[k - 1];
        let prev = points[(k + n - 2) % n];
        let next = points[k % n];
        let u = unit(prev[0] - p[0], prev[1] - p[1]);
        let v = unit(next[0] - p[0], next[1] - p[1]);
        let cos_half = ((u[0] * v[0] + u[1] * v[1] + 1.0) / 2.0).clamp(0.0, 1.0).sqrt();
        let sin_half = (1.0 - cos_half * cos_half).sqrt();
        if sin_half < 1e-9 || cos_half < 1e-9 {
            return Err(ProfileError::InfeasibleRadius { corner: k, radius });
        }
        // Tangent length along each edge and distance to the arc center.
        let t = radius * cos_half / sin_half;
        let len_prev = dist(p, prev);
        let len_next = dist(p, next);
        if t > len_prev / 2.0 + JOIN_TOL || t > len_next / 2.0 + JOIN_TOL {
            return Err(ProfileError::InfeasibleRadius { corner: k, radius });
        }
        setback[k - 1] = t;
        let bisector = unit(u[0] + v[0], u[1] + v[1]);
        let center = [
            p[0] + bisector[0] * radius / sin_half,
            p[1] + bisector[1] * radius / sin_half,
        ];
        let start = [p[0] + u[0] * t, p[1] + u[1] * t];
        let end = [p[0] + v[0] * t, p[1] + v[1] * t];
        let a0 = (start[1] - center[1]).atan2(start[0] - center[0]);
        let mut a1 = (end[1] - center[1]).atan2(end[0] - center[0]);
        // Traverse the short way around the corner.
        while a1 - a0 > std::f64::consts::PI {
            a1 -= 2.0 * std::f64::consts::PI;
        }
        while a0 - a1 > std::f64::consts::PI {
            a1 += 2.0 * std::f64::consts::PI;
        }
        arcs[k - 1] = Some(ProfileSegment::Arc {
            center,
            radius,
            start_angle: a0,
            end_angle: a1,
        });
    }

    for k in 0..n {
        let p = points[k];
        let q = points[(k + 1) % n];
        let d = unit(q[0] - p[0], q[1] - p[1]);
        let a = [p[0] + d[0] * setback[k], p[1] + d[1] * setback[k]];
        let nk = (k + 1) % n;
        let b = [q[0] - d[0] * setback[nk], q[1] - d[1] * setback[nk]];
        segments.push(ProfileSegment::Line { a, b });
        if let Some(arc) = arcs[nk].clone() {
            segments.push(arc);
        }
    }
    // Rotate so the loop starts on a line segment, then fix any arc whose
    // stored direction disagrees with the traversal.
    let mut profile = Profile { segments };
    for i in 0..profile.segments.len() {
        let prev_end = profile.segments[(i + profile.segments.len() - 1) % profile.segments.len()]
            .end();
        if !close_to(profile.segments[i].start(), prev_end) {
            profile.segments[i] = profile.segments[i].reversed();
        }
    }
    profile.ensure_ccw(JOIN_TOL.sqrt());
    Ok(profile)
}

fn arc_point(center: [f64; 2], radius: f64, angle: f64) -> [f64; 2] {
    [
        center[0] + radius * angle.cos(),
        center[1] + radius * angle.sin(),
    ]
}

fn unit(dx: f64, dy: f64) -> [f64; 2] {
    let len = (dx * dx + dy * dy).sqrt().max(f64::EPSILON);
    [dx / len, dy / len]
}

fn dist(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn close_to(a: [f64; 2], b: [f64; 2]) -> bool {
    (a[0] - b[0]).abs() < JOIN_TOL && (a[1] - b[1]).abs() < JOIN_TOL
}

fn signed_area(pts: &[[f64; 2]]) -> f64 {
    let n = pts.len();
    let mut acc = 0.0;
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        acc += a[0] * b[1] - b[0] * a[1];
    }
    acc / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::{RectangleOptions, Sketch};
    use approx::assert_relative_eq;

    #[test]
    fn rectangle_yields_one_ccw_profile() {
        let mut sketch = Sketch::new();
        sketch.add_rectangle(0.0, 0.0, 2.0, 1.0, RectangleOptions::default());
        let profiles = extract_profiles(&sketch).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_relative_eq!(profiles[0].signed_area(1e-4), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn circle_area_approaches_pi_r_squared() {
        let mut sketch = Sketch::new();
        sketch.add_circle(1.0, 1.0, 2.0);
        let profiles = extract_profiles(&sketch).unwrap();
        let area = profiles[0].signed_area(1e-5);
        assert_relative_eq!(area, std::f64::consts::PI * 4.0, epsilon = 0.01);
    }

    #[test]
    fn loose_lines_chain_into_a_loop() {
        let mut sketch = Sketch::new();
        sketch.add_line_segment(0.0, 0.0, 1.0, 0.0);
        // Deliberately reversed orientation; the chainer flips it.
        sketch.add_line_segment(0.0, 1.0, 1.0, 0.0);
        sketch.add_line_segment(0.0, 1.0, 0.0, 0.0);
        let profiles = extract_profiles(&sketch).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_relative_eq!(profiles[0].signed_area(1e-4).abs(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn dangling_chain_reports_open_endpoint() {
        let mut sketch = Sketch::new();
        sketch.add_line_segment(0.0, 0.0, 1.0, 0.0);
        sketch.add_line_segment(1.0, 0.0, 1.0, 1.0);
        let err = extract_profiles(&sketch).unwrap_err();
        assert!(matches!(err, ProfileError::OpenChain { .. }));
    }

    #[test]
    fn construction_entities_are_excluded() {
        let mut sketch = Sketch::new();
        sketch.add_rectangle(0.0, 0.0, 2.0, 1.0, RectangleOptions::default());
        let helper = sketch.add_line_segment(-5.0, -5.0, -4.0, -5.0);
        sketch.mark_construction(helper).unwrap();
        let profiles = extract_profiles(&sketch).unwrap();
        assert_eq!(profiles.len(), 1);
    }

    #[test]
    fn fillet_square_corner_preserves_tangency() {
        let square = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]];
        let profile = fillet_polygon(&square, &[2], 0.5).unwrap();
        // One arc replaces the corner; area shrinks by the corner nick
        // r^2 (1 - pi/4).
        let expected = 4.0 - 0.25 * (1.0 - std::f64::consts::PI / 4.0);
        assert_relative_eq!(profile.signed_area(1e-5).abs(), expected, epsilon = 0.01);
        let arcs = profile
            .segments
            .iter()
            .filter(|s| matches!(s, ProfileSegment::Arc { .. }))
            .count();
        assert_eq!(arcs, 1);
    }

    #[test]
    fn oversized_fillet_is_rejected() {
        let square = [[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]];
        let err = fillet_polygon(&square, &[1, 2, 3, 4], 1.5).unwrap_err();
        assert!(matches!(err, ProfileError::InfeasibleRadius { .. }));
    }

    #[test]
    fn tangent_path_passes_continuity_check() {
        // Quarter arc meeting a vertical line at (0, 1) going up; both have
        // tangent (0, 1) at the joint... the arc from angle 0 at (1,0)
        // around (0,0) ends at (0,1) with tangent (-1,0); the matching line
        // continues in -x.
        let path = SweepPath {
            segments: vec![
                ProfileSegment::Line {
                    a: [3.0, 0.0],
                    b: [1.0, 0.0],
                },
                ProfileSegment::Arc {
                    center: [1.0, 1.0],
                    radius: 1.0,
                    start_angle: -std::f64::consts::FRAC_PI_2,
                    end_angle: -std::f64::consts::PI,
                },
                ProfileSegment::Line {
                    a: [0.0, 1.0],
                    b: [0.0, 3.0],
                },
            ],
        };
        path.verify_tangency(1e-6).unwrap();
    }

    #[test]
    fn path_extraction_orders_and_orients_the_chain() {
        let mut sketch = Sketch::new();
        // Out of order and one segment reversed.
        sketch.add_line_segment(1.0, 0.0, 2.0, 0.0);
        sketch.add_line_segment(0.0, 0.0, 1.0, 0.0);
        sketch.add_line_segment(3.0, 0.0, 2.0, 0.0);
        let path = extract_path(&sketch).unwrap();
        assert_eq!(path.segments.len(), 3);
        let start = path.segments.first().unwrap().start();
        let end = path.segments.last().unwrap().end();
        let span = (end[0] - start[0]).abs();
        assert_relative_eq!(span, 3.0, epsilon = 1e-12);
        for pair in path.segments.windows(2) {
            let a = pair[0].end();
            let b = pair[1].start();
            assert!((a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn disconnected_path_pieces_are_an_error() {
        let mut sketch = Sketch::new();
        sketch.add_line_segment(0.0, 0.0, 1.0, 0.0);
        sketch.add_line_segment(5.0, 5.0, 6.0, 5.0);
        let err = extract_path(&sketch).unwrap_err();
        assert!(matches!(err, ProfileError::OpenChain { .. }));
    }

    #[test]
    fn kinked_path_fails_continuity_check() {
        let path = SweepPath {
            segments: vec![
                ProfileSegment::Line {
                    a: [0.0, 0.0],
                    b: [1.0, 0.0],
                },
                ProfileSegment::Line {
                    a: [1.0, 0.0],
                    b: [1.0, 1.0],
                },
            ],
        };
        let err = path.verify_tangency(1e-6).unwrap_err();
        assert!(matches!(err, ProfileError::TangencyBreak { joint: 1, .. }));
    }
}
