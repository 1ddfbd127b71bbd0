use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;
use crate::sketch::{Sketch, SketchError};

/// Stable handle to a constraint within one sketch. Handles survive edits;
/// re-setting a handle replaces the constraint in place (last write wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintId(pub(crate) u32);

/// The geometric relation a constraint enforces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConstraintKind {
    /// Two points coincide (2 equations), or a point lies on an edge (1).
    Coincident { a: EntityRef, b: EntityRef },
    Horizontal { edge: EntityRef },
    Vertical { edge: EntityRef },
    Parallel { a: EntityRef, b: EntityRef },
    Perpendicular { a: EntityRef, b: EntityRef },
    /// Signed angle from edge `a` to edge `b`, radians.
    Angle { a: EntityRef, b: EntityRef, radians: f64 },
    /// Unsigned distance between two references (point or edge each).
    Distance { a: EntityRef, b: EntityRef, value: f64 },
    /// Distance along the x axis between representative points.
    XDistance { a: EntityRef, b: EntityRef, value: f64 },
    /// Distance along the y axis between representative points.
    YDistance { a: EntityRef, b: EntityRef, value: f64 },
    /// dist(a, b) equals dist(c, d).
    EqualDistance {
        a: EntityRef,
        b: EntityRef,
        c: EntityRef,
        d: EntityRef,
    },
    EqualRadius { a: EntityRef, b: EntityRef },
    Radius { circle: EntityRef, value: f64 },
    /// An edge or circle is tangent to a circle or arc.
    Tangent { a: EntityRef, b: EntityRef },
    /// A point is fixed at a position.
    Fixed { point: EntityRef, x: f64, y: f64 },
}

/// A constraint plus optional help points.
///
/// Help points disambiguate multi-branch relations: they pick the sign of
/// directed distances and bias the solver toward the intended solution when
/// several satisfy the equations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub help_points: Vec<[f64; 2]>,
}

impl Constraint {
    fn new(kind: ConstraintKind) -> Self {
        Self {
            kind,
            help_points: Vec::new(),
        }
    }

    pub fn coincident(a: EntityRef, b: EntityRef) -> Self {
        Self::new(ConstraintKind::Coincident { a, b })
    }

    pub fn horizontal(edge: EntityRef) -> Self {
        Self::new(ConstraintKind::Horizontal { edge })
    }

    pub fn vertical(edge: EntityRef) -> Self {
        Self::new(ConstraintKind::Vertical { edge })
    }

    pub fn parallel(a: EntityRef, b: EntityRef) -> Self {
        Self::new(ConstraintKind::Parallel { a, b })
    }

    pub fn perpendicular(a: EntityRef, b: EntityRef) -> Self {
        Self::new(ConstraintKind::Perpendicular { a, b })
    }

    pub fn angle(a: EntityRef, b: EntityRef, radians: f64) -> Self {
        Self::new(ConstraintKind::Angle { a, b, radians })
    }

    pub fn distance(a: EntityRef, b: EntityRef, value: f64) -> Self {
        Self::new(ConstraintKind::Distance { a, b, value })
    }

    pub fn x_distance(a: EntityRef, b: EntityRef, value: f64) -> Self {
        Self::new(ConstraintKind::XDistance { a, b, value })
    }

    pub fn y_distance(a: EntityRef, b: EntityRef, value: f64) -> Self {
        Self::new(ConstraintKind::YDistance { a, b, value })
    }

    pub fn equal_distance(a: EntityRef, b: EntityRef, c: EntityRef, d: EntityRef) -> Self {
        Self::new(ConstraintKind::EqualDistance { a, b, c, d })
    }

    pub fn equal_radius(a: EntityRef, b: EntityRef) -> Self {
        Self::new(ConstraintKind::EqualRadius { a, b })
    }

    pub fn radius(circle: EntityRef, value: f64) -> Self {
        Self::new(ConstraintKind::Radius { circle, value })
    }

    pub fn tangent(a: EntityRef, b: EntityRef) -> Self {
        Self::new(ConstraintKind::Tangent { a, b })
    }

    pub fn fixed(point: EntityRef, x: f64, y: f64) -> Self {
        Self::new(ConstraintKind::Fixed { point, x, y })
    }

    pub fn with_help_points(mut self, points: &[[f64; 2]]) -> Self {
        self.help_points = points.to_vec();
        self
    }

    /// Short name for diagnostics and logs.
    pub fn name(&self) -> &'static str {
        match &self.kind {
            ConstraintKind::Coincident { .. } => "coincident",
            ConstraintKind::Horizontal { .. } => "horizontal",
            ConstraintKind::Vertical { .. } => "vertical",
            ConstraintKind::Parallel { .. } => "parallel",
            ConstraintKind::Perpendicular { .. } => "perpendicular",
            ConstraintKind::Angle { .. } => "angle",
            ConstraintKind::Distance { .. } => "distance",
            ConstraintKind::XDistance { .. } => "x-distance",
            ConstraintKind::YDistance { .. } => "y-distance",
            ConstraintKind::EqualDistance { .. } => "equal-distance",
            ConstraintKind::EqualRadius { .. } => "equal-radius",
            ConstraintKind::Radius { .. } => "radius",
            ConstraintKind::Tangent { .. } => "tangent",
            ConstraintKind::Fixed { .. } => "fixed",
        }
    }

    /// All entity references the constraint touches, for dependency analysis.
    pub fn refs(&self) -> Vec<EntityRef> {
        match &self.kind {
            ConstraintKind::Coincident { a, b }
            | ConstraintKind::Parallel { a, b }
            | ConstraintKind::Perpendicular { a, b }
            | ConstraintKind::Angle { a, b, .. }
            | ConstraintKind::Distance { a, b, .. }
            | ConstraintKind::XDistance { a, b, .. }
            | ConstraintKind::YDistance { a, b, .. }
            | ConstraintKind::EqualRadius { a, b }
            | ConstraintKind::Tangent { a, b } => vec![*a, *b],
            ConstraintKind::EqualDistance { a, b, c, d } => vec![*a, *b, *c, *d],
            ConstraintKind::Horizontal { edge } | ConstraintKind::Vertical { edge } => vec![*edge],
            ConstraintKind::Radius { circle, .. } => vec![*circle],
            ConstraintKind::Fixed { point, .. } => vec![*point],
        }
    }

    /// Check every reference resolves to a compatible sub-element.
    pub(crate) fn validate(&self, sketch: &Sketch) -> Result<(), SketchError> {
        let params = &sketch.params;
        let want_point = |r: &EntityRef| sketch.sub_point(r, params).map(|_| ());
        let want_edge = |r: &EntityRef| sketch.sub_edge(r, params).map(|_| ());
        let want_measurable = |r: &EntityRef| sketch.rep_point(r, params).map(|_| ());
        let want_circle = |r: &EntityRef| sketch.sub_circle(r).map(|_| ());
        match &self.kind {
            ConstraintKind::Coincident { a, b } => match (want_point(a), want_point(b)) {
                (Ok(()), Ok(())) => Ok(()),
                (Ok(()), _) => want_edge(b),
                (_, Ok(())) => want_edge(a),
                _ => Err(SketchError::UnsupportedReference {
                    constraint: "coincident",
                }),
            },
            ConstraintKind::Horizontal { edge } | ConstraintKind::Vertical { edge } => {
                want_edge(edge)
            }
            ConstraintKind::Parallel { a, b }
            | ConstraintKind::Perpendicular { a, b }
            | ConstraintKind::Angle { a, b, .. } => {
                want_edge(a)?;
                want_edge(b)
            }
            ConstraintKind::Distance { a, b, .. }
            | ConstraintKind::XDistance { a, b, .. }
            | ConstraintKind::YDistance { a, b, .. } => {
                want_measurable(a)?;
                want_measurable(b)
            }
            ConstraintKind::EqualDistance { a, b, c, d } => {
                want_measurable(a)?;
                want_measurable(b)?;
                want_measurable(c)?;
                want_measurable(d)
            }
            ConstraintKind::EqualRadius { a, b } => {
                want_circle(a)?;
                want_circle(b)
            }
            ConstraintKind::Radius { circle, .. } => want_circle(circle),
            ConstraintKind::Tangent { a, b } => {
                if want_circle(b).is_ok() {
                    if want_edge(a).is_ok() || want_circle(a).is_ok() {
                        return Ok(());
                    }
                } else if want_circle(a).is_ok() && want_edge(b).is_ok() {
                    return Ok(());
                }
                Err(SketchError::UnsupportedReference {
                    constraint: "tangent",
                })
            }
            ConstraintKind::Fixed { point, .. } => want_point(point),
        }
    }

    /// Number of residual equations this constraint contributes.
    pub(crate) fn eq_count(&self, sketch: &Sketch) -> usize {
        match &self.kind {
            ConstraintKind::Coincident { a, b } => {
                let params = &sketch.params;
                if sketch.sub_point(a, params).is_ok() && sketch.sub_point(b, params).is_ok() {
                    2
                } else {
                    1
                }
            }
            ConstraintKind::Fixed { .. } => 2,
            _ => 1,
        }
    }

    /// Append residual equations evaluated at `params`.
    pub(crate) fn residuals(
        &self,
        sketch: &Sketch,
        params: &[f64],
        out: &mut Vec<f64>,
    ) -> Result<(), SketchError> {
        match &self.kind {
            ConstraintKind::Coincident { a, b } => {
                match (sketch.sub_point(a, params), sketch.sub_point(b, params)) {
                    (Ok(pa), Ok(pb)) => {
                        out.push(pa[0] - pb[0]);
                        out.push(pa[1] - pb[1]);
                    }
                    (Ok(p), Err(_)) => {
                        let (e0, e1) = sketch.sub_edge(b, params)?;
                        out.push(point_line_signed(p, e0, e1));
                    }
                    (Err(_), Ok(p)) => {
                        let (e0, e1) = sketch.sub_edge(a, params)?;
                        out.push(point_line_signed(p, e0, e1));
                    }
                    (Err(e), Err(_)) => return Err(e),
                }
            }
            ConstraintKind::Horizontal { edge } => {
                let (a, b) = sketch.sub_edge(edge, params)?;
                out.push(a[1] - b[1]);
            }
            ConstraintKind::Vertical { edge } => {
                let (a, b) = sketch.sub_edge(edge, params)?;
                out.push(a[0] - b[0]);
            }
            ConstraintKind::Parallel { a, b } => {
                let da = unit_dir(sketch.sub_edge(a, params)?);
                let db = unit_dir(sketch.sub_edge(b, params)?);
                out.push(da[0] * db[1] - da[1] * db[0]);
            }
            ConstraintKind::Perpendicular { a, b } => {
                let da = unit_dir(sketch.sub_edge(a, params)?);
                let db = unit_dir(sketch.sub_edge(b, params)?);
                out.push(da[0] * db[0] + da[1] * db[1]);
            }
            ConstraintKind::Angle { a, b, radians } => {
                let da = unit_dir(sketch.sub_edge(a, params)?);
                let db = unit_dir(sketch.sub_edge(b, params)?);
                let cross = da[0] * db[1] - da[1] * db[0];
                let dot = da[0] * db[0] + da[1] * db[1];
                out.push(wrap_angle(cross.atan2(dot) - radians));
            }
            ConstraintKind::Distance { a, b, value } => {
                out.push(self.measure_distance(sketch, a, b, params)? - value);
            }
            ConstraintKind::XDistance { a, b, value } => {
                let pa = sketch.rep_point(a, params)?;
                let pb = sketch.rep_point(b, params)?;
                out.push((pb[0] - pa[0]) * self.axis_sign(0, pb[0] - pa[0]) - value);
            }
            ConstraintKind::YDistance { a, b, value } => {
                let pa = sketch.rep_point(a, params)?;
                let pb = sketch.rep_point(b, params)?;
                out.push((pb[1] - pa[1]) * self.axis_sign(1, pb[1] - pa[1]) - value);
            }
            ConstraintKind::EqualDistance { a, b, c, d } => {
                let first = self.measure_distance(sketch, a, b, params)?;
                let second = self.measure_distance(sketch, c, d, params)?;
                out.push(first - second);
            }
            ConstraintKind::EqualRadius { a, b } => {
                let (_, ra) = sketch.sub_circle(a)?;
                let (_, rb) = sketch.sub_circle(b)?;
                out.push(params[ra] - params[rb]);
            }
            ConstraintKind::Radius { circle, value } => {
                let (_, r) = sketch.sub_circle(circle)?;
                out.push(params[r] - value);
            }
            ConstraintKind::Tangent { a, b } => {
                out.push(self.tangent_residual(sketch, a, b, params)?);
            }
            ConstraintKind::Fixed { point, x, y } => {
                let p = sketch.sub_point(point, params)?;
                out.push(p[0] - x);
                out.push(p[1] - y);
            }
        }
        Ok(())
    }

    /// Directed-distance sign: taken from help points when present, else from
    /// the current configuration.
    fn axis_sign(&self, axis: usize, current_delta: f64) -> f64 {
        let delta = match self.help_points.as_slice() {
            [ha, hb, ..] => hb[axis] - ha[axis],
            _ => current_delta,
        };
        if delta < 0.0 {
            -1.0
        } else {
            1.0
        }
    }

    fn measure_distance(
        &self,
        sketch: &Sketch,
        a: &EntityRef,
        b: &EntityRef,
        params: &[f64],
    ) -> Result<f64, SketchError> {
        let pa = sketch.sub_point(a, params);
        let pb = sketch.sub_point(b, params);
        match (pa, pb) {
            (Ok(pa), Ok(pb)) => Ok(((pa[0] - pb[0]).powi(2) + (pa[1] - pb[1]).powi(2)).sqrt()),
            (Ok(p), Err(_)) => {
                let (e0, e1) = sketch.sub_edge(b, params)?;
                Ok(point_line_signed(p, e0, e1).abs())
            }
            (Err(_), Ok(p)) => {
                let (e0, e1) = sketch.sub_edge(a, params)?;
                Ok(point_line_signed(p, e0, e1).abs())
            }
            (Err(_), Err(_)) => {
                // Edge to edge: midpoint of the first against the second's line.
                let p = sketch.rep_point(a, params)?;
                let (e0, e1) = sketch.sub_edge(b, params)?;
                Ok(point_line_signed(p, e0, e1).abs())
            }
        }
    }

    fn tangent_residual(
        &self,
        sketch: &Sketch,
        a: &EntityRef,
        b: &EntityRef,
        params: &[f64],
    ) -> Result<f64, SketchError> {
        let (line, circle) = if sketch.sub_circle(b).is_ok() && sketch.sub_edge(a, params).is_ok() {
            (a, b)
        } else if sketch.sub_circle(a).is_ok() && sketch.sub_edge(b, params).is_ok() {
            (b, a)
        } else {
            // Circle to circle: the nearer of external and internal tangency.
            let (ca, ra) = sketch.sub_circle(a)?;
            let (cb, rb) = sketch.sub_circle(b)?;
            let pa = sketch.point_at(ca, params);
            let pb = sketch.point_at(cb, params);
            let ra = params[ra];
            let rb = params[rb];
            let d = ((pa[0] - pb[0]).powi(2) + (pa[1] - pb[1]).powi(2)).sqrt();
            let external = d - (ra + rb);
            let internal = d - (ra - rb).abs();
            return Ok(if external.abs() <= internal.abs() {
                external
            } else {
                internal
            });
        };
        let (e0, e1) = sketch.sub_edge(line, params)?;
        let (center, radius) = sketch.sub_circle(circle)?;
        let c = sketch.point_at(center, params);
        let r = params[radius];
        let d = point_line_signed(c, e0, e1);
        Ok(d.abs() - r)
    }
}

/// Signed perpendicular distance from `p` to the infinite line through
/// `a` and `b`. Positive to the left of a→b.
fn point_line_signed(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len = (dx * dx + dy * dy).sqrt();
    if len < f64::EPSILON {
        // Degenerate edge collapses to point distance.
        return ((p[0] - a[0]).powi(2) + (p[1] - a[1]).powi(2)).sqrt();
    }
    (dx * (p[1] - a[1]) - dy * (p[0] - a[0])) / len
}

fn unit_dir((a, b): ([f64; 2], [f64; 2])) -> [f64; 2] {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len = (dx * dx + dy * dy).sqrt().max(f64::EPSILON);
    [dx / len, dy / len]
}

/// Wrap an angle difference into (-pi, pi].
fn wrap_angle(a: f64) -> f64 {
    let mut a = a % (2.0 * std::f64::consts::PI);
    if a > std::f64::consts::PI {
        a -= 2.0 * std::f64::consts::PI;
    } else if a <= -std::f64::consts::PI {
        a += 2.0 * std::f64::consts::PI;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sketch::{RectangleOptions, Sketch};
    use approx::assert_relative_eq;

    fn residual_of(sketch: &Sketch, c: &Constraint) -> Vec<f64> {
        let mut out = Vec::new();
        c.residuals(sketch, &sketch.params, &mut out).unwrap();
        out
    }

    #[test]
    fn coincident_points_gives_two_equations() {
        let mut sketch = Sketch::new();
        let a = sketch.add_point(0.0, 0.0);
        let b = sketch.add_point(3.0, 4.0);
        let c = Constraint::coincident(EntityRef::whole(a), EntityRef::whole(b));
        let r = residual_of(&sketch, &c);
        assert_eq!(r, vec![-3.0, -4.0]);
        assert_eq!(c.eq_count(&sketch), 2);
    }

    #[test]
    fn point_on_edge_is_signed_offset() {
        let mut sketch = Sketch::new();
        let line = sketch.add_line_segment(0.0, 0.0, 10.0, 0.0);
        let p = sketch.add_point(5.0, 2.0);
        let c = Constraint::coincident(EntityRef::whole(p), EntityRef::whole(line));
        let r = residual_of(&sketch, &c);
        assert_eq!(r.len(), 1);
        assert_relative_eq!(r[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn edge_to_edge_distance_measures_gap() {
        let mut sketch = Sketch::new();
        let rect = sketch.add_rectangle(0.0, 0.0, 4.0, 3.0, RectangleOptions::default());
        let c = Constraint::distance(EntityRef::edge(rect, 1), EntityRef::edge(rect, 3), 4.0);
        let r = residual_of(&sketch, &c);
        assert_relative_eq!(r[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn help_points_fix_directed_distance_sign() {
        let mut sketch = Sketch::new();
        let a = sketch.add_point(0.0, 0.0);
        let b = sketch.add_point(-2.0, 0.0);
        // b sits left of a; help points declare the leftward direction, so a
        // gap of 2 satisfies the constraint.
        let c = Constraint::x_distance(EntityRef::whole(a), EntityRef::whole(b), 2.0)
            .with_help_points(&[[1.0, 0.0], [0.0, 0.0]]);
        let r = residual_of(&sketch, &c);
        assert_relative_eq!(r[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn tangent_line_circle_residual_vanishes_at_tangency() {
        let mut sketch = Sketch::new();
        let line = sketch.add_line_segment(-5.0, 1.0, 5.0, 1.0);
        let circle = sketch.add_circle(0.0, 0.0, 1.0);
        let c = Constraint::tangent(EntityRef::whole(line), EntityRef::whole(circle));
        let r = residual_of(&sketch, &c);
        assert_relative_eq!(r[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn validation_rejects_mismatched_references() {
        let mut sketch = Sketch::new();
        let p = sketch.add_point(0.0, 0.0);
        let q = sketch.add_point(1.0, 0.0);
        let c = Constraint::tangent(EntityRef::whole(p), EntityRef::whole(q));
        assert!(sketch.add_constraint(c).is_err());
    }
}
