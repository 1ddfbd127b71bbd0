//! Revolution of a profile about an in-plane axis.

use lathe_solver::Profile;
use tracing::debug;

use super::OperationError;
use crate::geometry::{Frame, Point3, Vec3};
use crate::topology::{Solid, VertexId};
use crate::Tolerance;

const FULL_TURN: f64 = 2.0 * std::f64::consts::PI;

/// Revolve a profile about the axis through `axis_point` with direction
/// `axis_dir`, both given in work-plane (u, v) coordinates. A sweep of a full
/// turn closes on itself without caps.
///
/// The profile must lie entirely on one side of the axis (touching is
/// allowed); a crossing profile would self-intersect.
pub fn revolve(
    profile: &Profile,
    frame: &Frame,
    axis_point: [f64; 2],
    axis_dir: [f64; 2],
    angle: f64,
    tol: &Tolerance,
) -> Result<Solid, OperationError> {
    if angle.abs() < tol.angular {
        return Err(OperationError::ZeroAngle);
    }
    let angle = angle.clamp(-FULL_TURN, FULL_TURN);
    let polygon = profile.polygonize(tol.chord);
    if polygon.len() < 3 {
        return Err(OperationError::InsufficientProfile);
    }

    // Signed distance from the axis in the plane; all on one side.
    let dir_len = (axis_dir[0] * axis_dir[0] + axis_dir[1] * axis_dir[1]).sqrt();
    if dir_len < 1e-12 {
        return Err(OperationError::ZeroAngle);
    }
    let ad = [axis_dir[0] / dir_len, axis_dir[1] / dir_len];
    let side = |p: &[f64; 2]| ad[0] * (p[1] - axis_point[1]) - ad[1] * (p[0] - axis_point[0]);
    let mut max_side = f64::NEG_INFINITY;
    let mut min_side = f64::INFINITY;
    let mut max_radius = 0.0_f64;
    for p in &polygon {
        let s = side(p);
        max_side = max_side.max(s);
        min_side = min_side.min(s);
        max_radius = max_radius.max(s.abs());
    }
    if max_side > tol.coincidence && min_side < -tol.coincidence {
        return Err(OperationError::ProfileCrossesAxis);
    }
    let side_sign = max_side + min_side;

    // Angular step from the chord tolerance at the outermost point.
    let max_step = if max_radius > tol.coincidence {
        2.0 * (1.0 - (tol.chord / max_radius).min(1.0)).acos()
    } else {
        FULL_TURN
    };
    let segments = ((angle.abs() / max_step.max(1e-3)).ceil() as usize).max(3);
    let full = (angle.abs() - FULL_TURN).abs() < tol.angular;
    debug!(segments, full, "revolve");

    let axis_origin = frame.to_world(axis_point);
    let axis = (frame.u * ad[0] + frame.v * ad[1])
        .normalized()
        .ok_or(OperationError::ZeroAngle)?;

    let mut solid = Solid::new();
    let cell = solid.add_cell();
    let ring_count = if full { segments } else { segments + 1 };
    let mut rings: Vec<Vec<VertexId>> = Vec::with_capacity(ring_count);
    for k in 0..ring_count {
        let theta = angle * (k as f64) / (segments as f64);
        let ring = polygon
            .iter()
            .map(|&uv| {
                let p = frame.to_world(uv);
                solid.add_vertex_merged(rotate_about(&p, &axis_origin, &axis, theta), tol.coincidence)
            })
            .collect();
        rings.push(ring);
    }

    let n = polygon.len();
    // Profile winding vs. rotation direction decides side-quad orientation.
    // A CCW profile on the negative side of the axis revolved by a positive
    // angle makes [r_k[i], r_{k+1}[i], r_{k+1}[j], r_k[j]] face outward.
    let flip = (angle > 0.0) == (side_sign > 0.0);
    for k in 0..segments {
        let next = (k + 1) % ring_count;
        for i in 0..n {
            let j = (i + 1) % n;
            let mut ring = vec![rings[k][i], rings[next][i], rings[next][j], rings[k][j]];
            if flip {
                ring.reverse();
            }
            ring.dedup();
            if ring.len() > 1 && ring[0] == ring[ring.len() - 1] {
                ring.pop();
            }
            if ring.len() >= 3 {
                super::add_wall(&mut solid, cell, ring)?;
            }
        }
    }

    if !full {
        // One cap winds with the work plane, the other against it, depending
        // on which way the solid grows from the start plane.
        let mut start = rings[0].clone();
        let mut end = rings[ring_count - 1].clone();
        if flip {
            start.reverse();
        } else {
            end.reverse();
        }
        solid.add_face(cell, start)?;
        solid.add_face(cell, end)?;
    }

    solid.audit()?;
    Ok(solid)
}

/// Rodrigues rotation of a point about an axis line.
fn rotate_about(p: &Point3, origin: &Point3, axis: &Vec3, theta: f64) -> Point3 {
    let v = *p - *origin;
    let cos = theta.cos();
    let sin = theta.sin();
    let rotated = v * cos + axis.cross(&v) * sin + *axis * (axis.dot(&v) * (1.0 - cos));
    *origin + rotated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::solid_volume;
    use lathe_solver::{extract_profiles, RectangleOptions, Sketch};

    fn rect_profile(x: f64, y: f64, w: f64, h: f64) -> Profile {
        let mut sketch = Sketch::new();
        sketch.add_rectangle(x, y, w, h, RectangleOptions::default());
        extract_profiles(&sketch).unwrap().remove(0)
    }

    #[test]
    fn full_revolution_of_offset_square_is_a_torus_like_ring() {
        // Square [2,3]x[0,1] about the v axis: volume by Pappus is
        // area * 2 pi * centroid radius = 1 * 2 pi * 2.5.
        let profile = rect_profile(2.0, 0.0, 1.0, 1.0);
        let solid = revolve(
            &profile,
            &Frame::xy(0.0),
            [0.0, 0.0],
            [0.0, 1.0],
            FULL_TURN,
            &Tolerance::default(),
        )
        .unwrap();
        let expected = FULL_TURN * 2.5;
        assert!((solid_volume(&solid) - expected).abs() / expected < 0.01);
    }

    #[test]
    fn quarter_revolution_has_caps_and_quarter_volume() {
        let profile = rect_profile(1.0, 0.0, 1.0, 1.0);
        let solid = revolve(
            &profile,
            &Frame::xy(0.0),
            [0.0, 0.0],
            [0.0, 1.0],
            std::f64::consts::FRAC_PI_2,
            &Tolerance::default(),
        )
        .unwrap();
        let expected = FULL_TURN * 1.5 / 4.0;
        assert!((solid_volume(&solid) - expected).abs() / expected < 0.01);
    }

    #[test]
    fn crossing_profile_is_rejected() {
        let profile = rect_profile(-0.5, 0.0, 1.0, 1.0);
        let err = revolve(
            &profile,
            &Frame::xy(0.0),
            [0.0, 0.0],
            [0.0, 1.0],
            FULL_TURN,
            &Tolerance::default(),
        )
        .unwrap_err();
        assert!(matches!(err, OperationError::ProfileCrossesAxis));
    }
}
