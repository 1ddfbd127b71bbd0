//! Linear extrusion of a profile along its work-plane normal.

use lathe_solver::Profile;
use tracing::debug;

use super::OperationError;
use crate::geometry::Frame;
use crate::topology::{Solid, VertexId};
use crate::Tolerance;

/// Extrude a profile by a single signed distance. Negative distances extrude
/// against the work-plane normal.
pub fn extrude(
    profile: &Profile,
    frame: &Frame,
    distance: f64,
    tol: &Tolerance,
) -> Result<Solid, OperationError> {
    extrude_layers(profile, frame, &[0.0, distance], tol)
}

/// Extrude through a list of offsets along the normal, producing one cell per
/// consecutive pair with shared interior boundary faces between them.
///
/// Offsets may be given in any order and sign; they are sorted and
/// deduplicated first, so `[0.0, -0.3]` extrudes backwards.
pub fn extrude_layers(
    profile: &Profile,
    frame: &Frame,
    offsets: &[f64],
    tol: &Tolerance,
) -> Result<Solid, OperationError> {
    let mut levels: Vec<f64> = offsets.to_vec();
    levels.sort_by(f64::total_cmp);
    levels.dedup_by(|a, b| (*a - *b).abs() < tol.coincidence);
    if levels.len() < 2 {
        return Err(OperationError::InvalidDistance);
    }

    let polygon = profile.polygonize(tol.chord);
    if polygon.len() < 3 {
        return Err(OperationError::InsufficientProfile);
    }
    let n = polygon.len();
    debug!(points = n, layers = levels.len() - 1, "extrude");

    let mut solid = Solid::new();
    // Ring of vertices at each level.
    let rings: Vec<Vec<VertexId>> = levels
        .iter()
        .map(|&z| {
            polygon
                .iter()
                .map(|&uv| solid.add_vertex(frame.to_world(uv) + frame.normal * z))
                .collect()
        })
        .collect();

    let cells: Vec<_> = (0..levels.len() - 1).map(|_| solid.add_cell()).collect();

    // Bottom cap, outward against the normal.
    let mut bottom = rings[0].clone();
    bottom.reverse();
    solid.add_face(cells[0], bottom)?;
    // Top cap, outward along the normal.
    solid.add_face(*cells.last().expect("at least one cell"), rings[levels.len() - 1].clone())?;
    // Interior caps between layers.
    for k in 1..levels.len() - 1 {
        let face = solid.add_face(cells[k - 1], rings[k].clone())?;
        solid.attach_neighbor(face, cells[k])?;
    }
    // Side walls, one quad per profile edge per layer.
    for k in 0..levels.len() - 1 {
        for i in 0..n {
            let j = (i + 1) % n;
            solid.add_face(
                cells[k],
                vec![rings[k][i], rings[k][j], rings[k + 1][j], rings[k + 1][i]],
            )?;
        }
    }

    solid.audit()?;
    Ok(solid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::solid_volume;
    use approx::assert_relative_eq;
    use lathe_solver::{extract_profiles, RectangleOptions, Sketch};

    fn rect_profile(w: f64, h: f64) -> Profile {
        let mut sketch = Sketch::new();
        sketch.add_rectangle(0.0, 0.0, w, h, RectangleOptions::default());
        extract_profiles(&sketch).unwrap().remove(0)
    }

    #[test]
    fn rectangle_extrudes_to_a_box() {
        let solid = extrude(
            &rect_profile(2.0, 1.0),
            &Frame::xy(0.0),
            3.0,
            &Tolerance::default(),
        )
        .unwrap();
        assert_eq!(solid.face_count(), 6);
        assert_eq!(solid.cell_count(), 1);
        assert_relative_eq!(solid_volume(&solid), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn negative_distance_extrudes_backwards() {
        let solid = extrude(
            &rect_profile(1.0, 1.0),
            &Frame::xy(0.0),
            -0.3,
            &Tolerance::default(),
        )
        .unwrap();
        let bb = solid.bounding_box();
        assert_relative_eq!(bb.min.z, -0.3, epsilon = 1e-9);
        assert_relative_eq!(bb.max.z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(solid_volume(&solid), 0.3, epsilon = 1e-9);
    }

    #[test]
    fn layered_extrude_shares_interior_boundaries() {
        let solid = extrude_layers(
            &rect_profile(1.0, 1.0),
            &Frame::xy(0.0),
            &[0.0, 0.5, 2.0],
            &Tolerance::default(),
        )
        .unwrap();
        assert_eq!(solid.cell_count(), 2);
        assert_eq!(solid.interior_faces().count(), 1);
        assert_relative_eq!(solid_volume(&solid), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn circle_extrudes_to_a_prism_with_cylinder_volume() {
        let mut sketch = Sketch::new();
        sketch.add_circle(0.0, 0.0, 0.5);
        let profile = extract_profiles(&sketch).unwrap().remove(0);
        let solid = extrude(&profile, &Frame::yz(1.0), 2.0, &Tolerance::default()).unwrap();
        let expected = std::f64::consts::PI * 0.25 * 2.0;
        // Faceted circle under-approximates the area slightly.
        assert!((solid_volume(&solid) - expected).abs() / expected < 0.01);
        let bb = solid.bounding_box();
        assert_relative_eq!(bb.min.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(bb.max.x, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn single_offset_is_rejected() {
        let err = extrude_layers(
            &rect_profile(1.0, 1.0),
            &Frame::xy(0.0),
            &[0.5],
            &Tolerance::default(),
        )
        .unwrap_err();
        assert!(matches!(err, OperationError::InvalidDistance));
    }
}
