//! Sweep of a profile along a tangent-continuous planar path.

use lathe_solver::{Profile, SweepPath};
use tracing::debug;

use super::OperationError;
use crate::geometry::Frame;
use crate::topology::{Solid, VertexId};
use crate::Tolerance;

/// Sweep a profile along `path`, which lies in the work plane `path_frame`.
///
/// The profile's (u, v) coordinates are placed in the moving cross-section
/// frame: u along the in-plane left normal of the path, v along the path
/// plane's normal. For a planar spine this frame is rotation minimizing, so a
/// G1 path produces a crease-free solid; the tangency check runs first and a
/// break is a structured error naming the joint.
pub fn sweep(
    profile: &Profile,
    path: &SweepPath,
    path_frame: &Frame,
    tol: &Tolerance,
) -> Result<Solid, OperationError> {
    path.verify_tangency(1e-6)?;
    let samples = path.discretize(tol.chord);
    if samples.len() < 2 {
        return Err(OperationError::PathTooShort);
    }
    let polygon = profile.polygonize(tol.chord);
    if polygon.len() < 3 {
        return Err(OperationError::InsufficientProfile);
    }
    let n = polygon.len();
    debug!(points = n, stations = samples.len(), "sweep");

    let mut solid = Solid::new();
    let cell = solid.add_cell();

    // Station frames: tangent t lifts to 3D, s = n x t stays in the path
    // plane, and the plane normal completes the triad.
    let rings: Vec<Vec<VertexId>> = samples
        .iter()
        .map(|&(p2, t2)| {
            let origin = path_frame.to_world(p2);
            let tangent = path_frame.u * t2[0] + path_frame.v * t2[1];
            let side = path_frame.normal.cross(&tangent);
            polygon
                .iter()
                .map(|&[a, b]| {
                    solid.add_vertex_merged(
                        origin + side * a + path_frame.normal * b,
                        tol.coincidence,
                    )
                })
                .collect()
        })
        .collect();

    // Walls between consecutive stations.
    for k in 0..rings.len() - 1 {
        for i in 0..n {
            let j = (i + 1) % n;
            let mut ring = vec![rings[k][i], rings[k][j], rings[k + 1][j], rings[k + 1][i]];
            ring.dedup();
            if ring.len() > 1 && ring[0] == ring[ring.len() - 1] {
                ring.pop();
            }
            if ring.len() >= 3 {
                super::add_wall(&mut solid, cell, ring)?;
            }
        }
    }

    // Caps: the start faces backwards along the spine.
    let mut start = rings[0].clone();
    start.reverse();
    solid.add_face(cell, start)?;
    solid.add_face(cell, rings[rings.len() - 1].clone())?;

    solid.audit()?;
    Ok(solid)
}
