//! Edge blends: rounds and chamfers on straight exterior edges.
//!
//! A blend removes the selected edges and rebuilds the solid with the two
//! incident faces trimmed back to the blend surface, a facet strip between
//! them, and the end faces patched where the edge's endpoints used to be.

use tracing::debug;

use super::OperationError;
use crate::geometry::{Plane, Point3, Vec3};
use crate::topology::{EntityIndex, Solid};
use crate::Tolerance;

/// Round the listed edges (1-based indices) with a cylindrical fillet.
pub fn fillet_edges(
    solid: &Solid,
    edges: &[usize],
    radius: f64,
    tol: &Tolerance,
) -> Result<Solid, OperationError> {
    blend(solid, edges, radius, false, tol)
}

/// Cut the listed edges (1-based indices) back by `distance` on each face.
pub fn chamfer_edges(
    solid: &Solid,
    edges: &[usize],
    distance: f64,
    tol: &Tolerance,
) -> Result<Solid, OperationError> {
    blend(solid, edges, distance, true, tol)
}

struct FaceRec {
    pts: Vec<Point3>,
    owner: usize,
    neighbor: Option<usize>,
}

fn blend(
    solid: &Solid,
    edges: &[usize],
    size: f64,
    chamfer: bool,
    tol: &Tolerance,
) -> Result<Solid, OperationError> {
    if size <= 0.0 {
        return Err(OperationError::InfeasibleRadius {
            edge: edges.first().copied().unwrap_or(0),
            radius: size,
        });
    }
    let index = EntityIndex::build(solid);
    let mut pairs = Vec::new();
    for &e in edges {
        let (a, b) = index.edge(e)?;
        pairs.push((e, solid.point(a), solid.point(b), a, b));
    }
    // Blended edges must not touch; a shared endpoint would need a corner
    // patch this kernel does not build.
    for i in 0..pairs.len() {
        for j in (i + 1)..pairs.len() {
            let (ea, _, _, a1, b1) = pairs[i];
            let (eb, _, _, a2, b2) = pairs[j];
            if a1 == a2 || a1 == b2 || b1 == a2 || b1 == b2 {
                return Err(OperationError::BlendEdgesTouch { a: ea, b: eb });
            }
        }
    }

    // Mutable face rings, keyed by creation order.
    let cell_pos: std::collections::HashMap<_, _> = solid
        .ordered_cells()
        .iter()
        .enumerate()
        .map(|(i, &c)| (c, i))
        .collect();
    let mut faces: Vec<FaceRec> = solid
        .ordered_faces()
        .iter()
        .map(|&f| {
            let face = solid.face(f).expect("ordered face exists");
            FaceRec {
                pts: solid.face_points(f),
                owner: cell_pos[&face.owner],
                neighbor: face.neighbor.map(|c| cell_pos[&c]),
            }
        })
        .collect();
    let mut strips: Vec<FaceRec> = Vec::new();

    for &(edge, qa, qb, _, _) in &pairs {
        let (f1, f2) = incident_faces(&faces, &qa, &qb, tol.coincidence)
            .ok_or(OperationError::EdgeNotFound { index: edge })?;
        let n1 = ring_plane(&faces[f1].pts).normal;
        let n2 = ring_plane(&faces[f2].pts).normal;
        let c = n1.dot(&n2).clamp(-1.0, 1.0);
        let phi = c.acos();
        if phi < 1e-6 || (1.0 + c).abs() < 1e-9 {
            return Err(OperationError::InfeasibleRadius { edge, radius: size });
        }
        let radius = if chamfer {
            size / (phi / 2.0).tan()
        } else {
            size
        };

        // Axis offset from the edge and per-face trim vectors.
        let axis_off = (n1 + n2) * (-radius / (1.0 + c));
        let off1 = n1 * radius + axis_off;
        let off2 = n2 * radius + axis_off;
        let trim = off1.norm();
        for &f in &[f1, f2] {
            for q in [&qa, &qb] {
                if shortest_adjacent(&faces[f].pts, q, tol.coincidence) < trim - tol.coincidence {
                    return Err(OperationError::InfeasibleRadius { edge, radius: size });
                }
            }
        }

        // Facet directions from n1 to n2 around the edge.
        let segments = if chamfer {
            1
        } else {
            let step = 2.0 * (1.0 - (tol.chord / radius).min(1.0)).acos();
            ((phi / step.max(1e-3)).ceil() as usize).clamp(2, 64)
        };
        let sin_phi = phi.sin();
        let dirs: Vec<Vec3> = (0..=segments)
            .map(|k| {
                let t = k as f64 / segments as f64;
                (n1 * (((1.0 - t) * phi).sin() / sin_phi) + n2 * ((t * phi).sin() / sin_phi))
                    .normalized()
                    .expect("slerp of unit normals")
            })
            .collect();
        let arc_at = |q: &Point3| -> Vec<Point3> {
            let axis = *q + axis_off;
            dirs.iter().map(|&d| axis + d * radius).collect()
        };
        let arc_a = arc_at(&qa);
        let arc_b = arc_at(&qb);
        debug!(edge, segments, trim, "blend edge");

        // Trim the two incident faces.
        for (f, off) in [(f1, off1), (f2, off2)] {
            for q in [&qa, &qb] {
                let i = position_of(&faces[f].pts, q, tol.coincidence)
                    .ok_or(OperationError::EdgeNotFound { index: edge })?;
                faces[f].pts[i] = *q + off;
            }
        }

        // Patch end faces: every other face holding an endpoint gets the arc
        // polyline in place of the vertex, entered from the side it shares
        // with the first incident face.
        let plane1 = ring_plane(&faces[f1].pts);
        let plane2 = ring_plane(&faces[f2].pts);
        for (q, arc) in [(&qa, &arc_a), (&qb, &arc_b)] {
            for f in 0..faces.len() {
                if f == f1 || f == f2 {
                    continue;
                }
                let Some(i) = position_of(&faces[f].pts, q, tol.coincidence) else {
                    continue;
                };
                let prev = faces[f].pts[(i + faces[f].pts.len() - 1) % faces[f].pts.len()];
                let from_face1 = plane1.signed_distance(&prev).abs()
                    <= plane2.signed_distance(&prev).abs();
                let mut insert = arc.clone();
                if !from_face1 {
                    insert.reverse();
                }
                faces[f].pts.splice(i..=i, insert);
            }
        }

        // The blend strip itself, one facet per sampled direction pair.
        let owner = faces[f1].owner;
        for k in 0..segments {
            let mut ring = vec![arc_a[k], arc_b[k], arc_b[k + 1], arc_a[k + 1]];
            let mid = (dirs[k] + dirs[k + 1]).normalized().expect("mid direction");
            if let Some(plane) = crate::topology::newell_plane(&ring) {
                if plane.normal.dot(&mid) < 0.0 {
                    ring.reverse();
                }
            }
            strips.push(FaceRec {
                pts: ring,
                owner,
                neighbor: None,
            });
        }
    }

    rebuild(solid, faces.into_iter().chain(strips), tol)
}

/// The two faces whose rings contain the segment (a, b).
fn incident_faces(
    faces: &[FaceRec],
    a: &Point3,
    b: &Point3,
    tol: f64,
) -> Option<(usize, usize)> {
    let mut found = Vec::new();
    for (f, rec) in faces.iter().enumerate() {
        let n = rec.pts.len();
        for i in 0..n {
            let p = rec.pts[i];
            let q = rec.pts[(i + 1) % n];
            if (p.distance(a) < tol && q.distance(b) < tol)
                || (p.distance(b) < tol && q.distance(a) < tol)
            {
                found.push(f);
                break;
            }
        }
    }
    (found.len() == 2).then(|| (found[0], found[1]))
}

fn position_of(pts: &[Point3], q: &Point3, tol: f64) -> Option<usize> {
    pts.iter().position(|p| p.distance(q) < tol)
}

/// Length of the shortest ring edge meeting the given vertex.
fn shortest_adjacent(pts: &[Point3], q: &Point3, tol: f64) -> f64 {
    let n = pts.len();
    let mut best = f64::INFINITY;
    for i in 0..n {
        if pts[i].distance(q) < tol {
            best = best
                .min(pts[i].distance(&pts[(i + 1) % n]))
                .min(pts[i].distance(&pts[(i + n - 1) % n]));
        }
    }
    best
}

fn ring_plane(pts: &[Point3]) -> Plane {
    crate::topology::newell_plane(pts).expect("face ring has a plane")
}

fn rebuild(
    original: &Solid,
    faces: impl Iterator<Item = FaceRec>,
    tol: &Tolerance,
) -> Result<Solid, OperationError> {
    let mut solid = Solid::new();
    let cells: Vec<_> = (0..original.cell_count()).map(|_| solid.add_cell()).collect();
    for rec in faces {
        let ring: Vec<_> = rec
            .pts
            .iter()
            .map(|&p| solid.add_vertex_merged(p, tol.coincidence))
            .collect();
        let mut dedup = ring.clone();
        dedup.dedup();
        if dedup.len() > 1 && dedup[0] == dedup[dedup.len() - 1] {
            dedup.pop();
        }
        if dedup.len() < 3 {
            continue;
        }
        let face = solid.add_face(cells[rec.owner], dedup)?;
        if let Some(nb) = rec.neighbor {
            solid.attach_neighbor(face, cells[nb])?;
        }
    }
    solid.audit()?;
    Ok(solid)
}
