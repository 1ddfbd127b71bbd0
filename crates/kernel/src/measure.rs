//! Volume, centroid, and containment queries over solids.
//!
//! All integrals use the divergence theorem over fan-triangulated boundary
//! faces, so they are exact for the polyhedral representation and agree
//! between a whole solid and any partition of it into cells.

use crate::geometry::{ray_triangle, Point3, Vec3};
use crate::topology::{CellId, FaceId, Solid};

/// Fan triangulation of a face ring.
pub fn face_triangles(solid: &Solid, face: FaceId) -> Vec<(Point3, Point3, Point3)> {
    let pts = solid.face_points(face);
    (1..pts.len().saturating_sub(1))
        .map(|i| (pts[0], pts[i], pts[i + 1]))
        .collect()
}

/// Boundary triangles of one cell, oriented outward.
fn cell_triangles(solid: &Solid, cell: CellId) -> Vec<(Point3, Point3, Point3)> {
    let mut tris = Vec::new();
    let Some(c) = solid.cell(cell) else {
        return tris;
    };
    for &f in &c.faces {
        let outward = solid.face(f).map(|face| face.owner == cell).unwrap_or(false);
        for (a, b, cc) in face_triangles(solid, f) {
            if outward {
                tris.push((a, b, cc));
            } else {
                tris.push((a, cc, b));
            }
        }
    }
    tris
}

/// Signed volume of one cell; positive for outward-oriented boundaries.
pub fn cell_volume(solid: &Solid, cell: CellId) -> f64 {
    cell_triangles(solid, cell)
        .iter()
        .map(|(a, b, c)| signed_tet_volume(a, b, c))
        .sum()
}

/// Total volume over all cells.
pub fn solid_volume(solid: &Solid) -> f64 {
    solid
        .ordered_cells()
        .iter()
        .map(|&c| cell_volume(solid, c))
        .sum()
}

/// Volume-weighted centroid of a cell.
pub fn cell_centroid(solid: &Solid, cell: CellId) -> Point3 {
    let mut volume = 0.0;
    let mut acc = Vec3::zero();
    for (a, b, c) in cell_triangles(solid, cell) {
        let v = signed_tet_volume(&a, &b, &c);
        volume += v;
        let tet_centroid = Vec3::new(a.x + b.x + c.x, a.y + b.y + c.y, a.z + b.z + c.z) * 0.25;
        acc = acc + tet_centroid * v;
    }
    if volume.abs() < 1e-30 {
        // Degenerate cell: fall back to the vertex average.
        let mut pts = Vec::new();
        if let Some(c) = solid.cell(cell) {
            for &f in &c.faces {
                pts.extend(solid.face_points(f));
            }
        }
        let n = pts.len().max(1) as f64;
        let mut s = Vec3::zero();
        for p in &pts {
            s = s + (*p - Point3::default());
        }
        return Point3::default() + s * (1.0 / n);
    }
    Point3::default() + acc * (1.0 / volume)
}

/// Ray direction with irrational-ish components, so axis-aligned model
/// geometry does not produce grazing hits.
fn probe_direction() -> Vec3 {
    Vec3::new(0.577_350_269_1, 0.211_324_865_4, 0.788_675_134_6)
        .normalized()
        .expect("nonzero")
}

/// Parity containment test against one cell's boundary.
pub fn cell_contains(solid: &Solid, cell: CellId, point: &Point3) -> bool {
    let dir = probe_direction();
    let mut crossings = 0;
    for (a, b, c) in cell_triangles(solid, cell) {
        if ray_triangle(point, &dir, &a, &b, &c).is_some() {
            crossings += 1;
        }
    }
    crossings % 2 == 1
}

/// True when the point lies inside any cell of the solid.
pub fn solid_contains(solid: &Solid, point: &Point3) -> bool {
    solid
        .ordered_cells()
        .iter()
        .any(|&c| cell_contains(solid, c, point))
}

fn signed_tet_volume(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    let va = *a - Point3::default();
    let vb = *b - Point3::default();
    let vc = *c - Point3::default();
    va.dot(&vb.cross(&vc)) / 6.0
}
