//! Boolean combination and partitioning of solids.
//!
//! All operations work by splitting cells into fragments along the other
//! operand's face planes, classifying each fragment by its volume centroid,
//! and rebuilding a solid from the kept fragments. Fragment caps produced by
//! the same split are geometrically identical, so interior boundaries between
//! kept fragments are recovered by exact pair matching. Volume is conserved
//! by construction: clipping never creates or destroys material.

mod split;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::geometry::{Plane, Point3, Vec3};
use crate::measure::solid_contains;
use crate::topology::{CellId, Solid, TopologyError};
use crate::Tolerance;
use split::{split_fragment, Fragment};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BooleanOptions {
    /// Keep boundaries between the operands' cells as interior faces. When
    /// false the result is dissolved into a single cell.
    pub keep_interior_boundaries: bool,
}

impl Default for BooleanOptions {
    fn default() -> Self {
        Self {
            keep_interior_boundaries: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum BooleanError {
    #[error("boolean result is empty")]
    EmptyResult,
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Union of two solids. Overlap material is counted once: the parts of `b`
/// inside `a` are discarded.
pub fn union(
    a: &Solid,
    b: &Solid,
    options: &BooleanOptions,
    tol: &Tolerance,
) -> Result<Solid, BooleanError> {
    let mut fragments: Vec<Fragment> = all_fragments(a);
    let planes = exterior_planes(a, tol);
    let mut kept = 0;
    for cell in b.ordered_cells() {
        for frag in split_by_planes(cell_fragment(b, *cell), &planes, tol) {
            if !solid_contains(a, &fragment_centroid(&frag)) {
                fragments.push(frag);
                kept += 1;
            }
        }
    }
    debug!(a_cells = a.cell_count(), b_kept = kept, "union");
    let mut solid = build_from_fragments(fragments, tol)?;
    if !options.keep_interior_boundaries {
        solid.dissolve_interior();
    }
    Ok(solid)
}

/// Material of `a` outside `b`.
pub fn difference(a: &Solid, b: &Solid, tol: &Tolerance) -> Result<Solid, BooleanError> {
    classify_against(a, b, tol, false)
}

/// Material of `a` inside `b`.
pub fn intersect(a: &Solid, b: &Solid, tol: &Tolerance) -> Result<Solid, BooleanError> {
    classify_against(a, b, tol, true)
}

fn classify_against(
    a: &Solid,
    b: &Solid,
    tol: &Tolerance,
    keep_inside: bool,
) -> Result<Solid, BooleanError> {
    let planes = exterior_planes(b, tol);
    let mut fragments = Vec::new();
    for cell in a.ordered_cells() {
        for frag in split_by_planes(cell_fragment(a, *cell), &planes, tol) {
            if solid_contains(b, &fragment_centroid(&frag)) == keep_inside {
                fragments.push(frag);
            }
        }
    }
    if fragments.is_empty() {
        return Err(BooleanError::EmptyResult);
    }
    build_from_fragments(fragments, tol)
}

/// Split every cell by one plane, keeping both sides as separate cells with
/// an interior boundary between them.
pub fn partition_by_plane(
    solid: &Solid,
    plane: &Plane,
    tol: &Tolerance,
) -> Result<Solid, BooleanError> {
    let mut fragments = Vec::new();
    for cell in solid.ordered_cells() {
        let frag = cell_fragment(solid, *cell);
        match split_fragment(&frag, plane, tol.coincidence) {
            Some(result) => {
                fragments.push(result.below);
                fragments.push(result.above);
            }
            None => fragments.push(frag),
        }
    }
    build_from_fragments(fragments, tol)
}

/// Partition `solid` along the boundary of `tool`: the material inside and
/// outside the tool become separate cells. With `keep_tool` the tool's own
/// cells are carried into the result as well.
pub fn partition_by_solid(
    solid: &Solid,
    tool: &Solid,
    keep_tool: bool,
    tol: &Tolerance,
) -> Result<Solid, BooleanError> {
    let planes = exterior_planes(tool, tol);
    let mut fragments = Vec::new();
    for cell in solid.ordered_cells() {
        fragments.extend(split_by_planes(cell_fragment(solid, *cell), &planes, tol));
    }
    if keep_tool {
        fragments.extend(all_fragments(tool));
    }
    build_from_fragments(fragments, tol)
}

// ── Fragment plumbing ────────────────────────────────────────────────────

fn all_fragments(solid: &Solid) -> Vec<Fragment> {
    solid
        .ordered_cells()
        .iter()
        .map(|&c| cell_fragment(solid, c))
        .collect()
}

/// Outward-oriented rings of one cell.
fn cell_fragment(solid: &Solid, cell: CellId) -> Fragment {
    let mut rings = Vec::new();
    for &f in &solid.cell(cell).expect("cell exists").faces {
        let face = solid.face(f).expect("face exists");
        let mut pts = solid.face_points(f);
        if face.owner != cell {
            pts.reverse();
        }
        rings.push(pts);
    }
    rings
}

/// Deduplicated exterior face planes, in face order.
fn exterior_planes(solid: &Solid, tol: &Tolerance) -> Vec<Plane> {
    let mut planes: Vec<Plane> = Vec::new();
    for f in solid.exterior_faces() {
        let plane = solid.face(f).expect("face exists").plane;
        let dup = planes.iter().any(|p| {
            p.normal.dot(&plane.normal).abs() > 1.0 - tol.angular.max(1e-9)
                && (p.offset - plane.offset * p.normal.dot(&plane.normal).signum()).abs()
                    < tol.coincidence
        });
        if !dup {
            planes.push(plane);
        }
    }
    planes
}

fn split_by_planes(fragment: Fragment, planes: &[Plane], tol: &Tolerance) -> Vec<Fragment> {
    let mut fragments = vec![fragment];
    for plane in planes {
        let mut next = Vec::new();
        for frag in fragments {
            match split_fragment(&frag, plane, tol.coincidence) {
                Some(result) => {
                    next.push(result.below);
                    next.push(result.above);
                }
                None => next.push(frag),
            }
        }
        fragments = next;
    }
    fragments.retain(|f| fragment_volume(f).abs() > 1e-12);
    fragments
}

fn fragment_volume(fragment: &Fragment) -> f64 {
    let mut volume = 0.0;
    for ring in fragment {
        for i in 1..ring.len() - 1 {
            volume += tet_volume(&ring[0], &ring[i], &ring[i + 1]);
        }
    }
    volume
}

fn fragment_centroid(fragment: &Fragment) -> Point3 {
    let mut volume = 0.0;
    let mut acc = Vec3::zero();
    for ring in fragment {
        for i in 1..ring.len() - 1 {
            let (a, b, c) = (ring[0], ring[i], ring[i + 1]);
            let v = tet_volume(&a, &b, &c);
            volume += v;
            acc = acc + Vec3::new(a.x + b.x + c.x, a.y + b.y + c.y, a.z + b.z + c.z) * (0.25 * v);
        }
    }
    if volume.abs() < 1e-30 {
        return Point3::default();
    }
    Point3::default() + acc * (1.0 / volume)
}

fn tet_volume(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    let va = *a - Point3::default();
    let vb = *b - Point3::default();
    let vc = *c - Point3::default();
    va.dot(&vb.cross(&vc)) / 6.0
}

/// Ring area vector (norm = area, direction = normal).
fn ring_area_vector(ring: &[Point3]) -> Vec3 {
    let mut acc = Vec3::zero();
    for i in 0..ring.len() {
        let a = ring[i] - Point3::default();
        let b = ring[(i + 1) % ring.len()] - Point3::default();
        acc = acc + a.cross(&b);
    }
    acc * 0.5
}

fn ring_centroid(ring: &[Point3]) -> Point3 {
    let n = ring.len().max(1) as f64;
    let mut acc = Vec3::zero();
    for p in ring {
        acc = acc + (*p - Point3::default());
    }
    Point3::default() + acc * (1.0 / n)
}

/// Assemble fragments into one solid, recovering interior boundaries between
/// fragments whose rings coincide with opposite orientation.
fn build_from_fragments(fragments: Vec<Fragment>, tol: &Tolerance) -> Result<Solid, BooleanError> {
    struct Pending {
        cell: usize,
        ring: Vec<Point3>,
        area: Vec3,
        centroid: Point3,
        matched: Option<usize>,
    }
    let mut pending: Vec<Pending> = Vec::new();
    for (cell, fragment) in fragments.iter().enumerate() {
        for ring in fragment {
            pending.push(Pending {
                cell,
                ring: ring.clone(),
                area: ring_area_vector(ring),
                centroid: ring_centroid(ring),
                matched: None,
            });
        }
    }
    // Pair coincident opposite-facing rings across cells.
    for i in 0..pending.len() {
        if pending[i].matched.is_some() {
            continue;
        }
        for j in (i + 1)..pending.len() {
            if pending[j].matched.is_some() || pending[i].cell == pending[j].cell {
                continue;
            }
            let same_spot =
                pending[i].centroid.distance(&pending[j].centroid) < tol.coincidence;
            let opposite = (pending[i].area + pending[j].area).norm()
                < tol.coincidence * (pending[i].area.norm() + 1.0);
            if same_spot && opposite {
                pending[i].matched = Some(j);
                pending[j].matched = Some(i);
                break;
            }
        }
    }

    let mut solid = Solid::new();
    let cells: Vec<_> = (0..fragments.len()).map(|_| solid.add_cell()).collect();
    for i in 0..pending.len() {
        match pending[i].matched {
            Some(j) if j < i => continue, // added as the pair's neighbor side
            other => {
                let ring: Vec<_> = pending[i]
                    .ring
                    .iter()
                    .map(|&p| solid.add_vertex_merged(p, tol.coincidence))
                    .collect();
                let mut dedup = ring;
                dedup.dedup();
                if dedup.len() > 1 && dedup[0] == dedup[dedup.len() - 1] {
                    dedup.pop();
                }
                if dedup.len() < 3 {
                    continue;
                }
                let face = solid.add_face(cells[pending[i].cell], dedup)?;
                if let Some(j) = other {
                    solid.attach_neighbor(face, cells[pending[j].cell])?;
                }
            }
        }
    }
    solid.audit()?;
    Ok(solid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Frame;
    use crate::measure::{cell_volume, solid_volume};
    use crate::operations::extrude::extrude;
    use approx::assert_relative_eq;
    use lathe_solver::{extract_profiles, RectangleOptions, Sketch};

    fn boxy(x: f64, y: f64, z: f64, w: f64, h: f64, d: f64) -> Solid {
        let mut sketch = Sketch::new();
        sketch.add_rectangle(x, y, w, h, RectangleOptions::default());
        let profile = extract_profiles(&sketch).unwrap().remove(0);
        let frame = Frame::xy(z);
        extrude(&profile, &frame, d, &Tolerance::default()).unwrap()
    }

    #[test]
    fn union_of_overlapping_boxes_counts_overlap_once() {
        let a = boxy(0.0, 0.0, 0.0, 2.0, 1.0, 1.0);
        let b = boxy(1.0, 0.0, 0.0, 2.0, 1.0, 1.0);
        let u = union(&a, &b, &BooleanOptions::default(), &Tolerance::default()).unwrap();
        assert_relative_eq!(solid_volume(&u), 3.0, epsilon = 1e-9);
        u.audit().unwrap();
    }

    #[test]
    fn union_without_interior_boundaries_is_one_cell() {
        let a = boxy(0.0, 0.0, 0.0, 2.0, 1.0, 1.0);
        let b = boxy(1.0, 0.0, 0.0, 2.0, 1.0, 1.0);
        let u = union(
            &a,
            &b,
            &BooleanOptions {
                keep_interior_boundaries: false,
            },
            &Tolerance::default(),
        )
        .unwrap();
        assert_eq!(u.cell_count(), 1);
        assert_relative_eq!(solid_volume(&u), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn difference_carves_a_through_hole_region() {
        let a = boxy(0.0, 0.0, 0.0, 3.0, 2.0, 1.0);
        let b = boxy(1.0, 0.5, -0.5, 1.0, 1.0, 2.0);
        let d = difference(&a, &b, &Tolerance::default()).unwrap();
        assert_relative_eq!(solid_volume(&d), 6.0 - 1.0, epsilon = 1e-9);
        d.audit().unwrap();
    }

    #[test]
    fn difference_removing_everything_is_empty() {
        let a = boxy(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);
        let b = boxy(-1.0, -1.0, -1.0, 3.0, 3.0, 3.0);
        assert!(matches!(
            difference(&a, &b, &Tolerance::default()),
            Err(BooleanError::EmptyResult)
        ));
    }

    #[test]
    fn intersection_keeps_the_overlap() {
        let a = boxy(0.0, 0.0, 0.0, 2.0, 1.0, 1.0);
        let b = boxy(1.0, 0.0, 0.0, 2.0, 1.0, 1.0);
        let i = intersect(&a, &b, &Tolerance::default()).unwrap();
        assert_relative_eq!(solid_volume(&i), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn partition_conserves_volume_and_splits_cells() {
        let a = boxy(0.0, 0.0, 0.0, 2.0, 1.0, 1.0);
        let plane =
            Plane::new(Vec3::new(1.0, 0.0, 0.0), Point3::new(0.7, 0.0, 0.0)).unwrap();
        let p = partition_by_plane(&a, &plane, &Tolerance::default()).unwrap();
        assert_eq!(p.cell_count(), 2);
        assert_eq!(p.interior_faces().count(), 1);
        assert_relative_eq!(solid_volume(&p), 2.0, epsilon = 1e-9);
        let cells = p.ordered_cells();
        let va = cell_volume(&p, cells[0]);
        let vb = cell_volume(&p, cells[1]);
        assert_relative_eq!(va + vb, 2.0, epsilon = 1e-9);
        assert_relative_eq!(va.min(vb), 0.7, epsilon = 1e-9);
    }

    #[test]
    fn partition_by_solid_separates_inside_and_outside() {
        let a = boxy(0.0, 0.0, 0.0, 3.0, 1.0, 1.0);
        let tool = boxy(1.0, -0.5, -0.5, 1.0, 2.0, 2.0);
        let p = partition_by_solid(&a, &tool, false, &Tolerance::default()).unwrap();
        // Left slab, middle (inside tool), right slab.
        assert_eq!(p.cell_count(), 3);
        assert_relative_eq!(solid_volume(&p), 3.0, epsilon = 1e-9);
    }
}
