//! Boundary-representation store.
//!
//! A [`Solid`] is a set of cells (3D domains), each bounded by planar faces
//! over shared vertices. Faces are stored once; an interior boundary between
//! two cells carries its `owner` on the normal side's opposite and a
//! `neighbor` on the other. Entity arenas are slotmaps, but deterministic
//! creation-order lists are kept alongside so rebuilds of an unchanged model
//! number entities identically; see [`index`].

pub mod index;

pub use index::{EntityIndex, IndexError};

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::geometry::{BoundingBox, Plane, Point3};

new_key_type! {
    pub struct VertexId;
    pub struct FaceId;
    pub struct CellId;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub point: Point3,
}

/// A planar face bounded by one vertex ring.
///
/// The ring runs counterclockwise seen from the plane normal side, and the
/// normal points out of `owner`. A face shared with a second cell records it
/// as `neighbor`; seen from the neighbor the ring winds the other way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub ring: Vec<VertexId>,
    pub plane: Plane,
    pub owner: CellId,
    pub neighbor: Option<CellId>,
}

/// A connected 3D domain bounded by faces (owned or neighbored).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub faces: Vec<FaceId>,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum TopologyError {
    #[error("face ring has fewer than 3 distinct vertices")]
    DegenerateFace,
    #[error("face vertices are not coplanar")]
    NonPlanarFace,
    #[error("unknown entity id")]
    MissingEntity,
    #[error("cell boundary is not closed (unmatched edge near ({x:.6}, {y:.6}, {z:.6}))")]
    OpenShell { x: f64, y: f64, z: f64 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Solid {
    vertices: SlotMap<VertexId, Vertex>,
    faces: SlotMap<FaceId, Face>,
    cells: SlotMap<CellId, Cell>,
    vertex_order: Vec<VertexId>,
    face_order: Vec<FaceId>,
    cell_order: Vec<CellId>,
    /// Bumped by the history graph when the node output changes; index
    /// handles captured against an older generation refuse to resolve.
    pub generation: u64,
}

impl Solid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, point: Point3) -> VertexId {
        let id = self.vertices.insert(Vertex { point });
        self.vertex_order.push(id);
        id
    }

    /// Add a vertex, reusing an existing one within `tol`.
    pub fn add_vertex_merged(&mut self, point: Point3, tol: f64) -> VertexId {
        for &id in &self.vertex_order {
            if self.vertices[id].point.distance(&point) < tol {
                return id;
            }
        }
        self.add_vertex(point)
    }

    pub fn add_cell(&mut self) -> CellId {
        let id = self.cells.insert(Cell::default());
        self.cell_order.push(id);
        id
    }

    /// Add a face bounding `cell`, ring oriented outward (counterclockwise
    /// from outside). The plane is derived from the ring.
    pub fn add_face(&mut self, cell: CellId, ring: Vec<VertexId>) -> Result<FaceId, TopologyError> {
        if ring.len() < 3 {
            return Err(TopologyError::DegenerateFace);
        }
        let points: Vec<Point3> = ring
            .iter()
            .map(|&v| {
                self.vertices
                    .get(v)
                    .map(|vx| vx.point)
                    .ok_or(TopologyError::MissingEntity)
            })
            .collect::<Result<_, _>>()?;
        // Newell normal keeps orientation for slightly non-convex rings.
        let plane = newell_plane(&points).ok_or(TopologyError::DegenerateFace)?;
        for p in &points {
            if plane.signed_distance(p).abs() > 1e-6 {
                return Err(TopologyError::NonPlanarFace);
            }
        }
        let id = self.faces.insert(Face {
            ring,
            plane,
            owner: cell,
            neighbor: None,
        });
        self.face_order.push(id);
        self.cells
            .get_mut(cell)
            .ok_or(TopologyError::MissingEntity)?
            .faces
            .push(id);
        Ok(id)
    }

    /// Record `cell` as the other side of an existing face.
    pub fn attach_neighbor(&mut self, face: FaceId, cell: CellId) -> Result<(), TopologyError> {
        let f = self.faces.get_mut(face).ok_or(TopologyError::MissingEntity)?;
        f.neighbor = Some(cell);
        self.cells
            .get_mut(cell)
            .ok_or(TopologyError::MissingEntity)?
            .faces
            .push(face);
        Ok(())
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id)
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn point(&self, id: VertexId) -> Point3 {
        self.vertices[id].point
    }

    /// Ring positions of a face.
    pub fn face_points(&self, id: FaceId) -> Vec<Point3> {
        self.faces[id]
            .ring
            .iter()
            .map(|&v| self.vertices[v].point)
            .collect()
    }

    /// Creation-order iteration; the basis for deterministic numbering.
    pub fn ordered_vertices(&self) -> &[VertexId] {
        &self.vertex_order
    }

    pub fn ordered_faces(&self) -> &[FaceId] {
        &self.face_order
    }

    pub fn ordered_cells(&self) -> &[CellId] {
        &self.cell_order
    }

    pub fn cell_count(&self) -> usize {
        self.cell_order.len()
    }

    pub fn face_count(&self) -> usize {
        self.face_order.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_order.len()
    }

    /// Faces on the outer boundary (single-sided).
    pub fn exterior_faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.face_order
            .iter()
            .copied()
            .filter(|&f| self.faces[f].neighbor.is_none())
    }

    /// Faces between two cells.
    pub fn interior_faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.face_order
            .iter()
            .copied()
            .filter(|&f| self.faces[f].neighbor.is_some())
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bb = BoundingBox::empty();
        for &v in &self.vertex_order {
            bb.insert(&self.vertices[v].point);
        }
        bb
    }

    /// Merge all cells into one, dropping interior boundary faces. Used by
    /// unions that do not keep interior boundaries.
    pub fn dissolve_interior(&mut self) {
        if self.cell_order.len() <= 1 && self.face_order.iter().all(|&f| self.faces[f].neighbor.is_none()) {
            return;
        }
        let merged = self.cells.insert(Cell::default());
        let mut kept_faces = Vec::new();
        for &f in &self.face_order {
            if self.faces[f].neighbor.is_none() {
                self.faces[f].owner = merged;
                self.cells[merged].faces.push(f);
                kept_faces.push(f);
            } else {
                self.faces.remove(f);
            }
        }
        for &c in &self.cell_order {
            self.cells.remove(c);
        }
        self.face_order = kept_faces;
        self.cell_order = vec![merged];
    }

    /// Check each cell's boundary is a closed, consistently oriented surface:
    /// every directed edge appears exactly once with its reverse.
    pub fn audit(&self) -> Result<(), TopologyError> {
        for &cell in &self.cell_order {
            let mut edges: std::collections::HashMap<(VertexId, VertexId), i32> =
                std::collections::HashMap::new();
            for &f in &self.cells[cell].faces {
                let face = &self.faces[f];
                let outward = face.owner == cell;
                let n = face.ring.len();
                for i in 0..n {
                    let (a, b) = if outward {
                        (face.ring[i], face.ring[(i + 1) % n])
                    } else {
                        (face.ring[(i + 1) % n], face.ring[i])
                    };
                    *edges.entry((a, b)).or_insert(0) += 1;
                }
            }
            for (&(a, b), &count) in &edges {
                if count != 1 || edges.get(&(b, a)) != Some(&1) {
                    let p = self.vertices[a].point;
                    return Err(TopologyError::OpenShell {
                        x: p.x,
                        y: p.y,
                        z: p.z,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Largest distance of any ring point from its Newell plane.
pub(crate) fn planarity_deviation(points: &[Point3]) -> Option<f64> {
    let plane = newell_plane(points)?;
    Some(
        points
            .iter()
            .map(|p| plane.signed_distance(p).abs())
            .fold(0.0, f64::max),
    )
}

/// Newell's method; robust plane for near-planar polygon rings.
pub(crate) fn newell_plane(points: &[Point3]) -> Option<Plane> {
    let n = points.len();
    if n < 3 {
        return None;
    }
    let mut nx = 0.0;
    let mut ny = 0.0;
    let mut nz = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        nx += (a.y - b.y) * (a.z + b.z);
        ny += (a.z - b.z) * (a.x + b.x);
        nz += (a.x - b.x) * (a.y + b.y);
    }
    Plane::new(crate::geometry::Vec3::new(nx, ny, nz), points[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;

    fn unit_cube() -> Solid {
        let mut solid = Solid::new();
        let cell = solid.add_cell();
        let p = |x, y, z| Point3::new(x, y, z);
        let v: Vec<VertexId> = [
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
            p(0.0, 0.0, 1.0),
            p(1.0, 0.0, 1.0),
            p(1.0, 1.0, 1.0),
            p(0.0, 1.0, 1.0),
        ]
        .into_iter()
        .map(|p| solid.add_vertex(p))
        .collect();
        let faces = [
            [0, 3, 2, 1], // bottom, normal -z
            [4, 5, 6, 7], // top, normal +z
            [0, 1, 5, 4], // front, normal -y
            [2, 3, 7, 6], // back, normal +y
            [0, 4, 7, 3], // left, normal -x
            [1, 2, 6, 5], // right, normal +x
        ];
        for ring in faces {
            solid
                .add_face(cell, ring.into_iter().map(|i| v[i]).collect())
                .unwrap();
        }
        solid
    }

    #[test]
    fn cube_audits_closed() {
        let solid = unit_cube();
        solid.audit().unwrap();
        assert_eq!(solid.vertex_count(), 8);
        assert_eq!(solid.face_count(), 6);
        assert_eq!(solid.cell_count(), 1);
    }

    #[test]
    fn missing_face_breaks_the_shell() {
        let mut solid = Solid::new();
        let cell = solid.add_cell();
        let v0 = solid.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let v1 = solid.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let v2 = solid.add_vertex(Point3::new(0.0, 1.0, 0.0));
        solid.add_face(cell, vec![v0, v1, v2]).unwrap();
        assert!(matches!(
            solid.audit(),
            Err(TopologyError::OpenShell { .. })
        ));
    }

    #[test]
    fn face_normal_follows_ring_winding() {
        let solid = unit_cube();
        let top = solid.ordered_faces()[1];
        let n = solid.face(top).unwrap().plane.normal;
        assert!((n - Vec3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn dissolve_interior_merges_cells() {
        let mut solid = Solid::new();
        // Two unit cubes sharing the x = 1 wall.
        let a = solid.add_cell();
        let b = solid.add_cell();
        let p = |x, y, z| Point3::new(x, y, z);
        let c000 = solid.add_vertex(p(0.0, 0.0, 0.0));
        let c100 = solid.add_vertex(p(1.0, 0.0, 0.0));
        let c110 = solid.add_vertex(p(1.0, 1.0, 0.0));
        let c010 = solid.add_vertex(p(0.0, 1.0, 0.0));
        let c001 = solid.add_vertex(p(0.0, 0.0, 1.0));
        let c101 = solid.add_vertex(p(1.0, 0.0, 1.0));
        let c111 = solid.add_vertex(p(1.0, 1.0, 1.0));
        let c011 = solid.add_vertex(p(0.0, 1.0, 1.0));
        let c200 = solid.add_vertex(p(2.0, 0.0, 0.0));
        let c210 = solid.add_vertex(p(2.0, 1.0, 0.0));
        let c201 = solid.add_vertex(p(2.0, 0.0, 1.0));
        let c211 = solid.add_vertex(p(2.0, 1.0, 1.0));
        // Cell a: full cube.
        for ring in [
            vec![c000, c010, c110, c100],
            vec![c001, c101, c111, c011],
            vec![c000, c100, c101, c001],
            vec![c110, c010, c011, c111],
            vec![c000, c001, c011, c010],
        ] {
            solid.add_face(a, ring).unwrap();
        }
        let wall = solid.add_face(a, vec![c100, c110, c111, c101]).unwrap();
        solid.attach_neighbor(wall, b).unwrap();
        for ring in [
            vec![c100, c110, c210, c200],
            vec![c101, c201, c211, c111],
            vec![c100, c200, c201, c101],
            vec![c210, c110, c111, c211],
            vec![c200, c210, c211, c201],
        ] {
            solid.add_face(b, ring).unwrap();
        }
        solid.audit().unwrap();
        assert_eq!(solid.interior_faces().count(), 1);
        solid.dissolve_interior();
        assert_eq!(solid.cell_count(), 1);
        assert_eq!(solid.interior_faces().count(), 0);
        solid.audit().unwrap();
    }
}
