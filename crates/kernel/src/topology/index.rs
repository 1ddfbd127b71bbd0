//! Deterministic topology numbering.
//!
//! Every entity of each dimension gets a 1-based index assigned in creation
//! order (edges in first-encounter order over the face list). Rebuilding an
//! unchanged model reproduces the same numbering, so persisted selections
//! keep meaning. An index snapshot remembers the solid generation it was
//! taken against and refuses to resolve against a different one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use lathe_types::EntityDim;

use super::{CellId, FaceId, Solid, VertexId};
use crate::geometry::Point3;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum IndexError {
    #[error("{dim} index {index} out of range 1..={count}")]
    OutOfRange {
        dim: EntityDim,
        index: usize,
        count: usize,
    },
    #[error("index snapshot from generation {snapshot} used against generation {actual}")]
    StaleReference { snapshot: u64, actual: u64 },
}

/// Index snapshot over one solid.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    generation: u64,
    vertices: Vec<VertexId>,
    edges: Vec<(VertexId, VertexId)>,
    faces: Vec<FaceId>,
    cells: Vec<CellId>,
    face_pos: HashMap<FaceId, usize>,
    cell_pos: HashMap<CellId, usize>,
    vertex_pos: HashMap<VertexId, usize>,
    edge_pos: HashMap<(VertexId, VertexId), usize>,
}

impl EntityIndex {
    pub fn build(solid: &Solid) -> Self {
        let vertices: Vec<VertexId> = solid.ordered_vertices().to_vec();
        let vertex_pos: HashMap<VertexId, usize> =
            vertices.iter().enumerate().map(|(i, &v)| (v, i)).collect();

        // Edges: unordered vertex pairs, first encounter over face rings.
        let mut edges = Vec::new();
        let mut edge_pos = HashMap::new();
        for &f in solid.ordered_faces() {
            let ring = &solid.face(f).expect("ordered face exists").ring;
            let n = ring.len();
            for i in 0..n {
                let key = canonical(ring[i], ring[(i + 1) % n], &vertex_pos);
                if let std::collections::hash_map::Entry::Vacant(e) = edge_pos.entry(key) {
                    e.insert(edges.len());
                    edges.push(key);
                }
            }
        }

        let faces: Vec<FaceId> = solid.ordered_faces().to_vec();
        let face_pos = faces.iter().enumerate().map(|(i, &f)| (f, i)).collect();
        let cells: Vec<CellId> = solid.ordered_cells().to_vec();
        let cell_pos = cells.iter().enumerate().map(|(i, &c)| (c, i)).collect();

        Self {
            generation: solid.generation,
            vertices,
            edges,
            faces,
            cells,
            face_pos,
            cell_pos,
            vertex_pos,
            edge_pos,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn check_generation(&self, solid: &Solid) -> Result<(), IndexError> {
        if solid.generation != self.generation {
            return Err(IndexError::StaleReference {
                snapshot: self.generation,
                actual: solid.generation,
            });
        }
        Ok(())
    }

    pub fn count(&self, dim: EntityDim) -> usize {
        match dim {
            EntityDim::Vertex => self.vertices.len(),
            EntityDim::Edge => self.edges.len(),
            EntityDim::Face => self.faces.len(),
            EntityDim::Domain => self.cells.len(),
        }
    }

    fn range_check(&self, dim: EntityDim, index: usize) -> Result<usize, IndexError> {
        let count = self.count(dim);
        if index == 0 || index > count {
            return Err(IndexError::OutOfRange { dim, index, count });
        }
        Ok(index - 1)
    }

    pub fn vertex(&self, index: usize) -> Result<VertexId, IndexError> {
        Ok(self.vertices[self.range_check(EntityDim::Vertex, index)?])
    }

    pub fn edge(&self, index: usize) -> Result<(VertexId, VertexId), IndexError> {
        Ok(self.edges[self.range_check(EntityDim::Edge, index)?])
    }

    pub fn face(&self, index: usize) -> Result<FaceId, IndexError> {
        Ok(self.faces[self.range_check(EntityDim::Face, index)?])
    }

    pub fn cell(&self, index: usize) -> Result<CellId, IndexError> {
        Ok(self.cells[self.range_check(EntityDim::Domain, index)?])
    }

    pub fn face_index(&self, id: FaceId) -> Option<usize> {
        self.face_pos.get(&id).map(|&i| i + 1)
    }

    pub fn cell_index(&self, id: CellId) -> Option<usize> {
        self.cell_pos.get(&id).map(|&i| i + 1)
    }

    pub fn vertex_index(&self, id: VertexId) -> Option<usize> {
        self.vertex_pos.get(&id).map(|&i| i + 1)
    }

    pub fn edge_index(&self, a: VertexId, b: VertexId) -> Option<usize> {
        self.edge_pos
            .get(&canonical(a, b, &self.vertex_pos))
            .map(|&i| i + 1)
    }

    /// Centroid of the indexed entity; box selections filter on this.
    pub fn centroid(
        &self,
        solid: &Solid,
        dim: EntityDim,
        index: usize,
    ) -> Result<Point3, IndexError> {
        match dim {
            EntityDim::Vertex => Ok(solid.point(self.vertex(index)?)),
            EntityDim::Edge => {
                let (a, b) = self.edge(index)?;
                Ok(solid.point(a).lerp(&solid.point(b), 0.5))
            }
            EntityDim::Face => {
                let pts = solid.face_points(self.face(index)?);
                Ok(average(&pts))
            }
            EntityDim::Domain => {
                let cell = self.cell(index)?;
                let mut pts = Vec::new();
                for &f in &solid.cell(cell).expect("indexed cell exists").faces {
                    pts.extend(solid.face_points(f));
                }
                Ok(average(&pts))
            }
        }
    }

    /// One-step downward adjacency: the indices (next-lower dimension)
    /// bounding the given entity. Results are sorted and deduplicated.
    pub fn adjacent_down(
        &self,
        solid: &Solid,
        dim: EntityDim,
        index: usize,
    ) -> Result<Vec<usize>, IndexError> {
        let mut out = Vec::new();
        match dim {
            EntityDim::Vertex => {}
            EntityDim::Edge => {
                let (a, b) = self.edge(index)?;
                out.extend(self.vertex_index(a));
                out.extend(self.vertex_index(b));
            }
            EntityDim::Face => {
                let face = self.face(index)?;
                let ring = &solid.face(face).expect("indexed face exists").ring;
                let n = ring.len();
                for i in 0..n {
                    out.extend(self.edge_index(ring[i], ring[(i + 1) % n]));
                }
            }
            EntityDim::Domain => {
                let cell = self.cell(index)?;
                for &f in &solid.cell(cell).expect("indexed cell exists").faces {
                    out.extend(self.face_index(f));
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }
}

fn canonical(
    a: VertexId,
    b: VertexId,
    pos: &HashMap<VertexId, usize>,
) -> (VertexId, VertexId) {
    if pos[&a] <= pos[&b] {
        (a, b)
    } else {
        (b, a)
    }
}

fn average(pts: &[Point3]) -> Point3 {
    let n = pts.len().max(1) as f64;
    let mut x = 0.0;
    let mut y = 0.0;
    let mut z = 0.0;
    for p in pts {
        x += p.x;
        y += p.y;
        z += p.z;
    }
    Point3::new(x / n, y / n, z / n)
}
