use serde::{Deserialize, Serialize};

/// Typed, versioned handle to a sketch entity.
///
/// The generation counter catches stale references by construction: a handle
/// issued before an entity was removed no longer resolves, instead of
/// aliasing whatever occupies the slot now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Addresses a sub-element of an entity for constraint and selection use.
///
/// Vertices and edges are numbered from 1 in declaration order, matching the
/// addressing used by the history graph (`rect(1)` edge 3 is the rectangle's
/// right edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "k")]
pub enum SubRef {
    /// The entity as a whole (circles, arcs for tangency/radius constraints).
    Whole,
    /// The k-th vertex, 1-based.
    Vertex(usize),
    /// The k-th edge, 1-based.
    Edge(usize),
    /// The center point of a circle or arc.
    Center,
}

/// A reference into one entity's sub-elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity: EntityId,
    pub sub: SubRef,
}

impl EntityRef {
    pub fn whole(entity: EntityId) -> Self {
        Self {
            entity,
            sub: SubRef::Whole,
        }
    }

    pub fn vertex(entity: EntityId, k: usize) -> Self {
        Self {
            entity,
            sub: SubRef::Vertex(k),
        }
    }

    pub fn edge(entity: EntityId, k: usize) -> Self {
        Self {
            entity,
            sub: SubRef::Edge(k),
        }
    }

    pub fn center(entity: EntityId) -> Self {
        Self {
            entity,
            sub: SubRef::Center,
        }
    }
}

/// A geometric entity in a sketch. Fields are offsets into the sketch's flat
/// parameter vector: a point occupies two consecutive slots (x, y).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SketchEntity {
    Point {
        param: usize,
    },
    /// A line segment between two owned endpoints.
    Line {
        start: usize,
        end: usize,
    },
    Circle {
        center: usize,
        radius: usize,
    },
    /// A circular arc: center, radius, start/end angles (radians, CCW).
    Arc {
        center: usize,
        radius: usize,
        start_angle: usize,
        end_angle: usize,
    },
    /// An ordered vertex chain; edge k connects vertex k to vertex k+1
    /// (wrapping when closed).
    Polygon {
        vertices: Vec<usize>,
        closed: bool,
    },
}

impl SketchEntity {
    /// Number of addressable edges.
    pub fn edge_count(&self) -> usize {
        match self {
            SketchEntity::Point { .. } => 0,
            SketchEntity::Line { .. } => 1,
            SketchEntity::Circle { .. } => 1,
            SketchEntity::Arc { .. } => 1,
            SketchEntity::Polygon { vertices, closed } => {
                if *closed {
                    vertices.len()
                } else {
                    vertices.len().saturating_sub(1)
                }
            }
        }
    }

    /// Number of addressable vertices.
    pub fn vertex_count(&self) -> usize {
        match self {
            SketchEntity::Point { .. } => 1,
            SketchEntity::Line { .. } => 2,
            SketchEntity::Circle { .. } => 0,
            SketchEntity::Arc { .. } => 2,
            SketchEntity::Polygon { vertices, .. } => vertices.len(),
        }
    }
}
