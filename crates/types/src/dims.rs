use serde::{Deserialize, Serialize};

/// Topological dimension of an entity in a built model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityDim {
    Vertex,
    Edge,
    Face,
    Domain,
}

impl EntityDim {
    /// Numeric dimension (0..=3).
    pub fn as_usize(self) -> usize {
        match self {
            EntityDim::Vertex => 0,
            EntityDim::Edge => 1,
            EntityDim::Face => 2,
            EntityDim::Domain => 3,
        }
    }

    /// The dimension one below, if any. Adjacency expansion of a selection
    /// steps down one dimension (domains expose faces, faces expose edges,
    /// edges expose vertices).
    pub fn lower(self) -> Option<EntityDim> {
        match self {
            EntityDim::Vertex => None,
            EntityDim::Edge => Some(EntityDim::Vertex),
            EntityDim::Face => Some(EntityDim::Edge),
            EntityDim::Domain => Some(EntityDim::Face),
        }
    }
}

impl std::fmt::Display for EntityDim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityDim::Vertex => "vertex",
            EntityDim::Edge => "edge",
            EntityDim::Face => "face",
            EntityDim::Domain => "domain",
        };
        f.write_str(s)
    }
}
