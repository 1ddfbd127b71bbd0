//! Solid-building operations over solved profiles.

pub mod extrude;
pub mod fillet;
pub mod revolve;
pub mod sweep;

pub use extrude::{extrude, extrude_layers};
pub use fillet::{chamfer_edges, fillet_edges};
pub use revolve::revolve;
pub use sweep::sweep;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::topology::{CellId, IndexError, Solid, TopologyError, VertexId};
use lathe_solver::ProfileError;

/// Add a wall face, fan-triangulating when the ring is not planar (ruled
/// surface patches from revolve and sweep).
pub(crate) fn add_wall(
    solid: &mut Solid,
    cell: CellId,
    ring: Vec<VertexId>,
) -> Result<(), TopologyError> {
    let pts: Vec<_> = ring.iter().map(|&v| solid.point(v)).collect();
    let planar = match crate::topology::planarity_deviation(&pts) {
        Some(dev) => dev < 1e-9,
        None => return Err(TopologyError::DegenerateFace),
    };
    if planar {
        solid.add_face(cell, ring)?;
    } else {
        for i in 1..ring.len() - 1 {
            solid.add_face(cell, vec![ring[0], ring[i], ring[i + 1]])?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum OperationError {
    #[error("profile has fewer than 3 boundary points")]
    InsufficientProfile,
    #[error("extrusion distance list needs at least two distinct offsets")]
    InvalidDistance,
    #[error("revolve angle must be nonzero")]
    ZeroAngle,
    #[error("revolve profile crosses its axis")]
    ProfileCrossesAxis,
    #[error("sweep path is empty or a single point")]
    PathTooShort,
    #[error("edge {index} is not on the solid")]
    EdgeNotFound { index: usize },
    #[error("blend edges {a} and {b} share a vertex")]
    BlendEdgesTouch { a: usize, b: usize },
    #[error("radius {radius} does not fit on the faces at edge {edge}")]
    InfeasibleRadius { edge: usize, radius: f64 },
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Index(#[from] IndexError),
}
