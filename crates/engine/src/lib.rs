//! Parametric feature-history engine.
//!
//! A [`Model`] records named feature nodes (work planes, sketches, solid
//! operations, booleans) and named selections over their outputs. Rebuilding
//! replays the history in declaration order through the sketch solver and the
//! solid kernel; topology numbering is deterministic, so persisted selections
//! and downstream references keep meaning across rebuilds and round trips
//! through JSON.

pub mod model;
pub mod node;
pub mod selection;
pub mod workplane;

pub use model::{Model, NodeResult, RebuildReport};
pub use node::{EngineError, FeatureNode, NodeStatus, Operation};
pub use selection::ResolvedSelection;
pub use workplane::{BasePlane, WorkPlaneDef};
