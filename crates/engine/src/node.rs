//! Feature nodes: the operations recorded in the history graph.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use lathe_kernel::boolean::BooleanError;
use lathe_kernel::operations::OperationError;
use lathe_kernel::topology::{IndexError, Solid, TopologyError};
use lathe_solver::{ProfileError, Sketch, SketchError, SolveError};
use lathe_types::{EntityDim, SelectionExpr, UnitError};

use crate::workplane::WorkPlaneDef;

/// One recorded operation. Nodes reference earlier nodes by name; the
/// rebuild replays them in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    WorkPlane(WorkPlaneDef),
    /// A sketch on a named work plane. The sketch is solved at rebuild.
    Sketch { plane: String, sketch: Sketch },
    /// Extrude the profiles of a sketch node through the offset list along
    /// the work-plane normal.
    Extrude { sketch: String, offsets: Vec<f64> },
    Revolve {
        sketch: String,
        axis_point: [f64; 2],
        axis_dir: [f64; 2],
        angle: f64,
    },
    /// Sweep the profile sketch along the path sketch's open curve chain.
    Sweep { profile: String, path: String },
    Fillet {
        target: String,
        edges: SelectionExpr,
        radius: f64,
    },
    Chamfer {
        target: String,
        edges: SelectionExpr,
        distance: f64,
    },
    Union {
        a: String,
        b: String,
        keep_interior_boundaries: bool,
    },
    Difference { a: String, b: String },
    Intersect { a: String, b: String },
    PartitionPlane { target: String, plane: String },
    PartitionSolid {
        target: String,
        tool: String,
        keep_tool: bool,
    },
    /// Drop a body from downstream availability.
    Delete { target: String },
    /// A solid brought in from outside the history.
    Import { solid: Solid },
}

impl Operation {
    /// Names of the earlier nodes this operation reads.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Operation::WorkPlane(def) => def.inputs(),
            Operation::Sketch { plane, .. } => vec![plane],
            Operation::Extrude { sketch, .. } => vec![sketch],
            Operation::Revolve { sketch, .. } => vec![sketch],
            Operation::Sweep { profile, path } => vec![profile, path],
            Operation::Fillet { target, edges, .. }
            | Operation::Chamfer { target, edges, .. } => {
                let mut v = vec![target.as_str()];
                collect_selection_nodes(edges, &mut v);
                v
            }
            Operation::Union { a, b, .. }
            | Operation::Difference { a, b }
            | Operation::Intersect { a, b } => vec![a, b],
            Operation::PartitionPlane { target, plane } => vec![target, plane],
            Operation::PartitionSolid { target, tool, .. } => vec![target, tool],
            Operation::Delete { target } => vec![target],
            Operation::Import { .. } => Vec::new(),
        }
    }
}

fn collect_selection_nodes<'a>(expr: &'a SelectionExpr, out: &mut Vec<&'a str>) {
    match expr {
        SelectionExpr::Explicit { node, .. }
        | SelectionExpr::All { node, .. }
        | SelectionExpr::Box { node, .. } => out.push(node),
        SelectionExpr::Adjacent { input } => collect_selection_nodes(input, out),
        SelectionExpr::Union { a, b }
        | SelectionExpr::Difference { a, b }
        | SelectionExpr::Intersection { a, b } => {
            collect_selection_nodes(a, out);
            collect_selection_nodes(b, out);
        }
        SelectionExpr::Named { .. } => {}
    }
}

/// Lifecycle of a node across edits and rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Never built.
    Pending,
    /// Output is current.
    Built,
    /// An upstream edit invalidated the output.
    Stale,
    /// The last rebuild attempt failed here.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureNode {
    pub id: Uuid,
    pub name: String,
    pub operation: Operation,
    pub suppressed: bool,
    #[serde(default = "pending")]
    pub status: NodeStatus,
    /// Optional display group, purely organizational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

fn pending() -> NodeStatus {
    NodeStatus::Pending
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node `{0}` does not exist")]
    UnknownNode(String),
    #[error("node name `{0}` is already taken")]
    DuplicateNode(String),
    #[error("node `{node}` references `{input}`, which is not declared before it")]
    ForwardReference { node: String, input: String },
    #[error("node `{node}` is a {actual}, expected a {expected}")]
    WrongResultKind {
        node: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("node `{0}` has no output (deleted or not built)")]
    Unavailable(String),
    #[error("selection `{0}` is not registered")]
    UnknownSelection(String),
    #[error("selection combines {a} entities with {b} entities")]
    DimensionMismatch { a: EntityDim, b: EntityDim },
    #[error("selection combines entities of `{a}` with entities of `{b}`")]
    SelectionNodesDiffer { a: String, b: String },
    #[error("selection on `{node}` expects {expected} entities")]
    SelectionDim { node: String, expected: EntityDim },
    #[error("vertices have no lower-dimensional adjacency")]
    NoLowerDimension,
    #[error("work plane for `{0}` has a degenerate normal")]
    DegeneratePlane(String),
    #[error("selection resolved to no entities")]
    EmptySelection,
    #[error("named selections recurse through `{0}`")]
    SelectionCycle(String),
    #[error("rebuild stopped at `{node}`: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: Box<EngineError>,
    },
    #[error(transparent)]
    Units(#[from] UnitError),
    #[error(transparent)]
    Sketch(#[from] SketchError),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Operation(#[from] OperationError),
    #[error(transparent)]
    Boolean(#[from] BooleanError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
}
