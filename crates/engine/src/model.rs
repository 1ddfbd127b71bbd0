//! The feature history graph and its rebuild loop.
//!
//! A model is an ordered list of named feature nodes plus a registry of named
//! selections. Nodes reference earlier nodes by name only; a rebuild replays
//! the whole list in declaration order, so an unchanged model reproduces the
//! same topology numbering every time. Editing a node marks it and its
//! transitive dependents stale until the next rebuild.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use lathe_kernel::boolean::{
    difference, intersect, partition_by_plane, partition_by_solid, union, BooleanOptions,
};
use lathe_kernel::geometry::Frame;
use lathe_kernel::operations::{
    chamfer_edges, extrude_layers, fillet_edges, revolve, sweep,
};
use lathe_kernel::topology::{EntityIndex, Solid};
use lathe_kernel::Tolerance;
use lathe_solver::{extract_path, extract_profiles, solve, Sketch, SolveConfig, SolveWarning};
use lathe_types::{EntityDim, SelectionExpr};

use crate::node::{EngineError, FeatureNode, NodeStatus, Operation};
use crate::selection::{resolve_selection, ResolvedSelection};
use crate::workplane::{quick_frame, WorkPlaneDef};

/// The built output of one feature node.
#[derive(Debug, Clone)]
pub enum NodeResult {
    Plane(Frame),
    Sketch { sketch: Sketch, frame: Frame },
    Solid { solid: Solid, index: EntityIndex },
}

impl NodeResult {
    fn kind(&self) -> &'static str {
        match self {
            NodeResult::Plane(_) => "work plane",
            NodeResult::Sketch { .. } => "sketch",
            NodeResult::Solid { .. } => "solid body",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    pub built: usize,
    /// Solver findings per sketch node, non-fatal.
    pub warnings: Vec<(String, SolveWarning)>,
}

struct Outcome {
    result: Option<NodeResult>,
    warnings: Vec<SolveWarning>,
}

impl Outcome {
    fn of(result: NodeResult) -> Self {
        Self {
            result: Some(result),
            warnings: Vec::new(),
        }
    }
}

/// A parametric model document.
///
/// Serialization captures the recipe (nodes, selections, tolerances), not the
/// built geometry; a loaded document must be rebuilt before its outputs are
/// available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    nodes: Vec<FeatureNode>,
    selections: HashMap<String, SelectionExpr>,
    tolerance: Tolerance,
    solve_config: SolveConfig,
    #[serde(skip)]
    results: HashMap<String, NodeResult>,
    #[serde(skip)]
    next_generation: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            selections: HashMap::new(),
            tolerance: Tolerance::default(),
            solve_config: SolveConfig::default(),
            results: HashMap::new(),
            next_generation: 1,
        }
    }

    pub fn tolerance(&self) -> &Tolerance {
        &self.tolerance
    }

    /// Frozen copy of the document and its built outputs. Rebuilds happen on
    /// one thread; readers holding a snapshot keep seeing the last fully
    /// built state while the live model is being rebuilt.
    pub fn snapshot(&self) -> Model {
        self.clone()
    }

    // ---- history ----------------------------------------------------------

    /// Append a node. Every input it names must already be declared.
    pub fn add_node(&mut self, name: &str, operation: Operation) -> Result<Uuid, EngineError> {
        if self.position(name).is_some() {
            return Err(EngineError::DuplicateNode(name.to_string()));
        }
        for input in operation.inputs() {
            if self.position(input).is_none() {
                return Err(EngineError::ForwardReference {
                    node: name.to_string(),
                    input: input.to_string(),
                });
            }
        }
        let id = Uuid::new_v4();
        self.nodes.push(FeatureNode {
            id,
            name: name.to_string(),
            operation,
            suppressed: false,
            status: NodeStatus::Pending,
            group: None,
        });
        Ok(id)
    }

    pub fn node(&self, name: &str) -> Option<&FeatureNode> {
        self.position(name).map(|i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[FeatureNode] {
        &self.nodes
    }

    /// Mutable access to a node's operation for parameter edits. The node and
    /// everything downstream of it become stale; the edit takes effect at the
    /// next rebuild, and repeated edits before that rebuild simply overwrite
    /// each other.
    pub fn operation_mut(&mut self, name: &str) -> Result<&mut Operation, EngineError> {
        let pos = self
            .position(name)
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;
        self.mark_stale_from(pos);
        Ok(&mut self.nodes[pos].operation)
    }

    pub fn set_suppressed(&mut self, name: &str, suppressed: bool) -> Result<(), EngineError> {
        let pos = self
            .position(name)
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;
        self.nodes[pos].suppressed = suppressed;
        self.mark_stale_from(pos);
        Ok(())
    }

    pub fn set_group(&mut self, name: &str, group: Option<String>) -> Result<(), EngineError> {
        let pos = self
            .position(name)
            .ok_or_else(|| EngineError::UnknownNode(name.to_string()))?;
        self.nodes[pos].group = group;
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    fn mark_stale_from(&mut self, pos: usize) {
        let mut stale: HashSet<&str> = HashSet::new();
        let names: Vec<String> = self.nodes.iter().map(|n| n.name.clone()).collect();
        stale.insert(&names[pos]);
        for (j, node) in self.nodes.iter_mut().enumerate().skip(pos) {
            let hit =
                j == pos || node.operation.inputs().iter().any(|i| stale.contains(i));
            if hit {
                stale.insert(&names[j]);
                if node.status == NodeStatus::Built {
                    node.status = NodeStatus::Stale;
                }
            }
        }
    }

    // ---- selections -------------------------------------------------------

    /// Register or overwrite a named selection.
    pub fn register_selection(&mut self, name: &str, expr: SelectionExpr) {
        self.selections.insert(name.to_string(), expr);
    }

    /// Resolve a selection against the current built outputs. Intermediate
    /// sub-expressions may be empty; an empty final result is an error, so a
    /// rebuild that moved geometry out from under a selection is caught
    /// instead of silently operating on nothing.
    pub fn resolve(&self, expr: &SelectionExpr) -> Result<ResolvedSelection, EngineError> {
        let resolved =
            resolve_selection(expr, &self.selections, &|name| self.solid(name))?;
        if resolved.indices.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        Ok(resolved)
    }

    pub fn resolve_named(&self, name: &str) -> Result<ResolvedSelection, EngineError> {
        let expr = self
            .selections
            .get(name)
            .ok_or_else(|| EngineError::UnknownSelection(name.to_string()))?;
        self.resolve(expr)
    }

    // ---- outputs ----------------------------------------------------------

    pub fn solid(&self, name: &str) -> Result<(&Solid, &EntityIndex), EngineError> {
        match self.results.get(name) {
            Some(NodeResult::Solid { solid, index }) => Ok((solid, index)),
            Some(other) => Err(EngineError::WrongResultKind {
                node: name.to_string(),
                expected: "solid body",
                actual: other.kind(),
            }),
            None => Err(self.missing(name)),
        }
    }

    pub fn plane(&self, name: &str) -> Result<Frame, EngineError> {
        match self.results.get(name) {
            Some(NodeResult::Plane(frame)) => Ok(*frame),
            Some(other) => Err(EngineError::WrongResultKind {
                node: name.to_string(),
                expected: "work plane",
                actual: other.kind(),
            }),
            None => Err(self.missing(name)),
        }
    }

    /// The solved sketch of a sketch node and the frame it was placed on.
    pub fn sketch(&self, name: &str) -> Result<(&Sketch, Frame), EngineError> {
        match self.results.get(name) {
            Some(NodeResult::Sketch { sketch, frame }) => Ok((sketch, *frame)),
            Some(other) => Err(EngineError::WrongResultKind {
                node: name.to_string(),
                expected: "sketch",
                actual: other.kind(),
            }),
            None => Err(self.missing(name)),
        }
    }

    fn missing(&self, name: &str) -> EngineError {
        if self.position(name).is_some() {
            EngineError::Unavailable(name.to_string())
        } else {
            EngineError::UnknownNode(name.to_string())
        }
    }

    // ---- rebuild ----------------------------------------------------------

    /// Replay the whole history in declaration order. Stops at the first
    /// failing node, which is marked failed with everything after it stale.
    pub fn rebuild(&mut self) -> Result<RebuildReport, EngineError> {
        self.results.clear();
        let mut report = RebuildReport::default();
        for i in 0..self.nodes.len() {
            let node = self.nodes[i].clone();
            if node.suppressed {
                self.nodes[i].status = NodeStatus::Pending;
                continue;
            }
            debug!(node = %node.name, "build");
            match self.execute(&node) {
                Ok(outcome) => {
                    if let Some(result) = outcome.result {
                        self.results.insert(node.name.clone(), result);
                    }
                    report
                        .warnings
                        .extend(outcome.warnings.into_iter().map(|w| (node.name.clone(), w)));
                    self.nodes[i].status = NodeStatus::Built;
                    report.built += 1;
                }
                Err(err) => {
                    self.nodes[i].status = NodeStatus::Failed;
                    for later in &mut self.nodes[i + 1..] {
                        later.status = NodeStatus::Stale;
                    }
                    return Err(EngineError::NodeFailed {
                        node: node.name,
                        source: Box::new(err),
                    });
                }
            }
        }
        info!(built = report.built, "rebuild complete");
        Ok(report)
    }

    fn execute(&mut self, node: &FeatureNode) -> Result<Outcome, EngineError> {
        match &node.operation {
            Operation::WorkPlane(def) => {
                Ok(Outcome::of(NodeResult::Plane(self.plane_frame(def)?)))
            }
            Operation::Sketch { plane, sketch } => {
                let frame = self.plane(plane)?;
                let mut solved = sketch.clone();
                let report = solve(&mut solved, &self.solve_config)?;
                Ok(Outcome {
                    result: Some(NodeResult::Sketch {
                        sketch: solved,
                        frame,
                    }),
                    warnings: report.warnings,
                })
            }
            Operation::Extrude { sketch, offsets } => {
                let (sk, frame) = self.sketch(sketch)?;
                let profiles = extract_profiles(sk)?;
                let mut merged: Option<Solid> = None;
                for profile in &profiles {
                    let part = extrude_layers(profile, &frame, offsets, &self.tolerance)?;
                    merged = Some(self.merge(merged, part)?);
                }
                self.finish(merged)
            }
            Operation::Revolve {
                sketch,
                axis_point,
                axis_dir,
                angle,
            } => {
                let (sk, frame) = self.sketch(sketch)?;
                let profiles = extract_profiles(sk)?;
                let mut merged: Option<Solid> = None;
                for profile in &profiles {
                    let part = revolve(
                        profile,
                        &frame,
                        *axis_point,
                        *axis_dir,
                        *angle,
                        &self.tolerance,
                    )?;
                    merged = Some(self.merge(merged, part)?);
                }
                self.finish(merged)
            }
            Operation::Sweep { profile, path } => {
                let (profile_sketch, _) = self.sketch(profile)?;
                let profiles = extract_profiles(profile_sketch)?;
                let (path_sketch, path_frame) = self.sketch(path)?;
                let spine = extract_path(path_sketch)?;
                let mut merged: Option<Solid> = None;
                for profile in &profiles {
                    let part = sweep(profile, &spine, &path_frame, &self.tolerance)?;
                    merged = Some(self.merge(merged, part)?);
                }
                self.finish(merged)
            }
            Operation::Fillet {
                target,
                edges,
                radius,
            } => {
                let picked = self.edge_selection(target, edges)?;
                let (solid, _) = self.solid(target)?;
                let out = fillet_edges(solid, &picked, *radius, &self.tolerance)?;
                self.finish(Some(out))
            }
            Operation::Chamfer {
                target,
                edges,
                distance,
            } => {
                let picked = self.edge_selection(target, edges)?;
                let (solid, _) = self.solid(target)?;
                let out = chamfer_edges(solid, &picked, *distance, &self.tolerance)?;
                self.finish(Some(out))
            }
            Operation::Union {
                a,
                b,
                keep_interior_boundaries,
            } => {
                let (sa, _) = self.solid(a)?;
                let (sb, _) = self.solid(b)?;
                let out = union(
                    sa,
                    sb,
                    &BooleanOptions {
                        keep_interior_boundaries: *keep_interior_boundaries,
                    },
                    &self.tolerance,
                )?;
                self.finish(Some(out))
            }
            Operation::Difference { a, b } => {
                let (sa, _) = self.solid(a)?;
                let (sb, _) = self.solid(b)?;
                let out = difference(sa, sb, &self.tolerance)?;
                self.finish(Some(out))
            }
            Operation::Intersect { a, b } => {
                let (sa, _) = self.solid(a)?;
                let (sb, _) = self.solid(b)?;
                let out = intersect(sa, sb, &self.tolerance)?;
                self.finish(Some(out))
            }
            Operation::PartitionPlane { target, plane } => {
                let frame = self.plane(plane)?;
                let (solid, _) = self.solid(target)?;
                let out = partition_by_plane(solid, &frame.plane(), &self.tolerance)?;
                self.finish(Some(out))
            }
            Operation::PartitionSolid {
                target,
                tool,
                keep_tool,
            } => {
                let (solid, _) = self.solid(target)?;
                let (tool_solid, _) = self.solid(tool)?;
                let out = partition_by_solid(solid, tool_solid, *keep_tool, &self.tolerance)?;
                self.finish(Some(out))
            }
            Operation::Delete { target } => {
                self.results.remove(target);
                Ok(Outcome {
                    result: None,
                    warnings: Vec::new(),
                })
            }
            Operation::Import { solid } => self.finish(Some(solid.clone())),
        }
    }

    fn merge(&self, acc: Option<Solid>, part: Solid) -> Result<Solid, EngineError> {
        match acc {
            None => Ok(part),
            Some(acc) => Ok(union(
                &acc,
                &part,
                &BooleanOptions {
                    keep_interior_boundaries: false,
                },
                &self.tolerance,
            )?),
        }
    }

    fn finish(&mut self, solid: Option<Solid>) -> Result<Outcome, EngineError> {
        // Profile extraction guarantees at least one profile, so the merge
        // always produced a body.
        let mut solid = solid.expect("at least one body was produced");
        solid.generation = self.next_generation;
        self.next_generation += 1;
        let index = EntityIndex::build(&solid);
        Ok(Outcome::of(NodeResult::Solid { solid, index }))
    }

    fn edge_selection(
        &self,
        target: &str,
        expr: &SelectionExpr,
    ) -> Result<Vec<usize>, EngineError> {
        let resolved = self.resolve(expr)?;
        if resolved.node != target {
            return Err(EngineError::SelectionNodesDiffer {
                a: target.to_string(),
                b: resolved.node,
            });
        }
        if resolved.dim != EntityDim::Edge {
            return Err(EngineError::SelectionDim {
                node: target.to_string(),
                expected: EntityDim::Edge,
            });
        }
        Ok(resolved.indices)
    }

    fn plane_frame(&self, def: &WorkPlaneDef) -> Result<Frame, EngineError> {
        match def {
            WorkPlaneDef::Quick { base, offset } => Ok(quick_frame(*base, *offset)),
            WorkPlaneDef::FaceParallel {
                node,
                face,
                offset,
                offset_vertex,
            } => {
                let (solid, index) = self.solid(node)?;
                let face_id = index.face(*face)?;
                let normal = solid
                    .face(face_id)
                    .expect("indexed face exists")
                    .plane
                    .normal;
                let mut origin = index.centroid(solid, EntityDim::Face, *face)?;
                if let Some(v) = offset_vertex {
                    let p = solid.point(index.vertex(*v)?);
                    origin = origin + normal * (p - origin).dot(&normal);
                }
                origin = origin + normal * *offset;
                Frame::from_normal(origin, normal)
                    .ok_or_else(|| EngineError::DegeneratePlane(node.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workplane::BasePlane;
    use lathe_solver::RectangleOptions;

    fn rect_sketch(w: f64, h: f64) -> Sketch {
        let mut sketch = Sketch::new();
        sketch.add_rectangle(0.0, 0.0, w, h, RectangleOptions::default());
        sketch
    }

    #[test]
    fn nodes_must_reference_declared_inputs() {
        let mut model = Model::new();
        let err = model
            .add_node(
                "sk1",
                Operation::Sketch {
                    plane: "wp1".into(),
                    sketch: rect_sketch(1.0, 1.0),
                },
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::ForwardReference { .. }));

        model
            .add_node(
                "wp1",
                Operation::WorkPlane(WorkPlaneDef::quick(BasePlane::Xy, 0.0)),
            )
            .unwrap();
        let err = model
            .add_node(
                "wp1",
                Operation::WorkPlane(WorkPlaneDef::quick(BasePlane::Xy, 1.0)),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateNode(_)));
    }

    #[test]
    fn editing_a_node_marks_dependents_stale() {
        let mut model = Model::new();
        model
            .add_node(
                "wp1",
                Operation::WorkPlane(WorkPlaneDef::quick(BasePlane::Xy, 0.0)),
            )
            .unwrap();
        model
            .add_node(
                "sk1",
                Operation::Sketch {
                    plane: "wp1".into(),
                    sketch: rect_sketch(2.0, 1.0),
                },
            )
            .unwrap();
        model
            .add_node(
                "ext1",
                Operation::Extrude {
                    sketch: "sk1".into(),
                    offsets: vec![0.0, 0.5],
                },
            )
            .unwrap();
        model.rebuild().unwrap();
        assert_eq!(model.node("ext1").unwrap().status, NodeStatus::Built);

        if let Operation::Sketch { sketch, .. } = model.operation_mut("sk1").unwrap() {
            *sketch = rect_sketch(3.0, 1.0);
        }
        assert_eq!(model.node("sk1").unwrap().status, NodeStatus::Stale);
        assert_eq!(model.node("ext1").unwrap().status, NodeStatus::Stale);
        assert_eq!(model.node("wp1").unwrap().status, NodeStatus::Built);
    }

    #[test]
    fn snapshots_keep_the_last_built_state() {
        use lathe_kernel::measure::solid_volume;

        let mut model = Model::new();
        model
            .add_node(
                "wp1",
                Operation::WorkPlane(WorkPlaneDef::quick(BasePlane::Xy, 0.0)),
            )
            .unwrap();
        model
            .add_node(
                "sk1",
                Operation::Sketch {
                    plane: "wp1".into(),
                    sketch: rect_sketch(1.0, 1.0),
                },
            )
            .unwrap();
        model
            .add_node(
                "ext1",
                Operation::Extrude {
                    sketch: "sk1".into(),
                    offsets: vec![0.0, 1.0],
                },
            )
            .unwrap();
        model.rebuild().unwrap();
        let snap = model.snapshot();

        if let Operation::Extrude { offsets, .. } = model.operation_mut("ext1").unwrap() {
            *offsets = vec![0.0, 2.0];
        }
        model.rebuild().unwrap();

        let (old, _) = snap.solid("ext1").unwrap();
        let (new, _) = model.solid("ext1").unwrap();
        assert!((solid_volume(old) - 1.0).abs() < 1e-9);
        assert!((solid_volume(new) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn deleted_bodies_are_unavailable_downstream() {
        let mut model = Model::new();
        model
            .add_node(
                "wp1",
                Operation::WorkPlane(WorkPlaneDef::quick(BasePlane::Xy, 0.0)),
            )
            .unwrap();
        model
            .add_node(
                "sk1",
                Operation::Sketch {
                    plane: "wp1".into(),
                    sketch: rect_sketch(1.0, 1.0),
                },
            )
            .unwrap();
        model
            .add_node(
                "ext1",
                Operation::Extrude {
                    sketch: "sk1".into(),
                    offsets: vec![0.0, 1.0],
                },
            )
            .unwrap();
        model
            .add_node("del1", Operation::Delete { target: "ext1".into() })
            .unwrap();
        model.rebuild().unwrap();
        assert!(matches!(
            model.solid("ext1"),
            Err(EngineError::Unavailable(_))
        ));
    }
}
