//! Resolution of declarative selections against built topology.
//!
//! A selection expression resolves to sorted, deduplicated 1-based indices
//! on one node's output. Resolution is re-run after every rebuild, so a
//! registered selection follows the model as long as the expression itself
//! stays meaningful; structural errors (out-of-range index, dimension
//! mismatch) surface as typed errors instead of silently shrinking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use lathe_kernel::geometry::Point3;
use lathe_kernel::topology::{EntityIndex, IndexError, Solid};
use lathe_types::{EntityDim, SelectionExpr};

use crate::node::EngineError;

/// The concrete outcome of resolving a selection expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSelection {
    pub node: String,
    pub dim: EntityDim,
    pub indices: Vec<usize>,
}

pub(crate) type Lookup<'a> = &'a dyn Fn(&str) -> Result<(&'a Solid, &'a EntityIndex), EngineError>;

pub(crate) fn resolve_selection(
    expr: &SelectionExpr,
    named: &HashMap<String, SelectionExpr>,
    lookup: Lookup<'_>,
) -> Result<ResolvedSelection, EngineError> {
    resolve_inner(expr, named, lookup, 0)
}

fn resolve_inner(
    expr: &SelectionExpr,
    named: &HashMap<String, SelectionExpr>,
    lookup: Lookup<'_>,
    depth: usize,
) -> Result<ResolvedSelection, EngineError> {
    match expr {
        SelectionExpr::Explicit { node, dim, indices } => {
            let (_, index) = lookup(node)?;
            let count = index.count(*dim);
            for &k in indices {
                if k == 0 || k > count {
                    return Err(IndexError::OutOfRange {
                        dim: *dim,
                        index: k,
                        count,
                    }
                    .into());
                }
            }
            let mut indices = indices.clone();
            indices.sort_unstable();
            indices.dedup();
            Ok(ResolvedSelection {
                node: node.clone(),
                dim: *dim,
                indices,
            })
        }
        SelectionExpr::All { node, dim } => {
            let (_, index) = lookup(node)?;
            Ok(ResolvedSelection {
                node: node.clone(),
                dim: *dim,
                indices: (1..=index.count(*dim)).collect(),
            })
        }
        SelectionExpr::Box { node, dim, min, max } => {
            let (solid, index) = lookup(node)?;
            let lo = Point3::new(min[0], min[1], min[2]);
            let hi = Point3::new(max[0], max[1], max[2]);
            let mut indices = Vec::new();
            for k in 1..=index.count(*dim) {
                let c = index.centroid(solid, *dim, k)?;
                if c.x >= lo.x
                    && c.x <= hi.x
                    && c.y >= lo.y
                    && c.y <= hi.y
                    && c.z >= lo.z
                    && c.z <= hi.z
                {
                    indices.push(k);
                }
            }
            Ok(ResolvedSelection {
                node: node.clone(),
                dim: *dim,
                indices,
            })
        }
        SelectionExpr::Adjacent { input } => {
            let inner = resolve_inner(input, named, lookup, depth + 1)?;
            let dim = inner.dim.lower().ok_or(EngineError::NoLowerDimension)?;
            let (solid, index) = lookup(&inner.node)?;
            let mut indices = Vec::new();
            for &k in &inner.indices {
                indices.extend(index.adjacent_down(solid, inner.dim, k)?);
            }
            indices.sort_unstable();
            indices.dedup();
            Ok(ResolvedSelection {
                node: inner.node,
                dim,
                indices,
            })
        }
        SelectionExpr::Union { a, b } => combine(a, b, named, lookup, depth, |x, y| {
            let mut out = x.to_vec();
            out.extend_from_slice(y);
            out
        }),
        SelectionExpr::Difference { a, b } => combine(a, b, named, lookup, depth, |x, y| {
            x.iter().copied().filter(|k| !y.contains(k)).collect()
        }),
        SelectionExpr::Intersection { a, b } => combine(a, b, named, lookup, depth, |x, y| {
            x.iter().copied().filter(|k| y.contains(k)).collect()
        }),
        SelectionExpr::Named { name } => {
            if depth > 32 {
                return Err(EngineError::SelectionCycle(name.clone()));
            }
            let inner = named
                .get(name)
                .ok_or_else(|| EngineError::UnknownSelection(name.clone()))?;
            resolve_inner(inner, named, lookup, depth + 1)
        }
    }
}

fn combine(
    a: &SelectionExpr,
    b: &SelectionExpr,
    named: &HashMap<String, SelectionExpr>,
    lookup: Lookup<'_>,
    depth: usize,
    merge: impl Fn(&[usize], &[usize]) -> Vec<usize>,
) -> Result<ResolvedSelection, EngineError> {
    let ra = resolve_inner(a, named, lookup, depth + 1)?;
    let rb = resolve_inner(b, named, lookup, depth + 1)?;
    if ra.node != rb.node {
        return Err(EngineError::SelectionNodesDiffer {
            a: ra.node,
            b: rb.node,
        });
    }
    if ra.dim != rb.dim {
        return Err(EngineError::DimensionMismatch {
            a: ra.dim,
            b: rb.dim,
        });
    }
    let mut indices = merge(&ra.indices, &rb.indices);
    indices.sort_unstable();
    indices.dedup();
    Ok(ResolvedSelection {
        node: ra.node,
        dim: ra.dim,
        indices,
    })
}
