use serde::{Deserialize, Serialize};

use crate::dims::EntityDim;

/// Name of a registered selection. Selections are addressed by name so that
/// they survive rebuilds; resolution happens against the current built model.
pub type SelectionId = String;

/// A declarative, rebuild-stable selection over the topology of a built model.
///
/// Expressions compose: `Difference` of an `Adjacent` over an `Explicit` list
/// is the usual "boundaries of these domains, minus the openings" pattern.
/// Every expression resolves to an order-stable, dimensionally consistent
/// index list, or fails with a structured topology error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SelectionExpr {
    /// Explicit 1-based entity indices on a named feature output.
    Explicit {
        node: String,
        dim: EntityDim,
        indices: Vec<usize>,
    },
    /// All entities of `dim` on a named feature output.
    All { node: String, dim: EntityDim },
    /// Entities of `dim` whose centroid lies inside the axis-aligned box.
    Box {
        node: String,
        dim: EntityDim,
        min: [f64; 3],
        max: [f64; 3],
    },
    /// One-ring adjacency expansion: entities of the next-lower dimension
    /// bounding the input selection.
    Adjacent { input: Box<SelectionExpr> },
    /// Set union of two selections of equal dimension.
    Union {
        a: Box<SelectionExpr>,
        b: Box<SelectionExpr>,
    },
    /// Set difference `a \ b` of two selections of equal dimension.
    Difference {
        a: Box<SelectionExpr>,
        b: Box<SelectionExpr>,
    },
    /// Set intersection of two selections of equal dimension.
    Intersection {
        a: Box<SelectionExpr>,
        b: Box<SelectionExpr>,
    },
    /// A previously registered selection, by name.
    Named { name: SelectionId },
}

impl SelectionExpr {
    pub fn explicit(node: &str, dim: EntityDim, indices: &[usize]) -> Self {
        SelectionExpr::Explicit {
            node: node.to_string(),
            dim,
            indices: indices.to_vec(),
        }
    }

    pub fn named(name: &str) -> Self {
        SelectionExpr::Named {
            name: name.to_string(),
        }
    }

    pub fn adjacent(self) -> Self {
        SelectionExpr::Adjacent {
            input: Box::new(self),
        }
    }

    pub fn difference(self, other: SelectionExpr) -> Self {
        SelectionExpr::Difference {
            a: Box::new(self),
            b: Box::new(other),
        }
    }

    pub fn union(self, other: SelectionExpr) -> Self {
        SelectionExpr::Union {
            a: Box::new(self),
            b: Box::new(other),
        }
    }

    pub fn intersection(self, other: SelectionExpr) -> Self {
        SelectionExpr::Intersection {
            a: Box::new(self),
            b: Box::new(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expressions_round_trip_through_json() {
        let expr = SelectionExpr::explicit("uni1", EntityDim::Domain, &[1, 2, 4])
            .adjacent()
            .difference(SelectionExpr::named("openings"));
        let json = serde_json::to_string(&expr).unwrap();
        let back: SelectionExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(expr, back);
    }
}
