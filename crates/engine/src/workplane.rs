//! Work-plane definitions.
//!
//! Quick planes are the three global planes with an offset along their
//! normal. Face-parallel planes track a face of an earlier body, optionally
//! shifted to pass through one of its vertices, so they follow rebuilds of
//! the upstream geometry.

use serde::{Deserialize, Serialize};

use lathe_kernel::geometry::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasePlane {
    Xy,
    Yz,
    Zx,
}

// Tagged distinctly from `Operation`, which wraps this enum in the same map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "plane_type")]
pub enum WorkPlaneDef {
    Quick { base: BasePlane, offset: f64 },
    /// Parallel to face `face` (1-based) of `node`. When `offset_vertex` is
    /// set the plane is shifted along the normal to pass through that vertex
    /// of the same body; otherwise `offset` is applied directly.
    FaceParallel {
        node: String,
        face: usize,
        #[serde(default)]
        offset: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset_vertex: Option<usize>,
    },
}

impl WorkPlaneDef {
    pub fn quick(base: BasePlane, offset: f64) -> Self {
        WorkPlaneDef::Quick { base, offset }
    }

    pub fn inputs(&self) -> Vec<&str> {
        match self {
            WorkPlaneDef::Quick { .. } => Vec::new(),
            WorkPlaneDef::FaceParallel { node, .. } => vec![node],
        }
    }
}

pub(crate) fn quick_frame(base: BasePlane, offset: f64) -> Frame {
    match base {
        BasePlane::Xy => Frame::xy(offset),
        BasePlane::Yz => Frame::yz(offset),
        BasePlane::Zx => Frame::zx(offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_planes_have_the_expected_normals() {
        let f = quick_frame(BasePlane::Yz, 2.0);
        assert_eq!(f.origin.x, 2.0);
        assert_eq!(f.normal.x, 1.0);
        let f = quick_frame(BasePlane::Zx, -1.0);
        assert_eq!(f.origin.y, -1.0);
        assert_eq!(f.normal.y, 1.0);
    }

    #[test]
    fn defs_round_trip_through_json() {
        let def = WorkPlaneDef::FaceParallel {
            node: "ext1".into(),
            face: 4,
            offset: 0.0,
            offset_vertex: Some(2),
        };
        let json = serde_json::to_string(&def).unwrap();
        let back: WorkPlaneDef = serde_json::from_str(&json).unwrap();
        assert_eq!(def, back);
    }
}
