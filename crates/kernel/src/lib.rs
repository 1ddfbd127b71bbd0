//! Polyhedral boundary-representation kernel.
//!
//! Solids are built from solved sketch profiles by the operations in
//! [`operations`] (extrude, revolve, sweep, fillet, chamfer), combined by the
//! booleans in [`boolean`], and measured by [`measure`]. Topology is
//! addressed through deterministic 1-based per-dimension indices that are
//! stable across rebuilds of an unchanged model; see [`topology`].

pub mod boolean;
pub mod geometry;
pub mod measure;
pub mod operations;
pub mod topology;

use serde::{Deserialize, Serialize};

/// Numeric tolerances used across the kernel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tolerance {
    /// Distance below which two points are the same point.
    pub coincidence: f64,
    /// Angle (radians) below which two directions are parallel.
    pub angular: f64,
    /// Arc sampling chord tolerance.
    pub chord: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            coincidence: 1e-7,
            angular: 1e-9,
            chord: 1e-4,
        }
    }
}
