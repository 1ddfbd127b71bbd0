//! 2D sketch entities, geometric constraints, and the numerical solver.
//!
//! A [`Sketch`] is the entity store for one work plane: points, lines, arcs,
//! circles, and polygons addressed by generational handles, plus the
//! constraint graph over their sub-elements. [`solve`] drives a
//! Levenberg-Marquardt iteration over the free parameters and diagnoses
//! under- and over-determined systems instead of silently picking a solution.

pub mod constraint;
pub mod entity;
pub mod profile;
pub mod sketch;
pub mod solve;

pub use constraint::{Constraint, ConstraintId, ConstraintKind};
pub use entity::{EntityId, EntityRef, SketchEntity, SubRef};
pub use profile::{
    extract_path, extract_profiles, fillet_polygon, Profile, ProfileError, ProfileSegment,
    SweepPath,
};
pub use sketch::{RectangleOptions, Sketch, SketchError};
pub use solve::{solve, SolveConfig, SolveError, SolveReport, SolveWarning};
