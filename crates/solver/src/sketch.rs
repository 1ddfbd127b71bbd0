use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constraint::{Constraint, ConstraintId};
use crate::entity::{EntityId, EntityRef, SketchEntity, SubRef};

/// Errors from entity-store operations and reference validation.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum SketchError {
    #[error("stale entity handle (index {index}, generation {generation})")]
    StaleHandle { index: u32, generation: u32 },
    #[error("entity is not a point")]
    NotAPoint,
    #[error("sub-reference {sub:?} does not exist on the entity")]
    BadSubRef { sub: SubRef },
    #[error("reference does not resolve to a point")]
    NotAPointRef,
    #[error("reference does not resolve to an edge")]
    NotAnEdgeRef,
    #[error("reference does not resolve to a circle or arc")]
    NotACircleRef,
    #[error("constraint {id:?} was removed")]
    RemovedConstraint { id: ConstraintId },
    #[error("unsupported reference combination for {constraint}")]
    UnsupportedReference { constraint: &'static str },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot {
    entity: Option<SketchEntity>,
    construction: bool,
    generation: u32,
}

/// Options for the rectangle convenience constructor.
///
/// `lock_rotation` pins the rectangle axis-aligned by constraining its edges
/// horizontal/vertical; `lock_size` fixes width and height with distance
/// constraints between opposite edges. Unlocked degrees of freedom are left
/// for the solver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RectangleOptions {
    pub lock_rotation: bool,
    pub lock_size: bool,
}

impl Default for RectangleOptions {
    fn default() -> Self {
        Self {
            lock_rotation: true,
            lock_size: false,
        }
    }
}

/// The 2D entity store and constraint graph for one work plane.
///
/// Parameters live in a flat vector; entities hold offsets into it. Pinned
/// parameters (projections of already-solved external topology, fixed
/// boundary values) are excluded from the solve's unknowns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sketch {
    slots: Vec<Slot>,
    pub params: Vec<f64>,
    pub(crate) pinned: Vec<bool>,
    pub(crate) constraints: Vec<Option<Constraint>>,
}

impl Sketch {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_params(&mut self, values: &[f64], pinned: bool) -> usize {
        let at = self.params.len();
        self.params.extend_from_slice(values);
        self.pinned.extend(std::iter::repeat(pinned).take(values.len()));
        at
    }

    fn push_entity(&mut self, entity: SketchEntity) -> EntityId {
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            entity: Some(entity),
            construction: false,
            generation: 0,
        });
        EntityId {
            index,
            generation: 0,
        }
    }

    /// Resolve a handle, rejecting stale generations.
    pub fn entity(&self, id: EntityId) -> Result<&SketchEntity, SketchError> {
        let slot = self
            .slots
            .get(id.index as usize)
            .ok_or(SketchError::StaleHandle {
                index: id.index,
                generation: id.generation,
            })?;
        match &slot.entity {
            Some(e) if slot.generation == id.generation => Ok(e),
            _ => Err(SketchError::StaleHandle {
                index: id.index,
                generation: id.generation,
            }),
        }
    }

    pub fn is_construction(&self, id: EntityId) -> Result<bool, SketchError> {
        self.entity(id)?;
        Ok(self.slots[id.index as usize].construction)
    }

    /// Iterate live entities with their handles.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &SketchEntity, bool)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.entity.as_ref().map(|e| {
                (
                    EntityId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    e,
                    slot.construction,
                )
            })
        })
    }

    // ── Creation ─────────────────────────────────────────────────────────

    pub fn add_point(&mut self, x: f64, y: f64) -> EntityId {
        let param = self.push_params(&[x, y], false);
        self.push_entity(SketchEntity::Point { param })
    }

    /// Line between two existing point entities.
    pub fn add_line(&mut self, a: EntityId, b: EntityId) -> Result<EntityId, SketchError> {
        let start = match self.entity(a)? {
            SketchEntity::Point { param } => *param,
            _ => return Err(SketchError::NotAPoint),
        };
        let end = match self.entity(b)? {
            SketchEntity::Point { param } => *param,
            _ => return Err(SketchError::NotAPoint),
        };
        Ok(self.push_entity(SketchEntity::Line { start, end }))
    }

    /// Line with its own endpoints.
    pub fn add_line_segment(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> EntityId {
        let start = self.push_params(&[x0, y0], false);
        let end = self.push_params(&[x1, y1], false);
        self.push_entity(SketchEntity::Line { start, end })
    }

    pub fn add_circle(&mut self, cx: f64, cy: f64, radius: f64) -> EntityId {
        let center = self.push_params(&[cx, cy], false);
        let r = self.push_params(&[radius], false);
        self.push_entity(SketchEntity::Circle { center, radius: r })
    }

    /// Circular arc from `start_angle` to `end_angle` (radians, CCW).
    pub fn add_arc(
        &mut self,
        cx: f64,
        cy: f64,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    ) -> EntityId {
        let center = self.push_params(&[cx, cy], false);
        let r = self.push_params(&[radius], false);
        let a0 = self.push_params(&[start_angle], false);
        let a1 = self.push_params(&[end_angle], false);
        self.push_entity(SketchEntity::Arc {
            center,
            radius: r,
            start_angle: a0,
            end_angle: a1,
        })
    }

    /// Ordered vertex chain. Edge k joins vertex k to vertex k+1 (1-based),
    /// wrapping when closed.
    pub fn add_polygon(&mut self, points: &[(f64, f64)], closed: bool) -> EntityId {
        let vertices = points
            .iter()
            .map(|&(x, y)| self.push_params(&[x, y], false))
            .collect();
        self.push_entity(SketchEntity::Polygon { vertices, closed })
    }

    /// Axis-aligned rectangle at `(x, y)` (lower-left corner). Edges are
    /// numbered 1 = left, 2 = bottom, 3 = right, 4 = top.
    pub fn add_rectangle(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        options: RectangleOptions,
    ) -> EntityId {
        // Vertex order chosen so edge numbering comes out left/bottom/right/top.
        let id = self.add_polygon(
            &[(x, y + height), (x, y), (x + width, y), (x + width, y + height)],
            true,
        );
        if options.lock_rotation {
            let _ = self.add_constraint(Constraint::vertical(EntityRef::edge(id, 1)));
            let _ = self.add_constraint(Constraint::horizontal(EntityRef::edge(id, 2)));
            let _ = self.add_constraint(Constraint::vertical(EntityRef::edge(id, 3)));
            let _ = self.add_constraint(Constraint::horizontal(EntityRef::edge(id, 4)));
        }
        if options.lock_size {
            let _ = self.add_constraint(Constraint::distance(
                EntityRef::edge(id, 1),
                EntityRef::edge(id, 3),
                width,
            ));
            let _ = self.add_constraint(Constraint::distance(
                EntityRef::edge(id, 2),
                EntityRef::edge(id, 4),
                height,
            ));
        }
        id
    }

    /// Projected point from already-solved external topology. Pinned: enters
    /// constraints as a boundary value, never as an unknown.
    pub fn add_projection_point(&mut self, x: f64, y: f64) -> EntityId {
        let param = self.push_params(&[x, y], true);
        let id = self.push_entity(SketchEntity::Point { param });
        self.slots[id.index as usize].construction = true;
        id
    }

    /// Projected polygon outline from external topology (pinned, construction).
    pub fn add_projection_polygon(&mut self, points: &[(f64, f64)], closed: bool) -> EntityId {
        let vertices = points
            .iter()
            .map(|&(x, y)| self.push_params(&[x, y], true))
            .collect();
        let id = self.push_entity(SketchEntity::Polygon { vertices, closed });
        self.slots[id.index as usize].construction = true;
        id
    }

    // ── Mutation ─────────────────────────────────────────────────────────

    pub fn mark_construction(&mut self, id: EntityId) -> Result<(), SketchError> {
        self.entity(id)?;
        self.slots[id.index as usize].construction = true;
        Ok(())
    }

    /// Move a point entity. Last write wins.
    pub fn set_point(&mut self, id: EntityId, x: f64, y: f64) -> Result<(), SketchError> {
        let param = match self.entity(id)? {
            SketchEntity::Point { param } => *param,
            _ => return Err(SketchError::NotAPoint),
        };
        self.params[param] = x;
        self.params[param + 1] = y;
        Ok(())
    }

    /// Remove an entity, invalidating its handle and any references to it.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), SketchError> {
        self.entity(id)?;
        let slot = &mut self.slots[id.index as usize];
        slot.entity = None;
        slot.generation += 1;
        Ok(())
    }

    // ── Constraints ──────────────────────────────────────────────────────

    /// Add a constraint after validating its references. Returns a handle
    /// usable with [`Sketch::set_constraint`] for last-write-wins edits.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintId, SketchError> {
        constraint.validate(self)?;
        let id = ConstraintId(self.constraints.len() as u32);
        self.constraints.push(Some(constraint));
        Ok(id)
    }

    /// Replace an existing constraint. Last write wins per handle.
    pub fn set_constraint(
        &mut self,
        id: ConstraintId,
        constraint: Constraint,
    ) -> Result<(), SketchError> {
        constraint.validate(self)?;
        match self.constraints.get_mut(id.0 as usize) {
            Some(slot @ Some(_)) => {
                *slot = Some(constraint);
                Ok(())
            }
            _ => Err(SketchError::RemovedConstraint { id }),
        }
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<(), SketchError> {
        match self.constraints.get_mut(id.0 as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => Err(SketchError::RemovedConstraint { id }),
        }
    }

    pub fn constraint(&self, id: ConstraintId) -> Result<&Constraint, SketchError> {
        self.constraints
            .get(id.0 as usize)
            .and_then(|c| c.as_ref())
            .ok_or(SketchError::RemovedConstraint { id })
    }

    /// Live constraints with their handles.
    pub fn live_constraints(&self) -> impl Iterator<Item = (ConstraintId, &Constraint)> {
        self.constraints
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (ConstraintId(i as u32), c)))
    }

    // ── Geometric evaluation ─────────────────────────────────────────────
    // Used by constraint residuals and profile extraction. All evaluation
    // goes through an explicit parameter slice so the solver can probe
    // candidate parameter vectors without mutating the sketch.

    pub(crate) fn point_at(&self, param: usize, params: &[f64]) -> [f64; 2] {
        [params[param], params[param + 1]]
    }

    fn arc_endpoint(
        &self,
        center: usize,
        radius: usize,
        angle: usize,
        params: &[f64],
    ) -> [f64; 2] {
        let c = self.point_at(center, params);
        let r = params[radius];
        let a = params[angle];
        [c[0] + r * a.cos(), c[1] + r * a.sin()]
    }

    /// Resolve a reference to a point position, if it names one.
    pub fn sub_point(&self, r: &EntityRef, params: &[f64]) -> Result<[f64; 2], SketchError> {
        let entity = self.entity(r.entity)?;
        match (entity, r.sub) {
            (SketchEntity::Point { param }, SubRef::Whole | SubRef::Vertex(1)) => {
                Ok(self.point_at(*param, params))
            }
            (SketchEntity::Line { start, .. }, SubRef::Vertex(1)) => {
                Ok(self.point_at(*start, params))
            }
            (SketchEntity::Line { end, .. }, SubRef::Vertex(2)) => Ok(self.point_at(*end, params)),
            (SketchEntity::Circle { center, .. }, SubRef::Center) => {
                Ok(self.point_at(*center, params))
            }
            (SketchEntity::Arc { center, .. }, SubRef::Center) => {
                Ok(self.point_at(*center, params))
            }
            (
                SketchEntity::Arc {
                    center,
                    radius,
                    start_angle,
                    ..
                },
                SubRef::Vertex(1),
            ) => Ok(self.arc_endpoint(*center, *radius, *start_angle, params)),
            (
                SketchEntity::Arc {
                    center,
                    radius,
                    end_angle,
                    ..
                },
                SubRef::Vertex(2),
            ) => Ok(self.arc_endpoint(*center, *radius, *end_angle, params)),
            (SketchEntity::Polygon { vertices, .. }, SubRef::Vertex(k))
                if k >= 1 && k <= vertices.len() =>
            {
                Ok(self.point_at(vertices[k - 1], params))
            }
            _ => Err(SketchError::NotAPointRef),
        }
    }

    /// Resolve a reference to a straight edge's endpoints, if it names one.
    pub fn sub_edge(
        &self,
        r: &EntityRef,
        params: &[f64],
    ) -> Result<([f64; 2], [f64; 2]), SketchError> {
        let entity = self.entity(r.entity)?;
        match (entity, r.sub) {
            (SketchEntity::Line { start, end }, SubRef::Whole | SubRef::Edge(1)) => {
                Ok((self.point_at(*start, params), self.point_at(*end, params)))
            }
            (SketchEntity::Polygon { vertices, closed }, SubRef::Edge(k)) => {
                let n = vertices.len();
                let edges = if *closed { n } else { n.saturating_sub(1) };
                if k >= 1 && k <= edges {
                    let a = vertices[k - 1];
                    let b = vertices[k % n];
                    Ok((self.point_at(a, params), self.point_at(b, params)))
                } else {
                    Err(SketchError::BadSubRef { sub: r.sub })
                }
            }
            _ => Err(SketchError::NotAnEdgeRef),
        }
    }

    /// Resolve a reference to a circle-like (center param, radius param).
    pub fn sub_circle(&self, r: &EntityRef) -> Result<(usize, usize), SketchError> {
        match (self.entity(r.entity)?, r.sub) {
            (SketchEntity::Circle { center, radius }, SubRef::Whole | SubRef::Edge(1)) => {
                Ok((*center, *radius))
            }
            (SketchEntity::Arc { center, radius, .. }, SubRef::Whole | SubRef::Edge(1)) => {
                Ok((*center, *radius))
            }
            _ => Err(SketchError::NotACircleRef),
        }
    }

    /// A representative point for distance measures and help-point scoring:
    /// vertices and centers resolve exactly, edges to their midpoint, whole
    /// entities to a natural center.
    pub fn rep_point(&self, r: &EntityRef, params: &[f64]) -> Result<[f64; 2], SketchError> {
        if let Ok(p) = self.sub_point(r, params) {
            return Ok(p);
        }
        if let Ok((a, b)) = self.sub_edge(r, params) {
            return Ok([(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5]);
        }
        if let Ok((center, _)) = self.sub_circle(r) {
            return Ok(self.point_at(center, params));
        }
        if let SketchEntity::Polygon { vertices, .. } = self.entity(r.entity)? {
            let n = vertices.len().max(1) as f64;
            let mut cx = 0.0;
            let mut cy = 0.0;
            for &v in vertices {
                cx += params[v];
                cy += params[v + 1];
            }
            return Ok([cx / n, cy / n]);
        }
        Err(SketchError::BadSubRef { sub: r.sub })
    }

    /// Parameter indices a reference can move (excluding pinned ones).
    /// Used for connected-component analysis and help-point seeding.
    pub(crate) fn free_params_of(&self, r: &EntityRef) -> Vec<usize> {
        let mut out = Vec::new();
        let Ok(entity) = self.entity(r.entity) else {
            return out;
        };
        let mut push = |range: std::ops::Range<usize>, pinned: &[bool]| {
            for i in range {
                if !pinned[i] {
                    out.push(i);
                }
            }
        };
        match entity {
            SketchEntity::Point { param } => push(*param..*param + 2, &self.pinned),
            SketchEntity::Line { start, end } => {
                push(*start..*start + 2, &self.pinned);
                push(*end..*end + 2, &self.pinned);
            }
            SketchEntity::Circle { center, radius } => {
                push(*center..*center + 2, &self.pinned);
                push(*radius..*radius + 1, &self.pinned);
            }
            SketchEntity::Arc {
                center,
                radius,
                start_angle,
                end_angle,
            } => {
                push(*center..*center + 2, &self.pinned);
                push(*radius..*radius + 1, &self.pinned);
                push(*start_angle..*start_angle + 1, &self.pinned);
                push(*end_angle..*end_angle + 1, &self.pinned);
            }
            SketchEntity::Polygon { vertices, .. } => match r.sub {
                SubRef::Vertex(k) if k >= 1 && k <= vertices.len() => {
                    push(vertices[k - 1]..vertices[k - 1] + 2, &self.pinned)
                }
                SubRef::Edge(k) => {
                    let n = vertices.len();
                    if k >= 1 && k <= n {
                        push(vertices[k - 1]..vertices[k - 1] + 2, &self.pinned);
                        push(vertices[k % n]..vertices[k % n] + 2, &self.pinned);
                    }
                }
                _ => {
                    for &v in vertices {
                        push(v..v + 2, &self.pinned);
                    }
                }
            },
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_handle_is_rejected() {
        let mut sketch = Sketch::new();
        let p = sketch.add_point(1.0, 2.0);
        sketch.remove_entity(p).unwrap();
        assert!(matches!(
            sketch.entity(p),
            Err(SketchError::StaleHandle { .. })
        ));
        assert!(sketch.set_point(p, 0.0, 0.0).is_err());
    }

    #[test]
    fn rectangle_edge_numbering() {
        let mut sketch = Sketch::new();
        let r = sketch.add_rectangle(1.0, 2.0, 3.0, 4.0, RectangleOptions::default());
        let params = sketch.params.clone();
        // Edge 1 = left: both endpoints at x = 1.
        let (a, b) = sketch.sub_edge(&EntityRef::edge(r, 1), &params).unwrap();
        assert_eq!(a[0], 1.0);
        assert_eq!(b[0], 1.0);
        // Edge 3 = right: both endpoints at x = 4.
        let (a, b) = sketch.sub_edge(&EntityRef::edge(r, 3), &params).unwrap();
        assert_eq!(a[0], 4.0);
        assert_eq!(b[0], 4.0);
        // Edge 2 = bottom at y = 2, edge 4 = top at y = 6.
        let (a, _) = sketch.sub_edge(&EntityRef::edge(r, 2), &params).unwrap();
        assert_eq!(a[1], 2.0);
        let (a, _) = sketch.sub_edge(&EntityRef::edge(r, 4), &params).unwrap();
        assert_eq!(a[1], 6.0);
    }

    #[test]
    fn projection_points_are_pinned_construction() {
        let mut sketch = Sketch::new();
        let p = sketch.add_projection_point(5.0, 6.0);
        assert!(sketch.is_construction(p).unwrap());
        let free = sketch.free_params_of(&EntityRef::whole(p));
        assert!(free.is_empty());
    }

    #[test]
    fn arc_endpoints_derive_from_angles() {
        let mut sketch = Sketch::new();
        let a = sketch.add_arc(0.0, 0.0, 2.0, 0.0, std::f64::consts::FRAC_PI_2);
        let params = sketch.params.clone();
        let start = sketch.sub_point(&EntityRef::vertex(a, 1), &params).unwrap();
        let end = sketch.sub_point(&EntityRef::vertex(a, 2), &params).unwrap();
        assert!((start[0] - 2.0).abs() < 1e-12);
        assert!((end[1] - 2.0).abs() < 1e-12);
    }
}
