//! Levenberg-Marquardt solve over a sketch's free parameters.
//!
//! Pinned parameters (projections, fixed boundary values) are excluded from
//! the unknowns. The constraint graph is split into connected components and
//! each component is solved independently, so a divergence in one island does
//! not perturb the rest of the sketch. Rank analysis of the Jacobian at the
//! solution reports under- and over-determined systems as structured
//! warnings.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use crate::constraint::{Constraint, ConstraintId};
use crate::sketch::{Sketch, SketchError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub lambda_initial: f64,
    pub lambda_factor: f64,
    /// Finite-difference step for the Jacobian.
    pub fd_step: f64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
            lambda_initial: 1e-3,
            lambda_factor: 10.0,
            fd_step: 1e-7,
        }
    }
}

/// Non-fatal findings about the constraint system's structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SolveWarning {
    /// The system has remaining degrees of freedom.
    UnderDetermined {
        dof: usize,
        free_params: Vec<usize>,
    },
    /// Constraints that add no new information at the solution.
    OverDetermined { redundant: Vec<ConstraintId> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub iterations: usize,
    pub final_residual: f64,
    pub warnings: Vec<SolveWarning>,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(bound(deserialize = "'de: 'static"))]
pub enum SolveError {
    #[error("did not converge after {iterations} iterations (residual {residual:.3e})")]
    DidNotConverge { iterations: usize, residual: f64 },
    #[error("constraints are mutually inconsistent (residual {residual:.3e})")]
    Inconsistent { residual: f64 },
    #[error(transparent)]
    Sketch(#[from] SketchError),
}

struct Component {
    constraints: Vec<(ConstraintId, Constraint)>,
    /// Global parameter indices this component may move.
    unknowns: Vec<usize>,
}

/// Solve the sketch in place. On success the sketch parameters hold the
/// converged configuration; on failure they are left untouched.
pub fn solve(sketch: &mut Sketch, config: &SolveConfig) -> Result<SolveReport, SolveError> {
    let live: Vec<(ConstraintId, Constraint)> = sketch
        .live_constraints()
        .map(|(id, c)| (id, c.clone()))
        .collect();
    if live.is_empty() {
        return Ok(SolveReport {
            iterations: 0,
            final_residual: 0.0,
            warnings: Vec::new(),
        });
    }

    let components = partition(sketch, &live);
    debug!(
        constraints = live.len(),
        components = components.len(),
        "starting sketch solve"
    );

    let mut params = sketch.params.clone();
    let mut report = SolveReport {
        iterations: 0,
        final_residual: 0.0,
        warnings: Vec::new(),
    };

    for component in &components {
        if component.unknowns.is_empty() {
            // Fully pinned: nothing to move, but the equations must hold.
            let r = residual_vec(sketch, &component.constraints, &params)?;
            let norm = r.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > config.tolerance.sqrt() {
                return Err(SolveError::Inconsistent { residual: norm });
            }
            continue;
        }
        let outcome = solve_component(sketch, component, &mut params, config)?;
        report.iterations = report.iterations.max(outcome.iterations);
        report.final_residual = report.final_residual.max(outcome.final_residual);
        report.warnings.extend(outcome.warnings);
    }

    sketch.params = params;
    Ok(report)
}

fn partition(sketch: &Sketch, live: &[(ConstraintId, Constraint)]) -> Vec<Component> {
    // Union-find over free parameter indices; a constraint joins every free
    // parameter it touches.
    let n = sketch.params.len();
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut Vec<usize>, mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    let constraint_params: Vec<Vec<usize>> = live
        .iter()
        .map(|(_, c)| {
            let mut ps = Vec::new();
            for r in c.refs() {
                ps.extend(sketch.free_params_of(&r));
            }
            ps.sort_unstable();
            ps.dedup();
            ps
        })
        .collect();
    for ps in &constraint_params {
        if let Some(&first) = ps.first() {
            let root = find(&mut parent, first);
            for &p in &ps[1..] {
                let r = find(&mut parent, p);
                parent[r] = root;
            }
        }
    }

    let mut components: Vec<Component> = Vec::new();
    let mut root_index: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
    for (i, (id, c)) in live.iter().enumerate() {
        let ps = &constraint_params[i];
        let key = ps.first().map(|&p| find(&mut parent, p));
        let slot = match key {
            // Constraints with no free parameters each form their own
            // check-only component.
            None => {
                components.push(Component {
                    constraints: vec![(*id, c.clone())],
                    unknowns: Vec::new(),
                });
                continue;
            }
            Some(root) => *root_index.entry(root).or_insert_with(|| {
                components.push(Component {
                    constraints: Vec::new(),
                    unknowns: Vec::new(),
                });
                components.len() - 1
            }),
        };
        components[slot].constraints.push((*id, c.clone()));
        components[slot].unknowns.extend(ps.iter().copied());
    }
    for component in &mut components {
        component.unknowns.sort_unstable();
        component.unknowns.dedup();
    }
    components
}

fn residual_vec(
    sketch: &Sketch,
    constraints: &[(ConstraintId, Constraint)],
    params: &[f64],
) -> Result<Vec<f64>, SketchError> {
    let mut out = Vec::new();
    for (_, c) in constraints {
        c.residuals(sketch, params, &mut out)?;
    }
    Ok(out)
}

fn build_jacobian(
    sketch: &Sketch,
    component: &Component,
    params: &[f64],
    base: &[f64],
    config: &SolveConfig,
) -> Result<DMatrix<f64>, SketchError> {
    let m = base.len();
    let n = component.unknowns.len();
    let mut jac = DMatrix::zeros(m, n);
    let mut probe = params.to_vec();
    for (j, &g) in component.unknowns.iter().enumerate() {
        let h = config.fd_step * (1.0 + params[g].abs());
        probe[g] = params[g] + h;
        let perturbed = residual_vec(sketch, &component.constraints, &probe)?;
        probe[g] = params[g];
        for i in 0..m {
            jac[(i, j)] = (perturbed[i] - base[i]) / h;
        }
    }
    Ok(jac)
}

fn matrix_rank(jac: &DMatrix<f64>) -> usize {
    let svd = jac.clone().svd(false, false);
    let max_sv = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    if max_sv == 0.0 {
        return 0;
    }
    let threshold = max_sv * (jac.nrows().max(jac.ncols()) as f64) * f64::EPSILON;
    svd.singular_values.iter().filter(|&&s| s > threshold).count()
}

/// Run LM from one seed. Returns the final parameters and residual norm.
fn lm_from_seed(
    sketch: &Sketch,
    component: &Component,
    seed: &[f64],
    config: &SolveConfig,
) -> Result<(Vec<f64>, f64, usize), SketchError> {
    let mut params = seed.to_vec();
    let mut lambda = config.lambda_initial;
    let mut residual = residual_vec(sketch, &component.constraints, &params)?;
    let mut norm_sq: f64 = residual.iter().map(|v| v * v).sum();
    let n = component.unknowns.len();

    for iteration in 0..config.max_iterations {
        if norm_sq < config.tolerance {
            return Ok((params, norm_sq.sqrt(), iteration));
        }
        let jac = build_jacobian(sketch, component, &params, &residual, config)?;
        let r = DVector::from_column_slice(&residual);
        let jt = jac.transpose();
        let jtj = &jt * &jac;
        let jtr = &jt * &r;

        let mut stepped = false;
        for _ in 0..8 {
            let mut damped = jtj.clone();
            for i in 0..n {
                damped[(i, i)] += lambda * (1.0 + jtj[(i, i)].abs());
            }
            let Some(dx) = damped.lu().solve(&(-&jtr)) else {
                lambda *= config.lambda_factor;
                continue;
            };
            let mut candidate = params.clone();
            for (j, &g) in component.unknowns.iter().enumerate() {
                candidate[g] += dx[j];
            }
            let cand_res = residual_vec(sketch, &component.constraints, &candidate)?;
            let cand_norm: f64 = cand_res.iter().map(|v| v * v).sum();
            if cand_norm < norm_sq {
                params = candidate;
                residual = cand_res;
                norm_sq = cand_norm;
                lambda = (lambda / config.lambda_factor).max(1e-12);
                stepped = true;
                break;
            }
            lambda *= config.lambda_factor;
        }
        trace!(iteration, residual = norm_sq.sqrt(), lambda, "lm step");
        if !stepped {
            // Damping exhausted; report where we stalled.
            return Ok((params, norm_sq.sqrt(), iteration + 1));
        }
    }
    Ok((params, norm_sq.sqrt(), config.max_iterations))
}

/// Seed variant that moves point references toward their help points, so the
/// iteration starts in the intended solution branch.
fn help_seed(sketch: &Sketch, component: &Component, params: &[f64]) -> Option<Vec<f64>> {
    let mut seed = params.to_vec();
    let mut changed = false;
    for (_, c) in &component.constraints {
        if c.help_points.is_empty() {
            continue;
        }
        for (r, hp) in c.refs().iter().zip(c.help_points.iter()) {
            let free = sketch.free_params_of(r);
            if free.len() == 2 && free[1] == free[0] + 1 {
                if let Ok(p) = sketch.sub_point(r, &seed) {
                    seed[free[0]] += hp[0] - p[0];
                    seed[free[1]] += hp[1] - p[1];
                    changed = true;
                }
            }
        }
    }
    changed.then_some(seed)
}

/// Distance score of a candidate solution to the component's help points.
fn help_score(sketch: &Sketch, component: &Component, params: &[f64]) -> f64 {
    let mut score = 0.0;
    for (_, c) in &component.constraints {
        for (r, hp) in c.refs().iter().zip(c.help_points.iter()) {
            if let Ok(p) = sketch.rep_point(r, params) {
                score += (p[0] - hp[0]).powi(2) + (p[1] - hp[1]).powi(2);
            }
        }
    }
    score
}

fn solve_component(
    sketch: &Sketch,
    component: &Component,
    params: &mut Vec<f64>,
    config: &SolveConfig,
) -> Result<SolveReport, SolveError> {
    let mut candidates = vec![lm_from_seed(sketch, component, params, config)?];
    if let Some(seed) = help_seed(sketch, component, params) {
        candidates.push(lm_from_seed(sketch, component, &seed, config)?);
    }

    let tol = config.tolerance.sqrt();
    let converged: Vec<&(Vec<f64>, f64, usize)> =
        candidates.iter().filter(|(_, res, _)| *res <= tol).collect();
    let best = if converged.is_empty() {
        let (_, residual, iterations) = candidates
            .iter()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .expect("at least one candidate");
        return Err(SolveError::DidNotConverge {
            iterations: *iterations,
            residual: *residual,
        });
    } else {
        // Among converged branches, prefer the one nearest the help points.
        converged
            .iter()
            .min_by(|a, b| {
                help_score(sketch, component, &a.0).total_cmp(&help_score(sketch, component, &b.0))
            })
            .expect("non-empty")
    };

    let (solution, final_residual, iterations) = (*best).clone();
    *params = solution;

    // Rank analysis at the solution.
    let mut warnings = Vec::new();
    let base = residual_vec(sketch, &component.constraints, params)?;
    let jac = build_jacobian(sketch, component, params, &base, config)?;
    let rank = matrix_rank(&jac);
    let n = component.unknowns.len();
    let m = jac.nrows();
    if rank < n {
        warnings.push(SolveWarning::UnderDetermined {
            dof: n - rank,
            free_params: component.unknowns.clone(),
        });
    }
    if rank < m {
        let redundant = find_redundant(component, &jac, rank, sketch);
        if !redundant.is_empty() {
            warnings.push(SolveWarning::OverDetermined { redundant });
        }
    }
    debug!(
        unknowns = n,
        equations = m,
        rank,
        iterations,
        residual = final_residual,
        "component solved"
    );

    Ok(SolveReport {
        iterations,
        final_residual,
        warnings,
    })
}

/// Constraints whose rows can be dropped without lowering the Jacobian rank.
fn find_redundant(
    component: &Component,
    jac: &DMatrix<f64>,
    full_rank: usize,
    sketch: &Sketch,
) -> Vec<ConstraintId> {
    let mut redundant = Vec::new();
    let mut row = 0;
    for (id, c) in &component.constraints {
        let eqs = c.eq_count(sketch);
        let kept: Vec<usize> = (0..jac.nrows())
            .filter(|&r| r < row || r >= row + eqs)
            .collect();
        if !kept.is_empty() {
            let sub = jac.select_rows(kept.iter());
            if matrix_rank(&sub) == full_rank {
                redundant.push(*id);
            }
        }
        row += eqs;
    }
    redundant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Constraint;
    use crate::entity::EntityRef;
    use crate::sketch::{RectangleOptions, Sketch};
    use approx::assert_relative_eq;

    #[test]
    fn distance_and_axis_constraints_converge() {
        let mut sketch = Sketch::new();
        let origin = sketch.add_point(0.0, 0.0);
        let p = sketch.add_point(1.0, 1.0);
        sketch
            .add_constraint(Constraint::fixed(EntityRef::whole(origin), 0.0, 0.0))
            .unwrap();
        sketch
            .add_constraint(Constraint::distance(
                EntityRef::whole(origin),
                EntityRef::whole(p),
                5.0,
            ))
            .unwrap();
        sketch
            .add_constraint(Constraint::x_distance(
                EntityRef::whole(origin),
                EntityRef::whole(p),
                3.0,
            ))
            .unwrap();
        let report = solve(&mut sketch, &SolveConfig::default()).unwrap();
        assert!(report.final_residual < 1e-5);
        let xy = sketch
            .sub_point(&EntityRef::whole(p), &sketch.params)
            .unwrap();
        assert_relative_eq!(xy[0], 3.0, epsilon = 1e-5);
        assert_relative_eq!(xy[1].abs(), 4.0, epsilon = 1e-5);
        // Started above the axis, so the positive branch wins.
        assert!(xy[1] > 0.0);
    }

    #[test]
    fn help_points_select_the_lower_branch() {
        let mut sketch = Sketch::new();
        let origin = sketch.add_point(0.0, 0.0);
        let p = sketch.add_point(1.0, 1.0);
        sketch
            .add_constraint(Constraint::fixed(EntityRef::whole(origin), 0.0, 0.0))
            .unwrap();
        sketch
            .add_constraint(
                Constraint::distance(EntityRef::whole(origin), EntityRef::whole(p), 5.0)
                    .with_help_points(&[[0.0, 0.0], [3.0, -4.0]]),
            )
            .unwrap();
        sketch
            .add_constraint(Constraint::x_distance(
                EntityRef::whole(origin),
                EntityRef::whole(p),
                3.0,
            ))
            .unwrap();
        solve(&mut sketch, &SolveConfig::default()).unwrap();
        let xy = sketch
            .sub_point(&EntityRef::whole(p), &sketch.params)
            .unwrap();
        assert_relative_eq!(xy[1], -4.0, epsilon = 1e-5);
    }

    #[test]
    fn under_determined_sketch_is_reported_not_failed() {
        let mut sketch = Sketch::new();
        // Axis locks only: position and size stay free.
        sketch.add_rectangle(0.0, 0.0, 2.0, 1.0, RectangleOptions::default());
        let report = solve(&mut sketch, &SolveConfig::default()).unwrap();
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, SolveWarning::UnderDetermined { dof, .. } if *dof > 0)));
    }

    #[test]
    fn duplicate_constraint_is_flagged_redundant() {
        let mut sketch = Sketch::new();
        let line = sketch.add_line_segment(0.0, 0.0, 4.0, 0.5);
        sketch
            .add_constraint(Constraint::fixed(EntityRef::vertex(line, 1), 0.0, 0.0))
            .unwrap();
        sketch
            .add_constraint(Constraint::horizontal(EntityRef::whole(line)))
            .unwrap();
        let dup = sketch
            .add_constraint(Constraint::horizontal(EntityRef::whole(line)))
            .unwrap();
        let report = solve(&mut sketch, &SolveConfig::default()).unwrap();
        let flagged = report.warnings.iter().any(|w| {
            matches!(w, SolveWarning::OverDetermined { redundant } if redundant.contains(&dup))
        });
        assert!(flagged);
    }

    #[test]
    fn inconsistent_fixed_system_errors() {
        let mut sketch = Sketch::new();
        let a = sketch.add_projection_point(0.0, 0.0);
        let b = sketch.add_projection_point(1.0, 0.0);
        sketch
            .add_constraint(Constraint::distance(
                EntityRef::whole(a),
                EntityRef::whole(b),
                5.0,
            ))
            .unwrap();
        let err = solve(&mut sketch, &SolveConfig::default()).unwrap_err();
        assert!(matches!(err, SolveError::Inconsistent { .. }));
    }

    #[test]
    fn tangent_line_snaps_onto_circle() {
        let mut sketch = Sketch::new();
        let circle = sketch.add_circle(0.0, 0.0, 1.0);
        let line = sketch.add_line_segment(-3.0, 1.3, 3.0, 1.3);
        sketch
            .add_constraint(Constraint::fixed(EntityRef::center(circle), 0.0, 0.0))
            .unwrap();
        sketch
            .add_constraint(Constraint::radius(EntityRef::whole(circle), 1.0))
            .unwrap();
        sketch
            .add_constraint(Constraint::horizontal(EntityRef::whole(line)))
            .unwrap();
        sketch
            .add_constraint(Constraint::tangent(
                EntityRef::whole(line),
                EntityRef::whole(circle),
            ))
            .unwrap();
        solve(&mut sketch, &SolveConfig::default()).unwrap();
        let a = sketch
            .sub_point(&EntityRef::vertex(line, 1), &sketch.params)
            .unwrap();
        let b = sketch
            .sub_point(&EntityRef::vertex(line, 2), &sketch.params)
            .unwrap();
        // Starting above the circle, the line settles on the upper tangent.
        assert_relative_eq!(a[1], 1.0, epsilon = 1e-5);
        assert_relative_eq!(b[1], 1.0, epsilon = 1e-5);
    }
}
