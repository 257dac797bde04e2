//! Single- and multi-anchor placement.

use std::fmt;
use std::sync::atomic::AtomicBool;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use tourlay_occlusion::OcclusionAnalyzer;
use tourlay_scene::{Aabb, AnchorType, SceneGeometry};

use crate::constraints::{ConstraintOverrides, PlacementConstraints};
use crate::cost::{PlacementCost, spacing_penalty};
use crate::optimizer::{MinimizeOptions, MinimizeResult, OptimizeError, minimize_bounded};

/// Half-width of the search box around the desired position.
pub const SEARCH_RADIUS: f64 = 10.0;
pub const SINGLE_MAX_ITERATIONS: usize = 100;
pub const MULTI_MAX_ITERATIONS: usize = 200;

/// How a solve ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementOutcome {
    /// The simplex collapsed onto an improved point.
    Converged,
    /// The iteration cap was hit; the best point seen is kept.
    IterationLimit,
    /// No candidate beat the starting layout, which is kept.
    NoImprovement,
    /// The optimizer failed; the starting layout is kept with worst-case scores.
    Degraded { reason: String },
    /// Cancelled before finishing; the starting layout is kept.
    TimedOut,
}

impl PlacementOutcome {
    /// True for outcomes where the optimizer did not run to completion.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Degraded { .. } | Self::TimedOut)
    }
}

impl fmt::Display for PlacementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => f.write_str("converged"),
            Self::IterationLimit => f.write_str("iteration_limit"),
            Self::NoImprovement => f.write_str("no_improvement"),
            Self::Degraded { reason } => write!(f, "degraded: {reason}"),
            Self::TimedOut => f.write_str("timed_out"),
        }
    }
}

/// Result of [`PlacementSolver::solve_single`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Always inside the scene bounds.
    pub position: DVec3,
    /// Occlusion at `position`, in `[0, 1]`.
    pub occlusion_score: f64,
    pub outcome: PlacementOutcome,
    pub iterations: usize,
}

/// One anchor taking part in a joint solve.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutAnchor {
    pub anchor_type: AnchorType,
    /// Current position; the solve starts here.
    pub position: DVec3,
    /// The position the anchor was originally requested at; the cost pulls
    /// toward it.
    pub original_position: DVec3,
}

/// Why an anchor kept its prior position in a joint solve.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutIssue {
    /// The anchor's current or original position was not finite.
    InvalidInput,
    /// The solve produced a coordinate outside the scene or not finite.
    UnusableResult,
}

/// Result of [`PlacementSolver::solve_multi`].
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutSolution {
    /// One position per input anchor, in input order.
    pub positions: Vec<DVec3>,
    pub outcome: PlacementOutcome,
    /// Anchors that kept their prior position, by input index.
    pub issues: Vec<(usize, LayoutIssue)>,
    pub iterations: usize,
}

/// Returns true if `position` lies outside the scene bounds.
pub fn is_out_of_bounds(position: DVec3, scene: &SceneGeometry) -> bool {
    !scene.contains(position)
}

/// Finds anchor positions that balance closeness to the requested point,
/// preferred height and visibility.
#[derive(Clone, Copy, Debug)]
pub struct PlacementSolver {
    analyzer: OcclusionAnalyzer,
    single: MinimizeOptions,
    multi: MinimizeOptions,
}

impl Default for PlacementSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PlacementSolver {
    pub fn new() -> Self {
        Self {
            analyzer: OcclusionAnalyzer::new(),
            single: MinimizeOptions {
                max_iterations: SINGLE_MAX_ITERATIONS,
                ..Default::default()
            },
            multi: MinimizeOptions {
                max_iterations: MULTI_MAX_ITERATIONS,
                ..Default::default()
            },
        }
    }

    /// The analyzer used for the occlusion cost term.
    pub fn analyzer(&self) -> &OcclusionAnalyzer {
        &self.analyzer
    }

    /// Search the box around `desired` for the lowest-cost position.
    ///
    /// Never fails: if the optimizer cannot run, `desired` clamped into the
    /// scene is returned with an occlusion score of 1.0 and a
    /// [`PlacementOutcome::Degraded`] outcome.
    pub fn solve_single(
        &self,
        desired: DVec3,
        anchor_type: &AnchorType,
        scene: &SceneGeometry,
        overrides: Option<&ConstraintOverrides>,
        cancel: Option<&AtomicBool>,
    ) -> Placement {
        let _span = tracing::info_span!("solve_single", anchor_type = %anchor_type).entered();

        let start = start_point(desired, &scene.bounds);
        let constraints = PlacementConstraints::resolve(anchor_type, overrides);
        let cost = PlacementCost {
            scene,
            anchor_type,
            constraints: &constraints,
            desired,
            analyzer: self.analyzer,
        };
        let bounds = search_box(start, &scene.bounds);

        let result = minimize_bounded(
            |x: &[f64]| cost.evaluate(DVec3::from_slice(x)),
            &start.to_array(),
            &bounds,
            &self.single,
            cancel,
        );

        let result = match result {
            Ok(r) => r,
            Err(e) => return self.fallback_single(start, e),
        };

        let start_cost = cost.evaluate(start);
        let candidate = DVec3::from_slice(&result.x);
        let (position, outcome) = if result.fun < start_cost && scene.contains(candidate) {
            let outcome = if result.converged {
                PlacementOutcome::Converged
            } else {
                PlacementOutcome::IterationLimit
            };
            (candidate, outcome)
        } else {
            (start, PlacementOutcome::NoImprovement)
        };

        let occlusion_score = self
            .analyzer
            .placement_occlusion(position, scene, anchor_type);

        tracing::debug!(
            "placed {anchor_type} at {position} ({outcome}, {} iterations, {} evaluations)",
            result.iterations,
            result.evaluations
        );

        Placement {
            position,
            occlusion_score,
            outcome,
            iterations: result.iterations,
        }
    }

    fn fallback_single(&self, start: DVec3, error: OptimizeError) -> Placement {
        let outcome = match error {
            OptimizeError::Cancelled { .. } => PlacementOutcome::TimedOut,
            other => {
                tracing::warn!("placement optimization failed, keeping requested position: {other}");
                PlacementOutcome::Degraded {
                    reason: other.to_string(),
                }
            }
        };
        Placement {
            position: start,
            occlusion_score: 1.0,
            outcome,
            iterations: 0,
        }
    }

    /// Jointly re-optimize a set of anchors, penalizing pairs closer than
    /// their spacing rule.
    ///
    /// Anchors with non-finite inputs are left out of the solve and keep
    /// their position. On optimizer failure every anchor keeps its position.
    pub fn solve_multi(
        &self,
        anchors: &[LayoutAnchor],
        scene: &SceneGeometry,
        cancel: Option<&AtomicBool>,
    ) -> LayoutSolution {
        let _span = tracing::info_span!("solve_multi", anchors = anchors.len()).entered();

        let mut positions: Vec<DVec3> = anchors.iter().map(|a| a.position).collect();
        let mut issues = Vec::new();

        let active: Vec<usize> = anchors
            .iter()
            .enumerate()
            .filter_map(|(i, a)| {
                if a.position.is_finite() && a.original_position.is_finite() {
                    Some(i)
                } else {
                    tracing::warn!("anchor {i} has a non-finite position, excluded from layout");
                    issues.push((i, LayoutIssue::InvalidInput));
                    None
                }
            })
            .collect();

        if active.is_empty() {
            return LayoutSolution {
                positions,
                outcome: PlacementOutcome::NoImprovement,
                issues,
                iterations: 0,
            };
        }

        let constraints: Vec<PlacementConstraints> = active
            .iter()
            .map(|&i| PlacementConstraints::for_type(&anchors[i].anchor_type))
            .collect();
        let spacing: Vec<f64> = constraints.iter().map(PlacementConstraints::spacing).collect();
        let costs: Vec<PlacementCost<'_>> = active
            .iter()
            .zip(&constraints)
            .map(|(&i, c)| PlacementCost {
                scene,
                anchor_type: &anchors[i].anchor_type,
                constraints: c,
                desired: anchors[i].original_position,
                analyzer: self.analyzer,
            })
            .collect();

        let start: Vec<f64> = active
            .iter()
            .flat_map(|&i| scene.bounds.clamp_point(anchors[i].position).to_array())
            .collect();
        let bounds: Vec<(f64, f64)> = active
            .iter()
            .flat_map(|&i| search_box(anchors[i].original_position, &scene.bounds))
            .collect();

        let objective = |x: &[f64]| -> f64 {
            let points: Vec<DVec3> = x.chunks_exact(3).map(DVec3::from_slice).collect();
            let individual: f64 = costs.iter().zip(&points).map(|(c, &p)| c.evaluate(p)).sum();
            individual + spacing_penalty(&points, &spacing)
        };

        let start_cost = objective(&start);
        let result = match minimize_bounded(&objective, &start, &bounds, &self.multi, cancel) {
            Ok(r) => r,
            Err(OptimizeError::Cancelled { iterations }) => {
                tracing::warn!("layout solve cancelled after {iterations} iterations");
                return LayoutSolution {
                    positions,
                    outcome: PlacementOutcome::TimedOut,
                    issues,
                    iterations,
                };
            }
            Err(e) => {
                tracing::warn!("layout optimization failed, keeping current positions: {e}");
                return LayoutSolution {
                    positions,
                    outcome: PlacementOutcome::Degraded {
                        reason: e.to_string(),
                    },
                    issues,
                    iterations: 0,
                };
            }
        };

        let outcome = apply_layout(
            &result,
            start_cost,
            &active,
            scene,
            &mut positions,
            &mut issues,
        );
        tracing::info!(
            "layout of {} anchors finished: {outcome} after {} iterations",
            active.len(),
            result.iterations
        );

        LayoutSolution {
            positions,
            outcome,
            issues,
            iterations: result.iterations,
        }
    }
}

fn apply_layout(
    result: &MinimizeResult,
    start_cost: f64,
    active: &[usize],
    scene: &SceneGeometry,
    positions: &mut [DVec3],
    issues: &mut Vec<(usize, LayoutIssue)>,
) -> PlacementOutcome {
    if result.fun >= start_cost {
        for &i in active {
            positions[i] = scene.bounds.clamp_point(positions[i]);
        }
        return PlacementOutcome::NoImprovement;
    }

    for (&i, chunk) in active.iter().zip(result.x.chunks_exact(3)) {
        let candidate = DVec3::from_slice(chunk);
        if candidate.is_finite() && scene.contains(candidate) {
            positions[i] = candidate;
        } else {
            tracing::warn!("anchor {i} layout result {candidate} is unusable, keeping prior position");
            issues.push((i, LayoutIssue::UnusableResult));
        }
    }

    if result.converged {
        PlacementOutcome::Converged
    } else {
        PlacementOutcome::IterationLimit
    }
}

/// `p` clamped into `bounds`, with NaN axes replaced by the bounds center.
fn start_point(p: DVec3, bounds: &Aabb) -> DVec3 {
    DVec3::select(p.is_nan_mask(), bounds.center(), bounds.clamp_point(p))
}

/// Box of half-width [`SEARCH_RADIUS`] around `center`, clipped to `scene`.
/// An axis where the clip leaves nothing collapses onto the clamped center.
fn search_box(center: DVec3, scene: &Aabb) -> [(f64, f64); 3] {
    let clamped = scene.clamp_point(center);
    let mut out = [(0.0, 0.0); 3];
    for axis in 0..3 {
        let lo = (center[axis] - SEARCH_RADIUS).max(scene.min[axis]);
        let hi = (center[axis] + SEARCH_RADIUS).min(scene.max[axis]);
        out[axis] = if lo <= hi {
            (lo, hi)
        } else {
            (clamped[axis], clamped[axis])
        };
    }
    out
}
