//! Constrained anchor placement.
//!
//! [`PlacementSolver::solve_single`] searches a box around the requested
//! position for the point minimizing a weighted cost of distance, height error,
//! occlusion and boundary overshoot. [`PlacementSolver::solve_multi`] optimizes
//! several anchors jointly and adds a spacing penalty between them.

mod constraints;
mod cost;
mod optimizer;
mod recommendations;
mod solver;

pub use constraints::{ConstraintOverrides, PlacementConstraints};
pub use cost::{PlacementCost, spacing_penalty};
pub use optimizer::{MinimizeOptions, MinimizeResult, OptimizeError, minimize_bounded};
pub use recommendations::{PlacementRecommendation, placement_recommendations};
pub use solver::{
    LayoutAnchor, LayoutIssue, LayoutSolution, MULTI_MAX_ITERATIONS, Placement, PlacementOutcome,
    PlacementSolver, SEARCH_RADIUS, SINGLE_MAX_ITERATIONS, is_out_of_bounds,
};
