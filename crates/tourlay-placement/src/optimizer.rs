//! Bounded, gradient-free local minimization.
//!
//! A Nelder–Mead simplex search where every trial point is projected back onto
//! the box before it is evaluated. No smoothness is assumed of the objective,
//! which matters here because the placement cost has kinks at the desired
//! point and along collision volume faces.

use std::sync::atomic::{AtomicBool, Ordering};

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Stopping rules for [`minimize_bounded`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinimizeOptions {
    pub max_iterations: usize,
    /// Per-axis spread of the simplex below which it counts as converged.
    pub xatol: f64,
    /// Spread of objective values below which it counts as converged.
    pub fatol: f64,
    /// Edge length of the initial simplex.
    pub initial_step: f64,
}

impl Default for MinimizeOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            xatol: 1e-4,
            fatol: 1e-4,
            initial_step: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MinimizeResult {
    /// Best point found.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub fun: f64,
    pub iterations: usize,
    pub evaluations: usize,
    /// False when the iteration cap was reached first.
    pub converged: bool,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OptimizeError {
    #[error("nothing to optimize: zero-dimensional problem")]
    EmptyProblem,
    #[error("invalid bounds on axis {axis}: [{lower}, {upper}]")]
    InvalidBounds { axis: usize, lower: f64, upper: f64 },
    #[error("dimension mismatch: {start} start coordinates, {bounds} bounds")]
    DimensionMismatch { start: usize, bounds: usize },
    #[error("objective returned a non-finite value")]
    NonFiniteObjective,
    #[error("optimization cancelled after {iterations} iterations")]
    Cancelled { iterations: usize },
}

struct Vertex {
    x: Vec<f64>,
    f: f64,
}

struct Problem<'a, F> {
    objective: F,
    bounds: &'a [(f64, f64)],
    evaluations: usize,
}

impl<F: FnMut(&[f64]) -> f64> Problem<'_, F> {
    fn project(&self, x: &mut [f64]) {
        for (v, &(lo, hi)) in x.iter_mut().zip(self.bounds) {
            *v = v.clamp(lo, hi);
        }
    }

    fn vertex(&mut self, mut x: Vec<f64>) -> Result<Vertex, OptimizeError> {
        self.project(&mut x);
        self.evaluations += 1;
        let f = (self.objective)(&x);
        if !f.is_finite() {
            return Err(OptimizeError::NonFiniteObjective);
        }
        Ok(Vertex { x, f })
    }
}

/// Minimize `objective` inside the box `bounds`, starting from `x0`.
///
/// `x0` is projected into the box first. When `cancel` is set the search
/// stops at the next iteration boundary with [`OptimizeError::Cancelled`].
pub fn minimize_bounded<F>(
    objective: F,
    x0: &[f64],
    bounds: &[(f64, f64)],
    options: &MinimizeOptions,
    cancel: Option<&AtomicBool>,
) -> Result<MinimizeResult, OptimizeError>
where
    F: FnMut(&[f64]) -> f64,
{
    let n = x0.len();
    if n == 0 {
        return Err(OptimizeError::EmptyProblem);
    }
    if bounds.len() != n {
        return Err(OptimizeError::DimensionMismatch {
            start: n,
            bounds: bounds.len(),
        });
    }
    for (axis, &(lower, upper)) in bounds.iter().enumerate() {
        if !(lower.is_finite() && upper.is_finite() && lower <= upper) {
            return Err(OptimizeError::InvalidBounds { axis, lower, upper });
        }
    }

    let mut problem = Problem {
        objective,
        bounds,
        evaluations: 0,
    };

    let start = problem.vertex(x0.to_vec())?;
    let mut simplex = Vec::with_capacity(n + 1);
    for axis in 0..n {
        let mut x = start.x.clone();
        let (lo, hi) = bounds[axis];
        x[axis] = if x[axis] + options.initial_step <= hi {
            x[axis] + options.initial_step
        } else if x[axis] - options.initial_step >= lo {
            x[axis] - options.initial_step
        } else if hi - x[axis] >= x[axis] - lo {
            hi
        } else {
            lo
        };
        simplex.push(problem.vertex(x)?);
    }
    simplex.push(start);

    let mut iterations = 0;
    let mut converged = false;

    loop {
        simplex.sort_by(|a, b| a.f.total_cmp(&b.f));

        if has_converged(&simplex, options) {
            converged = true;
            break;
        }
        if iterations >= options.max_iterations {
            break;
        }
        if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
            return Err(OptimizeError::Cancelled { iterations });
        }
        iterations += 1;

        let worst = n;
        let centroid: Vec<f64> = (0..n)
            .map(|axis| simplex[..n].iter().map(|v| v.x[axis]).sum::<f64>() / n as f64)
            .collect();
        let along = |from: &[f64], scale: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, p)| c + scale * (c - p))
                .collect()
        };

        let reflected = problem.vertex(along(&simplex[worst].x, REFLECT))?;

        if reflected.f < simplex[0].f {
            let expanded = problem.vertex(along(&simplex[worst].x, REFLECT * EXPAND))?;
            simplex[worst] = if expanded.f < reflected.f {
                expanded
            } else {
                reflected
            };
            continue;
        }

        if reflected.f < simplex[n - 1].f {
            simplex[worst] = reflected;
            continue;
        }

        let contracted = if reflected.f < simplex[worst].f {
            let outside = problem.vertex(along(&simplex[worst].x, REFLECT * CONTRACT))?;
            (outside.f <= reflected.f).then_some(outside)
        } else {
            let inside = problem.vertex(along(&simplex[worst].x, -CONTRACT))?;
            (inside.f < simplex[worst].f).then_some(inside)
        };

        match contracted {
            Some(v) => simplex[worst] = v,
            None => {
                let best = simplex[0].x.clone();
                for vertex in simplex.iter_mut().skip(1) {
                    let x: Vec<f64> = best
                        .iter()
                        .zip(&vertex.x)
                        .map(|(b, v)| b + SHRINK * (v - b))
                        .collect();
                    *vertex = problem.vertex(x)?;
                }
            }
        }

        tracing::trace!("nelder-mead iteration {iterations}: best {}", simplex[0].f);
    }

    let best = simplex.swap_remove(0);
    Ok(MinimizeResult {
        x: best.x,
        fun: best.f,
        iterations,
        evaluations: problem.evaluations,
        converged,
    })
}

fn has_converged(sorted: &[Vertex], options: &MinimizeOptions) -> bool {
    let best = &sorted[0];
    sorted[1..].iter().all(|v| {
        (v.f - best.f).abs() <= options.fatol
            && v.x
                .iter()
                .zip(&best.x)
                .all(|(a, b)| (a - b).abs() <= options.xatol)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(center: [f64; 2]) -> impl FnMut(&[f64]) -> f64 {
        move |x| (x[0] - center[0]).powi(2) + (x[1] - center[1]).powi(2)
    }

    #[test]
    fn test_unconstrained_minimum_found() {
        let result = minimize_bounded(
            sphere([1.0, -2.0]),
            &[0.0, 0.0],
            &[(-10.0, 10.0), (-10.0, 10.0)],
            &MinimizeOptions {
                max_iterations: 500,
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert!(result.converged);
        assert!((result.x[0] - 1.0).abs() < 1e-2);
        assert!((result.x[1] + 2.0).abs() < 1e-2);
    }

    /// A minimum outside the box is pinned to the nearest face.
    #[test]
    fn test_minimum_outside_box_lands_on_boundary() {
        let result = minimize_bounded(
            sphere([5.0, 0.0]),
            &[0.0, 0.0],
            &[(-1.0, 2.0), (-1.0, 1.0)],
            &MinimizeOptions {
                max_iterations: 500,
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert!(result.x[0] <= 2.0);
        assert!(result.x[0] > 1.9);
        assert!(result.x[1].abs() < 0.1);
    }

    #[test]
    fn test_start_outside_box_is_projected() {
        let mut seen_outside = false;
        let bounds = [(0.0, 1.0), (0.0, 1.0)];
        let result = minimize_bounded(
            |x: &[f64]| {
                if x.iter().any(|v| !(0.0..=1.0).contains(v)) {
                    seen_outside = true;
                }
                x[0] + x[1]
            },
            &[7.0, -3.0],
            &bounds,
            &MinimizeOptions::default(),
            None,
        )
        .unwrap();
        assert!(!seen_outside);
        assert!(result.fun < 1.0 + 1e-9);
    }

    /// A zero-width axis stays fixed.
    #[test]
    fn test_collapsed_axis() {
        let result = minimize_bounded(
            sphere([0.0, 0.0]),
            &[3.0, 3.0],
            &[(3.0, 3.0), (-5.0, 5.0)],
            &MinimizeOptions {
                max_iterations: 300,
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert_eq!(result.x[0], 3.0);
        assert!(result.x[1].abs() < 1e-2);
    }

    #[test]
    fn test_iteration_cap_reports_not_converged() {
        let result = minimize_bounded(
            sphere([4.0, 4.0]),
            &[-4.0, -4.0],
            &[(-10.0, 10.0), (-10.0, 10.0)],
            &MinimizeOptions {
                max_iterations: 2,
                ..Default::default()
            },
            None,
        )
        .unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 2);
        assert!(result.fun < 128.0);
    }

    #[test]
    fn test_cancelled_before_first_iteration() {
        let cancel = AtomicBool::new(true);
        let err = minimize_bounded(
            sphere([1.0, 1.0]),
            &[0.0, 0.0],
            &[(-1.0, 2.0), (-1.0, 2.0)],
            &MinimizeOptions::default(),
            Some(&cancel),
        )
        .unwrap_err();
        assert_eq!(err, OptimizeError::Cancelled { iterations: 0 });
    }

    #[test]
    fn test_non_finite_objective_fails() {
        let err = minimize_bounded(
            |_: &[f64]| f64::NAN,
            &[0.0],
            &[(-1.0, 1.0)],
            &MinimizeOptions::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(err, OptimizeError::NonFiniteObjective);
    }

    #[test]
    fn test_rejects_bad_input() {
        let opts = MinimizeOptions::default();
        assert_eq!(
            minimize_bounded(|_: &[f64]| 0.0, &[], &[], &opts, None).unwrap_err(),
            OptimizeError::EmptyProblem
        );
        assert!(matches!(
            minimize_bounded(|_: &[f64]| 0.0, &[0.0], &[(1.0, -1.0)], &opts, None),
            Err(OptimizeError::InvalidBounds { axis: 0, .. })
        ));
        assert!(matches!(
            minimize_bounded(|_: &[f64]| 0.0, &[0.0, 0.0], &[(0.0, 1.0)], &opts, None),
            Err(OptimizeError::DimensionMismatch { .. })
        ));
    }
}
