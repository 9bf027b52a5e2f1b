//! Convergence tracking & tolerance checks for iterative solvers.

use crate::utils::timer::PhaseTimings;

/// Stopping criteria.
///
/// The test is relative to the right-hand side: `‖r‖ ≤ tol·‖b‖`, falling
/// back to the absolute `‖r‖ ≤ tol` when `b` is the zero vector.
#[derive(Clone, Copy, Debug)]
pub struct Convergence {
    pub tol: f64,
    pub max_iters: usize,
}

#[derive(Clone, Debug, Default)]
pub struct SolveStats {
    pub iterations: usize,
    pub final_residual: f64,
    pub converged: bool,
    /// `‖r‖` before the first iteration and after each one.
    pub residual_history: Vec<f64>,
    pub timings: PhaseTimings,
}

impl Convergence {
    /// Residual norm below which the iteration stops.
    pub fn threshold(&self, b_norm: f64) -> f64 {
        if b_norm > 0.0 { self.tol * b_norm } else { self.tol }
    }

    /// True when `res_norm` meets the threshold for a right-hand side of norm `b_norm`.
    pub fn check(&self, res_norm: f64, b_norm: f64) -> bool {
        res_norm <= self.threshold(b_norm)
    }
}
