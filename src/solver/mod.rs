//! Krylov solver interface.

use crate::core::traits::DistributedOperator;
use crate::parallel::Comm;
use crate::utils::convergence::SolveStats;

/// Common interface for distributed iterative solvers.
pub trait LinearSolver<A: DistributedOperator> {
    type Error;
    /// Solve A·x = b on every rank of `comm`, updating this rank's block of `x` in place.
    /// Returns iteration stats (including convergence info).
    fn solve<C: Comm>(
        &mut self,
        a: &A,
        comm: &C,
        b: &[f64],
        x: &mut [f64],
    ) -> Result<SolveStats, Self::Error>;
}

pub mod cg;
pub use cg::CgSolver;
