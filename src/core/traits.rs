//! Core linear-algebra traits for poisson-cg.

use crate::error::KError;
use crate::parallel::Comm;

/// Distributed operator application: y ← A x on this rank's block.
///
/// `apply` is collective over the ranks that share faces with this one, so
/// every rank must call it the same number of times.
pub trait DistributedOperator {
    /// Number of owned unknowns (length of `x` and `y`).
    fn local_len(&self) -> usize;
    /// Compute y = A · x.
    fn apply<C: Comm>(&self, comm: &C, x: &[f64], y: &mut [f64]) -> Result<(), KError>;
}

/// Inner products & norms.
pub trait InnerProduct<V: ?Sized> {
    /// Associated scalar type.
    type Scalar: Copy + PartialOrd;
    /// Compute dot(x, y).
    fn dot(&self, x: &V, y: &V) -> Result<Self::Scalar, KError>;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &V) -> Result<Self::Scalar, KError>;
}
