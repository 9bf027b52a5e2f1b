//! Element-wise and reduction primitives on distributed vectors.
//!
//! A distributed vector is a plain slice holding this rank's owned cells in
//! local linear order. `init`, `axpy` and `xpay` touch only the local slice.
//! `dot` and `norm2` add a global sum over all ranks and are therefore
//! collective: every rank must call them the same number of times, in the
//! same order, or the run deadlocks.
//!
//! # Features
//! - With the `rayon` feature the local loops run on the global rayon pool.
//!   The local dot product is summed over fixed-size chunks so the result
//!   does not depend on how the pool schedules the work.
//! - `DistributedInnerProduct` exposes the reductions through the
//!   [`InnerProduct`] trait for a given communicator.

use num_traits::Float;

use crate::core::traits::InnerProduct;
use crate::error::KError;
use crate::parallel::Comm;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Chunk length of the local dot product.
#[cfg(feature = "rayon")]
const DOT_CHUNK: usize = 4096;

/// Sets every entry of `v` to `value`.
pub fn init<T: Float + Send + Sync>(v: &mut [T], value: T) {
    #[cfg(feature = "rayon")]
    {
        v.par_iter_mut().for_each(|vi| *vi = value);
    }
    #[cfg(not(feature = "rayon"))]
    {
        v.iter_mut().for_each(|vi| *vi = value);
    }
}

/// `y ← a·x + y`.
pub fn axpy<T: Float + Send + Sync>(y: &mut [T], a: T, x: &[T]) {
    assert_eq!(x.len(), y.len(), "Vectors must have the same length");
    #[cfg(feature = "rayon")]
    {
        y.par_iter_mut().zip(x.par_iter()).for_each(|(yi, &xi)| *yi = a * xi + *yi);
    }
    #[cfg(not(feature = "rayon"))]
    {
        y.iter_mut().zip(x).for_each(|(yi, &xi)| *yi = a * xi + *yi);
    }
}

/// `y ← x + a·y`, the CG search-direction update.
pub fn xpay<T: Float + Send + Sync>(y: &mut [T], a: T, x: &[T]) {
    assert_eq!(x.len(), y.len(), "Vectors must have the same length");
    #[cfg(feature = "rayon")]
    {
        y.par_iter_mut().zip(x.par_iter()).for_each(|(yi, &xi)| *yi = xi + a * *yi);
    }
    #[cfg(not(feature = "rayon"))]
    {
        y.iter_mut().zip(x).for_each(|(yi, &xi)| *yi = xi + a * *yi);
    }
}

/// `out ← x − y`.
pub fn sub_into<T: Float + Send + Sync>(out: &mut [T], x: &[T], y: &[T]) {
    assert_eq!(x.len(), y.len(), "Vectors must have the same length");
    assert_eq!(x.len(), out.len(), "Vectors must have the same length");
    #[cfg(feature = "rayon")]
    {
        out.par_iter_mut()
            .zip(x.par_iter().zip(y.par_iter()))
            .for_each(|(o, (&xi, &yi))| *o = xi - yi);
    }
    #[cfg(not(feature = "rayon"))]
    {
        out.iter_mut().zip(x.iter().zip(y)).for_each(|(o, (&xi, &yi))| *o = xi - yi);
    }
}

/// Dot product of the local slices only, no communication.
pub fn local_dot(x: &[f64], y: &[f64]) -> f64 {
    assert_eq!(x.len(), y.len(), "Vectors must have the same length");
    #[cfg(feature = "rayon")]
    {
        let partial: Vec<f64> = x
            .par_chunks(DOT_CHUNK)
            .zip(y.par_chunks(DOT_CHUNK))
            .map(|(a, b)| a.iter().zip(b).map(|(&ai, &bi)| ai * bi).sum::<f64>())
            .collect();
        partial.iter().sum()
    }
    #[cfg(not(feature = "rayon"))]
    {
        x.iter().zip(y).map(|(&xi, &yi)| xi * yi).sum()
    }
}

/// Global dot product: local partial sum, then a sum over all ranks.
pub fn dot<C: Comm>(comm: &C, x: &[f64], y: &[f64]) -> Result<f64, KError> {
    comm.all_reduce(local_dot(x, y))
}

/// Global Euclidean norm `sqrt(dot(x, x))`.
pub fn norm2<C: Comm>(comm: &C, x: &[f64]) -> Result<f64, KError> {
    Ok(dot(comm, x, x)?.sqrt())
}

/// Distributed inner product and norm over a communicator.
///
/// Wraps a communicator and provides collective dot product and norm
/// operations across all ranks.
pub struct DistributedInnerProduct<'a, C: Comm> {
    /// Reference to the communicator implementing the `Comm` trait.
    pub comm: &'a C,
}

impl<'a, C: Comm> DistributedInnerProduct<'a, C> {
    pub fn new(comm: &'a C) -> Self {
        Self { comm }
    }
}

impl<C: Comm> InnerProduct<[f64]> for DistributedInnerProduct<'_, C> {
    type Scalar = f64;
    /// Computes the distributed dot product of two slices, reducing across all ranks.
    fn dot(&self, x: &[f64], y: &[f64]) -> Result<f64, KError> {
        dot(self.comm, x, y)
    }
    /// Computes the distributed Euclidean norm of a slice, reducing across all ranks.
    fn norm(&self, x: &[f64]) -> Result<f64, KError> {
        norm2(self.comm, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::{run_spmd, SerialComm};
    use approx::assert_abs_diff_eq;

    #[test]
    fn elementwise_updates() {
        let mut y = vec![0.0; 4];
        init(&mut y, 2.0);
        assert_eq!(y, vec![2.0; 4]);
        let x = vec![1.0, 2.0, 3.0, 4.0];
        axpy(&mut y, -1.0, &x);
        assert_eq!(y, vec![1.0, 0.0, -1.0, -2.0]);
        xpay(&mut y, 0.5, &x);
        assert_eq!(y, vec![1.5, 2.0, 2.5, 3.0]);
        let mut d = vec![0.0; 4];
        sub_into(&mut d, &x, &y);
        assert_eq!(d, vec![-0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn serial_dot_and_norm() {
        let comm = SerialComm::new();
        let x = vec![1.0, 2.0, 3.0];
        let y = vec![4.0, -5.0, 6.0];
        assert_abs_diff_eq!(dot(&comm, &x, &y).unwrap(), 12.0, epsilon = 1e-12);
        let ip = DistributedInnerProduct::new(&comm);
        assert_abs_diff_eq!(ip.norm(&x[..]).unwrap(), 14.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn long_local_dot_matches_serial_sum() {
        let x: Vec<f64> = (0..10_000).map(|i| (i as f64 * 0.01).sin()).collect();
        let expected: f64 = x.iter().map(|v| v * v).sum();
        assert_abs_diff_eq!(local_dot(&x, &x), expected, epsilon = 1e-9);
    }

    #[test]
    fn distributed_dot_is_global_and_identical() {
        // rank r owns entries [2r, 2r+1] of x = 1..=8
        let dots = run_spmd(4, |comm| {
            let r = comm.rank() as f64;
            let x = vec![2.0 * r + 1.0, 2.0 * r + 2.0];
            norm2(&comm, &x).unwrap()
        });
        let expected = (1..=8).map(|v| (v * v) as f64).sum::<f64>().sqrt();
        for d in &dots {
            assert_abs_diff_eq!(*d, expected, epsilon = 1e-12);
            assert_eq!(d.to_bits(), dots[0].to_bits());
        }
    }
}
