//! Poisson problem context.
//!
//! `PoissonContext` owns this rank's communicator, the stencil operator
//! built on the domain decomposition, and a configured CG solver. It is the
//! glue between the numerical core and a driver: the driver supplies the
//! grid, the forcing term `f(x, y, z)` and the Dirichlet data `g(x, y)` on
//! the `z = 0` face; all other faces are homogeneous.
//!
//! # Usage
//!
//! 1. Construct a `PoissonContext` with a communicator, grid size and solver options.
//! 2. Build the right-hand side with `assemble_rhs`.
//! 3. Call `solve` to solve `A x = b` in place.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::{GridSize, SolverOptions};
use crate::domain::DomainDecomposition;
use crate::error::KError;
use crate::matrix::StencilOperator;
use crate::parallel::Comm;
use crate::solver::{CgSolver, LinearSolver};
use crate::utils::convergence::SolveStats;

pub struct PoissonContext<C: Comm> {
    comm: C,
    op: StencilOperator,
    /// CG solver configured from the options passed to `new`
    pub solver: CgSolver,
}

impl<C: Comm> PoissonContext<C> {
    /// Decompose `grid` over the ranks of `comm` and build the Laplacian.
    ///
    /// Configuration errors (grid too small, process count that cannot be
    /// laid out, bad options) are reported here, before any communication.
    pub fn new(comm: C, grid: GridSize, options: SolverOptions) -> Result<Self, KError> {
        grid.validate()?;
        options.validate()?;
        let decomp = DomainDecomposition::new(grid, comm.size(), comm.rank())?;
        let op = StencilOperator::laplace(decomp);
        Ok(Self { comm, op, solver: CgSolver::from_options(&options) })
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn operator(&self) -> &StencilOperator {
        &self.op
    }

    pub fn decomposition(&self) -> &DomainDecomposition {
        self.op.decomposition()
    }

    /// Number of unknowns owned by this rank.
    pub fn local_len(&self) -> usize {
        self.decomposition().local_len()
    }

    /// Right-hand side for forcing `f` and Dirichlet data `g` on the `z = 0` face.
    ///
    /// Every owned cell gets `f(x, y, z)`; cells on the global plane `k = 0`
    /// additionally get `-value_b · g(x, y)`, the boundary term moved to the
    /// right-hand side.
    pub fn assemble_rhs<F, G>(&self, f: F, g: G) -> Vec<f64>
    where
        F: Fn(f64, f64, f64) -> f64 + Sync,
        G: Fn(f64, f64) -> f64 + Sync,
    {
        let d = self.decomposition();
        let mut b = vec![0.0; d.local_len()];
        let fill = |(idx, bi): (usize, &mut f64)| {
            let [x, y, z] = d.coordinates(idx);
            *bi = f(x, y, z);
        };
        #[cfg(feature = "rayon")]
        b.par_iter_mut().enumerate().for_each(fill);
        #[cfg(not(feature = "rayon"))]
        b.iter_mut().enumerate().for_each(fill);

        if d.offset()[2] == 0 {
            let [nx, ny, _] = d.local_dims();
            let value_b = self.op.value_b();
            for j in 0..ny {
                for i in 0..nx {
                    let idx = d.local_index(i, j, 0);
                    let [x, y, _] = d.coordinates(idx);
                    b[idx] -= value_b * g(x, y);
                }
            }
        }
        b
    }

    /// Solve `A x = b` with CG; `x` holds the initial guess on entry.
    pub fn solve(&mut self, b: &[f64], x: &mut [f64]) -> Result<SolveStats, KError> {
        self.solver.solve(&self.op, &self.comm, b, x)
    }

    /// Statistics of the last solve, also after a convergence failure.
    pub fn last_stats(&self) -> &SolveStats {
        self.solver.last_stats()
    }

    /// Collect a distributed vector on every rank, in global row-major order.
    ///
    /// Collective. Allocates the full grid on every rank.
    pub fn gather_global(&self, local: &[f64]) -> Result<Vec<f64>, KError> {
        let d = self.decomposition();
        if local.len() != d.local_len() {
            return Err(KError::Config(format!(
                "gather: vector has {} values, block has {}",
                local.len(),
                d.local_len()
            )));
        }
        let mut global = vec![0.0; d.grid().num_points()];
        for (idx, v) in local.iter().enumerate() {
            global[d.global_index(d.local_to_global(d.local_coords(idx)))] = *v;
        }
        self.comm.all_reduce_into(&mut global)?;
        Ok(global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::{run_spmd, SerialComm};
    use approx::assert_abs_diff_eq;

    #[test]
    fn rhs_folds_bottom_boundary() {
        let grid = GridSize::cube(5).unwrap();
        let ctx = PoissonContext::new(SerialComm, grid, SolverOptions::default()).unwrap();
        let b = ctx.assemble_rhs(|_, _, z| z, |x, _| x);
        let op = ctx.operator();
        let value_b = op.value_b();
        // interior: f only
        assert_abs_diff_eq!(b[op.index_c(1, 1, 2)], 0.5, epsilon = 1e-14);
        // bottom plane: f(z=0) = 0 minus value_b * g
        assert_abs_diff_eq!(b[op.index_c(2, 3, 0)], -value_b * 0.5, epsilon = 1e-12);
        // top plane gets no boundary term
        assert_abs_diff_eq!(b[op.index_c(2, 3, 4)], 1.0, epsilon = 1e-14);
    }

    #[test]
    fn gather_reassembles_global_order() {
        let grid = GridSize::new(6, 5, 4).unwrap();
        let gathered = run_spmd(4, |comm| {
            let ctx = PoissonContext::new(comm, grid, SolverOptions::default()).unwrap();
            let d = ctx.decomposition();
            let local: Vec<f64> = (0..d.local_len())
                .map(|idx| d.global_index(d.local_to_global(d.local_coords(idx))) as f64)
                .collect();
            ctx.gather_global(&local).unwrap()
        });
        let expected: Vec<f64> = (0..grid.num_points()).map(|v| v as f64).collect();
        for g in gathered {
            assert_eq!(g, expected);
        }
    }

    #[test]
    fn too_small_grid_fails_before_solving() {
        let err = GridSize::cube(2)
            .and_then(|g| PoissonContext::new(SerialComm, g, SolverOptions::default()).map(|_| ()));
        assert!(matches!(err, Err(KError::Config(_))));
    }
}
