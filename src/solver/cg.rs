//! Conjugate Gradient (unpreconditioned) per Saad §6.1, matrix-free and distributed.
//!
//! Every rank runs the same iteration on its own block. Per iteration the
//! solver makes exactly one operator application and two global dot
//! products, on every rank, in the same order. All branch decisions
//! (convergence, breakdown) are taken on globally reduced scalars, so the
//! ranks always agree on when to stop.

use log::{debug, info, trace, warn};

use crate::config::SolverOptions;
use crate::core::traits::{DistributedOperator, InnerProduct};
use crate::core::vector::{self, DistributedInnerProduct};
use crate::error::KError;
use crate::parallel::Comm;
use crate::solver::LinearSolver;
use crate::utils::convergence::{Convergence, SolveStats};
use crate::utils::timer::{Phase, PhaseTimings};

pub struct CgSolver {
    pub conv: Convergence,
    pub monitor: Option<Box<dyn FnMut(usize, f64) + Send>>,
    last_stats: SolveStats,
}

impl CgSolver {
    pub fn new(tol: f64, max_iters: usize) -> Self {
        Self { conv: Convergence { tol, max_iters }, monitor: None, last_stats: SolveStats::default() }
    }

    pub fn from_options(opts: &SolverOptions) -> Self {
        Self::new(opts.tol, opts.max_iters)
    }

    /// Call `f(iteration, residual_norm)` after every iteration (0 = initial residual).
    pub fn with_monitor<F>(mut self, f: F) -> Self
    where F: FnMut(usize, f64) + Send + 'static {
        self.monitor = Some(Box::new(f));
        self
    }

    /// Statistics of the most recent solve, including failed ones.
    pub fn last_stats(&self) -> &SolveStats {
        &self.last_stats
    }

    fn record(&mut self, stats: &mut SolveStats, it: usize, res_norm: f64) {
        stats.residual_history.push(res_norm);
        if let Some(ref mut monitor) = self.monitor {
            monitor(it, res_norm);
        }
    }
}

impl<A: DistributedOperator> LinearSolver<A> for CgSolver {
    type Error = KError;

    fn solve<C: Comm>(&mut self, a: &A, comm: &C, b: &[f64], x: &mut [f64]) -> Result<SolveStats, KError> {
        let n = a.local_len();
        if b.len() != n || x.len() != n {
            return Err(KError::Config(format!(
                "CG on rank {}: rhs has {} values, solution {}, operator block {n}",
                comm.rank(),
                b.len(),
                x.len()
            )));
        }
        let ip = DistributedInnerProduct::new(comm);
        let mut t = PhaseTimings::default();
        let mut stats = SolveStats::default();
        let mut r = vec![0.0; n];
        let mut q = vec![0.0; n];

        // r = b - A x
        t.time(Phase::Apply, || a.apply(comm, &*x, &mut q)).map_err(|e| e.at_iteration(0))?;
        t.time(Phase::Update, || vector::sub_into(&mut r, b, &q));
        let mut p = r.clone();
        let b_norm = t.time(Phase::Reduce, || ip.norm(b)).map_err(|e| e.at_iteration(0))?;
        let mut rs_old = t.time(Phase::Reduce, || ip.dot(&r[..], &r[..])).map_err(|e| e.at_iteration(0))?;
        let threshold = self.conv.threshold(b_norm);
        let res0 = rs_old.sqrt();
        self.record(&mut stats, 0, res0);
        if comm.rank() == 0 {
            debug!(
                "CG: n_local={n}, ranks={}, ||b||={b_norm:.6e}, ||r0||={res0:.6e}, tol={:.2e}, max_iter={}",
                comm.size(),
                self.conv.tol,
                self.conv.max_iters
            );
        }

        stats.final_residual = res0;
        if self.conv.check(res0, b_norm) {
            stats.converged = true;
            stats.timings = t;
            self.last_stats = stats.clone();
            return Ok(stats);
        }

        for it in 1..=self.conv.max_iters {
            t.time(Phase::Apply, || a.apply(comm, &p, &mut q)).map_err(|e| e.at_iteration(it))?;
            let pq = t.time(Phase::Reduce, || ip.dot(&p[..], &q[..])).map_err(|e| e.at_iteration(it))?;
            if !(pq > 0.0 && pq.is_finite()) {
                warn!("CG: non-positive p.Ap = {pq:.4e} at iteration {it} on rank {}", comm.rank());
                stats.iterations = it;
                stats.timings = t;
                self.last_stats = stats;
                return Err(KError::Breakdown { iteration: it, curvature: pq });
            }
            let alpha = rs_old / pq;
            t.time(Phase::Update, || {
                vector::axpy(&mut *x, alpha, &p);
                vector::axpy(&mut r, -alpha, &q);
            });
            let rs_new = t.time(Phase::Reduce, || ip.dot(&r[..], &r[..])).map_err(|e| e.at_iteration(it))?;
            let res_norm = rs_new.sqrt();
            stats.iterations = it;
            stats.final_residual = res_norm;
            self.record(&mut stats, it, res_norm);
            trace!("CG iter {it}: ||r|| = {res_norm:.6e}, target {threshold:.6e}");

            if res_norm <= threshold {
                stats.converged = true;
                stats.timings = t;
                if comm.rank() == 0 {
                    info!("CG converged at iteration {it}: ||r|| = {res_norm:.6e}");
                }
                self.last_stats = stats.clone();
                return Ok(stats);
            }
            let beta = rs_new / rs_old;
            t.time(Phase::Update, || vector::xpay(&mut p, beta, &r));
            rs_old = rs_new;
        }

        let residual = stats.final_residual;
        if comm.rank() == 0 {
            warn!(
                "CG: no convergence after {} iterations, ||r|| = {residual:.6e} > {threshold:.6e}",
                self.conv.max_iters
            );
        }
        stats.timings = t;
        self.last_stats = stats;
        Err(KError::NotConverged { iterations: self.conv.max_iters, residual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::SerialComm;

    // Simple dense matrix type for testing
    #[derive(Clone)]
    struct DenseMat {
        data: Vec<Vec<f64>>,
    }
    impl DistributedOperator for DenseMat {
        fn local_len(&self) -> usize {
            self.data.len()
        }
        fn apply<C: Comm>(&self, _comm: &C, x: &[f64], y: &mut [f64]) -> Result<(), KError> {
            for (i, row) in self.data.iter().enumerate() {
                y[i] = row.iter().zip(x.iter()).map(|(a, b)| a * b).sum();
            }
            Ok(())
        }
    }

    #[test]
    fn cg_solves_simple_spd() {
        // SPD system: [[4,1],[1,3]] x = [1,2]
        let a = DenseMat { data: vec![vec![4.0, 1.0], vec![1.0, 3.0]] };
        let b = vec![1.0, 2.0];
        let mut x = vec![0.0, 0.0];
        let mut solver = CgSolver::new(1e-10, 20);
        let stats = solver.solve(&a, &SerialComm, &b, &mut x).unwrap();
        let expected = vec![0.09090909090909091, 0.6363636363636364];
        let tol = 1e-8;
        for (xi, ei) in x.iter().zip(expected.iter()) {
            assert!((xi - ei).abs() < tol, "xi = {}, expected = {}", xi, ei);
        }
        assert!(stats.converged, "CG did not converge");
        assert!(stats.iterations <= 2);
        assert_eq!(stats.residual_history.len(), stats.iterations + 1);
    }

    #[test]
    fn cg_reports_breakdown_on_indefinite_matrix() {
        let a = DenseMat { data: vec![vec![-1.0, 0.0], vec![0.0, -2.0]] };
        let b = vec![1.0, 1.0];
        let mut x = vec![0.0, 0.0];
        let mut solver = CgSolver::new(1e-10, 20);
        match solver.solve(&a, &SerialComm, &b, &mut x) {
            Err(KError::Breakdown { iteration, curvature }) => {
                assert_eq!(iteration, 1);
                assert!(curvature < 0.0);
            }
            other => panic!("expected breakdown, got {other:?}"),
        }
    }

    #[test]
    fn cg_reports_non_convergence_with_partial_iterate() {
        let a = DenseMat {
            data: vec![
                vec![4.0, 1.0, 0.0],
                vec![1.0, 3.0, 1.0],
                vec![0.0, 1.0, 2.0],
            ]
        };
        let b = vec![6.0, 8.0, 8.0];
        let mut x = vec![0.0; 3];
        let mut solver = CgSolver::new(1e-12, 1);
        match solver.solve(&a, &SerialComm, &b, &mut x) {
            Err(KError::NotConverged { iterations, residual }) => {
                assert_eq!(iterations, 1);
                assert!(residual > 0.0);
                assert_eq!(solver.last_stats().final_residual, residual);
            }
            other => panic!("expected non-convergence, got {other:?}"),
        }
        assert!(x.iter().any(|v| *v != 0.0), "partial iterate must be kept");
    }

    #[test]
    fn zero_rhs_with_zero_guess_needs_no_iteration() {
        let a = DenseMat { data: vec![vec![2.0, 0.0], vec![0.0, 2.0]] };
        let mut x = vec![0.0, 0.0];
        let mut solver = CgSolver::new(1e-8, 5);
        let stats = solver.solve(&a, &SerialComm, &[0.0, 0.0], &mut x).unwrap();
        assert!(stats.converged);
        assert_eq!(stats.iterations, 0);
        assert_eq!(x, vec![0.0, 0.0]);
    }

    #[test]
    fn monitor_sees_every_iteration() {
        use std::sync::{Arc, Mutex};
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let a = DenseMat { data: vec![vec![4.0, 1.0], vec![1.0, 3.0]] };
        let mut x = vec![0.0, 0.0];
        let mut solver = CgSolver::new(1e-10, 20).with_monitor(move |i, _| sink.lock().unwrap().push(i));
        let stats = solver.solve(&a, &SerialComm, &[1.0, 2.0], &mut x).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, (0..=stats.iterations).collect::<Vec<_>>());
    }

    #[test]
    fn initial_residual_is_the_distributed_norm_of_b() {
        let a = DenseMat { data: vec![vec![4.0, 1.0], vec![1.0, 3.0]] };
        let b = [0.3, -1.7];
        let mut x = vec![0.0, 0.0];
        let mut solver = CgSolver::new(1e-10, 20);
        let stats = solver.solve(&a, &SerialComm, &b, &mut x).unwrap();
        let expected = DistributedInnerProduct::new(&SerialComm).norm(&b[..]).unwrap();
        assert_eq!(stats.residual_history[0].to_bits(), expected.to_bits());
    }
}
