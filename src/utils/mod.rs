//! Convergence tracking and timing helpers for the solver.

pub mod convergence;
pub mod timer;

pub use convergence::{Convergence, SolveStats};
pub use timer::{Phase, PhaseTimings};
