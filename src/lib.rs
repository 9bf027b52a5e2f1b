//! poisson-cg: distributed matrix-free CG for the 3-D Poisson equation
//!
//! This crate solves the 7-point finite-difference Laplacian on the unit cube
//! with unpreconditioned Conjugate Gradient. The grid is block-decomposed over
//! a 3-D process grid; every rank owns one block, exchanges one-cell halo
//! layers with its face neighbors and takes part in global sums. Ranks can be
//! MPI processes (feature `mpi`) or threads of one process, and loops inside a
//! rank run on rayon (feature `rayon`, on by default).

pub mod parallel;

pub mod config;
pub mod context;
pub mod core;
pub mod domain;
pub mod error;
pub mod matrix;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use crate::core::*;
pub use domain::*;
pub use error::*;
pub use matrix::*;
pub use parallel::{run_spmd, Comm, SerialComm, ThreadComm, UniverseComm};
pub use solver::*;
pub use utils::*;

#[cfg(feature = "mpi")]
pub use parallel::MpiComm;
