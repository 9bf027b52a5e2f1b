//! Context module for poisson-cg.
//!
//! This module provides the context type that ties a communicator, the domain
//! decomposition, the stencil operator and the solver options together for one
//! Poisson problem.
//!
//! Modules:
//! - [`poisson_context`]: Contains the `PoissonContext` struct, which builds the
//!   distributed operator, assembles right-hand sides from forcing and boundary
//!   functions, and runs CG.
//!
//! # Example
//! ```rust,no_run
//! use poisson_cg::{GridSize, PoissonContext, SerialComm, SolverOptions};
//! let mut ctx = PoissonContext::new(SerialComm, GridSize::cube(16)?, SolverOptions::default())?;
//! let b = ctx.assemble_rhs(|_, _, _| 1.0, |_, _| 0.0);
//! let mut x = vec![0.0; b.len()];
//! let stats = ctx.solve(&b, &mut x)?;
//! println!("{} iterations", stats.iterations);
//! # Ok::<(), poisson_cg::KError>(())
//! ```

pub mod poisson_context;
pub use poisson_context::PoissonContext;
