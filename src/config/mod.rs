//! Configuration types shared by the library and the `cg_poisson` driver.

pub mod options;
pub use options::{GridSize, SolverOptions};
