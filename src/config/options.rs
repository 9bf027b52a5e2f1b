//! Problem and solver options.
//!
//! This module provides the `GridSize` struct, the global resolution of the
//! structured grid, and the `SolverOptions` struct holding the CG stopping
//! criteria. Both are plain values filled in by the command-line driver or
//! by API callers, and validated before any decomposition is built.

use crate::error::KError;

/// Global resolution `nx × ny × nz` of the grid over the unit cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl GridSize {
    /// Validated grid; every axis needs at least three points so that it has
    /// a boundary and an interior.
    pub fn new(nx: usize, ny: usize, nz: usize) -> Result<Self, KError> {
        let grid = Self { nx, ny, nz };
        grid.validate()?;
        Ok(grid)
    }

    /// Cube with `n` points per axis.
    pub fn cube(n: usize) -> Result<Self, KError> {
        Self::new(n, n, n)
    }

    pub fn validate(&self) -> Result<(), KError> {
        if self.nx <= 2 || self.ny <= 2 || self.nz <= 2 {
            return Err(KError::Config(format!(
                "need at least three grid points in each direction to implement boundary conditions, got [{} x {} x {}]",
                self.nx, self.ny, self.nz
            )));
        }
        Ok(())
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Grid spacing `(dx, dy, dz)` with `dx = 1/(nx-1)`.
    pub fn spacing(&self) -> [f64; 3] {
        [
            1.0 / (self.nx - 1) as f64,
            1.0 / (self.ny - 1) as f64,
            1.0 / (self.nz - 1) as f64,
        ]
    }

    pub fn num_points(&self) -> usize {
        self.nx * self.ny * self.nz
    }
}

/// CG stopping criteria.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    /// Relative residual tolerance `‖r‖ ≤ tol·‖b‖`.
    pub tol: f64,
    /// Iteration budget.
    pub max_iters: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self { tol: f64::EPSILON.sqrt(), max_iters: 500 }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> Result<(), KError> {
        if !(self.tol > 0.0 && self.tol.is_finite()) {
            return Err(KError::Config(format!("tolerance must be positive, got {}", self.tol)));
        }
        if self.max_iters == 0 {
            return Err(KError::Config("iteration budget must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_two_point_axes() {
        assert!(matches!(GridSize::cube(2), Err(KError::Config(_))));
        assert!(matches!(GridSize::new(5, 5, 2), Err(KError::Config(_))));
        assert!(GridSize::new(3, 4, 5).is_ok());
    }

    #[test]
    fn spacing_spans_unit_cube() {
        let g = GridSize::new(3, 5, 11).unwrap();
        assert_eq!(g.spacing(), [0.5, 0.25, 0.1]);
    }

    #[test]
    fn default_options_match_driver() {
        let o = SolverOptions::default();
        assert_eq!(o.max_iters, 500);
        assert!((o.tol - f64::EPSILON.sqrt()).abs() < 1e-20);
        assert!(o.validate().is_ok());
        assert!(SolverOptions { tol: 0.0, max_iters: 1 }.validate().is_err());
        assert!(SolverOptions { tol: 1e-6, max_iters: 0 }.validate().is_err());
    }
}
