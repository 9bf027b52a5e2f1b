//! Matrix module: the matrix-free stencil operator and its dense assembly.

pub mod dense;
pub mod stencil;
pub use stencil::{StencilCoefficients, StencilOperator};
