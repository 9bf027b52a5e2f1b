//! Core traits and distributed vector primitives.

pub mod traits;
pub mod vector;

pub use traits::{DistributedOperator, InnerProduct};
pub use vector::DistributedInnerProduct;
