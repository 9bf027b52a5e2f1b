//! Domain decomposition of the global grid across ranks.
//!
//! - [`decomposition`]: process-grid factoring, local extents, offsets,
//!   neighbor lookup and the local/global index conversions.
//! - [`face`]: the six block faces and sets of them.

pub mod decomposition;
pub mod face;

pub use decomposition::{factor_process_grid, split_axis, DomainDecomposition};
pub use face::{Face, FaceSet};
