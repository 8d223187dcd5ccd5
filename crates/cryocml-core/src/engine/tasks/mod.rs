//! Computational tasks of the orientation search.
//!
//! Each submodule covers one stage, from turning projections into sinograms to the
//! search loop that assigns their directions. Tasks take the search context and
//! plain data, and return results rather than mutating shared state.

pub mod common_lines;
pub mod discrepancy;
pub mod search;
pub mod sinogram;
pub mod spin;
pub mod weights;
