//! # Workflows Module
//!
//! High-level entry points that tie the [`crate::engine`] and [`crate::core`]
//! layers together into complete procedures.
//!
//! ## Architecture
//!
//! - **Structure Search** ([`find`]) - Sinogram preparation, repeated common-lines
//!   trials on one or more workers, and export of the best orientations
//! - **Projection** ([`project`]) - Projections of a volume at explicit angles or at
//!   quasi-even reference directions
//! - **Export** ([`export`]) - Annotated stacks, parameter tables and coverage plots
//!
//! Each workflow reports its phases through a
//! [`ProgressReporter`](crate::engine::progress::ProgressReporter) and returns an
//! [`EngineError`](crate::engine::error::EngineError) on failure.

pub mod export;
pub mod find;
pub mod project;
