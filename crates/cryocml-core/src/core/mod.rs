//! # Core Module
//!
//! Stateless data models and numerical building blocks shared by the search engine
//! and the projection workflows.
//!
//! ## Architecture
//!
//! - **Images** ([`image`]) - Row-major 2-D images and 3-D volumes, masks and statistics
//! - **Geometry** ([`geometry`]) - SPIDER ZYZ Euler rotations and angle wrapping
//! - **Angular Sampling** ([`angles`]) - Quasi-even direction sets and cyclic symmetry
//! - **Fourier Transforms** ([`fourier`]) - Multi-dimensional FFTs, phase-ramp shifts and
//!   the Kaiser–Bessel gridding kernel
//! - **Projection** ([`projection`]) - Volume preparation and central-section extraction
//! - **File I/O** ([`io`]) - MRC stacks and volumes, CSV projection parameters
//!
//! Everything here is deterministic and free of shared state; parallelism, progress
//! and iteration live in [`crate::engine`].

pub mod angles;
pub mod fourier;
pub mod geometry;
pub mod image;
pub mod io;
pub mod projection;
