//! # cryocml Core Library
//!
//! Ab-initio orientation search for single-particle cryo-EM projections by common
//! lines, together with the Fourier gridding projector used to generate test and
//! reference projections.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same three layers throughout.
//!
//! - **[`core`]: The Foundation.** Images and volumes, Euler geometry, angular
//!   sampling, Fourier transforms, projection and file I/O. Stateless and deterministic.
//!
//! - **[`engine`]: The Logic Core.** The stateful search: sinograms, common-line
//!   geometry, Voronoi line weights, the discrepancy, the in-plane spin, the greedy
//!   candidate loop and the collectives that keep distributed replicas in step.
//!
//! - **[`workflows`]: The Public API.** Complete procedures such as finding the
//!   orientations of a stack or projecting a volume, with progress reporting and export.

pub mod core;
pub mod engine;
pub mod workflows;
