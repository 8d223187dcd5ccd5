//! # Engine Module
//!
//! This module implements the common-lines orientation search: given the sinograms
//! of a set of projections, it assigns each projection a direction from a fixed
//! candidate list and an in-plane angle so that the summed mismatch along all
//! common lines is as small as possible.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Search, sinogram and workflow parameters with builders
//! - **Context** ([`context`]) - In-plane sampling, the pair table and the candidate directions
//! - **State Tracking** ([`state`]) - Orientations, stop reasons and search outcomes
//! - **Rotations** ([`rotations`]) - Rotation matrices kept in step with the orientations
//! - **Collectives** ([`comm`]) - Single-worker and thread-backed execution strategies
//! - **Reporting** ([`report`], [`progress`]) - Angle reports and progress events
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! The search itself is one algorithm ([`tasks::search::find_structure`]) generic over
//! its [`comm::Collective`]; the single-worker run is the trivial strategy.

pub mod comm;
pub mod config;
pub mod context;
pub mod error;
pub(crate) mod occupancy;
pub mod progress;
pub mod report;
pub mod rotations;
pub mod state;
pub mod tasks;
