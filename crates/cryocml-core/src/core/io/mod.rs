//! Provides input/output for density maps and projection parameters.
//!
//! Image stacks and volumes are exchanged as MRC files through the
//! [`traits::DensityFile`] interface; per-projection Euler angles and shifts are
//! exchanged as CSV tables.

pub mod mrc;
pub mod params;
pub mod traits;
