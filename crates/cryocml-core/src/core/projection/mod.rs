//! Fourier-space projection of volumes and images.
//!
//! A volume is first *prepared* ([`prepare::prepare_volume`]): divided by the real-space
//! profile of the interpolation kernel, zero-padded around its centre and transformed.
//! Projections are then central sections of that spectrum ([`extract`]), sampled with
//! Kaiser–Bessel gridding or with nearest-neighbour / trilinear interpolation.
//!
//! [`real_space::project_real_space`] instead sums trilinear samples along each ray
//! inside a sphere, without preparing the volume.

pub mod extract;
pub mod prepare;
pub mod real_space;
pub mod reference;

use crate::core::image::{Image2D, ImageError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use extract::{SectionOutput, extract_line, project_gridding, project_section};
pub use prepare::{PreparedImage, PreparedVolume, prepare_image, prepare_volume};
pub use real_space::project_real_space;
pub use reference::{generate_templates, reference_projections};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationMethod {
    Gridding,
    NearestNeighbor,
    Trilinear,
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterpolationMethod::Gridding => "gridding",
            InterpolationMethod::NearestNeighbor => "nearest-neighbor",
            InterpolationMethod::Trilinear => "trilinear",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ProjectionError {
    #[error("Padding factor {npad} is not supported by {method} interpolation")]
    UnsupportedPadding {
        method: InterpolationMethod,
        npad: usize,
    },
    #[error("Volume has an empty dimension: {dims:?}")]
    EmptyVolume { dims: [usize; 3] },
    #[error("This operation requires a cubic volume, got {dims:?}")]
    NonCubicVolume { dims: [usize; 3] },
    #[error("Volume was prepared for {found} interpolation, expected {expected}")]
    MethodMismatch {
        expected: &'static str,
        found: InterpolationMethod,
    },
    #[error("Image must be square, got {nx}x{ny}")]
    NonSquareImage { nx: usize, ny: usize },
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

/// Euler angles (degrees) and in-plane shift (pixels) of one projection.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectionParams {
    pub phi: f64,
    pub theta: f64,
    pub psi: f64,
    pub sx: f64,
    pub sy: f64,
}

impl ProjectionParams {
    pub fn new(phi: f64, theta: f64, psi: f64, sx: f64, sy: f64) -> Self {
        Self {
            phi,
            theta,
            psi,
            sx,
            sy,
        }
    }

    pub fn angles(phi: f64, theta: f64, psi: f64) -> Self {
        Self::new(phi, theta, psi, 0.0, 0.0)
    }
}

/// A generated projection. `params` records the alignment that undoes the applied
/// shift, so the stored shift is the negation of the requested one.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub image: Image2D,
    pub params: ProjectionParams,
}

impl Projection {
    pub(crate) fn annotate(image: Image2D, requested: &ProjectionParams) -> Self {
        Self {
            image,
            params: ProjectionParams {
                sx: -requested.sx,
                sy: -requested.sy,
                ..*requested
            },
        }
    }
}
