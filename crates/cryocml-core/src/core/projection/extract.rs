use super::prepare::{PreparedImage, PreparedVolume, wrap};
use super::{InterpolationMethod, Projection, ProjectionError, ProjectionParams};
use crate::core::fourier::{Cplx, Direction, apply_phase_shift, fft_1d, fft_2d, signed_frequency};
use crate::core::geometry::{plane_axes, rotation_from_euler};
use crate::core::image::Image2D;
use std::f64::consts::PI;

/// What [`project_section`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionOutput {
    #[default]
    Real,
    Fourier,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Real(Projection),
    Fourier {
        nx: usize,
        ny: usize,
        data: Vec<Cplx>,
        params: ProjectionParams,
    },
}

/// Samples the central section perpendicular to the projection direction and applies
/// the shift as a phase ramp. The result spans the padded `x`/`y` grid.
fn central_section(prepared: &PreparedVolume, params: &ProjectionParams) -> Vec<Cplx> {
    let [nx, ny, nz] = prepared.padded_dims();
    let (u, v) = plane_axes(&rotation_from_euler(params.phi, params.theta, params.psi));
    let mut section = vec![Cplx::default(); nx * ny];
    for iy in 0..ny {
        let f2 = signed_frequency(iy, ny) as f64 / ny as f64;
        for ix in 0..nx {
            let f1 = signed_frequency(ix, nx) as f64 / nx as f64;
            if f1 * f1 + f2 * f2 > 0.25 {
                continue;
            }
            let f = u * f1 + v * f2;
            section[ix + nx * iy] =
                prepared.sample([f.x * nx as f64, f.y * ny as f64, f.z * nz as f64]);
        }
    }
    apply_phase_shift(&mut section, nx, ny, params.sx, params.sy);
    section
}

fn section_to_image(mut section: Vec<Cplx>, padded: [usize; 3], original: [usize; 3]) -> Image2D {
    let (nx, ny) = (padded[0], padded[1]);
    let (mx, my) = (original[0], original[1]);
    fft_2d(&mut section, nx, ny, Direction::Inverse);
    Image2D::from_fn(mx, my, |x, y| {
        let ix = wrap(x as isize - (mx / 2) as isize, nx);
        let iy = wrap(y as isize - (my / 2) as isize, ny);
        section[ix + nx * iy].re
    })
}

/// Projection of a gridding-prepared volume at the given orientation and shift.
pub fn project_gridding(
    prepared: &PreparedVolume,
    params: &ProjectionParams,
) -> Result<Projection, ProjectionError> {
    if prepared.method() != InterpolationMethod::Gridding {
        return Err(ProjectionError::MethodMismatch {
            expected: "gridding",
            found: prepared.method(),
        });
    }
    let section = central_section(prepared, params);
    let image = section_to_image(section, prepared.padded_dims(), prepared.original_dims());
    Ok(Projection::annotate(image, params))
}

/// Nearest-neighbour or trilinear central section, returned either as the real-space
/// projection or as the raw Fourier section.
pub fn project_section(
    prepared: &PreparedVolume,
    params: &ProjectionParams,
    output: SectionOutput,
) -> Result<Section, ProjectionError> {
    if prepared.method() == InterpolationMethod::Gridding {
        return Err(ProjectionError::MethodMismatch {
            expected: "nearest-neighbor or trilinear",
            found: prepared.method(),
        });
    }
    let section = central_section(prepared, params);
    let padded = prepared.padded_dims();
    Ok(match output {
        SectionOutput::Real => Section::Real(Projection::annotate(
            section_to_image(section, padded, prepared.original_dims()),
            params,
        )),
        SectionOutput::Fourier => Section::Fourier {
            nx: padded[0],
            ny: padded[1],
            data: section,
            params: ProjectionParams {
                sx: -params.sx,
                sy: -params.sy,
                ..*params
            },
        },
    })
}

/// Real-space projection line of a prepared image along the in-plane direction
/// `alpha` (degrees), shifted by `shift` pixels along that line.
///
/// The returned line has the image's original size and is centred at `size / 2`.
pub fn extract_line(prepared: &PreparedImage, alpha: f64, shift: f64) -> Vec<f64> {
    let n = prepared.padded();
    let (sa, ca) = alpha.to_radians().sin_cos();
    let mut line: Vec<Cplx> = (0..n)
        .map(|k| {
            let kk = signed_frequency(k, n) as f64;
            let value = prepared.sample(kk * ca, kk * sa);
            if shift == 0.0 {
                value
            } else {
                value * Cplx::from_polar(1.0, -2.0 * PI * kk / n as f64 * shift)
            }
        })
        .collect();
    fft_1d(&mut line, Direction::Inverse);
    let size = prepared.size();
    (0..size)
        .map(|i| line[wrap(i as isize - (size / 2) as isize, n)].re)
        .collect()
}
