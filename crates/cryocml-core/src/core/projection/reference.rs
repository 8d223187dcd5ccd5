use super::extract::project_gridding;
use super::prepare::PreparedVolume;
use super::{Projection, ProjectionError, ProjectionParams};
use crate::core::angles::{Symmetry, symmetric_even_angles};
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Reference projections at quasi-even directions over the asymmetric unit of a
/// cyclic symmetry, with `psi = -phi`. Requires a cubic gridding volume.
#[instrument(skip_all, name = "reference_projections")]
pub fn reference_projections(
    prepared: &PreparedVolume,
    delta: f64,
    symmetry: Symmetry,
) -> Result<Vec<Projection>, ProjectionError> {
    prepared.cubic_kernel()?;
    let angles = symmetric_even_angles(delta, symmetry);
    debug!(
        count = angles.len(),
        delta,
        symmetry = %symmetry,
        "Generating reference projections."
    );

    #[cfg(not(feature = "parallel"))]
    let iterator = angles.iter();

    #[cfg(feature = "parallel")]
    let iterator = angles.par_iter();

    iterator
        .map(|a| project_gridding(prepared, &ProjectionParams::angles(a[0], a[1], a[2])))
        .collect()
}

/// Projections around `base` displaced by every integer offset in
/// `[-half_x, half_x] x [-half_y, half_y]` pixels and `[-half_psi, half_psi]` degrees.
///
/// Indexed as `templates[x][y][psi]`.
pub fn generate_templates(
    prepared: &PreparedVolume,
    base: &ProjectionParams,
    half_x: usize,
    half_y: usize,
    half_psi: usize,
) -> Result<Vec<Vec<Vec<Projection>>>, ProjectionError> {
    let offsets = |half: usize| -> Vec<f64> {
        (0..=2 * half).map(|i| i as f64 - half as f64).collect()
    };
    let (xs, ys, psis) = (offsets(half_x), offsets(half_y), offsets(half_psi));

    xs.iter()
        .map(|&dx| {
            ys.iter()
                .map(|&dy| {
                    psis.iter()
                        .map(|&dpsi| {
                            let params = ProjectionParams {
                                psi: base.psi + dpsi,
                                sx: base.sx + dx,
                                sy: base.sy + dy,
                                ..*base
                            };
                            project_gridding(prepared, &params)
                        })
                        .collect()
                })
                .collect()
        })
        .collect()
}
