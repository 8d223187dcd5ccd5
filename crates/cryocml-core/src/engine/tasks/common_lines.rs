use crate::core::geometry::{plane_axes, projection_normal, wrap_degrees};
use crate::engine::context::{PairTable, PsiSampling};
use nalgebra::{Matrix3, Vector3};

const PARALLEL_TOLERANCE: f64 = 1e-10;

/// Unit direction of the common line of two projection planes.
///
/// Parallel planes share every in-plane direction; the `x` axis of the first plane
/// is used for them.
pub fn common_line_direction(rot_i: &Matrix3<f64>, rot_j: &Matrix3<f64>) -> Vector3<f64> {
    let cross = projection_normal(rot_i).cross(&projection_normal(rot_j));
    let norm = cross.norm();
    if norm < PARALLEL_TOLERANCE {
        plane_axes(rot_i).0
    } else {
        cross / norm
    }
}

/// In-plane angle of `direction` in the plane of `rotation`, degrees in `[0, 360)`.
#[inline]
fn in_plane_angle(rotation: &Matrix3<f64>, direction: &Vector3<f64>) -> f64 {
    let (x, y) = plane_axes(rotation);
    wrap_degrees(y.dot(direction).atan2(x.dot(direction)).to_degrees())
}

/// Sinogram line indices, over the full circle, of the common line of projections
/// `i` and `j` in their respective sinograms.
pub fn common_line_indices(
    rot_i: &Matrix3<f64>,
    rot_j: &Matrix3<f64>,
    psi: &PsiSampling,
) -> (usize, usize) {
    let direction = common_line_direction(rot_i, rot_j);
    (
        psi.index_of(in_plane_angle(rot_i, &direction)),
        psi.index_of(in_plane_angle(rot_j, &direction)),
    )
}

/// Common line direction of every pair, in pair-table order.
pub fn common_line_directions(rotations: &[Matrix3<f64>], pairs: &PairTable) -> Vec<Vector3<f64>> {
    pairs
        .iter()
        .map(|&(i, j)| common_line_direction(&rotations[i], &rotations[j]))
        .collect()
}

/// Line index in the sinogram of a projection after adding `psi_index` steps to its
/// in-plane angle: increasing psi moves the common line backwards.
#[inline]
pub fn spin_index(line: usize, psi_index: usize, psi: &PsiSampling) -> usize {
    let n = psi.count();
    (line + n - psi_index % n) % n
}
