use nalgebra::{Matrix3, Vector3};

/// Rotation matrix for Euler angles `(phi, theta, psi)` in degrees, ZYZ convention
/// as used by SPIDER: `R = Rz(psi) * Ry(theta) * Rz(phi)`.
///
/// Row 0 and row 1 span the projection plane (image `x` and `y`); row 2 is the
/// projection direction.
pub fn rotation_from_euler(phi: f64, theta: f64, psi: f64) -> Matrix3<f64> {
    let (sp, cp) = phi.to_radians().sin_cos();
    let (st, ct) = theta.to_radians().sin_cos();
    let (ss, cs) = psi.to_radians().sin_cos();
    Matrix3::new(
        cs * ct * cp - ss * sp,
        cs * ct * sp + ss * cp,
        -cs * st,
        -ss * ct * cp - cs * sp,
        -ss * ct * sp + cs * cp,
        ss * st,
        st * cp,
        st * sp,
        ct,
    )
}

#[inline]
pub fn plane_axes(rotation: &Matrix3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    (
        rotation.row(0).transpose().into_owned(),
        rotation.row(1).transpose().into_owned(),
    )
}

#[inline]
pub fn projection_normal(rotation: &Matrix3<f64>) -> Vector3<f64> {
    rotation.row(2).transpose().into_owned()
}

/// Wraps an angle in degrees into `[0, 360)`.
#[inline]
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}
