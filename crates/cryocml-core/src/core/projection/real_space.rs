use super::{Projection, ProjectionError, ProjectionParams};
use crate::core::fourier::shift_image;
use crate::core::geometry::rotation_from_euler;
use crate::core::image::{Image2D, Volume};
use nalgebra::Vector3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Trilinear sample of `volume` at voxel coordinates `p`; zero outside the box.
fn trilinear(volume: &Volume, p: &Vector3<f64>) -> f64 {
    let [nx, ny, nz] = volume.dims();
    let base = p.map(f64::floor);
    let frac = p - base;
    let mut sum = 0.0;
    for dz in 0..2 {
        let wz = if dz == 0 { 1.0 - frac.z } else { frac.z };
        let z = base.z as isize + dz;
        if wz == 0.0 || z < 0 || z as usize >= nz {
            continue;
        }
        for dy in 0..2 {
            let wy = if dy == 0 { 1.0 - frac.y } else { frac.y };
            let y = base.y as isize + dy;
            if wy == 0.0 || y < 0 || y as usize >= ny {
                continue;
            }
            for dx in 0..2 {
                let wx = if dx == 0 { 1.0 - frac.x } else { frac.x };
                let x = base.x as isize + dx;
                if wx == 0.0 || x < 0 || x as usize >= nx {
                    continue;
                }
                sum += wx * wy * wz * volume.get(x as usize, y as usize, z as usize);
            }
        }
    }
    sum
}

/// Real-space projection of a cubic volume: trilinear ray sums along the
/// projection direction, restricted to the sphere of `radius` voxels around the
/// centre `n / 2`. A `radius` of zero or less selects `n / 2 - 1`.
///
/// Non-zero shifts are applied afterwards in Fourier space, and the result is
/// annotated with the inverse shift like the Fourier-section projectors.
pub fn project_real_space(
    volume: &Volume,
    params: &ProjectionParams,
    radius: f64,
) -> Result<Projection, ProjectionError> {
    let dims = volume.dims();
    if dims.contains(&0) {
        return Err(ProjectionError::EmptyVolume { dims });
    }
    if !volume.is_cubic() {
        return Err(ProjectionError::NonCubicVolume { dims });
    }
    let n = dims[0];
    let half = (n / 2) as f64;
    let radius = if radius > 0.0 { radius } else { half - 1.0 };
    let r2 = radius * radius;

    // Rows of the rotation are the image axes and the ray direction in volume space.
    let rotation = rotation_from_euler(params.phi, params.theta, params.psi);
    let axes = [0, 1, 2].map(|r| rotation.row(r).transpose().into_owned());
    let centre = Vector3::repeat(half);
    let depths: Vec<f64> = (0..n).map(|t| t as f64 - half).collect();

    let ray_sum = |x: usize, y: usize| -> f64 {
        let (u, v) = (x as f64 - half, y as f64 - half);
        let in_plane = axes[0] * u + axes[1] * v;
        depths
            .iter()
            .filter(|&&t| u * u + v * v + t * t <= r2)
            .map(|&t| trilinear(volume, &(centre + in_plane + axes[2] * t)))
            .sum()
    };

    let row = |y: usize| -> Vec<f64> { (0..n).map(|x| ray_sum(x, y)).collect() };

    #[cfg(not(feature = "parallel"))]
    let rows: Vec<Vec<f64>> = (0..n).map(row).collect();

    #[cfg(feature = "parallel")]
    let rows: Vec<Vec<f64>> = (0..n).into_par_iter().map(row).collect();

    let image = Image2D::from_vec(n, n, rows.concat())?;

    let image = if params.sx != 0.0 || params.sy != 0.0 {
        shift_image(&image, params.sx, params.sy)
    } else {
        image
    };
    Ok(Projection::annotate(image, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::projection::{InterpolationMethod, prepare_volume, project_gridding};

    fn blob(n: usize, sigma: [f64; 3]) -> Volume {
        let c = (n / 2) as f64;
        Volume::from_fn(n, n, n, |x, y, z| {
            let d = [x as f64 - c, y as f64 - c, z as f64 - c];
            (-(0..3)
                .map(|a| d[a] * d[a] / (2.0 * sigma[a] * sigma[a]))
                .sum::<f64>())
            .exp()
        })
    }

    fn sum_along_z(vol: &Volume) -> Image2D {
        let [nx, ny, nz] = vol.dims();
        Image2D::from_fn(nx, ny, |x, y| (0..nz).map(|z| vol.get(x, y, z)).sum())
    }

    fn max_abs(img: &Image2D) -> f64 {
        img.data().iter().fold(0.0, |m, v| m.max(v.abs()))
    }

    #[test]
    fn identity_projection_is_the_column_sum() {
        let vol = blob(12, [2.0, 1.5, 2.5]);
        let prj = project_real_space(&vol, &ProjectionParams::default(), 100.0).unwrap();
        let expected = sum_along_z(&vol);
        assert!(prj.image.max_abs_diff(&expected).unwrap() < 1e-12);
        assert_eq!(prj.params, ProjectionParams::default());
    }

    #[test]
    fn pixels_outside_the_radius_stay_empty() {
        let vol = Volume::from_fn(16, 16, 16, |_, _, _| 1.0);
        let prj = project_real_space(&vol, &ProjectionParams::angles(20.0, 35.0, 10.0), 4.0)
            .unwrap();
        assert_eq!(prj.image.get(0, 0), 0.0);
        assert_eq!(prj.image.get(8, 14), 0.0);
        // The central ray crosses the whole sphere: 2 * 4 + 1 samples.
        assert!((prj.image.get(8, 8) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn default_radius_keeps_the_inscribed_sphere() {
        let vol = Volume::from_fn(16, 16, 16, |_, _, _| 1.0);
        let prj = project_real_space(&vol, &ProjectionParams::default(), 0.0).unwrap();
        assert!((prj.image.get(8, 8) - 15.0).abs() < 1e-12);
        assert_eq!(prj.image.get(8, 0), 0.0);
    }

    #[test]
    fn oblique_projection_agrees_with_gridding() {
        let vol = blob(20, [2.5, 2.5, 2.5]);
        let params = ProjectionParams::angles(30.0, 50.0, 70.0);
        let real = project_real_space(&vol, &params, 100.0).unwrap();
        let prepared = prepare_volume(&vol, 2, InterpolationMethod::Gridding).unwrap();
        let fourier = project_gridding(&prepared, &params).unwrap();
        let err = real.image.max_abs_diff(&fourier.image).unwrap();
        assert!(err < 0.06 * max_abs(&fourier.image), "error {err}");
    }

    #[test]
    fn shift_is_applied_and_recorded_inverted() {
        let vol = blob(16, [2.0, 2.0, 2.0]);
        let plain = project_real_space(&vol, &ProjectionParams::angles(0.0, 30.0, 0.0), 0.0)
            .unwrap();
        let params = ProjectionParams::new(0.0, 30.0, 0.0, 2.0, -1.0);
        let shifted = project_real_space(&vol, &params, 0.0).unwrap();
        let reference = shift_image(&plain.image, 2.0, -1.0);
        assert!(shifted.image.max_abs_diff(&reference).unwrap() < 1e-9);
        assert_eq!((shifted.params.sx, shifted.params.sy), (-2.0, 1.0));
    }

    #[test]
    fn rectangular_volumes_are_rejected() {
        let vol = Volume::zeros(8, 8, 6);
        assert!(matches!(
            project_real_space(&vol, &ProjectionParams::default(), 0.0),
            Err(ProjectionError::NonCubicVolume { .. })
        ));
    }
}
