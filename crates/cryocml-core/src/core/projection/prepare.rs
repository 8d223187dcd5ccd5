use super::{InterpolationMethod, ProjectionError};
use crate::core::fourier::kaiser_bessel::KaiserBessel;
use crate::core::fourier::{Cplx, Direction, fft_2d, fft_3d};
use crate::core::image::{Image2D, Volume};
use std::f64::consts::PI;
use tracing::debug;

const GRIDDING_PADDING: usize = 2;
const MAX_TAPS: usize = 8;

#[derive(Debug, Clone)]
enum Kernels {
    Cubic(KaiserBessel),
    Rectangular([KaiserBessel; 3]),
}

impl Kernels {
    #[inline]
    fn axis(&self, axis: usize) -> &KaiserBessel {
        match self {
            Kernels::Cubic(kb) => kb,
            Kernels::Rectangular(kbs) => &kbs[axis],
        }
    }
}

/// The padded, deapodised spectrum of a volume ready for central-section extraction.
#[derive(Debug, Clone)]
pub struct PreparedVolume {
    method: InterpolationMethod,
    npad: usize,
    original: [usize; 3],
    padded: [usize; 3],
    spectrum: Vec<Cplx>,
    kernels: Option<Kernels>,
}

impl PreparedVolume {
    #[inline]
    pub fn method(&self) -> InterpolationMethod {
        self.method
    }

    #[inline]
    pub fn npad(&self) -> usize {
        self.npad
    }

    #[inline]
    pub fn original_dims(&self) -> [usize; 3] {
        self.original
    }

    #[inline]
    pub fn padded_dims(&self) -> [usize; 3] {
        self.padded
    }

    #[inline]
    pub fn is_cubic(&self) -> bool {
        self.original[0] == self.original[1] && self.original[1] == self.original[2]
    }

    pub fn spectrum(&self) -> &[Cplx] {
        &self.spectrum
    }

    /// The single kernel shared by all axes. Only cubic gridding volumes have one.
    pub fn cubic_kernel(&self) -> Result<&KaiserBessel, ProjectionError> {
        match &self.kernels {
            Some(Kernels::Cubic(kb)) => Ok(kb),
            Some(Kernels::Rectangular(_)) => Err(ProjectionError::NonCubicVolume {
                dims: self.original,
            }),
            None => Err(ProjectionError::MethodMismatch {
                expected: "gridding",
                found: self.method,
            }),
        }
    }

    /// Interpolated spectrum value at `pos`, given in padded frequency bins per axis.
    pub(crate) fn sample(&self, pos: [f64; 3]) -> Cplx {
        let [nx, ny, nz] = self.padded;
        match (&self.kernels, self.method) {
            (Some(kernels), _) => {
                let (tx, cx) = taps(kernels.axis(0), pos[0], nx);
                let (ty, cy) = taps(kernels.axis(1), pos[1], ny);
                let (tz, cz) = taps(kernels.axis(2), pos[2], nz);
                let mut acc = Cplx::default();
                for &(iz, wz) in &tz[..cz] {
                    for &(iy, wy) in &ty[..cy] {
                        let wyz = wy * wz;
                        let row = nx * (iy + ny * iz);
                        for &(ix, wx) in &tx[..cx] {
                            acc += self.spectrum[ix + row] * (wx * wyz);
                        }
                    }
                }
                acc
            }
            (None, InterpolationMethod::NearestNeighbor) => {
                let ix = wrap(pos[0].round() as isize, nx);
                let iy = wrap(pos[1].round() as isize, ny);
                let iz = wrap(pos[2].round() as isize, nz);
                self.spectrum[ix + nx * (iy + ny * iz)]
            }
            (None, _) => {
                let base = pos.map(|p| p.floor());
                let frac = [pos[0] - base[0], pos[1] - base[1], pos[2] - base[2]];
                let mut acc = Cplx::default();
                for corner in 0..8usize {
                    let offs = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
                    let mut w = 1.0;
                    let mut idx = [0usize; 3];
                    for axis in 0..3 {
                        w *= if offs[axis] == 1 {
                            frac[axis]
                        } else {
                            1.0 - frac[axis]
                        };
                        idx[axis] = wrap(base[axis] as isize + offs[axis] as isize, self.padded[axis]);
                    }
                    if w != 0.0 {
                        acc += self.spectrum[idx[0] + nx * (idx[1] + ny * idx[2])] * w;
                    }
                }
                acc
            }
        }
    }
}

#[inline]
pub(crate) fn wrap(index: isize, n: usize) -> usize {
    index.rem_euclid(n as isize) as usize
}

fn taps(kb: &KaiserBessel, pos: f64, n: usize) -> ([(usize, f64); MAX_TAPS], usize) {
    let mut out = [(0usize, 0.0f64); MAX_TAPS];
    let mut count = 0;
    for (j, w) in kb.footprint(pos) {
        if w != 0.0 && count < MAX_TAPS {
            out[count] = (wrap(j, n), w);
            count += 1;
        }
    }
    (out, count)
}

fn sinc(t: f64) -> f64 {
    if t.abs() < 1e-12 {
        1.0
    } else {
        (PI * t).sin() / (PI * t)
    }
}

/// Real-space profile divided out of an axis before the forward transform.
fn axis_profile(
    method: InterpolationMethod,
    kernel: Option<&KaiserBessel>,
    size: usize,
    padded: usize,
) -> Vec<f64> {
    (0..size)
        .map(|i| {
            let c = i as f64 - (size / 2) as f64;
            match (method, kernel) {
                (InterpolationMethod::Gridding, Some(kb)) => kb.apodization(c),
                (InterpolationMethod::Trilinear, _) => sinc(c / padded as f64).powi(2),
                _ => sinc(c / padded as f64),
            }
        })
        .collect()
}

/// Prepares `volume` for Fourier projection with the given interpolation method.
///
/// Gridding requires a padding factor of 2 and works for rectangular volumes
/// (one kernel per axis). Nearest-neighbour and trilinear accept any padding of at
/// least 1 but require a cubic volume.
pub fn prepare_volume(
    volume: &Volume,
    npad: usize,
    method: InterpolationMethod,
) -> Result<PreparedVolume, ProjectionError> {
    let dims = volume.dims();
    if dims.contains(&0) {
        return Err(ProjectionError::EmptyVolume { dims });
    }
    match method {
        InterpolationMethod::Gridding if npad != GRIDDING_PADDING => {
            return Err(ProjectionError::UnsupportedPadding { method, npad });
        }
        InterpolationMethod::NearestNeighbor | InterpolationMethod::Trilinear => {
            if npad == 0 {
                return Err(ProjectionError::UnsupportedPadding { method, npad });
            }
            if !volume.is_cubic() {
                return Err(ProjectionError::NonCubicVolume { dims });
            }
        }
        _ => {}
    }

    let padded = dims.map(|d| d * npad);
    let kernels = (method == InterpolationMethod::Gridding).then(|| {
        if volume.is_cubic() {
            Kernels::Cubic(KaiserBessel::for_size(dims[0]))
        } else {
            Kernels::Rectangular(dims.map(KaiserBessel::for_size))
        }
    });
    let profiles: Vec<Vec<f64>> = (0..3)
        .map(|axis| {
            axis_profile(
                method,
                kernels.as_ref().map(|k| k.axis(axis)),
                dims[axis],
                padded[axis],
            )
        })
        .collect();

    let [nx, ny, nz] = padded;
    let mut spectrum = vec![Cplx::default(); nx * ny * nz];
    for z in 0..dims[2] {
        let iz = wrap(z as isize - (dims[2] / 2) as isize, nz);
        for y in 0..dims[1] {
            let iy = wrap(y as isize - (dims[1] / 2) as isize, ny);
            let pyz = profiles[1][y] * profiles[2][z];
            for x in 0..dims[0] {
                let ix = wrap(x as isize - (dims[0] / 2) as isize, nx);
                let value = volume.get(x, y, z) / (profiles[0][x] * pyz);
                spectrum[ix + nx * (iy + ny * iz)] = Cplx::new(value, 0.0);
            }
        }
    }
    fft_3d(&mut spectrum, padded, Direction::Forward);
    debug!(
        method = %method,
        npad,
        dims = ?dims,
        padded = ?padded,
        "Prepared volume for Fourier projection."
    );

    Ok(PreparedVolume {
        method,
        npad,
        original: dims,
        padded,
        spectrum,
        kernels,
    })
}

/// A square image prepared for 1-D line extraction with gridding.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    size: usize,
    padded: usize,
    kernel: KaiserBessel,
    spectrum: Vec<Cplx>,
}

impl PreparedImage {
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn padded(&self) -> usize {
        self.padded
    }

    pub(crate) fn sample(&self, px: f64, py: f64) -> Cplx {
        let n = self.padded;
        let (tx, cx) = taps(&self.kernel, px, n);
        let (ty, cy) = taps(&self.kernel, py, n);
        let mut acc = Cplx::default();
        for &(iy, wy) in &ty[..cy] {
            for &(ix, wx) in &tx[..cx] {
                acc += self.spectrum[ix + n * iy] * (wx * wy);
            }
        }
        acc
    }
}

/// Subtracts the perimeter average, divides by the kernel profile, pads twofold
/// around the centre and transforms.
pub fn prepare_image(image: &Image2D) -> Result<PreparedImage, ProjectionError> {
    if !image.is_square() {
        return Err(ProjectionError::NonSquareImage {
            nx: image.nx(),
            ny: image.ny(),
        });
    }
    let size = image.nx();
    let padded = GRIDDING_PADDING * size;
    let kernel = KaiserBessel::for_size(size);
    let profile = axis_profile(InterpolationMethod::Gridding, Some(&kernel), size, padded);
    let background = image.perimeter_mean();

    let mut spectrum = vec![Cplx::default(); padded * padded];
    for y in 0..size {
        let iy = wrap(y as isize - (size / 2) as isize, padded);
        for x in 0..size {
            let ix = wrap(x as isize - (size / 2) as isize, padded);
            let value = (image.get(x, y) - background) / (profile[x] * profile[y]);
            spectrum[ix + padded * iy] = Cplx::new(value, 0.0);
        }
    }
    fft_2d(&mut spectrum, padded, padded, Direction::Forward);

    Ok(PreparedImage {
        size,
        padded,
        kernel,
        spectrum,
    })
}
