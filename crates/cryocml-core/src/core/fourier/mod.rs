//! Discrete Fourier transforms over `rustfft` and the helpers built on top of them:
//! multi-dimensional transforms on row-major buffers, signed frequency indexing and
//! phase-ramp image shifts.

pub mod kaiser_bessel;

use crate::core::image::Image2D;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

pub type Cplx = Complex<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Unnormalised forward transform, `exp(-2*pi*i*k*x/n)`.
    Forward,
    /// Inverse transform divided by the number of samples.
    Inverse,
}

fn plan(planner: &mut FftPlanner<f64>, len: usize, direction: Direction) -> Arc<dyn Fft<f64>> {
    match direction {
        Direction::Forward => planner.plan_fft_forward(len),
        Direction::Inverse => planner.plan_fft_inverse(len),
    }
}

fn transform_axis(data: &mut [Cplx], dims: [usize; 3], axis: usize, fft: &Arc<dyn Fft<f64>>) {
    let [nx, ny, nz] = dims;
    let len = dims[axis];
    if axis == 0 {
        // Rows are contiguous; rustfft transforms every chunk of the buffer.
        fft.process(data);
        return;
    }
    let stride = if axis == 1 { nx } else { nx * ny };
    let (outer_y, outer_z) = if axis == 1 { (1, nz) } else { (ny, 1) };
    let mut line = vec![Cplx::default(); len];
    for z in 0..outer_z {
        for y in 0..outer_y {
            for x in 0..nx {
                let base = x + nx * (y + ny * z);
                for (i, v) in line.iter_mut().enumerate() {
                    *v = data[base + i * stride];
                }
                fft.process(&mut line);
                for (i, v) in line.iter().enumerate() {
                    data[base + i * stride] = *v;
                }
            }
        }
    }
}

/// In-place N-dimensional DFT of a buffer laid out `x` fastest. Unused trailing
/// dimensions are 1.
pub fn fft_nd(data: &mut [Cplx], dims: [usize; 3], direction: Direction) {
    let total: usize = dims.iter().product();
    debug_assert_eq!(data.len(), total);
    if total == 0 {
        return;
    }
    let mut planner = FftPlanner::new();
    for axis in 0..3 {
        if dims[axis] > 1 {
            let fft = plan(&mut planner, dims[axis], direction);
            transform_axis(data, dims, axis, &fft);
        }
    }
    if direction == Direction::Inverse {
        let scale = 1.0 / total as f64;
        data.iter_mut().for_each(|v| *v *= scale);
    }
}

pub fn fft_1d(data: &mut [Cplx], direction: Direction) {
    let n = data.len();
    fft_nd(data, [n, 1, 1], direction);
}

pub fn fft_2d(data: &mut [Cplx], nx: usize, ny: usize, direction: Direction) {
    fft_nd(data, [nx, ny, 1], direction);
}

pub fn fft_3d(data: &mut [Cplx], dims: [usize; 3], direction: Direction) {
    fft_nd(data, dims, direction);
}

/// Signed frequency of DFT bin `index` for a transform of length `n`.
#[inline]
pub fn signed_frequency(index: usize, n: usize) -> isize {
    if index < n.div_ceil(2) {
        index as isize
    } else {
        index as isize - n as isize
    }
}

/// Multiplies a 2-D spectrum by the phase ramp that translates the image by `(sx, sy)`.
pub fn apply_phase_shift(spectrum: &mut [Cplx], nx: usize, ny: usize, sx: f64, sy: f64) {
    if sx == 0.0 && sy == 0.0 {
        return;
    }
    for iy in 0..ny {
        let fy = signed_frequency(iy, ny) as f64 / ny as f64;
        for ix in 0..nx {
            let fx = signed_frequency(ix, nx) as f64 / nx as f64;
            let phase = -2.0 * PI * (fx * sx + fy * sy);
            spectrum[ix + nx * iy] *= Cplx::from_polar(1.0, phase);
        }
    }
}

pub fn to_complex(values: &[f64]) -> Vec<Cplx> {
    values.iter().map(|&v| Cplx::new(v, 0.0)).collect()
}

/// Translates an image by `(sx, sy)` pixels with periodic boundaries.
pub fn shift_image(image: &Image2D, sx: f64, sy: f64) -> Image2D {
    let (nx, ny) = (image.nx(), image.ny());
    let mut spectrum = to_complex(image.data());
    fft_2d(&mut spectrum, nx, ny, Direction::Forward);
    apply_phase_shift(&mut spectrum, nx, ny, sx, sy);
    fft_2d(&mut spectrum, nx, ny, Direction::Inverse);
    Image2D::from_fn(nx, ny, |x, y| spectrum[x + nx * y].re)
}
