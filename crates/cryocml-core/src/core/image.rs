use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ImageError {
    #[error("Buffer of length {len} does not match dimensions {nx}x{ny}x{nz}")]
    BufferSize {
        nx: usize,
        ny: usize,
        nz: usize,
        len: usize,
    },
    #[error("Image dimensions must be non-zero, got {nx}x{ny}x{nz}")]
    EmptyDimensions { nx: usize, ny: usize, nz: usize },
    #[error("Images have different dimensions: {left:?} vs {right:?}")]
    DimensionMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
}

/// A real-valued 2-D image stored row-major (`x` fastest).
#[derive(Debug, Clone, PartialEq)]
pub struct Image2D {
    nx: usize,
    ny: usize,
    data: Vec<f64>,
}

impl Image2D {
    pub fn zeros(nx: usize, ny: usize) -> Self {
        Self {
            nx,
            ny,
            data: vec![0.0; nx * ny],
        }
    }

    pub fn from_vec(nx: usize, ny: usize, data: Vec<f64>) -> Result<Self, ImageError> {
        if nx == 0 || ny == 0 {
            return Err(ImageError::EmptyDimensions { nx, ny, nz: 1 });
        }
        if data.len() != nx * ny {
            return Err(ImageError::BufferSize {
                nx,
                ny,
                nz: 1,
                len: data.len(),
            });
        }
        Ok(Self { nx, ny, data })
    }

    /// Builds an image by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(nx: usize, ny: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(nx * ny);
        for y in 0..ny {
            for x in 0..nx {
                data.push(f(x, y));
            }
        }
        Self { nx, ny, data }
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    #[inline]
    pub fn is_square(&self) -> bool {
        self.nx == self.ny
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[x + self.nx * y]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        self.data[x + self.nx * y] = value;
    }

    pub fn max_abs_diff(&self, other: &Image2D) -> Result<f64, ImageError> {
        if (self.nx, self.ny) != (other.nx, other.ny) {
            return Err(ImageError::DimensionMismatch {
                left: (self.nx, self.ny),
                right: (other.nx, other.ny),
            });
        }
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max))
    }

    /// Mean and population standard deviation of the pixels selected by `mask`.
    ///
    /// Returns `None` when the mask selects no pixel.
    pub fn masked_stats(&self, mask: &[bool]) -> Option<(f64, f64)> {
        let selected: Vec<f64> = self
            .data
            .iter()
            .zip(mask)
            .filter_map(|(&v, &m)| m.then_some(v))
            .collect();
        mean_and_sigma(&selected)
    }

    /// Average of the pixels lying on or outside the circle of radius `nx/2 - 1`.
    pub fn perimeter_mean(&self) -> f64 {
        let cx = (self.nx / 2) as f64;
        let cy = (self.ny / 2) as f64;
        let r = (self.nx.min(self.ny) / 2) as f64 - 1.0;
        let r2 = r * r;
        let mut sum = 0.0;
        let mut count = 0usize;
        for y in 0..self.ny {
            for x in 0..self.nx {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                if dx * dx + dy * dy >= r2 {
                    sum += self.get(x, y);
                    count += 1;
                }
            }
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

/// Annulus mask centred at `(nx/2, ny/2)`: pixels with `inner <= r <= outer`.
///
/// An `outer` radius below one selects `nx/2 - 1`.
pub fn annulus_mask(nx: usize, ny: usize, inner: f64, outer: f64) -> Vec<bool> {
    let outer = if outer < 1.0 {
        (nx / 2) as f64 - 1.0
    } else {
        outer
    };
    let cx = (nx / 2) as f64;
    let cy = (ny / 2) as f64;
    let (r_in2, r_out2) = (inner * inner, outer * outer);
    let mut mask = Vec::with_capacity(nx * ny);
    for y in 0..ny {
        for x in 0..nx {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            let r2 = dx * dx + dy * dy;
            mask.push(r2 <= r_out2 && (inner <= 0.0 || r2 >= r_in2));
        }
    }
    mask
}

pub fn mean_and_sigma(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// A real-valued 3-D volume stored with `x` fastest, then `y`, then `z`.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    nx: usize,
    ny: usize,
    nz: usize,
    data: Vec<f64>,
}

impl Volume {
    pub fn zeros(nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            nx,
            ny,
            nz,
            data: vec![0.0; nx * ny * nz],
        }
    }

    pub fn from_vec(nx: usize, ny: usize, nz: usize, data: Vec<f64>) -> Result<Self, ImageError> {
        if data.len() != nx * ny * nz {
            return Err(ImageError::BufferSize {
                nx,
                ny,
                nz,
                len: data.len(),
            });
        }
        Ok(Self { nx, ny, nz, data })
    }

    pub fn from_fn(
        nx: usize,
        ny: usize,
        nz: usize,
        mut f: impl FnMut(usize, usize, usize) -> f64,
    ) -> Self {
        let mut data = Vec::with_capacity(nx * ny * nz);
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    data.push(f(x, y, z));
                }
            }
        }
        Self { nx, ny, nz, data }
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    #[inline]
    pub fn is_cubic(&self) -> bool {
        self.nx == self.ny && self.ny == self.nz
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f64 {
        self.data[x + self.nx * (y + self.ny * z)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f64) {
        self.data[x + self.nx * (y + self.ny * z)] = value;
    }
}
