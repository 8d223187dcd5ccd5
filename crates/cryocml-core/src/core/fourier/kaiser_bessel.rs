use std::f64::consts::PI;

pub const WINDOW_SIZE: usize = 6;
pub const ALPHA: f64 = 1.75;

const TABLE_SIZE: usize = 4096;

/// Tabulated Kaiser–Bessel window used as the gridding interpolation kernel, together
/// with the real-space profile that has to be divided out of the data beforehand.
#[derive(Debug, Clone)]
pub struct KaiserBessel {
    window: usize,
    padded: usize,
    beta: f64,
    table: Vec<f64>,
}

impl KaiserBessel {
    /// Kernel for an axis of `size` samples padded to `padded` samples.
    pub fn new(alpha: f64, window: usize, size: usize, padded: usize) -> Self {
        let beta = 2.0 * PI * alpha * (size as f64 / 2.0) * (window as f64 / (2.0 * padded as f64));
        let half = window as f64 / 2.0;
        let table = (0..=TABLE_SIZE)
            .map(|i| {
                let u = half * i as f64 / TABLE_SIZE as f64;
                let arg = 1.0 - (u / half).powi(2);
                bessel_i0(beta * arg.max(0.0).sqrt())
            })
            .collect();
        Self {
            window,
            padded,
            beta,
            table,
        }
    }

    /// The standard kernel for twofold oversampling of an axis of `size` samples.
    pub fn for_size(size: usize) -> Self {
        Self::new(ALPHA, WINDOW_SIZE, size, 2 * size)
    }

    #[inline]
    pub fn half_width(&self) -> f64 {
        self.window as f64 / 2.0
    }

    #[inline]
    pub fn padded(&self) -> usize {
        self.padded
    }

    #[inline]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Fourier-space window at offset `u` (in padded frequency bins).
    pub fn weight(&self, u: f64) -> f64 {
        let half = self.half_width();
        let u = u.abs();
        if u > half {
            return 0.0;
        }
        let pos = u / half * TABLE_SIZE as f64;
        let i = pos.floor() as usize;
        if i >= TABLE_SIZE {
            return self.table[TABLE_SIZE];
        }
        let frac = pos - i as f64;
        self.table[i] * (1.0 - frac) + self.table[i + 1] * frac
    }

    /// Real-space profile of the window at `x` samples from the origin.
    pub fn apodization(&self, x: f64) -> f64 {
        let k = self.window as f64;
        let t = PI * k * x / self.padded as f64;
        let s = self.beta * self.beta - t * t;
        if s > 0.0 {
            let r = s.sqrt();
            k * r.sinh() / r
        } else if s < 0.0 {
            let r = (-s).sqrt();
            k * r.sin() / r
        } else {
            k
        }
    }

    /// Bins touched by the window centred at `pos`, with their weights.
    pub fn footprint(&self, pos: f64) -> impl Iterator<Item = (isize, f64)> + '_ {
        let half = self.half_width();
        let lo = (pos - half).ceil() as isize;
        let hi = (pos + half).floor() as isize;
        (lo..=hi).map(move |j| (j, self.weight(pos - j as f64)))
    }
}

/// Modified Bessel function of the first kind, order zero, by its power series.
pub fn bessel_i0(x: f64) -> f64 {
    let q = x * x / 4.0;
    let mut term = 1.0;
    let mut sum = 1.0;
    let mut k = 1.0;
    while term > sum * 1e-17 {
        term *= q / (k * k);
        sum += term;
        k += 1.0;
    }
    sum
}
