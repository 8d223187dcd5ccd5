use crate::core::fourier::{Cplx, Direction, fft_1d, shift_image};
use crate::core::image::{Image2D, annulus_mask, mean_and_sigma};
use crate::core::projection::{ProjectionParams, extract_line, prepare_image};
use crate::engine::config::SinogramParams;
use crate::engine::context::PsiSampling;
use crate::engine::error::EngineError;
use crate::engine::state::OrientationSet;
use std::ops::RangeInclusive;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Band-limited Fourier transforms of the Radon lines of one projection over
/// `[0, 180)` degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Sinogram {
    half: usize,
    width: usize,
    rows: Vec<Cplx>,
}

/// A sinogram line over the full circle: lines past 180 degrees are the conjugates
/// of the stored ones.
#[derive(Debug, Clone, Copy)]
pub struct LineView<'a> {
    data: &'a [Cplx],
    conjugate: bool,
}

impl<'a> LineView<'a> {
    pub fn iter(&self) -> impl Iterator<Item = Cplx> + 'a {
        let conjugate = self.conjugate;
        self.data
            .iter()
            .map(move |&v| if conjugate { v.conj() } else { v })
    }

    #[inline]
    pub fn is_conjugate(&self) -> bool {
        self.conjugate
    }
}

impl Sinogram {
    pub fn from_rows(half: usize, width: usize, rows: Vec<Cplx>) -> Option<Self> {
        (rows.len() == half * width).then_some(Self { half, width, rows })
    }

    #[inline]
    pub fn half(&self) -> usize {
        self.half
    }

    /// Number of retained Fourier coefficients per line.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn row(&self, index: usize) -> &[Cplx] {
        &self.rows[index * self.width..(index + 1) * self.width]
    }

    /// Line `index` of `[0, 2 * half)`, wrapping around the circle.
    #[inline]
    pub fn line(&self, index: usize) -> LineView<'_> {
        let k = index % (2 * self.half);
        if k < self.half {
            LineView {
                data: self.row(k),
                conjugate: false,
            }
        } else {
            LineView {
                data: self.row(k - self.half),
                conjugate: true,
            }
        }
    }
}

/// Squared Euclidean distance between two lines.
pub fn line_distance(a: LineView<'_>, b: LineView<'_>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).norm_sqr()).sum()
}

/// Diameter in pixels of the region kept from every Radon line.
pub fn line_diameter(nx: usize, outer_radius: f64) -> usize {
    let outer = if outer_radius < 1.0 {
        (nx / 2) as f64 - 1.0
    } else {
        outer_radius
    };
    ((2.0 * outer) as usize).clamp(1, nx)
}

/// Retained coefficient range of a line of `length` samples.
pub fn frequency_band(
    length: usize,
    params: &SinogramParams,
) -> Result<RangeInclusive<usize>, EngineError> {
    let lo = (params.low_freq * length as f64).floor() as usize;
    let hi = ((params.high_freq * length as f64).floor() as usize).min(length / 2);
    if lo > hi {
        return Err(EngineError::InvalidBand {
            low: params.low_freq,
            high: params.high_freq,
            length,
        });
    }
    Ok(lo..=hi)
}

fn normalize_under_mask(
    index: usize,
    image: &Image2D,
    params: &SinogramParams,
) -> Result<Image2D, EngineError> {
    let mask = annulus_mask(image.nx(), image.ny(), params.inner_radius, params.outer_radius);
    let (mean, sigma) = image
        .masked_stats(&mask)
        .ok_or(EngineError::ZeroVariance { index })?;
    if sigma <= f64::EPSILON * mean.abs().max(1.0) {
        return Err(EngineError::ZeroVariance { index });
    }
    let data = image
        .data()
        .iter()
        .zip(&mask)
        .map(|(&v, &m)| if m { (v - mean) / sigma } else { 0.0 })
        .collect();
    Ok(Image2D::from_vec(image.nx(), image.ny(), data)?)
}

/// Builds the sinogram of projection `index`.
pub fn build_sinogram(
    index: usize,
    image: &Image2D,
    params: &SinogramParams,
    psi: &PsiSampling,
) -> Result<Sinogram, EngineError> {
    if !image.is_square() {
        return Err(EngineError::NonSquareImage {
            index,
            nx: image.nx(),
            ny: image.ny(),
        });
    }
    let normalized = normalize_under_mask(index, image, params)?;
    let prepared = prepare_image(&normalized)?;

    let size = image.nx();
    let diameter = line_diameter(size, params.outer_radius);
    let band = frequency_band(diameter, params)?;
    let width = band.end() - band.start() + 1;
    let half = psi.half();

    let mut rows = Vec::with_capacity(half * width);
    let mut values = vec![0.0; diameter];
    for j in 0..half {
        let line = extract_line(&prepared, psi.angle(j), 0.0);
        // Centre of the line goes to sample 0 of the transform.
        for i in 0..diameter {
            let c = i as isize - (diameter / 2) as isize;
            let src = (c + (size / 2) as isize) as usize;
            values[c.rem_euclid(diameter as isize) as usize] = line[src];
        }
        let (mean, sigma) = mean_and_sigma(&values).unwrap_or((0.0, 0.0));
        let scale = if sigma > 0.0 { 1.0 / sigma } else { 0.0 };
        let mut segment: Vec<Cplx> = values
            .iter()
            .map(|&v| Cplx::new((v - mean) * scale, 0.0))
            .collect();
        fft_1d(&mut segment, Direction::Forward);
        rows.extend_from_slice(&segment[band.clone()]);
    }

    Ok(Sinogram { half, width, rows })
}

/// Builds the sinogram of projection `index` after translating it by `(sx, sy)`.
pub fn build_sinogram_shifted(
    index: usize,
    image: &Image2D,
    shift: (f64, f64),
    params: &SinogramParams,
    psi: &PsiSampling,
) -> Result<Sinogram, EngineError> {
    if shift == (0.0, 0.0) {
        return build_sinogram(index, image, params, psi);
    }
    let shifted = shift_image(image, shift.0, shift.1);
    build_sinogram(index, &shifted, params, psi)
}

/// Builds the sinograms of a projection set.
#[instrument(skip_all, name = "sinogram_task")]
pub fn run(
    images: &[Image2D],
    params: &SinogramParams,
    psi: &PsiSampling,
) -> Result<Vec<Sinogram>, EngineError> {
    if let Some(first) = images.first() {
        if let Some((index, image)) = images
            .iter()
            .enumerate()
            .find(|(_, img)| (img.nx(), img.ny()) != (first.nx(), first.ny()))
        {
            return Err(EngineError::Initialization(format!(
                "projection {} is {}x{}, expected {}x{} like projection 0",
                index,
                image.nx(),
                image.ny(),
                first.nx(),
                first.ny()
            )));
        }
    }

    #[cfg(not(feature = "parallel"))]
    let iterator = images.iter().enumerate();

    #[cfg(feature = "parallel")]
    let iterator = images.par_iter().enumerate();

    let sinograms = iterator
        .map(|(index, image)| build_sinogram(index, image, params, psi))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        count = sinograms.len(),
        lines = psi.half(),
        width = sinograms.first().map_or(0, |s| s.width()),
        "Sinograms built."
    );
    Ok(sinograms)
}

/// Sinograms of a projection stack and its starting orientations: the prior angles
/// when given, unassigned otherwise.
pub fn open_projections(
    images: &[Image2D],
    priors: Option<&[ProjectionParams]>,
    params: &SinogramParams,
    psi: &PsiSampling,
) -> Result<(Vec<Sinogram>, OrientationSet), EngineError> {
    let orientations = match priors {
        Some(priors) if priors.len() != images.len() => {
            return Err(EngineError::Initialization(format!(
                "{} prior orientations for {} projections",
                priors.len(),
                images.len()
            )));
        }
        Some(priors) => OrientationSet::from_params(priors),
        None => OrientationSet::unassigned(images.len()),
    };
    Ok((run(images, params, psi)?, orientations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::SinogramParamsBuilder;

    fn params() -> SinogramParams {
        SinogramParamsBuilder::new()
            .outer_radius(0.0)
            .low_freq(0.0)
            .high_freq(0.5)
            .build()
            .unwrap()
    }

    fn blob(n: usize, cx: f64, cy: f64) -> Image2D {
        Image2D::from_fn(n, n, |x, y| {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            (-(dx * dx / 3.0 + dy * dy / 8.0)).exp()
        })
    }

    #[test]
    fn sinogram_has_one_row_per_stored_angle() {
        let psi = PsiSampling::new(10.0);
        let sino = build_sinogram(0, &blob(16, 8.0, 8.0), &params(), &psi).unwrap();
        assert_eq!(sino.half(), 18);
        // Diameter 14 keeps coefficients 0..=7.
        assert_eq!(sino.width(), 8);
        assert_eq!(sino.row(17).len(), 8);
    }

    #[test]
    fn lines_past_180_degrees_are_conjugates() {
        let psi = PsiSampling::new(30.0);
        let sino = build_sinogram(0, &blob(16, 7.0, 9.0), &params(), &psi).unwrap();
        let direct: Vec<Cplx> = sino.line(1).iter().collect();
        let mirrored: Vec<Cplx> = sino.line(1 + sino.half()).iter().collect();
        assert!(sino.line(1 + sino.half()).is_conjugate());
        for (a, b) in direct.iter().zip(&mirrored) {
            assert_eq!(*a, b.conj());
        }
        assert_eq!(line_distance(sino.line(2), sino.line(2 + 2 * sino.half())), 0.0);
    }

    #[test]
    fn normalised_lines_have_zero_mean_and_unit_power() {
        let psi = PsiSampling::new(45.0);
        let sino = build_sinogram(0, &blob(16, 8.0, 8.0), &params(), &psi).unwrap();
        for j in 0..sino.half() {
            let row = sino.row(j);
            assert!(row[0].norm() < 1e-9);
            let power: f64 = row.iter().map(|v| v.norm_sqr()).sum();
            assert!(power > 0.0);
        }
    }

    #[test]
    fn constant_image_has_zero_variance() {
        let psi = PsiSampling::new(10.0);
        let flat = Image2D::from_fn(16, 16, |_, _| 3.0);
        assert!(matches!(
            build_sinogram(4, &flat, &params(), &psi),
            Err(EngineError::ZeroVariance { index: 4 })
        ));
    }

    #[test]
    fn rectangular_image_is_rejected() {
        let psi = PsiSampling::new(10.0);
        let img = Image2D::zeros(16, 12);
        assert!(matches!(
            build_sinogram(1, &img, &params(), &psi),
            Err(EngineError::NonSquareImage { index: 1, .. })
        ));
    }

    #[test]
    fn empty_band_is_rejected() {
        let band = SinogramParamsBuilder::new()
            .outer_radius(0.0)
            .low_freq(0.01)
            .high_freq(0.02)
            .build()
            .unwrap();
        assert!(matches!(
            frequency_band(10, &band),
            Err(EngineError::InvalidBand { length: 10, .. })
        ));
        assert_eq!(frequency_band(14, &params()).unwrap(), 0..=7);
    }

    #[test]
    fn shifted_sinogram_matches_sinogram_of_shifted_image() {
        let psi = PsiSampling::new(20.0);
        let img = blob(16, 8.0, 8.0);
        let a = build_sinogram_shifted(0, &img, (1.0, -1.0), &params(), &psi).unwrap();
        let b = build_sinogram(0, &shift_image(&img, 1.0, -1.0), &params(), &psi).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn run_rejects_mixed_sizes() {
        let psi = PsiSampling::new(10.0);
        let images = vec![blob(16, 8.0, 8.0), blob(12, 6.0, 6.0)];
        assert!(matches!(
            run(&images, &params(), &psi),
            Err(EngineError::Initialization(_))
        ));
    }

    #[test]
    fn open_projections_takes_priors_or_starts_unassigned() {
        let psi = PsiSampling::new(30.0);
        let images = vec![blob(16, 8.0, 8.0), blob(16, 7.0, 8.0)];
        let (sinos, start) = open_projections(&images, None, &params(), &psi).unwrap();
        assert_eq!(sinos.len(), 2);
        assert_eq!(start, OrientationSet::unassigned(2));

        let priors = vec![
            ProjectionParams::angles(10.0, 20.0, 30.0),
            ProjectionParams::angles(40.0, 50.0, 60.0),
        ];
        let (_, start) = open_projections(&images, Some(&priors), &params(), &psi).unwrap();
        assert_eq!(start.get(1).theta, 50.0);
        assert!(matches!(
            open_projections(&images, Some(&priors[..1]), &params(), &psi),
            Err(EngineError::Initialization(_))
        ));
    }
}
