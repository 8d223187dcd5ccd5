use super::config::SearchConfig;
use super::progress::ProgressReporter;
use super::tasks::weights::HemisphereLattice;
use crate::core::angles::CandidateAngles;
use itertools::Itertools;
use tracing::warn;

const DIVISORS_OF_180: [f64; 18] = [
    1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 9.0, 10.0, 12.0, 15.0, 18.0, 20.0, 30.0, 36.0, 45.0, 60.0, 90.0,
    180.0,
];

/// Replaces an in-plane step that does not divide 180 degrees by the nearest one that
/// does: an integer divisor of 180 for steps of at least one degree (ties resolve to
/// the smaller divisor), `180 / round(180 / step)` below that.
pub fn normalize_psi_step(requested: f64) -> f64 {
    let ratio = 180.0 / requested;
    if (ratio - ratio.round()).abs() < 1e-9 {
        return 180.0 / ratio.round();
    }
    if requested >= 1.0 {
        DIVISORS_OF_180
            .iter()
            .copied()
            .min_by(|a, b| {
                (a - requested)
                    .abs()
                    .total_cmp(&(b - requested).abs())
                    .then(a.total_cmp(b))
            })
            .unwrap_or(1.0)
    } else {
        180.0 / ratio.round()
    }
}

/// In-plane angular sampling: `half` lines cover `[0, 180)`, their conjugates cover
/// `[180, 360)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsiSampling {
    step: f64,
    half: usize,
}

impl PsiSampling {
    pub fn new(requested_step: f64) -> Self {
        let step = normalize_psi_step(requested_step);
        if (step - requested_step).abs() > 1e-12 {
            warn!(
                requested = requested_step,
                used = step,
                "In-plane step does not divide 180 degrees; using the nearest divisor."
            );
        }
        Self {
            step,
            half: (180.0 / step).round() as usize,
        }
    }

    #[inline]
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Number of stored sinogram lines.
    #[inline]
    pub fn half(&self) -> usize {
        self.half
    }

    /// Number of line indices over the full circle.
    #[inline]
    pub fn count(&self) -> usize {
        2 * self.half
    }

    #[inline]
    pub fn angle(&self, index: usize) -> f64 {
        index as f64 * self.step
    }

    /// Nearest line index of an angle in degrees, wrapped to the full circle.
    #[inline]
    pub fn index_of(&self, angle: f64) -> usize {
        let n = self.count() as i64;
        ((angle / self.step).round() as i64).rem_euclid(n) as usize
    }
}

/// One entry per unordered projection pair `(i, j)` with `i < j`, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairTable {
    n: usize,
    pairs: Vec<(usize, usize)>,
}

impl PairTable {
    pub fn new(n: usize) -> Self {
        let pairs = (0..n).tuple_combinations().collect();
        Self { n, pairs }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[inline]
    pub fn projections(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, index: usize) -> (usize, usize) {
        self.pairs[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, usize)> {
        self.pairs.iter()
    }

    /// Index of the pair formed by `i` and `j` in either order.
    pub fn index_of(&self, i: usize, j: usize) -> Option<usize> {
        if i == j || i >= self.n || j >= self.n {
            return None;
        }
        let (a, b) = if i < j { (i, j) } else { (j, i) };
        Some(a * self.n - a * (a + 1) / 2 + (b - a - 1))
    }

    /// `(partner, pair index)` of every pair involving projection `k`, ordered by
    /// partner.
    pub fn lines_of(&self, k: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.n).filter_map(move |j| self.index_of(k, j).map(|pair| (j, pair)))
    }
}

/// Everything the search needs besides the mutable orientation state.
pub struct SearchContext<'a> {
    pub config: &'a SearchConfig,
    pub reporter: &'a ProgressReporter<'a>,
    pub candidates: CandidateAngles,
    pub pairs: PairTable,
    pub psi: PsiSampling,
    pub lattice: HemisphereLattice,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        config: &'a SearchConfig,
        reporter: &'a ProgressReporter<'a>,
        n_projections: usize,
    ) -> Self {
        let candidates = match &config.candidates {
            Some(list) => CandidateAngles::from_vec(list.clone()),
            None => CandidateAngles::even(config.delta),
        };
        Self {
            config,
            reporter,
            candidates,
            pairs: PairTable::new(n_projections),
            psi: PsiSampling::new(config.psi_step),
            lattice: HemisphereLattice::default(),
        }
    }

    #[inline]
    pub fn n_projections(&self) -> usize {
        self.pairs.projections()
    }
}
