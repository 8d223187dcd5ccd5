use super::common_lines::{common_line_directions, common_line_indices};
use super::sinogram::{Sinogram, line_distance};
use super::weights::LineWeights;
use crate::engine::context::{PairTable, PsiSampling, SearchContext};
use crate::engine::error::EngineError;
use crate::engine::rotations::RotationCache;
use crate::engine::state::OrientationSet;
use nalgebra::Matrix3;
use tracing::instrument;

/// Weighted sum over all pairs of the squared distance between the two sinogram
/// lines along their common line.
pub fn weighted_discrepancy(
    pairs: &PairTable,
    sinograms: &[Sinogram],
    rotations: &[Matrix3<f64>],
    psi: &PsiSampling,
    weights: &LineWeights,
) -> f64 {
    pairs
        .iter()
        .enumerate()
        .map(|(p, &(i, j))| {
            let (ki, kj) = common_line_indices(&rotations[i], &rotations[j], psi);
            weights.get(p) * line_distance(sinograms[i].line(ki), sinograms[j].line(kj))
        })
        .sum()
}

/// Discrepancy of the current orientations, weighted as configured.
#[instrument(skip_all, name = "discrepancy_task")]
pub fn total_discrepancy(
    ctx: &SearchContext,
    sinograms: &[Sinogram],
    rotations: &RotationCache,
) -> f64 {
    let rotations = rotations.as_slice();
    let weights = if ctx.config.use_weights {
        let directions = common_line_directions(rotations, &ctx.pairs);
        LineWeights::compute(true, &directions, &ctx.lattice)
    } else {
        LineWeights::Uniform
    };
    weighted_discrepancy(&ctx.pairs, sinograms, rotations, &ctx.psi, &weights)
}

/// Discrepancy of an arbitrary orientation set against the sinograms of `ctx`'s
/// projections.
pub fn orientation_discrepancy(
    ctx: &SearchContext,
    sinograms: &[Sinogram],
    orientations: &OrientationSet,
) -> Result<f64, EngineError> {
    let n = ctx.n_projections();
    if sinograms.len() != n || orientations.len() != n {
        return Err(EngineError::Initialization(format!(
            "{} sinograms and {} orientations for {} projections",
            sinograms.len(),
            orientations.len(),
            n
        )));
    }
    Ok(total_discrepancy(
        ctx,
        sinograms,
        &RotationCache::from_orientations(orientations),
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::angles::CandidateAngle;
    use crate::core::fourier::Cplx;
    use crate::core::geometry::rotation_from_euler;
    use crate::core::image::Volume;
    use crate::core::projection::{
        InterpolationMethod, ProjectionParams, prepare_volume, project_gridding,
    };
    use crate::engine::config::{SearchConfig, SearchConfigBuilder, SinogramParamsBuilder};
    use crate::engine::progress::ProgressReporter;
    use crate::engine::state::Orientation;
    use crate::engine::tasks::sinogram;
    use crate::engine::tasks::weights::{HemisphereLattice, pair_weights};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    pub(crate) fn random_sinograms(n: usize, psi: &PsiSampling, width: usize, seed: u64) -> Vec<Sinogram> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let rows = (0..psi.half() * width)
                    .map(|_| Cplx::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)))
                    .collect();
                Sinogram::from_rows(psi.half(), width, rows).unwrap()
            })
            .collect()
    }

    fn rotations(angles: &[(f64, f64, f64)]) -> Vec<Matrix3<f64>> {
        angles
            .iter()
            .map(|&(phi, theta, psi)| rotation_from_euler(phi, theta, psi))
            .collect()
    }

    const ANGLES: [(f64, f64, f64); 4] = [
        (12.0, 33.0, 5.0),
        (140.0, 71.0, 200.0),
        (250.0, 118.0, 47.0),
        (310.0, 20.0, 300.0),
    ];

    #[test]
    fn relabelling_projections_keeps_the_discrepancy() {
        let psi = PsiSampling::new(5.0);
        let pairs = PairTable::new(4);
        let lattice = HemisphereLattice::default();
        let sinos = random_sinograms(4, &psi, 6, 7);
        let rots = rotations(&ANGLES);

        let perm = [2, 0, 3, 1];
        let mut sinos_p = sinos.clone();
        let mut rots_p = rots.clone();
        for (new, &old) in perm.iter().enumerate() {
            sinos_p[new] = sinos[old].clone();
            rots_p[new] = rots[old];
        }

        let uniform = weighted_discrepancy(&pairs, &sinos, &rots, &psi, &LineWeights::Uniform);
        let uniform_p =
            weighted_discrepancy(&pairs, &sinos_p, &rots_p, &psi, &LineWeights::Uniform);
        assert!((uniform - uniform_p).abs() <= 1e-9 * uniform);

        let weighted = LineWeights::Voronoi(pair_weights(
            &common_line_directions(&rots, &pairs),
            &lattice,
        ));
        let weighted_p = LineWeights::Voronoi(pair_weights(
            &common_line_directions(&rots_p, &pairs),
            &lattice,
        ));
        let a = weighted_discrepancy(&pairs, &sinos, &rots, &psi, &weighted);
        let b = weighted_discrepancy(&pairs, &sinos_p, &rots_p, &psi, &weighted_p);
        assert!((a - b).abs() <= 1e-9 * a.max(1e-300));
    }

    #[test]
    fn disabled_weights_equal_unit_weights() {
        let psi = PsiSampling::new(10.0);
        let pairs = PairTable::new(4);
        let sinos = random_sinograms(4, &psi, 5, 11);
        let rots = rotations(&ANGLES);
        let uniform = weighted_discrepancy(&pairs, &sinos, &rots, &psi, &LineWeights::Uniform);
        let ones = LineWeights::Voronoi(vec![1.0; pairs.len()]);
        assert_eq!(
            uniform,
            weighted_discrepancy(&pairs, &sinos, &rots, &psi, &ones)
        );
    }

    #[test]
    fn identical_projections_with_one_orientation_have_zero_discrepancy() {
        let psi = PsiSampling::new(10.0);
        let pairs = PairTable::new(3);
        let one = random_sinograms(1, &psi, 5, 3).remove(0);
        let sinos = vec![one.clone(), one.clone(), one];
        let rots = rotations(&[(40.0, 60.0, 10.0); 3]);
        assert_eq!(
            weighted_discrepancy(&pairs, &sinos, &rots, &psi, &LineWeights::Uniform),
            0.0
        );
    }

    const TRUE_ANGLES: [(f64, f64, f64); 5] = [
        (10.0, 20.0, 30.0),
        (80.0, 60.0, 200.0),
        (150.0, 100.0, 45.0),
        (250.0, 40.0, 300.0),
        (320.0, 130.0, 120.0),
    ];

    fn four_blobs() -> Volume {
        let blobs = [
            ([16.0, 16.0, 16.0], 2.5, 1.0),
            ([22.0, 14.0, 17.0], 1.5, 0.8),
            ([12.0, 21.0, 13.0], 2.0, 0.6),
            ([15.0, 12.0, 23.0], 1.2, 1.2),
        ];
        Volume::from_fn(32, 32, 32, |x, y, z| {
            blobs
                .iter()
                .map(|&(c, sigma, amp)| {
                    let d2 = (x as f64 - c[0]).powi(2)
                        + (y as f64 - c[1]).powi(2)
                        + (z as f64 - c[2]).powi(2);
                    amp * (-d2 / (2.0 * sigma * sigma)).exp()
                })
                .sum()
        })
    }

    fn unweighted_config() -> SearchConfig {
        SearchConfigBuilder::new()
            .delta(15.0)
            .psi_step(2.0)
            .max_iterations(1)
            .seed(0)
            .use_weights(false)
            .candidates(vec![CandidateAngle { phi: 0.0, theta: 0.0 }])
            .build()
            .unwrap()
    }

    fn orientations(angles: &[(f64, f64, f64)]) -> OrientationSet {
        OrientationSet::from_vec(
            angles
                .iter()
                .map(|&(phi, theta, psi)| Orientation::new(phi, theta, psi, None))
                .collect(),
        )
    }

    #[test]
    fn projections_of_a_volume_agree_only_at_their_true_orientations() {
        let prepared = prepare_volume(&four_blobs(), 2, InterpolationMethod::Gridding).unwrap();
        let images: Vec<_> = TRUE_ANGLES
            .iter()
            .map(|&(phi, theta, psi)| {
                project_gridding(&prepared, &ProjectionParams::angles(phi, theta, psi))
                    .unwrap()
                    .image
            })
            .collect();

        let cfg = unweighted_config();
        let reporter = ProgressReporter::new();
        let ctx = SearchContext::new(&cfg, &reporter, images.len());
        let params = SinogramParamsBuilder::new()
            .outer_radius(0.0)
            .low_freq(0.0)
            .high_freq(0.5)
            .build()
            .unwrap();
        let sinos = sinogram::run(&images, &params, &ctx.psi).unwrap();

        let truth = orientation_discrepancy(&ctx, &sinos, &orientations(&TRUE_ANGLES)).unwrap();
        assert!(truth.is_finite());

        for k in 0..TRUE_ANGLES.len() {
            for offset in [30.0, 90.0, 180.0] {
                let mut wrong = TRUE_ANGLES;
                wrong[k].2 += offset;
                let d = orientation_discrepancy(&ctx, &sinos, &orientations(&wrong)).unwrap();
                assert!(
                    d > 5.0 * truth,
                    "projection {k} with psi offset {offset}: {d} vs true {truth}"
                );
            }
        }

        let mirrored: Vec<_> = TRUE_ANGLES
            .iter()
            .map(|&(phi, theta, psi)| (phi, theta, -psi))
            .collect();
        let d = orientation_discrepancy(&ctx, &sinos, &orientations(&mirrored)).unwrap();
        assert!(d > 5.0 * truth, "mirrored psi: {d} vs true {truth}");
    }

    #[test]
    fn orientation_discrepancy_checks_the_projection_count() {
        let cfg = unweighted_config();
        let reporter = ProgressReporter::new();
        let ctx = SearchContext::new(&cfg, &reporter, 3);
        let sinos = random_sinograms(3, &ctx.psi, 4, 2);
        assert!(matches!(
            orientation_discrepancy(&ctx, &sinos, &OrientationSet::unassigned(2)),
            Err(EngineError::Initialization(_))
        ));
        let same = orientations(&[(40.0, 60.0, 10.0); 3]);
        let d = orientation_discrepancy(&ctx, &sinos, &same).unwrap();
        assert_eq!(d, total_discrepancy(&ctx, &sinos, &RotationCache::from_orientations(&same)));
    }
}
