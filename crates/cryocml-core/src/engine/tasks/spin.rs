use super::common_lines::{common_line_direction, common_line_indices, spin_index};
use super::sinogram::{Sinogram, line_distance};
use super::weights::LineWeights;
use crate::core::geometry::rotation_from_euler;
use crate::engine::context::{PsiSampling, SearchContext};
use crate::engine::error::EngineError;
use crate::engine::rotations::RotationCache;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Best in-plane angle of one candidate direction and the discrepancy it gives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    pub discrepancy: f64,
    pub psi_index: usize,
}

/// A common line of the projection being spun.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveLine {
    pub pair: usize,
    pub partner: usize,
    /// Line index in the spun projection at `psi = 0`.
    pub own_line: usize,
    pub partner_line: usize,
}

/// Tries every in-plane step of `projection` over the full circle and returns the
/// one with the lowest weighted discrepancy over its active lines. Ties go to the
/// smallest step.
pub fn spin_psi(
    sinograms: &[Sinogram],
    projection: usize,
    active: &[ActiveLine],
    weights: &LineWeights,
    psi: &PsiSampling,
) -> CandidateScore {
    let own = &sinograms[projection];
    let mut best = CandidateScore {
        discrepancy: f64::INFINITY,
        psi_index: 0,
    };
    for step in 0..psi.count() {
        let discrepancy: f64 = active
            .iter()
            .map(|line| {
                let k = spin_index(line.own_line, step, psi);
                weights.get(line.pair)
                    * line_distance(own.line(k), sinograms[line.partner].line(line.partner_line))
            })
            .sum();
        if discrepancy < best.discrepancy {
            best = CandidateScore {
                discrepancy,
                psi_index: step,
            };
        }
    }
    best
}

/// Scores candidate direction `candidate` for `projection`, all other projections
/// staying where they are.
pub fn evaluate_candidate(
    ctx: &SearchContext,
    sinograms: &[Sinogram],
    rotations: &RotationCache,
    projection: usize,
    candidate: usize,
) -> Result<CandidateScore, EngineError> {
    let angle = ctx.candidates.get(candidate).ok_or_else(|| {
        EngineError::Internal(format!("candidate {} out of range", candidate))
    })?;
    let trial = rotation_from_euler(angle.phi, angle.theta, 0.0);
    let rotation_of = |k: usize| {
        if k == projection {
            &trial
        } else {
            rotations.get(k)
        }
    };

    let weights = if ctx.config.use_weights {
        let directions: Vec<_> = ctx
            .pairs
            .iter()
            .map(|&(i, j)| common_line_direction(rotation_of(i), rotation_of(j)))
            .collect();
        LineWeights::compute(true, &directions, &ctx.lattice)
    } else {
        LineWeights::Uniform
    };

    let active: Vec<ActiveLine> = ctx
        .pairs
        .lines_of(projection)
        .map(|(partner, pair)| {
            let (own_line, partner_line) =
                common_line_indices(&trial, rotations.get(partner), &ctx.psi);
            ActiveLine {
                pair,
                partner,
                own_line,
                partner_line,
            }
        })
        .collect();

    Ok(spin_psi(sinograms, projection, &active, &weights, &ctx.psi))
}

/// Scores every candidate of `indices`, returned in the same order.
pub fn evaluate_candidates(
    ctx: &SearchContext,
    sinograms: &[Sinogram],
    rotations: &RotationCache,
    projection: usize,
    indices: &[usize],
) -> Result<Vec<(usize, CandidateScore)>, EngineError> {
    #[cfg(not(feature = "parallel"))]
    let iterator = indices.iter();

    #[cfg(feature = "parallel")]
    let iterator = indices.par_iter();

    iterator
        .map(|&c| {
            evaluate_candidate(ctx, sinograms, rotations, projection, c).map(|score| (c, score))
        })
        .collect()
}
