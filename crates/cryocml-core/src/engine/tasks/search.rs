use super::discrepancy::total_discrepancy;
use super::sinogram::Sinogram;
use super::spin::{CandidateScore, evaluate_candidates};
use crate::engine::comm::{Choice, Collective};
use crate::engine::config::SearchConfig;
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::occupancy::SlotTable;
use crate::engine::progress::Progress;
use crate::engine::report::AngleReport;
use crate::engine::rotations::RotationCache;
use crate::engine::state::{Orientation, OrientationSet, SearchOutcome, StopReason};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument, trace, warn};

/// Consecutive period-two repeats of the discrepancy that stop the search.
const OSCILLATION_THRESHOLD: usize = 2;

/// Lowest discrepancy among the examined candidates, first in candidate order on
/// ties.
pub fn select_best(scores: &[Option<CandidateScore>]) -> Choice {
    let mut best: Option<(usize, CandidateScore)> = None;
    for (slot, score) in scores.iter().enumerate() {
        if let Some(score) = score {
            if best.is_none_or(|(_, b)| score.discrepancy < b.discrepancy) {
                best = Some((slot, *score));
            }
        }
    }
    best.map(|(slot, score)| (slot, score.psi_index))
}

fn claim_priors(
    orientations: &OrientationSet,
    slots: &mut SlotTable,
) -> Result<(), EngineError> {
    for (i, o) in orientations.iter().enumerate() {
        if let Some(slot) = o.slot {
            if !slots.claim(slot, i) {
                return Err(EngineError::Initialization(format!(
                    "projection {} cannot take candidate {}: {}",
                    i,
                    slot,
                    match slots.owner(slot) {
                        Some(owner) => format!("already held by projection {}", owner),
                        None => format!("only {} candidates exist", slots.capacity()),
                    }
                )));
            }
        }
    }
    Ok(())
}

/// Greedy coordinate descent over the candidate directions. Every replica of a
/// distributed run calls this with the same arguments; `comm` keeps them in step.
#[instrument(skip_all, name = "search_task", fields(rank = comm.rank()))]
pub fn find_structure<C: Collective>(
    ctx: &SearchContext,
    sinograms: &[Sinogram],
    initial: OrientationSet,
    comm: &mut C,
    report: &mut AngleReport,
) -> Result<SearchOutcome, EngineError> {
    let n = ctx.n_projections();
    if sinograms.len() != n || initial.len() != n {
        return Err(EngineError::Initialization(format!(
            "{} sinograms and {} orientations for {} projections",
            sinograms.len(),
            initial.len(),
            n
        )));
    }
    if ctx.candidates.is_empty() {
        return Err(EngineError::Initialization(
            "no candidate directions to search".to_string(),
        ));
    }

    let coordinator = comm.is_coordinator();
    let mut orientations = initial;
    let mut slots = SlotTable::new(ctx.candidates.len());
    claim_priors(&orientations, &mut slots)?;

    let projections: Vec<usize> = if ctx.config.first_zero && n > 0 {
        if let Some(slot) = orientations.get(0).slot {
            slots.release(slot);
        }
        if let Some(owner) = slots.owner(0) {
            let mut displaced = *orientations.get(owner);
            displaced.slot = None;
            orientations.set(owner, displaced);
            slots.release(0);
        }
        let anchor = *ctx
            .candidates
            .get(0)
            .ok_or_else(|| EngineError::Internal("no anchor candidate".to_string()))?;
        orientations.set(0, Orientation::new(anchor.phi, anchor.theta, 0.0, Some(0)));
        if !slots.claim(0, 0) {
            return Err(EngineError::Internal(
                "anchor candidate is not free".to_string(),
            ));
        }
        (1..n).collect()
    } else {
        (0..n).collect()
    };

    let mut rotations = RotationCache::from_orientations(&orientations);
    let mut rng = StdRng::seed_from_u64(ctx.config.seed);
    let mut history = [0.0f64; 3];
    let mut period_count = 0;
    let mut discrepancy = total_discrepancy(ctx, sinograms, &rotations);
    let mut iterations = 0;
    let mut stop_reason = StopReason::IterationLimit;

    info!(
        projections = n,
        candidates = ctx.candidates.len(),
        psi_step = ctx.psi.step(),
        workers = comm.size(),
        "Starting orientation search."
    );

    for iteration in 1..=ctx.config.max_iterations {
        iterations = iteration;

        let mut order = projections.clone();
        if coordinator {
            order.shuffle(&mut rng);
        }
        let order = comm.broadcast_order(order)?;
        if order.len() != projections.len() {
            return Err(EngineError::Internal(format!(
                "broadcast order holds {} projections, expected {}",
                order.len(),
                projections.len()
            )));
        }

        if coordinator {
            ctx.reporter.report(Progress::IterationStart {
                iteration,
                max_iterations: ctx.config.max_iterations,
                projections: order.len() as u64,
            });
        }

        let mut changed = false;
        for &projection in &order {
            let current = *orientations.get(projection);
            if let Some(slot) = current.slot {
                slots.release(slot);
            }

            let mine: Vec<usize> = slots
                .free_slots()
                .filter(|c| c % comm.size() == comm.rank())
                .collect();
            let mut partial = vec![None; ctx.candidates.len()];
            for (c, score) in evaluate_candidates(ctx, sinograms, &rotations, projection, &mine)? {
                trace!(projection, candidate = c, discrepancy = score.discrepancy, "Candidate scored.");
                partial[c] = Some(score);
            }

            let merged = comm.reduce_scores(partial)?;
            let proposal = if coordinator { select_best(&merged) } else { None };
            let choice = comm.broadcast_choice(proposal)?;

            if coordinator {
                for (c, angle) in ctx.candidates.iter().enumerate() {
                    let score = merged
                        .get(c)
                        .copied()
                        .flatten()
                        .map(|s| (ctx.psi.angle(s.psi_index), s.discrepancy));
                    report.write_candidate(iteration, projection, c, (angle.phi, angle.theta), score)?;
                }
            }

            let chosen_score = choice.and_then(|(slot, _)| merged.get(slot).copied().flatten());
            match choice {
                Some((slot, psi_index)) if Some(slot) != current.slot => {
                    let angle = ctx.candidates.get(slot).ok_or_else(|| {
                        EngineError::Internal(format!("chosen candidate {} out of range", slot))
                    })?;
                    if !slots.claim(slot, projection) {
                        return Err(EngineError::Internal(format!(
                            "chosen candidate {} is not free",
                            slot
                        )));
                    }
                    orientations.set(
                        projection,
                        Orientation::new(angle.phi, angle.theta, ctx.psi.angle(psi_index), Some(slot)),
                    );
                    changed = true;
                }
                _ => {
                    if let Some(slot) = current.slot {
                        slots.claim(slot, projection);
                    }
                    orientations.set(projection, current);
                }
            }
            let applied = *orientations.get(projection);
            rotations.update(projection, &applied);

            debug!(
                iteration,
                projection,
                candidate = ?applied.slot,
                phi = applied.phi,
                theta = applied.theta,
                psi = applied.psi,
                "Projection placed."
            );
            if coordinator {
                report.write_choice(
                    iteration,
                    choice.map(|(slot, _)| slot),
                    (applied.phi, applied.theta, applied.psi),
                    chosen_score.map_or(-1.0, |s| s.discrepancy),
                )?;
                ctx.reporter.report(Progress::TaskIncrement);
            }
        }

        discrepancy = total_discrepancy(ctx, sinograms, &rotations);
        if coordinator {
            report.write_iteration(iteration, &orientations, discrepancy)?;
            ctx.reporter.report(Progress::IterationFinish {
                iteration,
                discrepancy,
                changed,
            });
        }
        info!(iteration, discrepancy, changed, "Iteration finished.");
        comm.barrier()?;

        if !changed {
            stop_reason = StopReason::Converged;
            break;
        }

        history.rotate_left(1);
        history[2] = discrepancy;
        if history[0] == history[2] {
            period_count += 1;
            let lowest = history.iter().copied().fold(f64::INFINITY, f64::min);
            if period_count >= OSCILLATION_THRESHOLD && lowest == discrepancy {
                warn!(iteration, ?history, "Discrepancy oscillates; stopping.");
                if coordinator {
                    report.write_unstable(&history)?;
                }
                stop_reason = StopReason::Unstable;
                break;
            }
        } else {
            period_count = 0;
        }
    }

    info!(%stop_reason, iterations, discrepancy, "Orientation search finished.");
    Ok(SearchOutcome {
        orientations,
        discrepancy,
        iterations,
        stop_reason,
    })
}

/// Seeds of the independent trials of a run. A single trial uses `seed` itself;
/// more trials draw distinct seeds from a generator seeded with it.
pub fn trial_seeds(trials: usize, seed: u64) -> Vec<u64> {
    if trials <= 1 {
        return vec![seed];
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seeds = Vec::with_capacity(trials);
    while seeds.len() < trials {
        let base: u64 = rng.random_range(100..1_000_000);
        let factor: u64 = rng.random_range(1..100);
        let value = if rng.random_bool(0.5) {
            base * factor
        } else {
            base / factor
        };
        if !seeds.contains(&value) {
            seeds.push(value);
        }
    }
    seeds
}

/// Runs one search per trial seed and keeps the outcome with the lowest
/// discrepancy (the earliest trial on ties). Returns its trial index and outcome.
pub fn run_trials<F>(
    config: &SearchConfig,
    trials: usize,
    mut run_one: F,
) -> Result<(usize, SearchOutcome), EngineError>
where
    F: FnMut(usize, &SearchConfig) -> Result<SearchOutcome, EngineError>,
{
    let mut best: Option<(usize, SearchOutcome)> = None;
    for (trial, seed) in trial_seeds(trials, config.seed).into_iter().enumerate() {
        let trial_config = SearchConfig {
            seed,
            ..config.clone()
        };
        let outcome = run_one(trial, &trial_config)?;
        info!(
            trial,
            seed,
            discrepancy = outcome.discrepancy,
            iterations = outcome.iterations,
            "Trial finished."
        );
        if best
            .as_ref()
            .is_none_or(|(_, b)| outcome.discrepancy < b.discrepancy)
        {
            best = Some((trial, outcome));
        }
    }
    best.ok_or_else(|| EngineError::Internal("no trial was run".to_string()))
}
