use super::export::export_structure;
use crate::core::image::Image2D;
use crate::core::projection::ProjectionParams;
use crate::engine::comm::{Solo, ThreadGroup};
use crate::engine::config::{FindStructureConfig, SearchConfig};
use crate::engine::context::SearchContext;
use crate::engine::error::EngineError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::report::AngleReport;
use crate::engine::state::{OrientationSet, SearchOutcome};
use crate::engine::tasks::search::{find_structure, run_trials};
use crate::engine::tasks::sinogram::{Sinogram, open_projections};
use std::path::Path;
use std::thread;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct FindStructureResult {
    /// Index of the trial whose outcome was kept.
    pub best_trial: usize,
    pub outcome: SearchOutcome,
}

/// Runs one search on `workers` threads, one replica each, and returns the
/// coordinator's outcome.
pub fn run_distributed(
    ctx: &SearchContext,
    sinograms: &[Sinogram],
    initial: &OrientationSet,
    workers: usize,
    report: &mut AngleReport,
) -> Result<SearchOutcome, EngineError> {
    let mut comms = ThreadGroup::new(workers).into_iter();
    let Some(mut coordinator) = comms.next() else {
        return Err(EngineError::Internal("thread group has no ranks".to_string()));
    };

    thread::scope(|s| {
        let replicas: Vec<_> = comms
            .map(|mut comm| {
                let start = initial.clone();
                s.spawn(move || {
                    find_structure(ctx, sinograms, start, &mut comm, &mut AngleReport::discard())
                })
            })
            .collect();

        let outcome = find_structure(ctx, sinograms, initial.clone(), &mut coordinator, report);
        drop(coordinator);

        for replica in replicas {
            let result = replica.join().map_err(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                EngineError::WorkerPanicked(message)
            })?;
            // Replicas depart when the coordinator fails; its error wins.
            if outcome.is_ok() {
                result?;
            }
        }
        outcome
    })
}

fn open_report(
    output_dir: Option<&Path>,
    trial: usize,
    debug: bool,
) -> Result<AngleReport, EngineError> {
    let Some(dir) = output_dir else {
        return Ok(AngleReport::discard());
    };
    let report = AngleReport::append_to(&dir.join(format!("angles_{:03}", trial)))?;
    if debug {
        Ok(report.with_progress_file(&dir.join(format!("progress_{:03}", trial)))?)
    } else {
        Ok(report)
    }
}

fn log_header(config: &FindStructureConfig, n_projections: usize, candidates: usize, psi_step: f64) {
    let search = &config.search;
    let sinogram = &config.sinogram;
    info!(
        projections = n_projections,
        output_dir = ?config.output_dir,
        delta = search.delta,
        psi_step,
        inner_radius = sinogram.inner_radius,
        outer_radius = sinogram.outer_radius,
        low_freq = sinogram.low_freq,
        high_freq = sinogram.high_freq,
        seed = search.seed,
        max_iterations = search.max_iterations,
        priors = config.use_priors,
        candidates,
        trials = config.trials,
        workers = config.workers,
        weights = search.use_weights,
        "Common-lines structure search."
    );
}

fn log_final_angles(orientations: &OrientationSet) {
    for (i, o) in orientations.iter().enumerate() {
        info!(
            "Projection #{:03}: phi {:10.5}    theta {:10.5}    psi {:10.5}",
            i, o.phi, o.theta, o.psi
        );
    }
}

/// Finds the orientations of a projection stack by common lines.
///
/// `priors` are used as starting orientations when the configuration asks for
/// them. With an output directory, every trial writes its angle report and exported
/// structure there.
#[instrument(skip_all, name = "find_structure_workflow")]
pub fn run(
    images: &[Image2D],
    priors: Option<&[ProjectionParams]>,
    config: &FindStructureConfig,
    reporter: &ProgressReporter,
) -> Result<FindStructureResult, EngineError> {
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let n = images.len();
    if n < 2 {
        return Err(EngineError::Initialization(format!(
            "common lines need at least two projections, got {}",
            n
        )));
    }
    let priors = if config.use_priors {
        Some(priors.ok_or_else(|| {
            EngineError::Initialization("starting from priors, but none were given".to_string())
        })?)
    } else {
        None
    };
    if let Some(dir) = &config.output_dir {
        std::fs::create_dir_all(dir)?;
    }
    let probe = SearchContext::new(&config.search, reporter, n);
    log_header(config, n, probe.candidates.len(), probe.psi.step());
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Sinograms ===
    reporter.report(Progress::PhaseStart { name: "Sinograms" });
    let (sinograms, initial) = open_projections(images, priors, &config.sinogram, &probe.psi)?;
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Orientation search ===
    reporter.report(Progress::PhaseStart {
        name: "Orientation search",
    });
    let output_dir = config.output_dir.as_deref();
    let (best_trial, outcome) =
        run_trials(&config.search, config.trials, |trial, search: &SearchConfig| {
            reporter.report(Progress::TrialStart {
                trial,
                trials: config.trials,
                seed: search.seed,
                workers: config.workers,
            });
            let ctx = SearchContext::new(search, reporter, n);
            let mut report = open_report(output_dir, trial, config.debug)?;
            let outcome = if config.workers > 1 {
                run_distributed(&ctx, &sinograms, &initial, config.workers, &mut report)?
            } else {
                find_structure(&ctx, &sinograms, initial.clone(), &mut Solo, &mut report)?
            };
            if let Some(dir) = output_dir {
                export_structure(images, &outcome.orientations, dir, trial)?;
            }
            reporter.report(Progress::Message(format!(
                "Trial {}: discrepancy {:.6e} after {} iteration(s) ({})",
                trial + 1,
                outcome.discrepancy,
                outcome.iterations,
                outcome.stop_reason
            )));
            Ok(outcome)
        })?;
    reporter.report(Progress::PhaseFinish);

    log_final_angles(&outcome.orientations);
    info!(
        best_trial,
        discrepancy = outcome.discrepancy,
        iterations = outcome.iterations,
        stop_reason = %outcome.stop_reason,
        "Structure search finished."
    );
    Ok(FindStructureResult {
        best_trial,
        outcome,
    })
}
