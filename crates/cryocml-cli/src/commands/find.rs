use crate::cli::FindArgs;
use crate::config::PartialFindConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use cryocml::core::io::mrc::read_stack;
use cryocml::core::io::params::read_params_for;
use cryocml::engine::progress::ProgressReporter;
use cryocml::workflows;
use tracing::info;

pub fn run(args: FindArgs) -> Result<()> {
    let partial_config = PartialFindConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.merge_with_cli(&args)?;

    info!("Loading projection stack from {:?}", &args.input);
    let images = read_stack(&args.input).map_err(|e| CliError::mrc(&args.input, e))?;

    let priors = match &args.priors {
        Some(path) if config.use_priors => {
            info!("Loading prior orientations from {:?}", path);
            Some(read_params_for(path, images.len()).map_err(|e| CliError::params(path, e))?)
        }
        _ => None,
    };

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Searching orientations of {} projections ({} trial(s), {} worker(s))...",
        images.len(),
        config.trials,
        config.workers
    );
    let result = workflows::find::run(&images, priors.as_deref(), &config, &reporter)?;

    let outcome = &result.outcome;
    println!(
        "✓ Best trial {:03}: discrepancy {:.6e} after {} iteration(s) ({}).",
        result.best_trial, outcome.discrepancy, outcome.iterations, outcome.stop_reason
    );
    println!(
        "  Structure written to: {}",
        args.output_dir
            .join(format!("structure_{:03}.mrc", result.best_trial))
            .display()
    );
    Ok(())
}
