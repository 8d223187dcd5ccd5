use crate::cli::FindArgs;
use crate::error::{CliError, Result};
use cryocml::engine::config as core_config;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const DEFAULT_DELTA: f64 = 10.0;
const DEFAULT_PSI_STEP: f64 = 10.0;
const DEFAULT_MAX_ITERATIONS: usize = 10;
const DEFAULT_HIGH_FREQ: f64 = 0.5;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSearchConfig {
    delta: Option<f64>,
    #[serde(rename = "psi-step")]
    psi_step: Option<f64>,
    #[serde(rename = "max-iterations")]
    max_iterations: Option<usize>,
    seed: Option<u64>,
    weights: Option<bool>,
    #[serde(rename = "first-zero")]
    first_zero: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialSinogramConfig {
    #[serde(rename = "inner-radius")]
    inner_radius: Option<f64>,
    #[serde(rename = "outer-radius")]
    outer_radius: Option<f64>,
    #[serde(rename = "low-freq")]
    low_freq: Option<f64>,
    #[serde(rename = "high-freq")]
    high_freq: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialRunConfig {
    trials: Option<usize>,
    workers: Option<usize>,
    #[serde(rename = "use-priors")]
    use_priors: Option<bool>,
    debug: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialFindConfig {
    search: Option<PartialSearchConfig>,
    sinogram: Option<PartialSinogramConfig>,
    run: Option<PartialRunConfig>,
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

impl PartialFindConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Loads the file named by `--config`, or an empty configuration without one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn merge_with_cli(mut self, args: &FindArgs) -> Result<core_config::FindStructureConfig> {
        self.apply_set_values(&args.set_values)?;

        let search = self.search.take().unwrap_or_default();
        let sinogram = self.sinogram.take().unwrap_or_default();
        let run = self.run.take().unwrap_or_default();

        let search_config = core_config::SearchConfigBuilder::new()
            .delta(args.delta.or(search.delta).unwrap_or(DEFAULT_DELTA))
            .psi_step(args.psi_step.or(search.psi_step).unwrap_or(DEFAULT_PSI_STEP))
            .max_iterations(
                args.max_iterations
                    .or(search.max_iterations)
                    .unwrap_or(DEFAULT_MAX_ITERATIONS),
            )
            .seed(args.seed.or(search.seed).unwrap_or(0))
            .use_weights(!args.no_weights && search.weights.unwrap_or(true))
            .first_zero(args.first_zero || search.first_zero.unwrap_or(false))
            .build()?;

        let sinogram_params = core_config::SinogramParamsBuilder::new()
            .inner_radius(args.inner_radius.or(sinogram.inner_radius).unwrap_or(0.0))
            .outer_radius(args.outer_radius.or(sinogram.outer_radius).unwrap_or(0.0))
            .low_freq(args.low_freq.or(sinogram.low_freq).unwrap_or(0.0))
            .high_freq(
                args.high_freq
                    .or(sinogram.high_freq)
                    .unwrap_or(DEFAULT_HIGH_FREQ),
            )
            .build()?;

        let use_priors = run.use_priors.unwrap_or(args.priors.is_some());
        if use_priors && args.priors.is_none() {
            return Err(CliError::Config(
                "`run.use-priors` is set but no --priors file was given.".to_string(),
            ));
        }

        let config = core_config::FindStructureConfigBuilder::new()
            .search(search_config)
            .sinogram(sinogram_params)
            .trials(args.trials.or(run.trials).unwrap_or(1))
            .workers(args.workers.or(run.workers).unwrap_or(1))
            .use_priors(use_priors)
            .output_dir(args.output_dir.clone())
            .debug(args.debug || run.debug.unwrap_or(false))
            .build()?;
        Ok(config)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let key = key.trim();

            match key {
                "search.delta" => {
                    self.search.get_or_insert_with(Default::default).delta =
                        Some(parse_value(key, value_str, "float")?);
                }
                "search.psi-step" => {
                    self.search.get_or_insert_with(Default::default).psi_step =
                        Some(parse_value(key, value_str, "float")?);
                }
                "search.max-iterations" => {
                    self.search.get_or_insert_with(Default::default).max_iterations =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "search.seed" => {
                    self.search.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "search.weights" => {
                    self.search.get_or_insert_with(Default::default).weights =
                        Some(parse_value(key, value_str, "boolean")?);
                }
                "search.first-zero" => {
                    self.search.get_or_insert_with(Default::default).first_zero =
                        Some(parse_value(key, value_str, "boolean")?);
                }
                "sinogram.inner-radius" => {
                    self.sinogram.get_or_insert_with(Default::default).inner_radius =
                        Some(parse_value(key, value_str, "float")?);
                }
                "sinogram.outer-radius" => {
                    self.sinogram.get_or_insert_with(Default::default).outer_radius =
                        Some(parse_value(key, value_str, "float")?);
                }
                "sinogram.low-freq" => {
                    self.sinogram.get_or_insert_with(Default::default).low_freq =
                        Some(parse_value(key, value_str, "float")?);
                }
                "sinogram.high-freq" => {
                    self.sinogram.get_or_insert_with(Default::default).high_freq =
                        Some(parse_value(key, value_str, "float")?);
                }
                "run.trials" => {
                    self.run.get_or_insert_with(Default::default).trials =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "run.workers" => {
                    self.run.get_or_insert_with(Default::default).workers =
                        Some(parse_value(key, value_str, "integer")?);
                }
                "run.use-priors" => {
                    self.run.get_or_insert_with(Default::default).use_priors =
                        Some(parse_value(key, value_str, "boolean")?);
                }
                "run.debug" => {
                    self.run.get_or_insert_with(Default::default).debug =
                        Some(parse_value(key, value_str, "boolean")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_config_file(dir: &TempDir, content: &str) -> PathBuf {
        let file_path = dir.path().join("find.toml");
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn parse_find_args(extra: &[&str]) -> FindArgs {
        let mut args = vec!["cryocml", "find", "-i", "stack.mrc", "-o", "out"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Find(find) => find,
            _ => panic!("Expected 'find' subcommand"),
        }
    }

    #[test]
    fn defaults_apply_without_a_config_file() {
        let args = parse_find_args(&[]);
        let config = PartialFindConfig::load(None)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.search.delta, DEFAULT_DELTA);
        assert_eq!(config.search.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert!(config.search.use_weights);
        assert_eq!(config.sinogram.high_freq, DEFAULT_HIGH_FREQ);
        assert_eq!(config.trials, 1);
        assert!(!config.use_priors);
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn file_values_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
        [search]
        delta = 15.0
        psi-step = 5.0
        seed = 7
        weights = false

        [sinogram]
        outer-radius = 30.0
        high-freq = 0.25

        [run]
        trials = 3
        workers = 2
        "#,
        );
        let config = PartialFindConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&parse_find_args(&[]))
            .unwrap();

        assert_eq!(config.search.delta, 15.0);
        assert_eq!(config.search.psi_step, 5.0);
        assert_eq!(config.search.seed, 7);
        assert!(!config.search.use_weights);
        assert_eq!(config.sinogram.outer_radius, 30.0);
        assert_eq!(config.sinogram.high_freq, 0.25);
        assert_eq!(config.trials, 3);
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn cli_args_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(
            &dir,
            r#"
        [search]
        delta = 15.0 # Will be overridden
        max-iterations = 4

        [run]
        trials = 3 # Will be overridden
        "#,
        );
        let args = parse_find_args(&["--delta", "20", "--trials", "5", "--first-zero"]);
        let config = PartialFindConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.search.delta, 20.0);
        assert_eq!(config.search.max_iterations, 4);
        assert!(config.search.first_zero);
        assert_eq!(config.trials, 5);
    }

    #[test]
    fn set_values_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(&dir, "[search]\nmax-iterations = 4\n");
        let args = parse_find_args(&[
            "-S",
            "search.max-iterations=20",
            "-S",
            "sinogram.low-freq=0.05",
            "-S",
            "run.debug=true",
        ]);
        let config = PartialFindConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.search.max_iterations, 20);
        assert_eq!(config.sinogram.low_freq, 0.05);
        assert!(config.debug);
    }

    #[test]
    fn invalid_set_values_are_rejected() {
        for set in ["search.delta", "search.unknown=1", "run.trials=many"] {
            let args = parse_find_args(&["-S", set]);
            let result = PartialFindConfig::default().merge_with_cli(&args);
            assert!(matches!(result, Err(CliError::Config(_))), "{}", set);
        }
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_file(&dir, "[search]\nangular-step = 4.0\n");
        assert!(matches!(
            PartialFindConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn builder_validation_surfaces_as_config_errors() {
        let args = parse_find_args(&["--low-freq", "0.4", "--high-freq", "0.1"]);
        assert!(matches!(
            PartialFindConfig::default().merge_with_cli(&args),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn priors_flag_requires_a_priors_file() {
        let args = parse_find_args(&["-S", "run.use-priors=true"]);
        assert!(PartialFindConfig::default().merge_with_cli(&args).is_err());
        let args = parse_find_args(&["--priors", "angles.csv"]);
        let config = PartialFindConfig::default().merge_with_cli(&args).unwrap();
        assert!(config.use_priors);
    }
}
