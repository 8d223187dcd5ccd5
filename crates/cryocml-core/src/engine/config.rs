use crate::core::angles::CandidateAngle;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

/// Masking and frequency band applied when building sinograms.
#[derive(Debug, Clone, PartialEq)]
pub struct SinogramParams {
    /// Inner radius of the normalisation annulus in pixels.
    pub inner_radius: f64,
    /// Outer radius in pixels; values below 1 select `nx / 2 - 1`.
    pub outer_radius: f64,
    /// Lowest retained frequency, cycles per pixel.
    pub low_freq: f64,
    /// Highest retained frequency, cycles per pixel.
    pub high_freq: f64,
}

#[derive(Default)]
pub struct SinogramParamsBuilder {
    inner_radius: Option<f64>,
    outer_radius: Option<f64>,
    low_freq: Option<f64>,
    high_freq: Option<f64>,
}

impl SinogramParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner_radius(mut self, r: f64) -> Self {
        self.inner_radius = Some(r);
        self
    }
    pub fn outer_radius(mut self, r: f64) -> Self {
        self.outer_radius = Some(r);
        self
    }
    pub fn low_freq(mut self, f: f64) -> Self {
        self.low_freq = Some(f);
        self
    }
    pub fn high_freq(mut self, f: f64) -> Self {
        self.high_freq = Some(f);
        self
    }

    pub fn build(self) -> Result<SinogramParams, ConfigError> {
        let params = SinogramParams {
            inner_radius: self.inner_radius.unwrap_or(0.0),
            outer_radius: self
                .outer_radius
                .ok_or(ConfigError::MissingParameter("outer_radius"))?,
            low_freq: self
                .low_freq
                .ok_or(ConfigError::MissingParameter("low_freq"))?,
            high_freq: self
                .high_freq
                .ok_or(ConfigError::MissingParameter("high_freq"))?,
        };
        if params.inner_radius < 0.0 {
            return Err(invalid("inner_radius", "must not be negative"));
        }
        if params.outer_radius >= 1.0 && params.inner_radius >= params.outer_radius {
            return Err(invalid(
                "inner_radius",
                format!("must be smaller than outer_radius ({})", params.outer_radius),
            ));
        }
        if !(0.0..=0.5).contains(&params.low_freq) || !(0.0..=0.5).contains(&params.high_freq) {
            return Err(invalid("frequency band", "limits must lie in [0, 0.5]"));
        }
        if params.low_freq >= params.high_freq {
            return Err(invalid(
                "frequency band",
                format!(
                    "low_freq ({}) must be below high_freq ({})",
                    params.low_freq, params.high_freq
                ),
            ));
        }
        Ok(params)
    }
}

/// Parameters of the orientation search loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Angular step of the candidate directions, degrees.
    pub delta: f64,
    /// Requested in-plane step, degrees. Normalised to a divisor of 180 when the
    /// search context is built.
    pub psi_step: f64,
    pub max_iterations: usize,
    pub seed: u64,
    pub use_weights: bool,
    /// Anchor projection 0 to candidate 0 with `psi = 0`.
    pub first_zero: bool,
    /// Explicit candidate directions; `None` samples even angles at `delta`.
    pub candidates: Option<Vec<CandidateAngle>>,
}

#[derive(Default)]
pub struct SearchConfigBuilder {
    delta: Option<f64>,
    psi_step: Option<f64>,
    max_iterations: Option<usize>,
    seed: Option<u64>,
    use_weights: Option<bool>,
    first_zero: Option<bool>,
    candidates: Option<Vec<CandidateAngle>>,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delta(mut self, degrees: f64) -> Self {
        self.delta = Some(degrees);
        self
    }
    pub fn psi_step(mut self, degrees: f64) -> Self {
        self.psi_step = Some(degrees);
        self
    }
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn use_weights(mut self, enabled: bool) -> Self {
        self.use_weights = Some(enabled);
        self
    }
    pub fn first_zero(mut self, enabled: bool) -> Self {
        self.first_zero = Some(enabled);
        self
    }
    pub fn candidates(mut self, angles: Vec<CandidateAngle>) -> Self {
        self.candidates = Some(angles);
        self
    }

    pub fn build(self) -> Result<SearchConfig, ConfigError> {
        let config = SearchConfig {
            delta: self.delta.ok_or(ConfigError::MissingParameter("delta"))?,
            psi_step: self
                .psi_step
                .ok_or(ConfigError::MissingParameter("psi_step"))?,
            max_iterations: self
                .max_iterations
                .ok_or(ConfigError::MissingParameter("max_iterations"))?,
            seed: self.seed.ok_or(ConfigError::MissingParameter("seed"))?,
            use_weights: self.use_weights.unwrap_or(true),
            first_zero: self.first_zero.unwrap_or(false),
            candidates: self.candidates,
        };
        if !(config.delta > 0.0 && config.delta <= 180.0) {
            return Err(invalid("delta", "must lie in (0, 180]"));
        }
        if !(config.psi_step > 0.0 && config.psi_step <= 180.0) {
            return Err(invalid("psi_step", "must lie in (0, 180]"));
        }
        if config.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1"));
        }
        if matches!(&config.candidates, Some(c) if c.is_empty()) {
            return Err(invalid("candidates", "list must not be empty"));
        }
        Ok(config)
    }
}

/// End-to-end configuration of the structure-finding workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct FindStructureConfig {
    pub search: SearchConfig,
    pub sinogram: SinogramParams,
    pub trials: usize,
    /// Number of SPMD workers; 1 runs the search on the calling thread.
    pub workers: usize,
    /// Start from the supplied orientations instead of an unassigned set.
    pub use_priors: bool,
    /// Directory receiving angle reports, exported stacks and plots.
    pub output_dir: Option<PathBuf>,
    /// Also write a per-projection progress log next to each angle report.
    pub debug: bool,
}

#[derive(Default)]
pub struct FindStructureConfigBuilder {
    search: Option<SearchConfig>,
    sinogram: Option<SinogramParams>,
    trials: Option<usize>,
    workers: Option<usize>,
    use_priors: Option<bool>,
    output_dir: Option<PathBuf>,
    debug: Option<bool>,
}

impl FindStructureConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, config: SearchConfig) -> Self {
        self.search = Some(config);
        self
    }
    pub fn sinogram(mut self, params: SinogramParams) -> Self {
        self.sinogram = Some(params);
        self
    }
    pub fn trials(mut self, n: usize) -> Self {
        self.trials = Some(n);
        self
    }
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }
    pub fn use_priors(mut self, enabled: bool) -> Self {
        self.use_priors = Some(enabled);
        self
    }
    pub fn output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = Some(dir);
        self
    }
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = Some(enabled);
        self
    }

    pub fn build(self) -> Result<FindStructureConfig, ConfigError> {
        let config = FindStructureConfig {
            search: self.search.ok_or(ConfigError::MissingParameter("search"))?,
            sinogram: self
                .sinogram
                .ok_or(ConfigError::MissingParameter("sinogram"))?,
            trials: self.trials.unwrap_or(1),
            workers: self.workers.unwrap_or(1),
            use_priors: self.use_priors.unwrap_or(false),
            output_dir: self.output_dir,
            debug: self.debug.unwrap_or(false),
        };
        if config.trials == 0 {
            return Err(invalid("trials", "must be at least 1"));
        }
        if config.workers == 0 {
            return Err(invalid("workers", "must be at least 1"));
        }
        Ok(config)
    }
}
