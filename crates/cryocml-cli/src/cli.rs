use clap::{Args, Parser, Subcommand, ValueEnum};
use cryocml::core::angles::Symmetry;
use cryocml::core::projection::InterpolationMethod;
use cryocml::workflows::project::Projector;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "cryocml - ab-initio orientation search by common lines and Fourier gridding projection for single-particle cryo-EM.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find the orientations of a projection stack by common lines.
    Find(FindArgs),
    /// Project a volume at explicit angles or at quasi-even reference directions.
    Project(ProjectArgs),
}

/// Arguments for the `find` subcommand.
#[derive(Args, Debug)]
pub struct FindArgs {
    // --- Core Arguments ---
    /// Path to the input projection stack (MRC).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory receiving angle reports, exported stacks and plots.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Path to an optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// CSV file with prior orientations (phi,theta,psi,sx,sy), one row per projection.
    #[arg(short = 'p', long, value_name = "PATH")]
    pub priors: Option<PathBuf>,

    // --- Search Overrides ---
    /// Override the angular step of the candidate directions, in degrees.
    #[arg(short, long, value_name = "FLOAT")]
    pub delta: Option<f64>,

    /// Override the in-plane angular step, in degrees.
    #[arg(long, value_name = "FLOAT")]
    pub psi_step: Option<f64>,

    /// Override the maximum number of iterations.
    #[arg(long, value_name = "INT")]
    pub max_iterations: Option<usize>,

    /// Override the random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the number of independent trials.
    #[arg(short, long, value_name = "INT")]
    pub trials: Option<usize>,

    /// Override the number of search workers.
    #[arg(short, long, value_name = "INT")]
    pub workers: Option<usize>,

    /// Disable the Voronoi weighting of common lines.
    #[arg(long)]
    pub no_weights: bool,

    /// Anchor the first projection to the first candidate direction.
    #[arg(long)]
    pub first_zero: bool,

    /// Also write a per-candidate progress log next to each angle report.
    #[arg(long)]
    pub debug: bool,

    // --- Sinogram Overrides ---
    /// Override the inner radius of the normalisation mask, in pixels.
    #[arg(long, value_name = "FLOAT")]
    pub inner_radius: Option<f64>,

    /// Override the outer radius, in pixels. Values below 1 select nx / 2 - 1.
    #[arg(long, value_name = "FLOAT")]
    pub outer_radius: Option<f64>,

    /// Override the lowest retained frequency, in cycles per pixel.
    #[arg(long, value_name = "FLOAT")]
    pub low_freq: Option<f64>,

    /// Override the highest retained frequency, in cycles per pixel.
    #[arg(long, value_name = "FLOAT")]
    pub high_freq: Option<f64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S search.max-iterations=20
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// How projections are computed: a central section sampled with one of three
/// interpolations, or real-space ray sums.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodArg {
    Gridding,
    NearestNeighbor,
    Trilinear,
    RealSpace,
}

impl MethodArg {
    pub fn projector(self, radius: Option<f64>) -> Projector {
        match self {
            MethodArg::Gridding => Projector::Fourier(InterpolationMethod::Gridding),
            MethodArg::NearestNeighbor => Projector::Fourier(InterpolationMethod::NearestNeighbor),
            MethodArg::Trilinear => Projector::Fourier(InterpolationMethod::Trilinear),
            MethodArg::RealSpace => Projector::RealSpace {
                radius: radius.unwrap_or(0.0),
            },
        }
    }
}

/// Arguments for the `project` subcommand.
#[derive(Args, Debug)]
pub struct ProjectArgs {
    /// Path to the input volume (MRC).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the output projection stack (MRC). Parameters are written next to it
    /// with a `.csv` extension.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    #[command(flatten)]
    pub angles: AngleSource,

    /// Point-group symmetry of the reference directions (cyclic only, e.g. c4).
    #[arg(long, default_value = "c1", value_name = "SYM")]
    pub symmetry: Symmetry,

    /// Projection method.
    #[arg(short, long, value_enum, default_value_t = MethodArg::Gridding)]
    pub method: MethodArg,

    /// Radius of the sphere summed by the real-space method, in voxels.
    /// Defaults to n / 2 - 1.
    #[arg(short, long, value_name = "FLOAT")]
    pub radius: Option<f64>,
}

/// Exactly one source of projection directions.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct AngleSource {
    /// CSV file of projection parameters (phi,theta,psi,sx,sy).
    #[arg(long, value_name = "PATH")]
    pub params: Option<PathBuf>,

    /// Generate quasi-even reference directions at this angular step, in degrees.
    #[arg(long, value_name = "FLOAT")]
    pub reference_delta: Option<f64>,
}
