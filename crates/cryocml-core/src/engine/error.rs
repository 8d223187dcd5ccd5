use super::config::ConfigError;
use crate::core::image::ImageError;
use crate::core::io::mrc::MrcError;
use crate::core::io::params::ParamsError;
use crate::core::projection::ProjectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Projection {index} must be square, got {nx}x{ny}")]
    NonSquareImage { index: usize, nx: usize, ny: usize },

    #[error("Projection {index} has zero variance under the normalisation mask")]
    ZeroVariance { index: usize },

    #[error("Frequency band [{low}, {high}] selects no coefficient of a {length}-sample line")]
    InvalidBand { low: f64, high: f64, length: usize },

    #[error("Collective mismatch on rank {rank}: expected {expected}, found {found}")]
    CollectiveMismatch {
        rank: usize,
        expected: String,
        found: String,
    },

    #[error("A worker left the group while rank {rank} was waiting on a collective")]
    WorkerDeparted { rank: usize },

    #[error("Worker thread failed: {0}")]
    WorkerPanicked(String),

    #[error("Projection failed: {source}")]
    Projection {
        #[from]
        source: ProjectionError,
    },

    #[error("Image error: {source}")]
    Image {
        #[from]
        source: ImageError,
    },

    #[error("MRC I/O failed: {source}")]
    Mrc {
        #[from]
        source: MrcError,
    },

    #[error("Parameter file I/O failed: {source}")]
    Params {
        #[from]
        source: ParamsError,
    },

    #[error("Report output failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to save plot '{path}': {message}")]
    Plot { path: String, message: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
