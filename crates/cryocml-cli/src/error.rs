use cryocml::core::io::mrc::MrcError;
use cryocml::core::io::params::ParamsError;
use cryocml::engine::config::ConfigError;
use cryocml::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl CliError {
    pub fn mrc(path: &std::path::Path, e: MrcError) -> Self {
        CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        }
    }

    pub fn params(path: &std::path::Path, e: ParamsError) -> Self {
        CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        }
    }
}
