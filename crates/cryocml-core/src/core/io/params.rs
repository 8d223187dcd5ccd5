use crate::core::projection::ProjectionParams;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Parameter file '{path}' lists {found} projections, expected {expected}")]
    CountMismatch {
        path: String,
        expected: usize,
        found: usize,
    },
}

/// Reads projection parameters from a CSV file with columns `phi,theta,psi,sx,sy`.
pub fn read_params(path: &Path) -> Result<Vec<ProjectionParams>, ParamsError> {
    let to_err = |source: csv::Error| ParamsError::Csv {
        path: path.to_string_lossy().to_string(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(to_err)?;
    reader
        .deserialize::<ProjectionParams>()
        .map(|record| record.map_err(to_err))
        .collect()
}

/// Reads parameters and checks there is exactly one row per projection.
pub fn read_params_for(path: &Path, expected: usize) -> Result<Vec<ProjectionParams>, ParamsError> {
    let params = read_params(path)?;
    if params.len() != expected {
        return Err(ParamsError::CountMismatch {
            path: path.to_string_lossy().to_string(),
            expected,
            found: params.len(),
        });
    }
    Ok(params)
}

pub fn write_params(path: &Path, params: &[ProjectionParams]) -> Result<(), ParamsError> {
    let to_err = |source: csv::Error| ParamsError::Csv {
        path: path.to_string_lossy().to_string(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(to_err)?;
    for p in params {
        writer.serialize(p).map_err(to_err)?;
    }
    writer.flush().map_err(|e| to_err(e.into()))?;
    Ok(())
}
