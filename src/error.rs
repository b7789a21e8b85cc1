//! Error types for the edulog pipeline
//!
//! Only fatal conditions surface here. Degraded-success conditions (missing
//! optional columns, referential gaps, timestamp collisions, tercile
//! under-population) are logged and the run proceeds with the available data.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("missing required column `{column}` in {path}")]
    MissingColumn { column: String, path: PathBuf },

    #[error("cannot parse timestamp `{value}` (expected `YYYY-MM-DD HH:MM:SS`)")]
    BadTimestamp { value: String },

    #[error("cannot parse number `{value}` in column `{column}`")]
    BadNumber { column: String, value: String },

    #[error("{path} contains no data rows")]
    EmptyTable { path: PathBuf },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PipelineError::Csv {
            path: path.into(),
            source,
        }
    }
}
