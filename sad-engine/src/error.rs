//! Error types for signal activity detection.

use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for detection operations.
pub type SadResult<T> = Result<T, SadError>;

/// Errors that can occur while detecting, reading or writing segmentations.
#[derive(Debug, Error)]
pub enum SadError {
    #[error("Cannot grow buffer: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: cannot convert '{text}' to a segment label")]
    MalformedLabel { line: usize, text: String },

    #[error("Cannot convert '{0}' to a segment label")]
    InvalidLabel(String),

    #[error("Gaussian component {component} received no frames during re-estimation")]
    DegenerateModel { component: usize },

    #[error("Invalid analysis parameters: {0}")]
    InvalidParameters(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[cfg(feature = "wav")]
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl SadError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SadError::Open {
            path: path.into(),
            source,
        }
    }
}
