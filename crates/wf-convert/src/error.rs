//! Error types for batch conversion

use thiserror::Error;

/// Conversion errors
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Failed to read audio file: {0}")]
    Read(String),

    #[error("Failed to write output file: {0}")]
    Write(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Sample rate conversion failed: {0}")]
    Resample(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Conversion already running")]
    AlreadyRunning,

    #[error("No jobs to convert")]
    EmptyBatch,

    #[error("Worker did not stop within {0} ms")]
    StopTimeout(u64),

    #[error("Worker thread panicked")]
    WorkerPanicked,

    #[error("Channel mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
}

/// Result type for conversion operations
pub type ConvertResult<T> = Result<T, ConvertError>;

impl From<hound::Error> for ConvertError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => ConvertError::Io(e),
            other => ConvertError::Read(other.to_string()),
        }
    }
}
