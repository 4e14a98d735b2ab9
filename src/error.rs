//! Error types for the trainer.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TrainError>;

/// All failures the trainer can report.
#[derive(Debug, Error)]
pub enum TrainError {
    /// Invalid user-supplied configuration (bad paths, malformed splits,
    /// zero-sized dimensions, missing dataset layout).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested dataset source cannot be served in this environment.
    #[error("dataset source unavailable: {0}")]
    SourceUnavailable(String),

    /// Filesystem failure (enumeration, checkpoint writes, metadata writes).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An image file could not be decoded.
    #[error("failed to decode image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Model weight record could not be saved or loaded.
    #[error("model record error: {0}")]
    Record(String),

    /// Failure inside the fit loop (e.g. the loss went non-finite).
    #[error("training failed: {0}")]
    Training(String),
}

impl From<burn::record::RecorderError> for TrainError {
    fn from(err: burn::record::RecorderError) -> Self {
        TrainError::Record(err.to_string())
    }
}

impl From<serde_json::Error> for TrainError {
    fn from(err: serde_json::Error) -> Self {
        TrainError::Record(format!("metadata serialization failed: {err}"))
    }
}
