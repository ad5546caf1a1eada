//! Error types for scene construction and ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// A scene record that cannot be used as-is.
///
/// These are configuration failures: they are raised while a dataset is being
/// built and are never retried.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene has no frames")]
    Empty,

    #[error("{what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{what} is {actual_width}x{actual_height}, expected {width}x{height}")]
    DimensionMismatch {
        what: &'static str,
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },

    #[error("all camera translations coincide; normalization scale is undefined")]
    DegeneratePoses,

    #[error("scene is missing the {0} modality")]
    MissingModality(&'static str),

    #[error("sensor count must be at least 1")]
    NoSensors,

    #[error("virtual pose pool needs at least one variant per camera")]
    NoVirtualVariants,

    #[error("key-pose interpolation needs two key poses, got {0}")]
    NotEnoughKeyPoses(usize),
}

/// Failures raised by scene adapters while reading data from disk.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image decoding error on {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed pose record in {path}: {reason}")]
    MalformedPose { path: PathBuf, reason: String },

    #[error("no scene loader registered under '{0}'")]
    UnknownLoader(String),

    #[error("invalid scene: {0}")]
    Scene(#[from] SceneError),
}

impl IngestionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedPose {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
