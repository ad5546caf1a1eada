//! Error types for dataset construction and batch production.

use crate::camera::CastError;
use crate::grid::ShapeError;
use crate::warp::WarpError;
use raystream_data::{IngestionError, SceneError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("ray casting error: {0}")]
    Cast(#[from] CastError),

    #[error("warping error: {0}")]
    Warp(#[from] WarpError),

    #[error("pixel ({x}, {y}) of camera {camera} is outside the scene")]
    Selection { camera: u32, x: u32, y: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render path file is invalid: {0}")]
    RenderPath(#[from] serde_json::Error),

    #[error("batch producer stopped")]
    StreamClosed,
}

impl DatasetError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
