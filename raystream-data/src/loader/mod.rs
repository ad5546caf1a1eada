//! Scene adapters.
//!
//! An adapter turns one on-disk scene layout into a [`SceneRecord`]. Adapters
//! are looked up by configuration key through a [`LoaderRegistry`], so adding a
//! dataset type means registering another [`SceneLoader`].

mod registry;
mod transforms;

pub use registry::LoaderRegistry;
pub use transforms::TransformsLoader;

use crate::error::IngestionError;
use crate::split::Split;
use crate::types::SceneRecord;
use std::path::PathBuf;

/// What the dataset asks an adapter for.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub data_dir: PathBuf,
    pub split: Split,
    pub load_depth: bool,
    pub load_virtual_poses: bool,
}

impl LoadRequest {
    pub fn new(data_dir: impl Into<PathBuf>, split: Split) -> Self {
        Self {
            data_dir: data_dir.into(),
            split,
            load_depth: false,
            load_virtual_poses: false,
        }
    }

    pub fn with_depth(mut self, load_depth: bool) -> Self {
        self.load_depth = load_depth;
        self
    }

    pub fn with_virtual_poses(mut self, load_virtual_poses: bool) -> Self {
        self.load_virtual_poses = load_virtual_poses;
        self
    }
}

/// Trait for scene-format adapters.
///
/// Implementations return every frame of the capture in timestep-major,
/// camera-minor order with unnormalized poses; the dataset normalizes and
/// partitions the record itself.
pub trait SceneLoader: Send + Sync {
    fn load_scene(&self, request: &LoadRequest) -> Result<SceneRecord, IngestionError>;
}
