use super::{LoadRequest, SceneLoader, TransformsLoader};
use crate::error::IngestionError;
use crate::types::SceneRecord;
use std::collections::HashMap;
use tracing::{debug, info};

/// Maps configuration keys to scene adapters.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: HashMap<String, Box<dyn SceneLoader>>,
}

impl LoaderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Registry with the built-in adapters (`blender`).
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("blender", TransformsLoader);
        registry
    }

    /// Register `loader` under `key`, replacing any previous entry.
    pub fn register(&mut self, key: impl Into<String>, loader: impl SceneLoader + 'static) {
        let key = key.into();
        debug!("Registering scene loader '{}'", key);
        self.loaders.insert(key, Box::new(loader));
    }

    pub fn get(&self, key: &str) -> Result<&dyn SceneLoader, IngestionError> {
        self.loaders
            .get(key)
            .map(|loader| loader.as_ref())
            .ok_or_else(|| IngestionError::UnknownLoader(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.loaders.keys().map(String::as_str)
    }

    /// Load a scene with the adapter registered under `key` and check its invariants.
    #[tracing::instrument(skip_all, fields(loader = %key, dir = %request.data_dir.display()))]
    pub fn load(&self, key: &str, request: &LoadRequest) -> Result<SceneRecord, IngestionError> {
        let scene = self.get(key)?.load_scene(request)?;
        scene.validate()?;
        info!(
            "Loaded scene: {} frames at {}x{}, {} sensor(s)",
            scene.len(),
            scene.descriptor.width,
            scene.descriptor.height,
            scene.descriptor.sensor_count
        );
        Ok(scene)
    }
}
