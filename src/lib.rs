//! Raystream
//!
//! Umbrella crate over the scene data layer and the ray-batch engine.
//!
//! - [`data`]: scene records, pose normalization, split partitioning, loaders
//! - [`train`]: patch sampling, virtual views, batch assembly and streaming

pub use raystream_data as data;
pub use raystream_train as train;

pub use raystream_data::{LoaderRegistry, SceneRecord, Split};
pub use raystream_train::{DatasetConfig, DatasetError, RayBatch, RayDataset, RayStream};
