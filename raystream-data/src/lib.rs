//! Raystream Data Crate
//!
//! Scene records and the load-time transforms applied to them: pose
//! normalization, train/test partitioning and the scene adapter registry.
//! This crate knows nothing about rays or batching.

pub mod error;
pub mod geometry;
pub mod loader;
pub mod normalize;
pub mod split;
pub mod types;

pub use error::{IngestionError, SceneError};
pub use geometry::{depth_to_distance, flip_yz, interpolate_key_poses, intrinsic_matrix, pixtocam};
pub use loader::{LoadRequest, LoaderRegistry, SceneLoader, TransformsLoader};
pub use normalize::{NormalizationTransform, normalize_scene, normalize_scene_with};
pub use split::{Split, TEST_PERIOD, partition_scene, split_indices, split_of, virtual_split_of};
pub use types::{
    Camera, Distortion, Frame, PixelMap, ProjectionType, SceneDescriptor, SceneRecord, VirtualPosePool,
};
