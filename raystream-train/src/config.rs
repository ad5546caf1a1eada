//! Dataset configuration.

use raystream_data::ProjectionType;
use serde::Deserialize;
use std::path::PathBuf;

/// How camera indices are drawn for a training batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchingMethod {
    /// Independent camera per patch.
    #[default]
    AllImages,
    /// One camera shared by the whole batch.
    SingleImage,
}

/// Camera model override for the render path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderCameraType {
    Perspective,
    Fisheye,
    /// Full equirectangular panorama.
    Pano,
}

impl RenderCameraType {
    pub fn projection(self) -> ProjectionType {
        match self {
            RenderCameraType::Perspective => ProjectionType::Perspective,
            RenderCameraType::Fisheye => ProjectionType::Fisheye,
            RenderCameraType::Pano => ProjectionType::Spherical,
        }
    }
}

/// Options consumed by [`RayDataset`](crate::RayDataset).
///
/// Every field has a default, so a JSON config only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Registry key of the scene adapter.
    pub dataset_loader: String,
    /// Global batch size in rays, split evenly across `world_size` processes.
    pub batch_size: usize,
    pub patch_size: usize,
    pub world_size: usize,
    pub global_rank: usize,
    pub near: f32,
    pub far: f32,
    pub batching: BatchingMethod,
    pub num_border_pixels_to_mask: usize,
    pub apply_bayer_mask: bool,
    pub compute_disp_metrics: bool,
    pub compute_normal_metrics: bool,
    pub load_sky_segments: bool,
    /// Enable depth-guided virtual-view rays during training.
    pub virtual_poses: bool,
    /// Virtual poses generated per real camera.
    pub virtual_variants: usize,
    /// Share of a training batch reserved for virtual-view rays.
    pub virtual_fraction: f64,
    /// Iterate a training split sequentially, one image per batch.
    pub compute_visibility: bool,
    pub render_path: bool,
    /// JSON array of 3x4 (or 4x4) camera-to-world matrices.
    pub render_path_file: Option<PathBuf>,
    /// Interpolate this many render poses when no render path file is given.
    pub render_path_frames: Option<usize>,
    pub render_resolution: Option<(usize, usize)>,
    pub render_focal: Option<f64>,
    pub render_camtype: Option<RenderCameraType>,
    /// Fixed seed for the sampling RNG; drawn from the OS when unset.
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dataset_loader: "blender".to_string(),
            batch_size: 16384,
            patch_size: 1,
            world_size: 1,
            global_rank: 0,
            near: 0.0,
            far: 1e6,
            batching: BatchingMethod::AllImages,
            num_border_pixels_to_mask: 0,
            apply_bayer_mask: false,
            compute_disp_metrics: false,
            compute_normal_metrics: false,
            load_sky_segments: false,
            virtual_poses: false,
            virtual_variants: 9,
            virtual_fraction: 0.2,
            compute_visibility: false,
            render_path: false,
            render_path_file: None,
            render_path_frames: None,
            render_resolution: None,
            render_focal: None,
            render_camtype: None,
            seed: None,
        }
    }
}

impl DatasetConfig {
    /// Parse a JSON config; missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Rays handled by this process per step.
    pub fn per_process_batch_size(&self) -> usize {
        self.batch_size / self.world_size.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = DatasetConfig::from_json(
            r#"{"batch_size": 64, "batching": "single_image", "render_camtype": "pano", "render_resolution": [8, 4]}"#,
        )
        .unwrap();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.batching, BatchingMethod::SingleImage);
        assert_eq!(config.render_camtype, Some(RenderCameraType::Pano));
        assert_eq!(config.render_resolution, Some((8, 4)));
        assert_eq!(config.virtual_variants, 9);
        assert_eq!(config.dataset_loader, "blender");
    }

    #[test]
    fn test_per_process_batch_size() {
        let config = DatasetConfig {
            batch_size: 4096,
            world_size: 4,
            ..Default::default()
        };
        assert_eq!(config.per_process_batch_size(), 1024);
    }

    #[test]
    fn test_pano_maps_to_spherical() {
        assert_eq!(RenderCameraType::Pano.projection(), ProjectionType::Spherical);
    }
}
