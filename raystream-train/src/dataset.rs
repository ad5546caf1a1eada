//! The dataset object: a normalized, partitioned scene plus everything needed
//! to turn it into ray batches.

use crate::assembler::{RayBatchAssembler, RaySelection};
use crate::batch::RayBatch;
use crate::camera::RayCaster;
use crate::config::DatasetConfig;
use crate::error::DatasetError;
use crate::grid::{Grid, pixel_coordinates};
use crate::sampler::{PatchSampler, bayer_mask};
use crate::virtual_view::{VirtualViewSource, VirtualViewSynthesizer, WARMUP_GROUPS};
use crate::warp::Warper;
use glam::DAffine3;
use rand::Rng;
use raystream_data::geometry::pose_from_rows;
use raystream_data::{
    Camera, Frame, LoadRequest, LoaderRegistry, NormalizationTransform, SceneError, SceneRecord, Split,
    VirtualPosePool, interpolate_key_poses, normalize_scene, partition_scene, pixtocam,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// How a dataset hands out batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetMode {
    /// Random patches from random cameras, forever.
    Train,
    /// One full image per held-out (or visibility) frame, in capture order.
    Sequential,
    /// One full image per render pose, without ground truth.
    Render,
}

struct VirtualViews {
    synthesizer: VirtualViewSynthesizer,
    pool: VirtualPosePool,
    /// Rays per batch taken from virtual views.
    count: usize,
}

struct DatasetCore {
    split: Split,
    mode: DatasetMode,
    frames: Vec<Frame>,
    /// Real cameras, followed by the virtual pool when virtual views are on.
    cameras: Vec<Camera>,
    real_count: usize,
    width: usize,
    height: usize,
    sampler: Option<PatchSampler>,
    virtual_views: Option<VirtualViews>,
    assembler: RayBatchAssembler,
    caster: Arc<dyn RayCaster>,
    apply_bayer_mask: bool,
    normalization: NormalizationTransform,
    seed: Option<u64>,
}

/// Read-only ray source shared between the consumer and the batch producer.
#[derive(Clone)]
pub struct RayDataset {
    inner: Arc<DatasetCore>,
}

impl RayDataset {
    /// Load a scene through the registry and build a dataset on it.
    pub fn load(
        split: Split,
        data_dir: impl AsRef<Path>,
        config: &DatasetConfig,
        registry: &LoaderRegistry,
        caster: Arc<dyn RayCaster>,
        warper: Arc<dyn Warper>,
    ) -> Result<Self, DatasetError> {
        let wants_virtual = config.virtual_poses && split == Split::Train;
        let request = LoadRequest::new(data_dir.as_ref(), split)
            .with_depth(wants_virtual || config.compute_disp_metrics)
            .with_virtual_poses(wants_virtual);
        let scene = registry.load(&config.dataset_loader, &request)?;
        Self::new(split, scene, config, caster, warper)
    }

    /// Validate, normalize and partition `scene`, then prepare sampling.
    #[tracing::instrument(skip_all, fields(split = %split, frames = scene.len()))]
    pub fn new(
        split: Split,
        scene: SceneRecord,
        config: &DatasetConfig,
        caster: Arc<dyn RayCaster>,
        warper: Arc<dyn Warper>,
    ) -> Result<Self, DatasetError> {
        if config.world_size == 0 || config.global_rank >= config.world_size {
            return Err(DatasetError::config(format!(
                "process rank {} is outside a world of {}",
                config.global_rank, config.world_size
            )));
        }
        if !(0.0..1.0).contains(&config.virtual_fraction) {
            return Err(DatasetError::config(format!(
                "virtual fraction {} must lie in [0, 1)",
                config.virtual_fraction
            )));
        }
        scene.validate()?;

        let (scene, normalization) = normalize_scene(scene)?;
        let sensors = scene.descriptor.sensor_count;
        let total = scene.len();
        let scene = partition_scene(scene, split);
        info!(
            "Split {}: {} of {} frames ({} sensors per timestep)",
            split,
            scene.len(),
            total,
            sensors
        );
        if scene.is_empty() {
            return Err(SceneError::Empty.into());
        }

        let mode = if config.render_path {
            DatasetMode::Render
        } else if split == Split::Train && !config.compute_visibility {
            DatasetMode::Train
        } else {
            DatasetMode::Sequential
        };

        if mode != DatasetMode::Render {
            if config.compute_disp_metrics && !scene.has_depth() {
                return Err(SceneError::MissingModality("depth").into());
            }
            if config.compute_normal_metrics && !scene.has_normals() {
                return Err(SceneError::MissingModality("normals").into());
            }
            if config.load_sky_segments && !scene.has_sky_masks() {
                return Err(SceneError::MissingModality("sky mask").into());
            }
        }

        let SceneRecord {
            descriptor,
            frames,
            cameras,
            virtual_pool,
        } = scene;
        let real_count = cameras.len();

        let (cameras, width, height) = if mode == DatasetMode::Render {
            render_cameras(&cameras, &descriptor, config)?
        } else {
            (cameras, descriptor.width, descriptor.height)
        };

        let mut cameras = cameras;
        let mut sampler = None;
        let mut virtual_views = None;
        if mode == DatasetMode::Train {
            let batch_size = config.per_process_batch_size();
            let patch_sampler = PatchSampler::new(
                width,
                height,
                batch_size,
                config.patch_size,
                config.num_border_pixels_to_mask,
                config.batching,
                real_count,
            )?;

            if config.virtual_poses {
                if config.patch_size != 1 {
                    return Err(DatasetError::config(format!(
                        "virtual views need single-pixel patches, got patch size {}",
                        config.patch_size
                    )));
                }
                let pool = virtual_pool.ok_or(SceneError::MissingModality("virtual pose pool"))?;
                if pool.variants != config.virtual_variants {
                    return Err(DatasetError::config(format!(
                        "scene has {} virtual variants per camera, config expects {}",
                        pool.variants, config.virtual_variants
                    )));
                }
                if !frames.iter().all(|f| f.depth.is_some()) {
                    return Err(SceneError::MissingModality("depth").into());
                }
                if real_count <= WARMUP_GROUPS * sensors {
                    warn!(
                        "Only {} training cameras for {} sensors: every reference falls in the first {} warm-up timesteps, so virtual-view sampling will never return and the first training batch will hang",
                        real_count, sensors, WARMUP_GROUPS
                    );
                }
                let count = virtual_ray_count(config.virtual_fraction, patch_sampler.num_patches());
                info!("Reserving {} of {} rays per batch for virtual views", count, batch_size);
                cameras.extend(pool.cameras.iter().copied());
                virtual_views = Some(VirtualViews {
                    synthesizer: VirtualViewSynthesizer::new(sensors, warper),
                    pool,
                    count,
                });
            }
            sampler = Some(patch_sampler);
        }

        let loads_truth = mode != DatasetMode::Render;
        let assembler = RayBatchAssembler {
            near: config.near,
            far: config.far,
            load_disps: loads_truth && config.compute_disp_metrics,
            load_normals: loads_truth && config.compute_normal_metrics,
            load_sky_segs: loads_truth && config.load_sky_segments,
            image_size: (width, height),
        };

        let seed = config.seed.map(|s| s.wrapping_add(config.global_rank as u64));
        let core = DatasetCore {
            split,
            mode,
            frames,
            cameras,
            real_count,
            width,
            height,
            sampler,
            virtual_views,
            assembler,
            caster,
            apply_bayer_mask: config.apply_bayer_mask,
            normalization,
            seed,
        };
        info!(
            "Dataset ready: {:?} mode, {} examples at {}x{}",
            core.mode,
            core.size(),
            width,
            height
        );
        Ok(Self { inner: Arc::new(core) })
    }

    pub fn split(&self) -> Split {
        self.inner.split
    }

    pub fn mode(&self) -> DatasetMode {
        self.inner.mode
    }

    /// Number of examples: training cameras, held-out frames or render poses.
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    /// Image (width, height) of every batch.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.inner.width, self.inner.height)
    }

    /// The transform that was applied to the raw poses and depths.
    pub fn normalization(&self) -> NormalizationTransform {
        self.inner.normalization
    }

    /// Camera collection rays are cast from.
    pub fn cameras(&self) -> &[Camera] {
        &self.inner.cameras
    }

    pub(crate) fn seed(&self) -> Option<u64> {
        self.inner.seed
    }

    /// Sample one random training batch.
    pub fn next_train<R: Rng>(&self, rng: &mut R) -> Result<RayBatch, DatasetError> {
        let core = &self.inner;
        let sampler = core
            .sampler
            .as_ref()
            .ok_or_else(|| DatasetError::config("random batches need a training dataset"))?;
        let reserved = core.virtual_views.as_ref().map_or(0, |v| v.count);
        let sample = sampler.sample(rng, sampler.num_patches() - reserved);
        let mut selection = RaySelection::direct(sample.pix_x, sample.pix_y, sample.cam_idx);

        if let Some(views) = &core.virtual_views {
            let source = VirtualViewSource {
                cameras: &core.cameras[..core.real_count],
                frames: &core.frames,
                pool: &views.pool,
            };
            let correspondences = views.synthesizer.synthesize(rng, &source, views.count)?;
            selection = selection.merge_virtual(&correspondences, core.real_count)?;
        }
        if core.apply_bayer_mask {
            let mask = bayer_mask(&selection.truth_x, &selection.truth_y)?;
            selection = selection.with_lossmult(mask);
        }

        core.assembler
            .assemble(Some(core.frames.as_slice()), &core.cameras, core.caster.as_ref(), &selection)
    }

    /// Rays for every pixel of camera `cam_idx`.
    pub fn generate_ray_batch(&self, cam_idx: usize) -> Result<RayBatch, DatasetError> {
        let core = &self.inner;
        if cam_idx >= core.size() {
            return Err(DatasetError::config(format!(
                "camera {} requested from a dataset of {}",
                cam_idx,
                core.size()
            )));
        }
        let (xs, ys) = pixel_coordinates(core.width, core.height);
        let selection = RaySelection::direct(xs, ys, Grid::scalar(cam_idx as u32));
        let frames = match core.mode {
            DatasetMode::Render => None,
            DatasetMode::Train | DatasetMode::Sequential => Some(core.frames.as_slice()),
        };
        core.assembler
            .assemble(frames, &core.cameras, core.caster.as_ref(), &selection)
    }
}

impl DatasetCore {
    fn size(&self) -> usize {
        match self.mode {
            DatasetMode::Render => self.cameras.len(),
            DatasetMode::Train | DatasetMode::Sequential => self.real_count,
        }
    }
}

/// `floor(fraction * num_patches)`, tolerant of products like `0.29 * 100`
/// landing just below an integer.
fn virtual_ray_count(fraction: f64, num_patches: usize) -> usize {
    (fraction * num_patches as f64 + 1e-9).floor() as usize
}

/// Replace the split's cameras with render poses and ideal pinhole intrinsics.
fn render_cameras(
    cameras: &[Camera],
    descriptor: &raystream_data::SceneDescriptor,
    config: &DatasetConfig,
) -> Result<(Vec<Camera>, usize, usize), DatasetError> {
    let poses: Vec<DAffine3> = match &config.render_path_file {
        Some(path) => {
            let rows: Vec<Vec<Vec<f64>>> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            rows.iter()
                .enumerate()
                .map(|(i, m)| {
                    pose_from_rows(m).ok_or_else(|| {
                        DatasetError::config(format!("render pose {} in {} is not a 3x4 matrix", i, path.display()))
                    })
                })
                .collect::<Result<_, _>>()?
        }
        None => {
            let first_sensor: Vec<DAffine3> = cameras
                .iter()
                .step_by(descriptor.sensor_count.max(1))
                .map(|c| c.camtoworld)
                .collect();
            match config.render_path_frames {
                Some(n) => interpolate_key_poses(&first_sensor, n)?,
                None => first_sensor,
            }
        }
    };
    if poses.is_empty() {
        return Err(DatasetError::config("render path has no poses"));
    }

    let (width, height) = config.render_resolution.unwrap_or((descriptor.width, descriptor.height));
    let focal = config.render_focal.unwrap_or(descriptor.focal);
    let projection = config
        .render_camtype
        .map_or(descriptor.projection, |t| t.projection());
    let inverse_intrinsics = pixtocam(focal, width, height);
    info!(
        "Render path: {} poses at {}x{}, focal {:.2}, {:?}",
        poses.len(),
        width,
        height,
        focal,
        projection
    );
    let cameras = poses
        .into_iter()
        .map(|pose| Camera::new(inverse_intrinsics, pose).with_projection(projection))
        .collect();
    Ok((cameras, width, height))
}
