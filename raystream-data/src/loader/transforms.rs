//! Adapter for Blender/NGP style `transforms.json` captures.

use super::{LoadRequest, SceneLoader};
use crate::error::IngestionError;
use crate::geometry::{intrinsic_matrix, pose_from_rows};
use crate::types::{
    Camera, Distortion, Frame, PixelMap, ProjectionType, SceneDescriptor, SceneRecord, VirtualPosePool,
};
use image::imageops::FilterType;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Deserialize, Debug)]
struct TransformsFile {
    w: u32,
    h: u32,
    cx: Option<f64>,
    cy: Option<f64>,
    fl_x: Option<f64>,
    fl_y: Option<f64>,
    camera_angle_x: Option<f64>,
    camera_angle_y: Option<f64>,
    k1: Option<f64>,
    k2: Option<f64>,
    p1: Option<f64>,
    p2: Option<f64>,
    #[serde(default = "default_camera_count")]
    camera_count: usize,
    #[serde(default = "default_depth_scale")]
    depth_scale: f64,
    frames: Vec<FrameEntry>,
    #[serde(default)]
    virtual_frames: Vec<PoseEntry>,
    virtual_variants: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct FrameEntry {
    file_path: String,
    transform_matrix: Vec<Vec<f64>>,
    depth_path: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PoseEntry {
    transform_matrix: Vec<Vec<f64>>,
}

fn default_camera_count() -> usize {
    1
}

fn default_depth_scale() -> f64 {
    1.0
}

/// Reads `transforms.json` plus the images it lists.
///
/// The whole capture is always returned; per-split files such as
/// `transforms_test.json` are ignored because the dataset partitions frames
/// itself.
///
/// Optional keys beyond the usual Blender layout:
/// - `camera_count`: synchronized cameras per timestep (frames must be
///   timestep-major),
/// - `frames[].depth_path` with `depth_scale`: 16-bit z-depth images,
/// - `virtual_frames` with `virtual_variants`: the virtual pose pool.
///
/// Frames whose image file does not exist are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformsLoader;

impl TransformsLoader {
    fn pose_file(data_dir: &Path) -> PathBuf {
        data_dir.join("transforms.json")
    }

    fn read_image(path: &Path, width: u32, height: u32) -> Result<PixelMap<[f32; 3]>, IngestionError> {
        let mut image = image::open(path)
            .map_err(|e| IngestionError::image(path, e))?
            .to_rgb32f();
        if image.dimensions() != (width, height) {
            debug!("Resizing {} to {}x{}", path.display(), width, height);
            image = image::imageops::resize(&image, width, height, FilterType::Triangle);
        }
        let data = image.pixels().map(|p| p.0).collect();
        Ok(PixelMap::new(width as usize, height as usize, data)?)
    }

    fn read_depth(path: &Path, width: u32, height: u32, scale: f64) -> Result<PixelMap<f32>, IngestionError> {
        let mut depth = image::open(path)
            .map_err(|e| IngestionError::image(path, e))?
            .to_luma16();
        if depth.dimensions() != (width, height) {
            depth = image::imageops::resize(&depth, width, height, FilterType::Nearest);
        }
        let data = depth.pixels().map(|p| (p.0[0] as f64 * scale) as f32).collect();
        Ok(PixelMap::new(width as usize, height as usize, data)?)
    }
}

impl SceneLoader for TransformsLoader {
    #[tracing::instrument(skip_all, fields(dir = %request.data_dir.display(), split = %request.split))]
    fn load_scene(&self, request: &LoadRequest) -> Result<SceneRecord, IngestionError> {
        let data_dir = request.data_dir.as_path();
        let pose_path = Self::pose_file(data_dir);
        debug!("Reading poses from: {}", pose_path.display());
        let file = File::open(&pose_path).map_err(|e| IngestionError::io(&pose_path, e))?;
        let meta: TransformsFile = serde_json::from_reader(BufReader::new(file))?;

        let (w, h) = (meta.w as f64, meta.h as f64);
        let fx = match (meta.fl_x, meta.camera_angle_x) {
            (Some(fx), _) => fx,
            (None, Some(angle)) => 0.5 * w / (0.5 * angle).tan(),
            (None, None) => {
                return Err(IngestionError::malformed(
                    &pose_path,
                    "neither 'fl_x' nor 'camera_angle_x' is present",
                ));
            }
        };
        let fy = match (meta.fl_y, meta.camera_angle_y) {
            (Some(fy), _) => fy,
            (None, Some(angle)) => 0.5 * h / (0.5 * angle).tan(),
            (None, None) => fx,
        };
        let intrinsic = intrinsic_matrix(fx, fy, meta.cx.unwrap_or(w / 2.0), meta.cy.unwrap_or(h / 2.0));
        let pixtocam = intrinsic.inverse();
        let distortion = if [meta.k1, meta.k2, meta.p1, meta.p2].iter().any(Option::is_some) {
            Some(Distortion {
                k1: meta.k1.unwrap_or(0.0),
                k2: meta.k2.unwrap_or(0.0),
                p1: meta.p1.unwrap_or(0.0),
                p2: meta.p2.unwrap_or(0.0),
            })
        } else {
            None
        };
        let make_camera = |rows: &[Vec<f64>], what: &str| {
            let pose = pose_from_rows(rows)
                .ok_or_else(|| IngestionError::malformed(&pose_path, format!("{what} is not a 3x4 matrix")))?;
            let mut camera = Camera::new(pixtocam, pose);
            camera.distortion = distortion;
            Ok::<_, IngestionError>(camera)
        };

        let mut frames = Vec::with_capacity(meta.frames.len());
        let mut cameras = Vec::with_capacity(meta.frames.len());
        for (i, entry) in meta.frames.iter().enumerate() {
            let image_path = data_dir.join(&entry.file_path);
            if !image_path.exists() {
                warn!("Skipping frame {}: {} does not exist", i, image_path.display());
                continue;
            }
            let mut frame = Frame::new(Self::read_image(&image_path, meta.w, meta.h)?);
            if request.load_depth {
                let depth_path = entry.depth_path.as_ref().ok_or_else(|| {
                    IngestionError::malformed(&pose_path, format!("frame {i} has no 'depth_path'"))
                })?;
                frame = frame.with_depth(Self::read_depth(
                    &data_dir.join(depth_path),
                    meta.w,
                    meta.h,
                    meta.depth_scale,
                )?);
            }
            frames.push(frame);
            cameras.push(make_camera(&entry.transform_matrix, "transform_matrix")?);
        }

        let descriptor = SceneDescriptor {
            width: meta.w as usize,
            height: meta.h as usize,
            focal: fx,
            sensor_count: meta.camera_count,
            projection: ProjectionType::Perspective,
        };
        let mut scene = SceneRecord::new(descriptor, frames, cameras);

        if request.load_virtual_poses {
            let variants = meta.virtual_variants.ok_or_else(|| {
                IngestionError::malformed(&pose_path, "virtual poses requested but 'virtual_variants' is missing")
            })?;
            let pool = meta
                .virtual_frames
                .iter()
                .map(|entry| make_camera(&entry.transform_matrix, "virtual transform_matrix"))
                .collect::<Result<Vec<_>, _>>()?;
            scene = scene.with_virtual_pool(VirtualPosePool::new(variants, pool));
        }

        info!(
            "Parsed {}: {} frames, focal {:.2}",
            pose_path.display(),
            scene.len(),
            fx
        );
        Ok(scene)
    }
}
