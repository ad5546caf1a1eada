//! Depth-guided supervision at synthetic viewpoints.
//!
//! A real (reference) camera's depth map is reprojected into a nearby virtual
//! (source) camera. Rays are cast from the virtual camera while the colour
//! target is the reference pixel that landed there.

use crate::error::DatasetError;
use crate::warp::Warper;
use glam::DVec2;
use raystream_data::{Camera, Frame, SceneError, VirtualPosePool, flip_yz};
use rand::Rng;
use std::sync::Arc;
use tracing::warn;

/// Reference camera offsets, in camera groups, tried around a virtual view.
pub const REFERENCE_OFFSETS: [i64; 5] = [-2, -1, 0, 1, 2];

/// Camera groups at the start of a capture whose depth is not trusted.
pub const WARMUP_GROUPS: usize = 3;

const RETRY_LOG_INTERVAL: u64 = 1000;

/// A reference pixel and the source pixel it projects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correspondence {
    pub ref_x: u32,
    pub ref_y: u32,
    pub src_x: u32,
    pub src_y: u32,
    /// Index of the real reference camera.
    pub ref_camera: u32,
    /// Index into the virtual pose pool.
    pub src_virtual: u32,
    pub valid: bool,
}

/// Real cameras, their frames and the virtual pool the synthesizer draws from.
#[derive(Debug, Clone, Copy)]
pub struct VirtualViewSource<'a> {
    pub cameras: &'a [Camera],
    pub frames: &'a [Frame],
    pub pool: &'a VirtualPosePool,
}

pub struct VirtualViewSynthesizer {
    sensor_count: usize,
    warper: Arc<dyn Warper>,
}

impl VirtualViewSynthesizer {
    pub fn new(sensor_count: usize, warper: Arc<dyn Warper>) -> Self {
        Self {
            sensor_count: sensor_count.max(1),
            warper,
        }
    }

    /// Produce exactly `count` valid correspondences.
    ///
    /// Candidate (source, reference) pairs are redrawn until one yields at
    /// least `count` usable pixels. There is no attempt ceiling: a scene with
    /// no usable depth past the warm-up groups never returns.
    pub fn synthesize<R: Rng>(
        &self,
        rng: &mut R,
        source: &VirtualViewSource<'_>,
        count: usize,
    ) -> Result<Vec<Correspondence>, DatasetError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if source.pool.is_empty() {
            return Err(DatasetError::config("virtual pose pool is empty"));
        }

        let group = self.sensor_count as i64;
        let real_count = source.cameras.len() as i64;
        let mut attempts = 0u64;
        loop {
            attempts += 1;
            if attempts % RETRY_LOG_INTERVAL == 0 {
                warn!(attempts, count, "virtual view sampling has not found enough valid pixels");
            }

            let src_virtual = rng.random_range(0..source.pool.len());
            let src_real = source.pool.real_index(src_virtual) as i64;
            let offset = REFERENCE_OFFSETS[rng.random_range(0..REFERENCE_OFFSETS.len())] * group;
            let reference = match src_real + offset {
                r if (0..real_count).contains(&r) => r as usize,
                _ => src_real as usize,
            };
            if reference < WARMUP_GROUPS * self.sensor_count || reference >= source.cameras.len() {
                continue;
            }

            let depth = source.frames[reference]
                .depth
                .as_ref()
                .ok_or(SceneError::MissingModality("depth"))?;
            let ref_camera = &source.cameras[reference];
            let src_camera = &source.pool.cameras[src_virtual];
            let intrinsic = ref_camera.pixtocam.inverse();
            let field = self.warper.warp(
                &flip_yz(&ref_camera.camtoworld),
                &flip_yz(&src_camera.camtoworld),
                depth,
                &intrinsic,
            )?;

            let (width, height) = (field.width as f64, field.height as f64);
            let in_bounds = |c: DVec2| {
                let r = c.round();
                r.x >= 0.0 && r.x < width && r.y >= 0.0 && r.y < height
            };
            let usable: Vec<usize> = field
                .valid
                .iter()
                .zip(&field.coords)
                .enumerate()
                .filter(|(_, (valid, coord))| **valid && in_bounds(**coord))
                .map(|(i, _)| i)
                .collect();
            if usable.len() < count {
                continue;
            }

            let chosen = rand::seq::index::sample(rng, usable.len(), count);
            return Ok(chosen
                .iter()
                .map(|k| {
                    let i = usable[k];
                    let src = field.coords[i].round();
                    Correspondence {
                        ref_x: (i % field.width) as u32,
                        ref_y: (i / field.width) as u32,
                        src_x: src.x as u32,
                        src_y: src.y as u32,
                        ref_camera: reference as u32,
                        src_virtual: src_virtual as u32,
                        valid: true,
                    }
                })
                .collect());
        }
    }
}
