//! Ray caster contract and the reference pinhole/fisheye/panorama caster.

use glam::{DVec3, Vec3};
use raystream_data::{Camera, ProjectionType};
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CastError {
    #[error("camera index {index} out of range for {count} cameras")]
    CameraOutOfRange { index: u32, count: usize },
    #[error("camera {0} has lens distortion, which this caster does not model")]
    UnsupportedDistortion(u32),
    #[error("selection arrays differ in length: x={x}, y={y}, cameras={cameras}")]
    LengthMismatch { x: usize, y: usize, cameras: usize },
}

/// Flat, already broadcast pixel/camera selection.
#[derive(Debug, Clone, Copy)]
pub struct PixelSelection<'a> {
    pub pix_x: &'a [u32],
    pub pix_y: &'a [u32],
    pub cam_idx: &'a [u32],
    /// (width, height) of the image the pixels index into.
    pub image_size: (usize, usize),
}

impl PixelSelection<'_> {
    pub fn len(&self) -> usize {
        self.pix_x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pix_x.is_empty()
    }
}

/// Per-ray output of a [`RayCaster`], one entry per selected pixel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CastRays {
    pub origins: Vec<[f32; 3]>,
    pub directions: Vec<[f32; 3]>,
    pub viewdirs: Vec<[f32; 3]>,
    pub radii: Vec<f32>,
}

impl CastRays {
    fn with_capacity(n: usize) -> Self {
        Self {
            origins: Vec::with_capacity(n),
            directions: Vec::with_capacity(n),
            viewdirs: Vec::with_capacity(n),
            radii: Vec::with_capacity(n),
        }
    }
}

/// Maps pixels of a camera collection to world-space rays.
pub trait RayCaster: Send + Sync {
    fn cast(&self, cameras: &[Camera], pixels: &PixelSelection<'_>) -> Result<CastRays, CastError>;
}

/// Distortion-free caster for perspective, fisheye and equirectangular cameras.
///
/// Rays go through pixel centers. Directions are left unnormalized (unit depth
/// along the optical axis for perspective cameras); `viewdirs` are normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinholeRayCaster;

impl PinholeRayCaster {
    /// Camera-space direction (x right, y up, looking down -z) through pixel (x, y).
    fn camera_direction(camera: &Camera, x: f64, y: f64, image_size: (usize, usize)) -> DVec3 {
        match camera.projection {
            ProjectionType::Perspective => opencv_to_opengl(camera.pixtocam * DVec3::new(x, y, 1.0)),
            ProjectionType::Fisheye => {
                let d = camera.pixtocam * DVec3::new(x, y, 1.0);
                let (u, v) = (d.x / d.z, d.y / d.z);
                let theta = (u * u + v * v).sqrt().min(PI);
                let (sin, cos) = theta.sin_cos();
                let factor = if theta > 1e-12 { sin / theta } else { 1.0 };
                opencv_to_opengl(DVec3::new(u * factor, v * factor, cos))
            }
            ProjectionType::Spherical => {
                let (width, height) = image_size;
                let theta = x / width.max(1) as f64 * 2.0 * PI;
                let phi = y / height.max(1) as f64 * PI;
                let (sin_phi, cos_phi) = phi.sin_cos();
                DVec3::new(-sin_phi * theta.sin(), cos_phi, sin_phi * theta.cos())
            }
        }
    }
}

fn opencv_to_opengl(d: DVec3) -> DVec3 {
    DVec3::new(d.x, -d.y, -d.z)
}

fn to_f32(v: DVec3) -> [f32; 3] {
    v.as_vec3().to_array()
}

impl RayCaster for PinholeRayCaster {
    fn cast(&self, cameras: &[Camera], pixels: &PixelSelection<'_>) -> Result<CastRays, CastError> {
        let n = pixels.len();
        if pixels.pix_y.len() != n || pixels.cam_idx.len() != n {
            return Err(CastError::LengthMismatch {
                x: n,
                y: pixels.pix_y.len(),
                cameras: pixels.cam_idx.len(),
            });
        }

        let scale = 2.0 / 12f64.sqrt();
        let mut rays = CastRays::with_capacity(n);
        for i in 0..n {
            let index = pixels.cam_idx[i];
            let camera = cameras.get(index as usize).ok_or(CastError::CameraOutOfRange {
                index,
                count: cameras.len(),
            })?;
            if camera.distortion.is_some() {
                return Err(CastError::UnsupportedDistortion(index));
            }

            let x = pixels.pix_x[i] as f64 + 0.5;
            let y = pixels.pix_y[i] as f64 + 0.5;
            let rotation = camera.camtoworld.matrix3;
            let direction = rotation * Self::camera_direction(camera, x, y, pixels.image_size);
            let direction_dx = rotation * Self::camera_direction(camera, x + 1.0, y, pixels.image_size);

            rays.origins.push(to_f32(camera.position()));
            rays.directions.push(to_f32(direction));
            rays.viewdirs.push(direction.as_vec3().normalize_or(Vec3::NEG_Z).to_array());
            rays.radii.push(((direction_dx - direction).length() * scale) as f32);
        }
        Ok(rays)
    }
}
