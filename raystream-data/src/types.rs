//! Canonical in-memory scene representation.
//!
//! Scene adapters produce a [`SceneRecord`]; everything downstream reads it.
//! Poses are camera-to-world transforms in the ray caster's convention
//! (x right, y up, camera looking down -z).

use crate::error::SceneError;
use glam::{DAffine3, DMat3, DVec3};
use serde::Deserialize;

/// How a camera maps pixels to ray directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionType {
    #[default]
    Perspective,
    Fisheye,
    /// Equirectangular panorama covering the full sphere.
    Spherical,
}

/// Radial-tangential lens distortion coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
}

/// Intrinsics and extrinsics of a single capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Inverse intrinsic matrix (pixel to camera space).
    pub pixtocam: DMat3,
    /// Camera-to-world pose.
    pub camtoworld: DAffine3,
    pub distortion: Option<Distortion>,
    pub projection: ProjectionType,
}

impl Camera {
    /// Create a distortion-free perspective camera.
    pub fn new(pixtocam: DMat3, camtoworld: DAffine3) -> Self {
        Self {
            pixtocam,
            camtoworld,
            distortion: None,
            projection: ProjectionType::Perspective,
        }
    }

    pub fn with_distortion(mut self, distortion: Distortion) -> Self {
        self.distortion = Some(distortion);
        self
    }

    pub fn with_projection(mut self, projection: ProjectionType) -> Self {
        self.projection = projection;
        self
    }

    /// Camera center in world space.
    pub fn position(&self) -> DVec3 {
        self.camtoworld.translation
    }

    /// Viewing axis in world space (the camera looks down its local -z).
    pub fn forward(&self) -> DVec3 {
        -self.camtoworld.matrix3.z_axis
    }
}

/// Dense per-pixel data stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelMap<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> PixelMap<T> {
    /// Wrap row-major pixel data, checking that it covers `width * height` pixels.
    pub fn new(width: usize, height: usize, data: Vec<T>) -> Result<Self, SceneError> {
        if data.len() != width * height {
            return Err(SceneError::LengthMismatch {
                what: "pixel map",
                expected: width * height,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Get dimensions (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.width && y < self.height {
            self.data.get(y * self.width + x)
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> PixelMap<U> {
        PixelMap {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl<T: Clone> PixelMap<T> {
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }
}

/// One capture: an RGB image plus optional per-pixel modalities.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Linear RGB in [0, 1].
    pub image: PixelMap<[f32; 3]>,
    /// Depth along the camera axis, in scene units.
    pub depth: Option<PixelMap<f32>>,
    pub normals: Option<PixelMap<[f32; 3]>>,
    /// Alpha matching `normals`.
    pub alpha: Option<PixelMap<f32>>,
    pub sky_mask: Option<PixelMap<f32>>,
}

impl Frame {
    pub fn new(image: PixelMap<[f32; 3]>) -> Self {
        Self {
            image,
            depth: None,
            normals: None,
            alpha: None,
            sky_mask: None,
        }
    }

    pub fn with_depth(mut self, depth: PixelMap<f32>) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_normals(mut self, normals: PixelMap<[f32; 3]>, alpha: PixelMap<f32>) -> Self {
        self.normals = Some(normals);
        self.alpha = Some(alpha);
        self
    }

    pub fn with_sky_mask(mut self, sky_mask: PixelMap<f32>) -> Self {
        self.sky_mask = Some(sky_mask);
        self
    }

    /// Get image dimensions (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        self.image.dimensions()
    }
}

/// Synthetic cameras used for virtual-view supervision.
///
/// Entry `real_index * variants + variant` is the `variant`-th synthetic
/// viewpoint generated around real camera `real_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualPosePool {
    pub variants: usize,
    pub cameras: Vec<Camera>,
}

impl VirtualPosePool {
    pub fn new(variants: usize, cameras: Vec<Camera>) -> Self {
        Self { variants, cameras }
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Pool index of `variant` around real camera `real_index`.
    pub fn virtual_index(&self, real_index: usize, variant: usize) -> usize {
        real_index * self.variants + variant
    }

    /// Real camera a pool entry was generated from.
    pub fn real_index(&self, virtual_index: usize) -> usize {
        virtual_index / self.variants
    }
}

/// Scalars every scene variant must provide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneDescriptor {
    pub width: usize,
    pub height: usize,
    /// Focal length for ideal pinhole rendering.
    pub focal: f64,
    /// Number of synchronized cameras per timestep.
    pub sensor_count: usize,
    pub projection: ProjectionType,
}

/// Everything a scene adapter hands to the dataset.
///
/// Frames are ordered timestep-major, camera-minor; the split partitioner
/// relies on that ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRecord {
    pub descriptor: SceneDescriptor,
    pub frames: Vec<Frame>,
    pub cameras: Vec<Camera>,
    pub virtual_pool: Option<VirtualPosePool>,
}

impl SceneRecord {
    pub fn new(descriptor: SceneDescriptor, frames: Vec<Frame>, cameras: Vec<Camera>) -> Self {
        Self {
            descriptor,
            frames,
            cameras,
            virtual_pool: None,
        }
    }

    pub fn with_virtual_pool(mut self, pool: VirtualPosePool) -> Self {
        self.virtual_pool = Some(pool);
        self
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Check the array-length and resolution invariants.
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.frames.is_empty() {
            return Err(SceneError::Empty);
        }
        if self.descriptor.sensor_count == 0 {
            return Err(SceneError::NoSensors);
        }
        if self.cameras.len() != self.frames.len() {
            return Err(SceneError::LengthMismatch {
                what: "camera list",
                expected: self.frames.len(),
                actual: self.cameras.len(),
            });
        }

        let (width, height) = (self.descriptor.width, self.descriptor.height);
        let check = |what: &'static str, dims: (usize, usize)| {
            if dims != (width, height) {
                return Err(SceneError::DimensionMismatch {
                    what,
                    width,
                    height,
                    actual_width: dims.0,
                    actual_height: dims.1,
                });
            }
            Ok(())
        };
        for frame in &self.frames {
            check("image", frame.image.dimensions())?;
            if let Some(depth) = &frame.depth {
                check("depth map", depth.dimensions())?;
            }
            if let Some(normals) = &frame.normals {
                check("normal map", normals.dimensions())?;
            }
            if let Some(alpha) = &frame.alpha {
                check("alpha map", alpha.dimensions())?;
            }
            if let Some(sky) = &frame.sky_mask {
                check("sky mask", sky.dimensions())?;
            }
        }

        if let Some(pool) = &self.virtual_pool {
            if pool.variants == 0 {
                return Err(SceneError::NoVirtualVariants);
            }
            if pool.len() != self.frames.len() * pool.variants {
                return Err(SceneError::LengthMismatch {
                    what: "virtual pose pool",
                    expected: self.frames.len() * pool.variants,
                    actual: pool.len(),
                });
            }
        }
        Ok(())
    }

    pub fn has_depth(&self) -> bool {
        self.frames.iter().all(|f| f.depth.is_some())
    }

    pub fn has_normals(&self) -> bool {
        self.frames
            .iter()
            .all(|f| f.normals.is_some() && f.alpha.is_some())
    }

    pub fn has_sky_masks(&self) -> bool {
        self.frames.iter().all(|f| f.sky_mask.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(width: usize, height: usize) -> SceneDescriptor {
        SceneDescriptor {
            width,
            height,
            focal: 10.0,
            sensor_count: 1,
            projection: ProjectionType::Perspective,
        }
    }

    fn frame(width: usize, height: usize) -> Frame {
        Frame::new(PixelMap::filled(width, height, [0.5; 3]))
    }

    #[test]
    fn test_pixel_map_rejects_short_data() {
        let err = PixelMap::new(4, 4, vec![0.0f32; 15]).unwrap_err();
        assert!(matches!(err, SceneError::LengthMismatch { expected: 16, actual: 15, .. }));
    }

    #[test]
    fn test_pixel_map_indexing() {
        let map = PixelMap::from_fn(3, 2, |x, y| (y * 10 + x) as f32);
        assert_eq!(map.get(2, 1), Some(&12.0));
        assert_eq!(map.get(3, 0), None);
        assert_eq!(map.get(0, 2), None);
    }

    #[test]
    fn test_validate_empty_scene() {
        let scene = SceneRecord::new(descriptor(4, 4), Vec::new(), Vec::new());
        assert!(matches!(scene.validate(), Err(SceneError::Empty)));
    }

    #[test]
    fn test_validate_camera_count_mismatch() {
        let scene = SceneRecord::new(
            descriptor(4, 4),
            vec![frame(4, 4), frame(4, 4)],
            vec![Camera::new(DMat3::IDENTITY, DAffine3::IDENTITY)],
        );
        assert!(matches!(
            scene.validate(),
            Err(SceneError::LengthMismatch { what: "camera list", .. })
        ));
    }

    #[test]
    fn test_validate_resolution_mismatch() {
        let scene = SceneRecord::new(
            descriptor(4, 4),
            vec![frame(4, 3)],
            vec![Camera::new(DMat3::IDENTITY, DAffine3::IDENTITY)],
        );
        assert!(matches!(scene.validate(), Err(SceneError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_validate_virtual_pool_length() {
        let camera = Camera::new(DMat3::IDENTITY, DAffine3::IDENTITY);
        let scene = SceneRecord::new(descriptor(4, 4), vec![frame(4, 4)], vec![camera])
            .with_virtual_pool(VirtualPosePool::new(3, vec![camera; 2]));
        assert!(matches!(
            scene.validate(),
            Err(SceneError::LengthMismatch { what: "virtual pose pool", expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_virtual_index_arithmetic() {
        let pool = VirtualPosePool::new(9, Vec::new());
        assert_eq!(pool.virtual_index(4, 2), 38);
        assert_eq!(pool.real_index(38), 4);
        assert_eq!(pool.real_index(35), 3);
    }

    #[test]
    fn test_camera_forward_is_negative_z() {
        let camera = Camera::new(DMat3::IDENTITY, DAffine3::IDENTITY);
        assert_eq!(camera.forward(), DVec3::new(0.0, 0.0, -1.0));
    }
}
