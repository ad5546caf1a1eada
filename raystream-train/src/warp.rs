//! Depth-based reprojection between two views.

use glam::{DAffine3, DMat3, DVec2, DVec3};
use raystream_data::PixelMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WarpError {
    #[error("intrinsic matrix is singular")]
    SingularIntrinsic,
    #[error("depth map is empty")]
    EmptyDepth,
}

/// Where each reference pixel lands in the source image.
///
/// Row-major over the reference depth map; `coords[i]` is meaningful only
/// where `valid[i]` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct WarpField {
    pub width: usize,
    pub height: usize,
    pub coords: Vec<DVec2>,
    pub valid: Vec<bool>,
}

impl WarpField {
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }
}

/// Reprojects a reference depth map into a source view.
///
/// Poses are camera-to-world in the OpenCV convention (y down, looking down +z).
pub trait Warper: Send + Sync {
    fn warp(
        &self,
        ref_pose: &DAffine3,
        src_pose: &DAffine3,
        ref_depth: &PixelMap<f32>,
        intrinsic: &DMat3,
    ) -> Result<WarpField, WarpError>;
}

/// Pinhole reprojection with a shared intrinsic matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthWarper;

impl Warper for DepthWarper {
    fn warp(
        &self,
        ref_pose: &DAffine3,
        src_pose: &DAffine3,
        ref_depth: &PixelMap<f32>,
        intrinsic: &DMat3,
    ) -> Result<WarpField, WarpError> {
        let (width, height) = ref_depth.dimensions();
        if width == 0 || height == 0 {
            return Err(WarpError::EmptyDepth);
        }
        if intrinsic.determinant().abs() < f64::EPSILON {
            return Err(WarpError::SingularIntrinsic);
        }
        let inv_intrinsic = intrinsic.inverse();
        // reference camera -> world -> source camera
        let ref_to_src = src_pose.inverse() * *ref_pose;
        let (max_x, max_y) = ((width - 1) as f64, (height - 1) as f64);

        let mut coords = Vec::with_capacity(width * height);
        let mut valid = Vec::with_capacity(width * height);
        for (i, &depth) in ref_depth.as_slice().iter().enumerate() {
            let (u, v) = ((i % width) as f64, (i / width) as f64);
            let depth = depth as f64;
            if depth.is_nan() || depth <= 0.0 {
                coords.push(DVec2::ZERO);
                valid.push(false);
                continue;
            }
            let point = ref_to_src.transform_point3(inv_intrinsic * DVec3::new(u, v, 1.0) * depth);
            if point.z <= 0.0 {
                coords.push(DVec2::ZERO);
                valid.push(false);
                continue;
            }
            let projected = *intrinsic * point;
            let uv = DVec2::new(projected.x / projected.z, projected.y / projected.z);
            coords.push(uv);
            valid.push(uv.x >= 0.0 && uv.x <= max_x && uv.y >= 0.0 && uv.y <= max_y);
        }
        Ok(WarpField {
            width,
            height,
            coords,
            valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raystream_data::intrinsic_matrix;

    fn k() -> DMat3 {
        intrinsic_matrix(4.0, 4.0, 2.0, 2.0)
    }

    #[test]
    fn test_identity_warp_maps_pixels_to_themselves() {
        let depth = PixelMap::filled(5, 5, 2.0f32);
        let field = DepthWarper
            .warp(&DAffine3::IDENTITY, &DAffine3::IDENTITY, &depth, &k())
            .unwrap();
        assert_eq!(field.valid_count(), 25);
        for (i, c) in field.coords.iter().enumerate() {
            assert!((c.x - (i % 5) as f64).abs() < 1e-9);
            assert!((c.y - (i / 5) as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sideways_source_shifts_pixels() {
        // Source camera one unit to the right: points appear shifted left by f * 1 / z = 2 px.
        let depth = PixelMap::filled(5, 5, 2.0f32);
        let src = DAffine3::from_translation(DVec3::new(1.0, 0.0, 0.0));
        let field = DepthWarper.warp(&DAffine3::IDENTITY, &src, &depth, &k()).unwrap();
        let center = field.coords[2 * 5 + 2];
        assert!((center.x - 0.0).abs() < 1e-9);
        assert!(field.valid[2 * 5 + 2]);
        // Columns 0 and 1 fall off the left edge.
        assert!(!field.valid[2 * 5]);
        assert!(!field.valid[2 * 5 + 1]);
        assert_eq!(field.valid_count(), 15);
    }

    #[test]
    fn test_missing_depth_is_invalid() {
        let mut depth = PixelMap::filled(3, 3, 1.0f32);
        depth.as_mut_slice()[4] = 0.0;
        let field = DepthWarper
            .warp(&DAffine3::IDENTITY, &DAffine3::IDENTITY, &depth, &intrinsic_matrix(2.0, 2.0, 1.0, 1.0))
            .unwrap();
        assert!(!field.valid[4]);
        assert_eq!(field.valid_count(), 8);
    }

    #[test]
    fn test_points_behind_source_are_invalid() {
        let depth = PixelMap::filled(3, 3, 1.0f32);
        let src = DAffine3::from_translation(DVec3::new(0.0, 0.0, 5.0));
        let field = DepthWarper
            .warp(&DAffine3::IDENTITY, &src, &depth, &intrinsic_matrix(2.0, 2.0, 1.0, 1.0))
            .unwrap();
        assert_eq!(field.valid_count(), 0);
    }

    #[test]
    fn test_singular_intrinsic_is_rejected() {
        let depth = PixelMap::filled(2, 2, 1.0f32);
        let err = DepthWarper
            .warp(&DAffine3::IDENTITY, &DAffine3::IDENTITY, &depth, &DMat3::ZERO)
            .unwrap_err();
        assert_eq!(err, WarpError::SingularIntrinsic);
    }
}
