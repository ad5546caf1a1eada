//! Recentering and isotropic rescaling of camera translations.

use crate::error::SceneError;
use crate::types::SceneRecord;
use glam::{DAffine3, DVec3};
use tracing::debug;

/// The `(center, scale)` pair that maps raw poses into the canonical volume.
///
/// Applying it subtracts `center` from every translation and multiplies the
/// result by `scale`; depth values are multiplied by the same `scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationTransform {
    pub center: DVec3,
    pub scale: f64,
}

impl NormalizationTransform {
    pub const IDENTITY: Self = Self {
        center: DVec3::ZERO,
        scale: 1.0,
    };

    /// Fit the transform so the mean camera distance from the centroid becomes 1.
    pub fn fit(poses: &[DAffine3]) -> Result<Self, SceneError> {
        if poses.is_empty() {
            return Err(SceneError::Empty);
        }
        let count = poses.len() as f64;
        let center = poses.iter().map(|p| p.translation).sum::<DVec3>() / count;
        let mean_norm = poses
            .iter()
            .map(|p| (p.translation - center).length())
            .sum::<f64>()
            / count;
        if !(mean_norm.is_finite() && mean_norm > 0.0) {
            return Err(SceneError::DegeneratePoses);
        }
        Ok(Self {
            center,
            scale: 1.0 / mean_norm,
        })
    }

    pub fn apply_pose(&self, pose: &DAffine3) -> DAffine3 {
        DAffine3::from_mat3_translation(pose.matrix3, (pose.translation - self.center) * self.scale)
    }

    pub fn invert_pose(&self, pose: &DAffine3) -> DAffine3 {
        DAffine3::from_mat3_translation(pose.matrix3, pose.translation / self.scale + self.center)
    }

    pub fn apply_depth(&self, depth: f32) -> f32 {
        (depth as f64 * self.scale) as f32
    }

    pub fn invert_depth(&self, depth: f32) -> f32 {
        (depth as f64 / self.scale) as f32
    }
}

/// Normalize a scene using the centroid and spread of its own real cameras.
///
/// Virtual poses and depth maps are transformed with the same pair.
#[tracing::instrument(skip_all, fields(frames = scene.len()))]
pub fn normalize_scene(scene: SceneRecord) -> Result<(SceneRecord, NormalizationTransform), SceneError> {
    let poses: Vec<DAffine3> = scene.cameras.iter().map(|c| c.camtoworld).collect();
    let transform = NormalizationTransform::fit(&poses)?;
    debug!(
        "Normalizing {} poses: center = {:?}, scale = {:.6}",
        poses.len(),
        transform.center,
        transform.scale
    );
    Ok((normalize_scene_with(scene, &transform), transform))
}

/// Apply a transform fitted elsewhere, e.g. on the training cameras of the
/// same capture when normalizing held-out poses.
pub fn normalize_scene_with(mut scene: SceneRecord, transform: &NormalizationTransform) -> SceneRecord {
    for camera in &mut scene.cameras {
        camera.camtoworld = transform.apply_pose(&camera.camtoworld);
    }
    if let Some(pool) = &mut scene.virtual_pool {
        for camera in &mut pool.cameras {
            camera.camtoworld = transform.apply_pose(&camera.camtoworld);
        }
    }
    for frame in &mut scene.frames {
        if let Some(depth) = &mut frame.depth {
            for d in depth.as_mut_slice() {
                *d = transform.apply_depth(*d);
            }
        }
    }
    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Camera, Frame, PixelMap, ProjectionType, SceneDescriptor, VirtualPosePool};
    use glam::{DMat3, DQuat};

    fn scene_with_translations(translations: &[DVec3]) -> SceneRecord {
        let cameras: Vec<Camera> = translations
            .iter()
            .enumerate()
            .map(|(i, t)| {
                Camera::new(
                    DMat3::IDENTITY,
                    DAffine3::from_rotation_translation(DQuat::from_rotation_y(i as f64 * 0.1), *t),
                )
            })
            .collect();
        let frames = translations
            .iter()
            .map(|_| {
                Frame::new(PixelMap::filled(2, 2, [0.0; 3])).with_depth(PixelMap::filled(2, 2, 4.0))
            })
            .collect();
        SceneRecord::new(
            SceneDescriptor {
                width: 2,
                height: 2,
                focal: 1.0,
                sensor_count: 1,
                projection: ProjectionType::Perspective,
            },
            frames,
            cameras,
        )
    }

    #[test]
    fn test_mean_distance_becomes_one() {
        let scene = scene_with_translations(&[
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(14.0, 0.0, 0.0),
            DVec3::new(12.0, 3.0, 0.0),
            DVec3::new(12.0, -3.0, 1.0),
        ]);
        let (scene, transform) = normalize_scene(scene).unwrap();

        let centroid = scene.cameras.iter().map(|c| c.position()).sum::<DVec3>() / 4.0;
        assert!(centroid.length() < 1e-9);
        let mean = scene.cameras.iter().map(|c| c.position().length()).sum::<f64>() / 4.0;
        assert!((mean - 1.0).abs() < 1e-9);

        let depth = scene.frames[0].depth.as_ref().unwrap();
        let expected = (4.0 * transform.scale) as f32;
        assert!((depth.get(0, 0).unwrap() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_round_trip_recovers_poses() {
        let translations = [
            DVec3::new(-3.5, 2.0, 100.0),
            DVec3::new(1.25, -7.0, 98.0),
            DVec3::new(0.0, 0.5, 103.0),
        ];
        let original = scene_with_translations(&translations);
        let (normalized, transform) = normalize_scene(original.clone()).unwrap();
        for (before, after) in original.cameras.iter().zip(&normalized.cameras) {
            let restored = transform.invert_pose(&after.camtoworld);
            assert!(restored.abs_diff_eq(before.camtoworld, 1e-5));
            assert_eq!(after.camtoworld.matrix3, before.camtoworld.matrix3);
        }
        let depth = normalized.frames[1].depth.as_ref().unwrap();
        assert!((transform.invert_depth(*depth.get(1, 1).unwrap()) - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_virtual_poses_share_the_transform() {
        let scene = scene_with_translations(&[DVec3::new(2.0, 0.0, 0.0), DVec3::new(-2.0, 0.0, 0.0)]);
        let pool_cameras = vec![
            Camera::new(DMat3::IDENTITY, DAffine3::from_translation(DVec3::new(4.0, 0.0, 0.0))),
            Camera::new(DMat3::IDENTITY, DAffine3::from_translation(DVec3::new(0.0, 2.0, 0.0))),
        ];
        let scene = scene.with_virtual_pool(VirtualPosePool::new(1, pool_cameras));
        let (scene, transform) = normalize_scene(scene).unwrap();
        assert!((transform.scale - 0.5).abs() < 1e-12);
        let pool = scene.virtual_pool.unwrap();
        assert!((pool.cameras[0].position() - DVec3::new(2.0, 0.0, 0.0)).length() < 1e-12);
        assert!((pool.cameras[1].position() - DVec3::new(0.0, 1.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn test_empty_scene_is_rejected() {
        assert!(matches!(NormalizationTransform::fit(&[]), Err(SceneError::Empty)));
    }

    #[test]
    fn test_coincident_cameras_are_rejected() {
        let poses = [DAffine3::from_translation(DVec3::ONE); 3];
        assert!(matches!(
            NormalizationTransform::fit(&poses),
            Err(SceneError::DegeneratePoses)
        ));
    }
}
