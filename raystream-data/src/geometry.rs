//! Small camera-geometry helpers shared by adapters and the dataset.

use crate::error::SceneError;
use crate::types::PixelMap;
use glam::{DAffine3, DMat3, DQuat, DVec3};

/// Switch a camera-to-world pose between the OpenGL (y up, looking down -z)
/// and OpenCV (y down, looking down +z) camera conventions.
///
/// The operation is its own inverse.
pub fn flip_yz(pose: &DAffine3) -> DAffine3 {
    let flip = DMat3::from_diagonal(DVec3::new(1.0, -1.0, -1.0));
    DAffine3::from_mat3_translation(pose.matrix3 * flip, pose.translation)
}

/// Pinhole intrinsic matrix.
pub fn intrinsic_matrix(fx: f64, fy: f64, cx: f64, cy: f64) -> DMat3 {
    DMat3::from_cols(
        DVec3::new(fx, 0.0, 0.0),
        DVec3::new(0.0, fy, 0.0),
        DVec3::new(cx, cy, 1.0),
    )
}

/// Inverse intrinsics of an ideal pinhole centered on the image.
pub fn pixtocam(focal: f64, width: usize, height: usize) -> DMat3 {
    intrinsic_matrix(focal, focal, width as f64 * 0.5, height as f64 * 0.5).inverse()
}

/// Build a pose from a row-major 3x4 or 4x4 matrix.
///
/// Returns `None` when the rows are not at least 3x4.
pub fn pose_from_rows(rows: &[Vec<f64>]) -> Option<DAffine3> {
    if rows.len() < 3 || rows.iter().take(3).any(|r| r.len() < 4) {
        return None;
    }
    let col = |c: usize| DVec3::new(rows[0][c], rows[1][c], rows[2][c]);
    Some(DAffine3::from_mat3_translation(
        DMat3::from_cols(col(0), col(1), col(2)),
        col(3),
    ))
}

/// Convert z-depth into distance along each pixel's ray.
pub fn depth_to_distance(depth: &PixelMap<f32>, fx: f64, fy: f64, cx: f64, cy: f64) -> PixelMap<f32> {
    PixelMap::from_fn(depth.width(), depth.height(), |u, v| {
        let d = depth.get(u, v).copied().unwrap_or(0.0) as f64;
        let a = (u as f64 - cx) / fx;
        let b = (v as f64 - cy) / fy;
        (d * (a * a + b * b + 1.0).sqrt()) as f32
    })
}

/// Blend two poses: rotation by slerp, translation linearly. `t = 0` gives `a`.
pub fn blend_poses(a: &DAffine3, b: &DAffine3, t: f64) -> DAffine3 {
    let qa = DQuat::from_mat3(&a.matrix3);
    let qb = DQuat::from_mat3(&b.matrix3);
    let rotation = qa.slerp(qb, t);
    DAffine3::from_mat3_translation(
        DMat3::from_quat(rotation),
        a.translation.lerp(b.translation, t),
    )
}

/// Generate `n_out` poses along a path through `key_poses`.
///
/// Only the first two key poses are ever used: pose `i` blends them with
/// weight `i / n_out`, so the path starts at `key_poses[0]` and stops short of
/// `key_poses[1]`. Any further key poses are ignored. This matches the path
/// previously rendered for existing scenes and is kept as-is.
pub fn interpolate_key_poses(key_poses: &[DAffine3], n_out: usize) -> Result<Vec<DAffine3>, SceneError> {
    let [first, second, ..] = key_poses else {
        return Err(SceneError::NotEnoughKeyPoses(key_poses.len()));
    };
    Ok((0..n_out)
        .map(|i| blend_poses(first, second, i as f64 / n_out as f64))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: DVec3, b: DVec3) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn test_flip_yz_is_involution() {
        let pose = DAffine3::from_rotation_translation(
            DQuat::from_rotation_y(0.3),
            DVec3::new(1.0, 2.0, 3.0),
        );
        let twice = flip_yz(&flip_yz(&pose));
        assert!(twice.abs_diff_eq(pose, 1e-12));
        // Looking direction flips sign, translation is untouched.
        let flipped = flip_yz(&pose);
        assert!(approx(flipped.matrix3.z_axis, -pose.matrix3.z_axis));
        assert_eq!(flipped.translation, pose.translation);
    }

    #[test]
    fn test_pixtocam_maps_center_to_axis() {
        let inv = pixtocam(50.0, 100, 80);
        let dir = inv * DVec3::new(50.0, 40.0, 1.0);
        assert!(approx(dir, DVec3::new(0.0, 0.0, 1.0)));
        let dir = inv * DVec3::new(100.0, 40.0, 1.0);
        assert!(approx(dir, DVec3::new(1.0, 0.0, 1.0)));
    }

    #[test]
    fn test_pose_from_rows() {
        let rows = vec![
            vec![1.0, 0.0, 0.0, 5.0],
            vec![0.0, 1.0, 0.0, 6.0],
            vec![0.0, 0.0, 1.0, 7.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ];
        let pose = pose_from_rows(&rows).unwrap();
        assert_eq!(pose.translation, DVec3::new(5.0, 6.0, 7.0));
        assert_eq!(pose.matrix3, DMat3::IDENTITY);
        assert!(pose_from_rows(&rows[..2]).is_none());
    }

    #[test]
    fn test_depth_to_distance_center_and_corner() {
        let depth = PixelMap::filled(3, 3, 2.0f32);
        let distance = depth_to_distance(&depth, 1.0, 1.0, 1.0, 1.0);
        assert!((distance.get(1, 1).unwrap() - 2.0).abs() < 1e-6);
        let expected = 2.0 * 3.0f32.sqrt();
        assert!((distance.get(0, 0).unwrap() - expected).abs() < 1e-5);
    }

    #[test]
    fn test_interpolate_uses_first_two_key_poses_only() {
        let a = DAffine3::from_translation(DVec3::ZERO);
        let b = DAffine3::from_translation(DVec3::new(4.0, 0.0, 0.0));
        let c = DAffine3::from_translation(DVec3::new(100.0, 0.0, 0.0));
        let path = interpolate_key_poses(&[a, b, c], 4).unwrap();
        assert_eq!(path.len(), 4);
        let xs: Vec<f64> = path.iter().map(|p| p.translation.x).collect();
        for (x, expected) in xs.iter().zip([0.0, 1.0, 2.0, 3.0]) {
            assert!((x - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_interpolate_rotation_midpoint() {
        let a = DAffine3::IDENTITY;
        let b = DAffine3::from_quat(DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2));
        let path = interpolate_key_poses(&[a, b], 2).unwrap();
        let mid = DQuat::from_mat3(&path[1].matrix3);
        let expected = DQuat::from_rotation_z(std::f64::consts::FRAC_PI_4);
        assert!(mid.abs_diff_eq(expected, 1e-9) || mid.abs_diff_eq(-expected, 1e-9));
    }

    #[test]
    fn test_interpolate_requires_two_key_poses() {
        let err = interpolate_key_poses(&[DAffine3::IDENTITY], 3).unwrap_err();
        assert!(matches!(err, SceneError::NotEnoughKeyPoses(1)));
    }
}
