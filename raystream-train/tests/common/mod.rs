#![allow(dead_code)]

use glam::{DAffine3, DVec3};
use raystream_data::{Camera, Frame, PixelMap, ProjectionType, SceneDescriptor, SceneRecord, VirtualPosePool, pixtocam};

pub const WIDTH: usize = 8;
pub const HEIGHT: usize = 6;

/// Cameras of each timestep sit side by side and the rig moves forward over time.
/// Every image is filled with its frame index in the red channel.
pub fn synthetic_scene(timesteps: usize, sensors: usize, variants: Option<usize>) -> SceneRecord {
    let n = timesteps * sensors;
    let descriptor = SceneDescriptor {
        width: WIDTH,
        height: HEIGHT,
        focal: 8.0,
        sensor_count: sensors,
        projection: ProjectionType::Perspective,
    };
    let pose = |i: usize, jitter: f64| {
        let (t, s) = ((i / sensors) as f64, (i % sensors) as f64);
        DAffine3::from_translation(DVec3::new(s * 0.5 + jitter, 0.0, -t))
    };
    let camera = |p: DAffine3| Camera::new(pixtocam(8.0, WIDTH, HEIGHT), p);

    let frames = (0..n)
        .map(|i| {
            Frame::new(PixelMap::filled(WIDTH, HEIGHT, [i as f32, 0.5, 0.5]))
                .with_depth(PixelMap::filled(WIDTH, HEIGHT, 30.0))
        })
        .collect();
    let cameras = (0..n).map(|i| camera(pose(i, 0.0))).collect();
    let scene = SceneRecord::new(descriptor, frames, cameras);
    match variants {
        Some(k) => scene.with_virtual_pool(VirtualPosePool::new(
            k,
            (0..n * k).map(|j| camera(pose(j / k, 0.05 * (j % k) as f64))).collect(),
        )),
        None => scene,
    }
}
