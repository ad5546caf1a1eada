//! Ray batch streaming example
//!
//! Builds a small synthetic two-sensor rig in memory, then pulls a few random
//! training batches followed by every full-image evaluation batch.
//!
//! Usage:
//!   cargo run --example stream_batches -- [num_steps]

use glam::{DAffine3, DQuat, DVec3};
use raystream::data::{Camera, Frame, PixelMap, ProjectionType, SceneDescriptor, pixtocam};
use raystream::train::{ChannelName, DepthWarper, PinholeRayCaster};
use raystream::{DatasetConfig, RayDataset, SceneRecord, Split};
use std::error::Error;
use std::sync::Arc;
use tracing::info;

const WIDTH: usize = 32;
const HEIGHT: usize = 24;
const FOCAL: f64 = 28.0;

fn synthetic_rig(timesteps: usize) -> SceneRecord {
    let descriptor = SceneDescriptor {
        width: WIDTH,
        height: HEIGHT,
        focal: FOCAL,
        sensor_count: 2,
        projection: ProjectionType::Perspective,
    };

    let mut frames = Vec::with_capacity(timesteps * 2);
    let mut cameras = Vec::with_capacity(timesteps * 2);
    for t in 0..timesteps {
        let yaw = t as f64 * 0.05;
        for sensor in 0..2 {
            let rotation = DQuat::from_rotation_y(yaw);
            let position = rotation * DVec3::new(sensor as f64 * 0.3 - 0.15, 0.0, 4.0);
            cameras.push(Camera::new(
                pixtocam(FOCAL, WIDTH, HEIGHT),
                DAffine3::from_rotation_translation(rotation, position),
            ));
            let shade = t as f32 / timesteps as f32;
            frames.push(Frame::new(PixelMap::filled(WIDTH, HEIGHT, [shade, 1.0 - shade, sensor as f32])));
        }
    }
    SceneRecord::new(descriptor, frames, cameras)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let steps: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 5,
    };

    let config = DatasetConfig {
        batch_size: 256,
        patch_size: 2,
        seed: Some(7),
        ..Default::default()
    };

    let train = RayDataset::new(
        Split::Train,
        synthetic_rig(24),
        &config,
        Arc::new(PinholeRayCaster),
        Arc::new(DepthWarper),
    )?;
    info!("Training split holds {} images", train.size());

    let mut stream = train.stream();
    for step in 0..steps {
        let batch = stream.next().ok_or("training stream ended")??;
        let lossmult = batch.get(ChannelName::LossMult).map(|c| c.rows());
        info!("step {}: shape {:?}, {:?} loss weights", step, batch.shape(), lossmult);
    }
    drop(stream);

    let test = RayDataset::new(
        Split::Test,
        synthetic_rig(24),
        &config,
        Arc::new(PinholeRayCaster),
        Arc::new(DepthWarper),
    )?;
    for (i, batch) in test.stream().enumerate() {
        let batch = batch?;
        let red = batch.get(ChannelName::Rgb).map(|rgb| rgb.row(0)[0]);
        info!("eval image {}: shape {:?}, red {:?}", i, batch.shape(), red);
    }

    Ok(())
}
