//! Train/test partitioning for interleaved multi-camera captures.
//!
//! Frames are ordered timestep-major, camera-minor. Once every
//! [`TEST_PERIOD`] timesteps the whole camera group is held out for
//! novel-view evaluation; every other timestep trains.

use crate::types::{SceneRecord, VirtualPosePool};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Number of timesteps between held-out camera groups.
pub const TEST_PERIOD: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Split::Train => write!(f, "train"),
            Split::Test => write!(f, "test"),
        }
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "test" => Ok(Split::Test),
            other => Err(format!("unknown split '{other}' (expected 'train' or 'test')")),
        }
    }
}

/// Split membership of frame `index` in a capture with `sensor_count` cameras.
pub fn split_of(index: usize, sensor_count: usize) -> Split {
    let sensors = sensor_count.max(1);
    if index % (TEST_PERIOD * sensors) < sensors {
        Split::Test
    } else {
        Split::Train
    }
}

/// Split membership of virtual pool entry `index` when every real camera
/// contributes `variants` entries.
///
/// Entry `j` follows the real frame `j / variants`.
pub fn virtual_split_of(index: usize, sensor_count: usize, variants: usize) -> Split {
    let group = sensor_count.max(1) * variants.max(1);
    if index % (TEST_PERIOD * group) < group {
        Split::Test
    } else {
        Split::Train
    }
}

/// Indices of the frames that belong to `split`, in capture order.
pub fn split_indices(frame_count: usize, sensor_count: usize, split: Split) -> Vec<usize> {
    (0..frame_count)
        .filter(|&i| split_of(i, sensor_count) == split)
        .collect()
}

/// Keep only the frames of `split`.
///
/// The virtual pose pool only accompanies the training split; its surviving
/// entries stay aligned so that train-local frame `t` owns pool entries
/// `t * variants .. (t + 1) * variants`.
pub fn partition_scene(scene: SceneRecord, split: Split) -> SceneRecord {
    let sensors = scene.descriptor.sensor_count;
    let SceneRecord {
        descriptor,
        frames,
        cameras,
        virtual_pool,
    } = scene;

    let frames = frames
        .into_iter()
        .enumerate()
        .filter(|(i, _)| split_of(*i, sensors) == split)
        .map(|(_, f)| f)
        .collect();
    let cameras = cameras
        .into_iter()
        .enumerate()
        .filter(|(i, _)| split_of(*i, sensors) == split)
        .map(|(_, c)| c)
        .collect();
    let virtual_pool = match (split, virtual_pool) {
        (Split::Train, Some(pool)) => {
            let variants = pool.variants;
            let cameras = pool
                .cameras
                .into_iter()
                .enumerate()
                .filter(|(j, _)| virtual_split_of(*j, sensors, variants) == Split::Train)
                .map(|(_, c)| c)
                .collect();
            Some(VirtualPosePool::new(variants, cameras))
        }
        _ => None,
    };

    SceneRecord {
        descriptor,
        frames,
        cameras,
        virtual_pool,
    }
}
