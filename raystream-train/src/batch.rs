//! Ray batches handed to the training and evaluation loops.

use crate::grid::ShapeError;
use std::collections::BTreeMap;
use std::fmt;

/// Named channels of a [`RayBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelName {
    Origins,
    Directions,
    Viewdirs,
    Radii,
    Near,
    Far,
    LossMult,
    CamIdx,
    CamDirs,
    Rgb,
    Disps,
    Normals,
    Alphas,
    SkySegs,
    CameraId,
}

impl ChannelName {
    pub const ALL: [ChannelName; 15] = [
        ChannelName::Origins,
        ChannelName::Directions,
        ChannelName::Viewdirs,
        ChannelName::Radii,
        ChannelName::Near,
        ChannelName::Far,
        ChannelName::LossMult,
        ChannelName::CamIdx,
        ChannelName::CamDirs,
        ChannelName::Rgb,
        ChannelName::Disps,
        ChannelName::Normals,
        ChannelName::Alphas,
        ChannelName::SkySegs,
        ChannelName::CameraId,
    ];

    /// Key used by the model side.
    pub const fn key(self) -> &'static str {
        match self {
            ChannelName::Origins => "origins",
            ChannelName::Directions => "directions",
            ChannelName::Viewdirs => "viewdirs",
            ChannelName::Radii => "radii",
            ChannelName::Near => "near",
            ChannelName::Far => "far",
            ChannelName::LossMult => "lossmult",
            ChannelName::CamIdx => "cam_idx",
            ChannelName::CamDirs => "cam_dirs",
            ChannelName::Rgb => "rgb",
            ChannelName::Disps => "disps",
            ChannelName::Normals => "normals",
            ChannelName::Alphas => "alphas",
            ChannelName::SkySegs => "sky_segs",
            ChannelName::CameraId => "camera_id",
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Per-ray values with a fixed trailing width, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    width: usize,
    data: Vec<f32>,
}

impl Channel {
    pub fn new(width: usize, data: Vec<f32>) -> Self {
        Self { width, data }
    }

    pub fn scalars(data: Vec<f32>) -> Self {
        Self::new(1, data)
    }

    pub fn vectors(data: &[[f32; 3]]) -> Self {
        Self::new(3, bytemuck::cast_slice::<[f32; 3], f32>(data).to_vec())
    }

    /// Number of values per ray.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rays.
    pub fn rows(&self) -> usize {
        self.data.len() / self.width.max(1)
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Rays for one training step or one rendered image.
///
/// Every present channel has `shape.iter().product()` rows. Optional channels
/// that were not loaded are stored as `None` rather than zero-filled.
#[derive(Debug, Clone, PartialEq)]
pub struct RayBatch {
    shape: Vec<usize>,
    channels: BTreeMap<ChannelName, Option<Channel>>,
}

impl RayBatch {
    pub(crate) fn new(shape: Vec<usize>) -> Self {
        Self {
            shape,
            channels: BTreeMap::new(),
        }
    }

    /// Attach a channel, or mark it absent with `None`.
    pub(crate) fn insert(&mut self, name: ChannelName, channel: Option<Channel>) -> Result<(), ShapeError> {
        if let Some(c) = &channel {
            let expected = self.len();
            if c.data.len() != expected * c.width {
                return Err(ShapeError::Size {
                    shape: self.shape.clone(),
                    expected: expected * c.width,
                    actual: c.data.len(),
                });
            }
        }
        self.channels.insert(name, channel);
        Ok(())
    }

    /// Leading shape shared by all channels.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of rays.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The channel's data, or `None` if it is absent.
    pub fn get(&self, name: ChannelName) -> Option<&Channel> {
        self.channels.get(&name).and_then(Option::as_ref)
    }

    pub fn is_present(&self, name: ChannelName) -> bool {
        self.get(name).is_some()
    }

    /// Full shape of a present channel: the leading shape plus its width.
    pub fn channel_shape(&self, name: ChannelName) -> Option<Vec<usize>> {
        self.get(name).map(|c| {
            let mut shape = self.shape.clone();
            shape.push(c.width());
            shape
        })
    }

    /// All channels, including the ones marked absent.
    pub fn iter(&self) -> impl Iterator<Item = (ChannelName, Option<&Channel>)> {
        self.channels.iter().map(|(name, c)| (*name, c.as_ref()))
    }
}
