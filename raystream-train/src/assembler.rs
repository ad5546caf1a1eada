//! Turn pixel/camera selections into populated ray batches.

use crate::batch::{Channel, ChannelName, RayBatch};
use crate::camera::{CastError, PixelSelection, RayCaster};
use crate::error::DatasetError;
use crate::grid::{Grid, ShapeError, broadcast_shapes};
use crate::virtual_view::Correspondence;
use raystream_data::{Camera, Frame, PixelMap};

/// Which pixels to cast rays through and which pixels supervise them.
///
/// For ordinary rays both sides are the same. Virtual-view rays are cast from
/// a virtual camera but take their targets from the reference pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct RaySelection {
    pub cast_x: Grid<u32>,
    pub cast_y: Grid<u32>,
    pub cast_cam: Grid<u32>,
    pub truth_x: Grid<u32>,
    pub truth_y: Grid<u32>,
    pub truth_cam: Grid<u32>,
    /// Per-ray loss weights with a trailing channel axis.
    pub lossmult: Option<Grid<f32>>,
}

impl RaySelection {
    pub fn direct(pix_x: Grid<u32>, pix_y: Grid<u32>, cam_idx: Grid<u32>) -> Self {
        Self {
            truth_x: pix_x.clone(),
            truth_y: pix_y.clone(),
            truth_cam: cam_idx.clone(),
            cast_x: pix_x,
            cast_y: pix_y,
            cast_cam: cam_idx,
            lossmult: None,
        }
    }

    pub fn with_lossmult(mut self, lossmult: Grid<f32>) -> Self {
        self.lossmult = Some(lossmult);
        self
    }

    /// Leading shape every channel of the resulting batch will have.
    pub fn shape(&self) -> Result<Vec<usize>, ShapeError> {
        broadcast_shapes(&[
            self.cast_x.shape(),
            self.cast_y.shape(),
            self.cast_cam.shape(),
            self.truth_x.shape(),
            self.truth_y.shape(),
            self.truth_cam.shape(),
        ])
    }

    /// Append virtual-view rays along the leading axis.
    ///
    /// The virtual camera of a correspondence sits at `real_count + src_virtual`
    /// in the camera collection. Loss weights, if any, are extended with ones.
    pub fn merge_virtual(self, correspondences: &[Correspondence], real_count: usize) -> Result<Self, ShapeError> {
        if correspondences.is_empty() {
            return Ok(self);
        }
        let shape = self.shape()?;
        let extra = vec![correspondences.len(), 1, 1];
        let column = |f: fn(&Correspondence) -> u32| Grid::from_fn(extra.clone(), |i| f(&correspondences[i]));

        let cast_x = self.cast_x.broadcast_to(&shape)?.concat(&column(|c| c.src_x))?;
        let cast_y = self.cast_y.broadcast_to(&shape)?.concat(&column(|c| c.src_y))?;
        let offset = real_count as u32;
        let virtual_cams = Grid::from_fn(extra.clone(), |i| offset + correspondences[i].src_virtual);
        let cast_cam = self.cast_cam.broadcast_to(&shape)?.concat(&virtual_cams)?;
        let truth_x = self.truth_x.broadcast_to(&shape)?.concat(&column(|c| c.ref_x))?;
        let truth_y = self.truth_y.broadcast_to(&shape)?.concat(&column(|c| c.ref_y))?;
        let truth_cam = self.truth_cam.broadcast_to(&shape)?.concat(&column(|c| c.ref_camera))?;

        let lossmult = match self.lossmult {
            Some(weights) => {
                let width = weights.shape().last().copied().unwrap_or(1);
                let mut full = shape.clone();
                full.push(width);
                let mut ones = extra.clone();
                ones.push(width);
                Some(weights.broadcast_to(&full)?.concat(&Grid::from_fn(ones, |_| 1.0))?)
            }
            None => None,
        };

        Ok(Self {
            cast_x,
            cast_y,
            cast_cam,
            truth_x,
            truth_y,
            truth_cam,
            lossmult,
        })
    }
}

/// Gathers ground truth and invokes the ray caster for a [`RaySelection`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayBatchAssembler {
    pub near: f32,
    pub far: f32,
    pub load_disps: bool,
    pub load_normals: bool,
    pub load_sky_segs: bool,
    /// Image size the pixel coordinates index into.
    pub image_size: (usize, usize),
}

impl RayBatchAssembler {
    /// Build a batch. `frames` is `None` for render-only requests, in which
    /// case no ground-truth channels are produced.
    pub fn assemble(
        &self,
        frames: Option<&[Frame]>,
        cameras: &[Camera],
        caster: &dyn RayCaster,
        selection: &RaySelection,
    ) -> Result<RayBatch, DatasetError> {
        let shape = selection.shape()?;
        let cast_x = selection.cast_x.broadcast_to(&shape)?;
        let cast_y = selection.cast_y.broadcast_to(&shape)?;
        let cast_cam = selection.cast_cam.broadcast_to(&shape)?;
        let truth_x = selection.truth_x.broadcast_to(&shape)?;
        let truth_y = selection.truth_y.broadcast_to(&shape)?;
        let truth_cam = selection.truth_cam.broadcast_to(&shape)?;
        let n = cast_x.len();

        let rays = caster.cast(
            cameras,
            &PixelSelection {
                pix_x: cast_x.as_slice(),
                pix_y: cast_y.as_slice(),
                cam_idx: cast_cam.as_slice(),
                image_size: self.image_size,
            },
        )?;

        let mut batch = RayBatch::new(shape.clone());
        batch.insert(ChannelName::Origins, Some(Channel::vectors(&rays.origins)))?;
        batch.insert(ChannelName::Directions, Some(Channel::vectors(&rays.directions)))?;
        batch.insert(ChannelName::Viewdirs, Some(Channel::vectors(&rays.viewdirs)))?;
        batch.insert(ChannelName::Radii, Some(Channel::scalars(rays.radii)))?;
        batch.insert(ChannelName::Near, Some(Channel::scalars(vec![self.near; n])))?;
        batch.insert(ChannelName::Far, Some(Channel::scalars(vec![self.far; n])))?;

        let lossmult = match &selection.lossmult {
            Some(weights) => {
                let width = weights.shape().last().copied().unwrap_or(1);
                let mut full = shape.clone();
                full.push(width);
                Channel::new(width, weights.broadcast_to(&full)?.into_vec())
            }
            None => Channel::scalars(vec![1.0; n]),
        };
        batch.insert(ChannelName::LossMult, Some(lossmult))?;

        let truth_ids: Vec<f32> = truth_cam.as_slice().iter().map(|&c| c as f32).collect();
        batch.insert(ChannelName::CamIdx, Some(Channel::scalars(truth_ids.clone())))?;
        batch.insert(ChannelName::CameraId, Some(Channel::scalars(truth_ids)))?;

        let cam_dirs = cast_cam
            .as_slice()
            .iter()
            .map(|&c| {
                cameras
                    .get(c as usize)
                    .map(|camera| camera.forward().as_vec3().to_array())
                    .ok_or(CastError::CameraOutOfRange {
                        index: c,
                        count: cameras.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        batch.insert(ChannelName::CamDirs, Some(Channel::vectors(&cam_dirs)))?;

        let targets = Targets {
            frames,
            xs: truth_x.as_slice(),
            ys: truth_y.as_slice(),
            cams: truth_cam.as_slice(),
        };
        batch.insert(ChannelName::Rgb, targets.gather_vectors(|f| Some(&f.image))?)?;
        let disps = if self.load_disps {
            targets.gather_scalars(|f| f.depth.as_ref())?
        } else {
            None
        };
        batch.insert(ChannelName::Disps, disps)?;
        let (normals, alphas) = if self.load_normals {
            (
                targets.gather_vectors(|f| f.normals.as_ref())?,
                targets.gather_scalars(|f| f.alpha.as_ref())?,
            )
        } else {
            (None, None)
        };
        batch.insert(ChannelName::Normals, normals)?;
        batch.insert(ChannelName::Alphas, alphas)?;
        let sky = if self.load_sky_segs {
            targets.gather_scalars(|f| f.sky_mask.as_ref())?
        } else {
            None
        };
        batch.insert(ChannelName::SkySegs, sky)?;

        Ok(batch)
    }
}

/// Ground-truth lookup at (camera, y, x) triples.
struct Targets<'a> {
    frames: Option<&'a [Frame]>,
    xs: &'a [u32],
    ys: &'a [u32],
    cams: &'a [u32],
}

impl Targets<'_> {
    fn gather<T: Copy>(
        &self,
        modality: impl Fn(&Frame) -> Option<&PixelMap<T>>,
    ) -> Result<Option<Vec<T>>, DatasetError> {
        let Some(frames) = self.frames else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(self.xs.len());
        for ((&x, &y), &camera) in self.xs.iter().zip(self.ys).zip(self.cams) {
            let Some(frame) = frames.get(camera as usize) else {
                return Err(DatasetError::Selection { camera, x, y });
            };
            // A modality missing from any frame makes the whole channel absent.
            let Some(map) = modality(frame) else {
                return Ok(None);
            };
            let value = map
                .get(x as usize, y as usize)
                .ok_or(DatasetError::Selection { camera, x, y })?;
            out.push(*value);
        }
        Ok(Some(out))
    }

    fn gather_scalars(
        &self,
        modality: impl Fn(&Frame) -> Option<&PixelMap<f32>>,
    ) -> Result<Option<Channel>, DatasetError> {
        Ok(self.gather(modality)?.map(Channel::scalars))
    }

    fn gather_vectors(
        &self,
        modality: impl Fn(&Frame) -> Option<&PixelMap<[f32; 3]>>,
    ) -> Result<Option<Channel>, DatasetError> {
        Ok(self.gather(modality)?.map(|v| Channel::vectors(&v)))
    }
}
