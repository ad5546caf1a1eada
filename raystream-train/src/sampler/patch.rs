//! Stratified patch sampling.

use crate::config::BatchingMethod;
use crate::error::DatasetError;
use crate::grid::{Grid, pixel_coordinates};
use rand::Rng;

/// Pixels and cameras chosen for one training step.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchSample {
    /// `[num_patches, p, p]`
    pub pix_x: Grid<u32>,
    /// `[num_patches, p, p]`
    pub pix_y: Grid<u32>,
    /// `[num_patches, 1, 1]` for per-patch cameras, `[1]` for a shared camera.
    pub cam_idx: Grid<u32>,
}

/// Draws `p x p` patches at uniformly random positions away from the image border.
#[derive(Debug, Clone)]
pub struct PatchSampler {
    width: usize,
    height: usize,
    patch_size: usize,
    border: usize,
    batching: BatchingMethod,
    camera_count: usize,
    num_patches: usize,
}

impl PatchSampler {
    pub fn new(
        width: usize,
        height: usize,
        batch_size: usize,
        patch_size: usize,
        border: usize,
        batching: BatchingMethod,
        camera_count: usize,
    ) -> Result<Self, DatasetError> {
        if patch_size == 0 {
            return Err(DatasetError::config("patch size must be at least 1"));
        }
        let patch_area = patch_size * patch_size;
        if patch_area > batch_size {
            return Err(DatasetError::config(format!(
                "patch size {patch_size} needs {patch_area} rays but the per-process batch holds {batch_size}"
            )));
        }
        if width < 2 * border + patch_size || height < 2 * border + patch_size {
            return Err(DatasetError::config(format!(
                "{width}x{height} image cannot fit a {patch_size}px patch inside a {border}px border"
            )));
        }
        if camera_count == 0 {
            return Err(DatasetError::config("no cameras to sample from"));
        }
        Ok(Self {
            width,
            height,
            patch_size,
            border,
            batching,
            camera_count,
            num_patches: batch_size / patch_area,
        })
    }

    /// Patches per full batch.
    pub fn num_patches(&self) -> usize {
        self.num_patches
    }

    pub fn patch_size(&self) -> usize {
        self.patch_size
    }

    /// Draw `num_patches` patches.
    pub fn sample<R: Rng>(&self, rng: &mut R, num_patches: usize) -> PatchSample {
        let p = self.patch_size;
        let lo = self.border;
        let x_hi = self.width - self.border - p + 1;
        let y_hi = self.height - self.border - p + 1;

        let mut origin_x = Vec::with_capacity(num_patches);
        let mut origin_y = Vec::with_capacity(num_patches);
        for _ in 0..num_patches {
            origin_x.push(rng.random_range(lo..x_hi) as u32);
            origin_y.push(rng.random_range(lo..y_hi) as u32);
        }

        let cam_idx = match self.batching {
            BatchingMethod::AllImages => Grid::from_fn(vec![num_patches, 1, 1], |_| {
                rng.random_range(0..self.camera_count) as u32
            }),
            BatchingMethod::SingleImage => Grid::from_vec(vec![rng.random_range(0..self.camera_count) as u32]),
        };

        let (dx, dy) = pixel_coordinates(p, p);
        PatchSample {
            pix_x: offset_patches(&origin_x, &dx),
            pix_y: offset_patches(&origin_y, &dy),
            cam_idx,
        }
    }
}

/// Add the `[p, p]` offset grid to `[n, 1, 1]` patch origins.
fn offset_patches(origins: &[u32], offsets: &Grid<u32>) -> Grid<u32> {
    let p = offsets.shape()[0];
    let area = p * p;
    Grid::from_fn(vec![origins.len(), p, p], |i| origins[i / area] + offsets.as_slice()[i % area])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_batch_of_four_two_pixel_patches() {
        let sampler = PatchSampler::new(8, 8, 16, 2, 0, BatchingMethod::AllImages, 3).unwrap();
        assert_eq!(sampler.num_patches(), 4);
        let mut rng = StdRng::seed_from_u64(7);
        let sample = sampler.sample(&mut rng, sampler.num_patches());
        assert_eq!(sample.pix_x.shape(), &[4, 2, 2]);
        assert_eq!(sample.cam_idx.shape(), &[4, 1, 1]);
        assert!(sample.pix_x.as_slice().iter().all(|&x| x <= 7));
        assert!(sample.pix_y.as_slice().iter().all(|&y| y <= 7));
        assert!(sample.cam_idx.as_slice().iter().all(|&c| c < 3));
    }

    #[test]
    fn test_border_confines_patch_origins() {
        let sampler = PatchSampler::new(8, 8, 16, 2, 1, BatchingMethod::AllImages, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let sample = sampler.sample(&mut rng, 4);
            for patch in sample.pix_x.as_slice().chunks(4) {
                // Top-left x of each patch lies in [1, 5]; the patch spans one more column.
                assert!((1..=5).contains(&patch[0]));
                assert!(patch.iter().all(|x| (1..=6).contains(x)));
            }
        }
    }

    #[test]
    fn test_patch_pixels_are_contiguous() {
        let sampler = PatchSampler::new(16, 16, 9, 3, 0, BatchingMethod::AllImages, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let sample = sampler.sample(&mut rng, 1);
        let xs = sample.pix_x.as_slice();
        let ys = sample.pix_y.as_slice();
        assert_eq!(xs, &[xs[0], xs[0] + 1, xs[0] + 2].repeat(3)[..]);
        assert_eq!(ys[0], ys[2]);
        assert_eq!(ys[3], ys[0] + 1);
        assert_eq!(ys[8], ys[0] + 2);
    }

    #[test]
    fn test_single_image_shares_camera() {
        let sampler = PatchSampler::new(8, 8, 8, 1, 0, BatchingMethod::SingleImage, 5).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let sample = sampler.sample(&mut rng, sampler.num_patches());
        assert_eq!(sample.cam_idx.shape(), &[1]);
        assert_eq!(sample.pix_x.shape(), &[8, 1, 1]);
    }

    #[test]
    fn test_patch_larger_than_batch_is_rejected() {
        let err = PatchSampler::new(8, 8, 8, 3, 0, BatchingMethod::AllImages, 1).unwrap_err();
        assert!(matches!(err, DatasetError::Configuration(_)));
    }

    #[test]
    fn test_border_too_wide_is_rejected() {
        let err = PatchSampler::new(8, 8, 16, 2, 4, BatchingMethod::AllImages, 1).unwrap_err();
        assert!(matches!(err, DatasetError::Configuration(_)));
    }

    #[test]
    fn test_seed_changes_positions_not_count() {
        let sampler = PatchSampler::new(64, 64, 32, 1, 0, BatchingMethod::AllImages, 2).unwrap();
        let a = sampler.sample(&mut StdRng::seed_from_u64(1), 32);
        let b = sampler.sample(&mut StdRng::seed_from_u64(2), 32);
        assert_eq!(a.pix_x.len(), b.pix_x.len());
        assert_ne!(a.pix_x, b.pix_x);
    }
}
