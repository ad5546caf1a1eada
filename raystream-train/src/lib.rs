//! Raystream Training Crate
//!
//! Turns a loaded scene into an endless stream of training ray batches, or a
//! finite sequence of full-image batches for evaluation and rendering.
//!
//! ## Modules
//!
//! - [`sampler`]: Stratified patch sampling and Bayer loss weights
//! - [`virtual_view`]: Depth-guided supervision at synthetic viewpoints
//! - [`assembler`]: Ray casting and ground-truth gathering
//! - [`dataset`]: Normalized, partitioned scene ready for sampling
//! - [`stream`]: Bounded producer/consumer queue over a dataset

pub mod assembler;
pub mod batch;
pub mod camera;
pub mod config;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod sampler;
pub mod stream;
pub mod virtual_view;
pub mod warp;

pub use assembler::{RayBatchAssembler, RaySelection};
pub use batch::{Channel, ChannelName, RayBatch};
pub use camera::{CastError, CastRays, PinholeRayCaster, PixelSelection, RayCaster};
pub use config::{BatchingMethod, DatasetConfig, RenderCameraType};
pub use dataset::{DatasetMode, RayDataset};
pub use error::DatasetError;
pub use grid::{Grid, ShapeError};
pub use sampler::{PatchSample, PatchSampler};
pub use stream::{QUEUE_CAPACITY, RayStream, StreamMetrics, StreamState};
pub use virtual_view::{Correspondence, VirtualViewSynthesizer};
pub use warp::{DepthWarper, WarpError, WarpField, Warper};
