//! Pixel selection for training steps
//!
//! - Stratified patch sampling over image area and cameras
//! - Bayer-mosaic loss weights for raw sensor data

pub mod bayer;
pub mod patch;

pub use bayer::bayer_mask;
pub use patch::{PatchSample, PatchSampler};
