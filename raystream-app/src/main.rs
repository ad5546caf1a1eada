//! Raystream Application
//!
//! Loads a scene directory, builds a dataset for one split and streams ray
//! batches from it, logging per-batch statistics.

mod app;

use clap::Parser;
use raystream_data::Split;
use std::path::PathBuf;

/// Raystream - streamed ray batches for radiance-field training
#[derive(Parser, Debug)]
#[command(name = "raystream")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// JSON dataset config; missing keys use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scene directory handed to the configured loader
    #[arg(short, long)]
    data_dir: PathBuf,

    /// Split to stream (train or test)
    #[arg(short, long, default_value = "train")]
    split: Split,

    /// Training batches to pull before exiting (evaluation streams end on their own)
    #[arg(long, default_value_t = 10)]
    steps: usize,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Send spans to Tracy
    #[cfg(feature = "tracy")]
    #[arg(long)]
    tracy: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = app::run(args) {
        eprintln!("Application error: {}", e);
        std::process::exit(1);
    }
}
