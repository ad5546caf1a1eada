//! Logging setup and the streaming loop.

use crate::Args;
use raystream_data::LoaderRegistry;
use raystream_train::{
    ChannelName, DatasetConfig, DatasetError, DatasetMode, DepthWarper, PinholeRayCaster, RayBatch, RayDataset,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

/// Logging configuration
pub struct LoggingConfig {
    pub level: String,
    pub enable_tracy: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_tracy: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

pub fn run(args: Args) -> Result<(), AppError> {
    let logging = LoggingConfig {
        level: args.log_level.clone(),
        #[cfg(feature = "tracy")]
        enable_tracy: args.tracy,
        #[cfg(not(feature = "tracy"))]
        enable_tracy: false,
    };
    init_logging(&logging);

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => DatasetConfig::default(),
    };
    info!(
        "Loading {} split of {} with the '{}' loader",
        args.split,
        args.data_dir.display(),
        config.dataset_loader
    );

    let registry = LoaderRegistry::with_defaults();
    let dataset = RayDataset::load(
        args.split,
        &args.data_dir,
        &config,
        &registry,
        Arc::new(PinholeRayCaster),
        Arc::new(DepthWarper),
    )?;

    let limit = match dataset.mode() {
        DatasetMode::Train => args.steps,
        DatasetMode::Sequential | DatasetMode::Render => dataset.size(),
    };
    let mut stream = dataset.stream();
    let start = Instant::now();
    let mut rays = 0usize;
    for (step, batch) in stream.by_ref().take(limit).enumerate() {
        let batch = batch?;
        rays += batch.len();
        log_batch(step, &batch);
    }

    let elapsed = start.elapsed().as_secs_f64();
    let metrics = stream.metrics();
    info!(
        "Streamed {} batches ({} rays) in {:.2}s, {} produced",
        metrics.consumed.get(),
        rays,
        elapsed,
        metrics.produced.get()
    );
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<DatasetConfig, AppError> {
    let json = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
        path: path.clone(),
        source,
    })?;
    DatasetConfig::from_json(&json).map_err(|source| AppError::ConfigParse {
        path: path.clone(),
        source,
    })
}

fn log_batch(step: usize, batch: &RayBatch) {
    let mean_rgb = batch.get(ChannelName::Rgb).map(|rgb| {
        let mut sum = [0.0f64; 3];
        for row in rgb.as_slice().chunks(3) {
            for (s, v) in sum.iter_mut().zip(row) {
                *s += *v as f64;
            }
        }
        sum.map(|s| s / rgb.rows().max(1) as f64)
    });
    let absent: Vec<&str> = batch
        .iter()
        .filter(|(_, c)| c.is_none())
        .map(|(name, _)| name.key())
        .collect();
    info!(
        step,
        shape = ?batch.shape(),
        mean_rgb = ?mean_rgb,
        absent = ?absent,
        "batch ready"
    );
}

fn init_logging(config: &LoggingConfig) {
    #[cfg(feature = "tracy")]
    {
        if config.enable_tracy {
            use tracing_subscriber::Layer;
            use tracing_subscriber::layer::SubscriberExt;
            use tracing_subscriber::util::SubscriberInitExt;
            tracing_subscriber::registry()
                .with(tracing_tracy::TracyLayer::default())
                .with(
                    tracing_subscriber::fmt::layer().with_filter(
                        tracing_subscriber::EnvFilter::try_from_default_env()
                            .unwrap_or_else(|_| config.level.clone().into()),
                    ),
                )
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level)),
        )
        .init();
}
