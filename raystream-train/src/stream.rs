//! Background batch production behind a bounded queue.

use crate::batch::RayBatch;
use crate::dataset::{DatasetMode, RayDataset};
use crate::error::DatasetError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::{debug, info, warn};

/// Batches the producer may run ahead of the consumer.
pub const QUEUE_CAPACITY: usize = 3;

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Batch counts shared by the producer and the consumer.
#[derive(Debug, Default)]
pub struct StreamMetrics {
    /// Batches handed to the queue (or built directly in sequential mode).
    pub produced: Counter,
    /// Batches taken by the consumer.
    pub consumed: Counter,
}

impl StreamMetrics {
    /// Batches produced but not yet consumed.
    pub fn in_flight(&self) -> u64 {
        self.produced.get().saturating_sub(self.consumed.get())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
}

enum Backend {
    Producer {
        rx: Receiver<Result<RayBatch, DatasetError>>,
        handle: Option<thread::JoinHandle<()>>,
        closed: bool,
    },
    Sequential {
        next: usize,
    },
}

/// Pull-based sequence of ray batches.
///
/// Training datasets stream random batches forever from a producer thread
/// through a queue of [`QUEUE_CAPACITY`]. Sequential and render datasets yield
/// one full image per example in order and then end.
pub struct RayStream {
    dataset: RayDataset,
    metrics: Arc<StreamMetrics>,
    backend: Option<Backend>,
}

impl RayDataset {
    /// An idle stream over this dataset.
    pub fn stream(&self) -> RayStream {
        RayStream {
            dataset: self.clone(),
            metrics: Arc::new(StreamMetrics::default()),
            backend: None,
        }
    }
}

impl RayStream {
    pub fn state(&self) -> StreamState {
        match self.backend {
            None => StreamState::Idle,
            Some(_) => StreamState::Streaming,
        }
    }

    pub fn metrics(&self) -> &StreamMetrics {
        &self.metrics
    }

    /// Begin production. Called implicitly by the first `next`.
    pub fn start(&mut self) -> Result<(), DatasetError> {
        if self.backend.is_some() {
            return Ok(());
        }
        let backend = match self.dataset.mode() {
            DatasetMode::Train => self.spawn_producer()?,
            DatasetMode::Sequential | DatasetMode::Render => Backend::Sequential { next: 0 },
        };
        self.backend = Some(backend);
        Ok(())
    }

    fn spawn_producer(&self) -> Result<Backend, DatasetError> {
        let (tx, rx) = mpsc::sync_channel(QUEUE_CAPACITY);
        let dataset = self.dataset.clone();
        let metrics = Arc::clone(&self.metrics);
        let handle = thread::Builder::new()
            .name("raystream-producer".to_string())
            .spawn(move || {
                let mut rng = match dataset.seed() {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_os_rng(),
                };
                info!("Batch producer started for {} split", dataset.split());
                loop {
                    let batch = dataset.next_train(&mut rng);
                    let failed = batch.is_err();
                    if tx.send(batch).is_err() {
                        break;
                    }
                    metrics.produced.inc();
                    if failed {
                        warn!("Batch producer stopping after an error");
                        break;
                    }
                }
                info!("Batch producer stopped after {} batches", metrics.produced.get());
            })?;
        Ok(Backend::Producer {
            rx,
            handle: Some(handle),
            closed: false,
        })
    }
}

impl Iterator for RayStream {
    type Item = Result<RayBatch, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Err(e) = self.start() {
            return Some(Err(e));
        }
        match self.backend.as_mut()? {
            Backend::Producer { rx, closed, .. } => match rx.recv() {
                Ok(batch) => {
                    self.metrics.consumed.inc();
                    Some(batch)
                }
                // The producer only hangs up after an error or a panic.
                Err(_) if !*closed => {
                    *closed = true;
                    Some(Err(DatasetError::StreamClosed))
                }
                Err(_) => None,
            },
            Backend::Sequential { next } => {
                if *next >= self.dataset.size() {
                    return None;
                }
                let index = *next;
                *next += 1;
                debug!("Generating full-image batch {}/{}", index + 1, self.dataset.size());
                let batch = self.dataset.generate_ray_batch(index);
                self.metrics.produced.inc();
                self.metrics.consumed.inc();
                Some(batch)
            }
        }
    }
}

impl Drop for RayStream {
    fn drop(&mut self) {
        if let Some(Backend::Producer { rx, handle, .. }) = self.backend.take() {
            // Hang up first so a producer blocked on a full queue wakes and exits.
            drop(rx);
            if let Some(handle) = handle {
                join_producer(handle);
            }
        }
    }
}

/// Wait for the producer thread; returns `false` if it panicked.
fn join_producer(handle: thread::JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            warn!("Batch producer panicked: {}", message);
            false
        }
    }
}
