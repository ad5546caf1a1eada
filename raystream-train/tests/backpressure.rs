mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use raystream_data::Split;
use raystream_train::{DatasetConfig, DepthWarper, PinholeRayCaster, QUEUE_CAPACITY, RayDataset, StreamState};

fn wait_for(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    done()
}

fn train_dataset() -> RayDataset {
    let config = DatasetConfig {
        batch_size: 16,
        seed: Some(42),
        ..Default::default()
    };
    RayDataset::new(
        Split::Train,
        common::synthetic_scene(16, 1, None),
        &config,
        Arc::new(PinholeRayCaster),
        Arc::new(DepthWarper),
    )
    .unwrap()
}

#[test]
fn stalled_consumer_blocks_producer_at_queue_capacity() {
    let mut stream = train_dataset().stream();
    assert_eq!(stream.state(), StreamState::Idle);
    stream.start().unwrap();
    assert_eq!(stream.state(), StreamState::Streaming);

    let capacity = QUEUE_CAPACITY as u64;
    assert!(
        wait_for(Duration::from_secs(10), || stream.metrics().produced.get() == capacity),
        "producer never filled the queue"
    );
    // The consumer keeps sleeping; production must stay blocked.
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(stream.metrics().produced.get(), capacity);

    let batch = stream.next().unwrap().unwrap();
    assert_eq!(batch.len(), 16);
    assert!(
        wait_for(Duration::from_secs(10), || stream.metrics().produced.get() == capacity + 1),
        "producer did not resume after one batch was consumed"
    );
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(stream.metrics().produced.get(), capacity + 1);
    assert!(stream.metrics().in_flight() <= capacity);
}

#[test]
fn occupancy_never_exceeds_capacity_under_slow_consumer() {
    let mut stream = train_dataset().stream();
    for _ in 0..20 {
        stream.next().unwrap().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let metrics = stream.metrics();
        assert!(
            metrics.in_flight() <= QUEUE_CAPACITY as u64,
            "in-flight {} > capacity {}",
            metrics.in_flight(),
            QUEUE_CAPACITY
        );
    }
    assert_eq!(stream.metrics().consumed.get(), 20);
}
