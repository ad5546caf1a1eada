mod common;

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use raystream_data::{IngestionError, LoadRequest, LoaderRegistry, SceneLoader, SceneRecord, Split, split_indices};
use raystream_train::{
    ChannelName, DatasetConfig, DatasetError, DatasetMode, DepthWarper, PinholeRayCaster, RayDataset,
};

fn build(split: Split, scene: SceneRecord, config: &DatasetConfig) -> RayDataset {
    RayDataset::new(split, scene, config, Arc::new(PinholeRayCaster), Arc::new(DepthWarper)).unwrap()
}

#[test]
fn two_cameras_sixteen_timesteps_split_into_four_and_twenty_eight() {
    assert_eq!(split_indices(32, 2, Split::Test), vec![0, 1, 16, 17]);
    assert_eq!(split_indices(32, 2, Split::Train).len(), 28);

    let config = DatasetConfig {
        batch_size: 32,
        ..Default::default()
    };
    let train = build(Split::Train, common::synthetic_scene(16, 2, None), &config);
    let test = build(Split::Test, common::synthetic_scene(16, 2, None), &config);
    assert_eq!(train.size(), 28);
    assert_eq!(test.size(), 4);
}

#[test]
fn eval_stream_yields_each_held_out_frame_then_ends() {
    let config = DatasetConfig {
        compute_disp_metrics: true,
        ..Default::default()
    };
    let test = build(Split::Test, common::synthetic_scene(16, 2, None), &config);
    assert_eq!(test.mode(), DatasetMode::Sequential);

    let batches = test.stream().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(batches.len(), 4);
    let red: Vec<f32> = batches
        .iter()
        .map(|b| b.get(ChannelName::Rgb).unwrap().row(0)[0])
        .collect();
    assert_eq!(red, vec![0.0, 1.0, 16.0, 17.0]);

    for batch in &batches {
        assert_eq!(batch.shape(), &[common::HEIGHT, common::WIDTH]);
        for (name, channel) in batch.iter() {
            if let Some(channel) = channel {
                assert_eq!(channel.rows(), common::WIDTH * common::HEIGHT, "{name}");
            }
        }
        assert!(batch.is_present(ChannelName::Disps));
        assert!(!batch.is_present(ChannelName::Normals));
        assert!(!batch.is_present(ChannelName::SkySegs));
    }
}

#[test]
fn train_stream_mixes_virtual_views_into_every_batch() {
    let config = DatasetConfig {
        batch_size: 40,
        virtual_poses: true,
        virtual_variants: 3,
        seed: Some(7),
        ..Default::default()
    };
    let train = build(Split::Train, common::synthetic_scene(16, 2, Some(3)), &config);
    // 28 real cameras followed by their 84 virtual poses.
    assert_eq!(train.cameras().len(), 28 + 84);

    let mut stream = train.stream();
    for _ in 0..5 {
        let batch = stream.next().unwrap().unwrap();
        assert_eq!(batch.shape(), &[40, 1, 1]);
        let ids = batch.get(ChannelName::CameraId).unwrap().as_slice();
        assert!(ids.iter().all(|&id| (id as usize) < 28));
        // Eight reserved rays reference a camera past the warm-up groups.
        assert!(ids[32..].iter().all(|&id| id as usize >= 6));
    }
}

#[test]
fn seeded_training_is_reproducible() {
    let config = DatasetConfig {
        batch_size: 16,
        ..Default::default()
    };
    let train = build(Split::Train, common::synthetic_scene(8, 1, None), &config);
    let a = train.next_train(&mut StdRng::seed_from_u64(5)).unwrap();
    let b = train.next_train(&mut StdRng::seed_from_u64(5)).unwrap();
    assert_eq!(a, b);
}

struct SyntheticLoader;

impl SceneLoader for SyntheticLoader {
    fn load_scene(&self, request: &LoadRequest) -> Result<SceneRecord, IngestionError> {
        let variants = request.load_virtual_poses.then_some(9);
        Ok(common::synthetic_scene(16, 2, variants))
    }
}

#[test]
fn registry_dispatches_on_configured_loader_key() {
    let mut registry = LoaderRegistry::with_defaults();
    registry.register("synthetic", SyntheticLoader);
    let config = DatasetConfig {
        dataset_loader: "synthetic".to_string(),
        batch_size: 20,
        virtual_poses: true,
        ..Default::default()
    };
    let train = RayDataset::load(
        Split::Train,
        "unused",
        &config,
        &registry,
        Arc::new(PinholeRayCaster),
        Arc::new(DepthWarper),
    )
    .unwrap();
    assert_eq!(train.size(), 28);

    let config = DatasetConfig {
        dataset_loader: "missing".to_string(),
        ..config
    };
    let err = RayDataset::load(
        Split::Test,
        "unused",
        &config,
        &registry,
        Arc::new(PinholeRayCaster),
        Arc::new(DepthWarper),
    )
    .err()
    .unwrap();
    assert!(matches!(err, DatasetError::Ingestion(IngestionError::UnknownLoader(_))));
}
