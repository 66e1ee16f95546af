//! End-to-end run of the local example generation loop.

use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::DriverManager;
use geopatch::config::{ExecutionMode, GenerateExamplesConfig};
use geopatch::io::sink::read_shard;
use geopatch::pipeline::generate_examples;
use geopatch::types::{Coordinate, GeoPatchError};
use std::path::Path;

const PIXEL_DEGREES: f64 = 1e-4;
const TARGET_RESOLUTION: f64 = PIXEL_DEGREES * 111_000.0;
const RASTER_SIZE: usize = 200;

fn texture(r: i64, c: i64) -> u8 {
    let r = r.rem_euclid(RASTER_SIZE as i64) as u64;
    let c = c.rem_euclid(RASTER_SIZE as i64) as u64;
    ((r * r * 5 + c * c * 11 + r * c * 3) % 217 + 31) as u8
}

fn create_rgb_raster<P: AsRef<Path>>(path: P, shift: i64) {
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut dataset = driver
        .create_with_band_type::<u8, _>(
            path.as_ref(),
            RASTER_SIZE,
            RASTER_SIZE,
            3,
        )
        .unwrap();
    dataset
        .set_geo_transform(&[30.0, PIXEL_DEGREES, 0.0, 10.0, 0.0, -PIXEL_DEGREES])
        .unwrap();
    dataset
        .set_spatial_ref(&SpatialRef::from_epsg(4326).unwrap())
        .unwrap();

    for band_index in 1..=3usize {
        let data: Vec<u8> = (0..RASTER_SIZE as i64)
            .flat_map(|r| (0..RASTER_SIZE as i64).map(move |c| (r, c)))
            .map(|(r, c)| texture(r - shift, c - shift))
            .collect();
        let mut buffer = Buffer::new((RASTER_SIZE, RASTER_SIZE), data);
        let mut band = dataset.rasterband(band_index).unwrap();
        band.write((0, 0), (RASTER_SIZE, RASTER_SIZE), &mut buffer).unwrap();
    }
}

fn coordinates_near_center(count: usize, label: f64) -> Vec<Coordinate> {
    (0..count)
        .map(|i| {
            Coordinate::new(
                30.009 + i as f64 * PIXEL_DEGREES,
                9.99 - i as f64 * PIXEL_DEGREES,
                label,
            )
            .unwrap()
        })
        .collect()
}

#[test]
fn test_local_run_writes_shards_and_labeling_images() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let before_path = dir.path().join("before.tif");
    let after_path = dir.path().join("after.tif");
    create_rgb_raster(&before_path, 0);
    create_rgb_raster(&after_path, 2);

    let config = GenerateExamplesConfig {
        before_image_path: Some(before_path.to_string_lossy().into_owned()),
        after_image_path: after_path.to_string_lossy().into_owned(),
        example_patch_size: 8,
        alignment_patch_size: 12,
        labeling_patch_size: 8,
        resolution: TARGET_RESOLUTION,
        output_dir: dir.path().join("out"),
        num_output_shards: 2,
        num_labeling_images: 3,
        backend_settings: vec![],
        mode: ExecutionMode::Local,
    };

    let unlabeled = coordinates_near_center(6, Coordinate::UNLABELED);
    let labeled = coordinates_near_center(2, 1.0);

    let summary = generate_examples(&config, &unlabeled, &labeled).unwrap();

    let unlabeled_metrics = summary.unlabeled.unwrap();
    assert_eq!(unlabeled_metrics.generated_examples, 6);
    assert_eq!(unlabeled_metrics.rejected_examples, 0);

    // Round-robin across the two unlabeled shards
    let shard0 = read_shard(
        dir.path()
            .join("out/examples/unlabeled/unlabeled-00000-of-00002.tfrecord"),
    )
    .unwrap();
    let shard1 = read_shard(
        dir.path()
            .join("out/examples/unlabeled/unlabeled-00001-of-00002.tfrecord"),
    )
    .unwrap();
    assert_eq!(shard0.len() + shard1.len(), 6);
    for record in shard0.iter().chain(shard1.iter()) {
        assert_eq!(record.label, Coordinate::UNLABELED);
        assert_eq!(record.encoded_coordinates.len(), 32);
        assert!(!record.before_png.is_empty());
        assert!(!record.after_png.is_empty());
    }

    // Labeled pass keeps its labels and never samples labeling images
    let labeled_metrics = summary.labeled.unwrap();
    assert_eq!(labeled_metrics.generated_examples, 2);
    let labeled_records = read_shard(
        dir.path()
            .join("out/examples/labeled/labeled-00000-of-00002.tfrecord"),
    )
    .unwrap();
    assert!(labeled_records.iter().all(|r| r.label == 1.0));

    // Labeling images land in their directory, one file per sampled
    // coordinate, keyed uniquely
    let labeling_dir = dir.path().join("out/examples/labeling_images");
    let names: Vec<String> = std::fs::read_dir(&labeling_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.len() <= 6);
    let unique: std::collections::HashSet<_> = names.iter().collect();
    assert_eq!(unique.len(), names.len());
    for name in &names {
        assert!(name.ends_with(".png"));
    }
}

#[test]
fn test_distributed_mode_without_region_fails_fast() {
    let config = GenerateExamplesConfig {
        after_image_path: "does-not-exist.tif".to_string(),
        mode: ExecutionMode::Distributed {
            project: Some("disaster-assessment".to_string()),
            region: None,
        },
        ..Default::default()
    };

    // Config validation rejects the run before any raster is touched
    let err = generate_examples(&config, &[], &[]).unwrap_err();
    match err {
        GeoPatchError::Validation(msg) => assert!(msg.contains("project and region")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_malformed_backend_setting_fails_fast() {
    let config = GenerateExamplesConfig {
        after_image_path: "does-not-exist.tif".to_string(),
        backend_settings: vec!["MISSING_EQUALS".to_string()],
        ..Default::default()
    };
    let err = generate_examples(&config, &[], &[]).unwrap_err();
    assert!(matches!(err, GeoPatchError::Validation(_)));
}
