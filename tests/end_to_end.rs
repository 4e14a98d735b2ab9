//! Full training runs over small synthetic datasets.

use std::fs;
use std::path::Path;

use burn::backend::{Autodiff, NdArray};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

use madurez_trainer::config::RunConfig;
use madurez_trainer::dataset::LocalCatalogProvider;
use madurez_trainer::training::{run, ArtifactMetadata, RunOutcome};

type TestBackend = Autodiff<NdArray>;

fn write_images(dir: &Path, count: usize, color: [u8; 3]) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        let mut img = RgbImage::new(8, 8);
        for pixel in img.pixels_mut() {
            *pixel = Rgb(color);
        }
        img.save(dir.join(format!("img_{i}.png"))).unwrap();
    }
}

fn small_config(output_dir: &Path) -> RunConfig {
    RunConfig {
        output_dir: output_dir.to_path_buf(),
        image_size: 32,
        batch_size: 2,
        epochs: 1,
        ..RunConfig::default()
    }
}

#[test]
fn trains_and_exports_from_directory_tree() {
    let root = TempDir::new().unwrap();
    let data = root.path().join("data");
    for (class, color) in [("healthy", [0, 200, 0]), ("ripe", [200, 120, 0])] {
        write_images(&data.join("train").join(class), 10, color);
        write_images(&data.join("val").join(class), 4, color);
    }

    let config = RunConfig {
        data_dir: Some(data),
        ..small_config(&root.path().join("models").join("madurez"))
    };
    // Catalog absent on purpose: the local directory must win regardless.
    let provider = LocalCatalogProvider::new(root.path().join("no_catalog"));
    let device = Default::default();

    let outcome = run::<TestBackend, _>(&config, &provider, &device).unwrap();
    let RunOutcome::Completed(outcome) = outcome else {
        panic!("expected a completed run");
    };

    assert_eq!(outcome.epochs_run, 1);
    assert!(outcome.artifact_dir.join("model.mpk").exists());
    assert!(outcome.artifact_dir.join("ckpt_1.mpk").exists());

    let metadata = ArtifactMetadata::load(&outcome.artifact_dir.join("model.json")).unwrap();
    assert_eq!(metadata.model.num_classes, 2);
    assert_eq!(metadata.model.image_size, 32);
    assert_eq!(
        metadata.class_names.as_deref(),
        Some(&["healthy".to_string(), "ripe".to_string()][..])
    );
}

#[test]
fn trains_from_catalog_registry() {
    let root = TempDir::new().unwrap();
    let registry = root.path().join("catalog");
    for (class, color) in [("diseased", [160, 40, 40]), ("healthy", [40, 160, 40])] {
        write_images(&registry.join("plant_village").join(class), 10, color);
    }

    let config = small_config(&root.path().join("out"));
    let provider = LocalCatalogProvider::new(&registry);
    let device = Default::default();

    let outcome = run::<TestBackend, _>(&config, &provider, &device).unwrap();
    let RunOutcome::Completed(outcome) = outcome else {
        panic!("expected a completed run");
    };

    assert!(outcome.artifact_dir.join("model.mpk").exists());
    let metadata = ArtifactMetadata::load(&outcome.artifact_dir.join("model.json")).unwrap();
    // 20 samples split 85/15: both slices are non-empty and labeled.
    assert_eq!(metadata.model.num_classes, 2);
    assert_eq!(
        metadata.class_names.as_deref(),
        Some(&["diseased".to_string(), "healthy".to_string()][..])
    );
}

#[test]
fn missing_catalog_without_data_dir_stops_before_any_write() {
    let root = TempDir::new().unwrap();
    let out = root.path().join("out");
    let config = small_config(&out);
    let provider = LocalCatalogProvider::new(root.path().join("absent"));
    let device = Default::default();

    let outcome = run::<TestBackend, _>(&config, &provider, &device).unwrap();
    assert!(matches!(outcome, RunOutcome::SourceMissing(_)));
    assert!(!out.exists(), "no training means no output directory");
}

#[test]
fn unknown_catalog_dataset_stops_with_corrective_message() {
    let root = TempDir::new().unwrap();
    let registry = root.path().join("catalog");
    fs::create_dir_all(&registry).unwrap();

    let config = RunConfig {
        catalog_name: "does_not_exist".to_string(),
        ..small_config(&root.path().join("out"))
    };
    let provider = LocalCatalogProvider::new(&registry);
    let device = Default::default();

    let outcome = run::<TestBackend, _>(&config, &provider, &device).unwrap();
    let RunOutcome::SourceMissing(message) = outcome else {
        panic!("expected an early return");
    };
    assert!(message.contains("--data_dir"));
}
