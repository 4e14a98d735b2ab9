//! Dataset handling.
//!
//! This module provides:
//! - Lazy image datasets (paths + labels, decoded on access)
//! - The local directory loader (`train/`+`val/` class trees)
//! - The catalog loader (named datasets in the local registry)
//! - Batching into tensors and restartable per-epoch streams

pub mod batcher;
pub mod catalog;
pub mod directory;
pub mod stream;

// Re-export main types for convenience
pub use batcher::{LeafBatch, LeafBatcher};
pub use catalog::{CatalogProvider, CatalogSource, LocalCatalogProvider};
pub use directory::DirectorySource;
pub use stream::LabeledImageStream;

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageReader;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, TrainError};
use crate::FALLBACK_NUM_CLASSES;

/// File extensions recognized as images.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Ordered unique class names; index position is the numeric label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCatalog {
    names: Vec<String>,
}

impl ClassCatalog {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Number of output units for the classification head.
///
/// Falls back to 2 when no class names are known, and also when exactly one
/// class was detected: a one-unit softmax cannot separate anything, so a
/// lone class directory is treated as a detection failure rather than a
/// valid head size.
pub fn effective_num_classes(catalog: Option<&ClassCatalog>) -> usize {
    match catalog {
        None => {
            warn!(
                "no class names detected; defaulting to {} output units",
                FALLBACK_NUM_CLASSES
            );
            FALLBACK_NUM_CLASSES
        }
        Some(c) if c.len() < 2 => {
            warn!(
                "found {} class directory(ies), which cannot form a classification task; \
                 defaulting to {} output units",
                c.len(),
                FALLBACK_NUM_CLASSES
            );
            FALLBACK_NUM_CLASSES
        }
        Some(c) => c.len(),
    }
}

/// A decoded image ready for batching: CHW floats in [0,1] plus its label.
#[derive(Debug, Clone)]
pub struct LeafImageItem {
    /// Flattened CHW pixel data, `3 * size * size` values.
    pub image: Vec<f32>,
    /// Numeric class label.
    pub label: usize,
}

impl LeafImageItem {
    /// Decode an image file, resize it to a square and normalize to [0,1].
    pub fn from_path(path: &Path, label: usize, image_size: usize) -> Result<Self> {
        let img = ImageReader::open(path)?
            .decode()
            .map_err(|source| TrainError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .resize_exact(image_size as u32, image_size as u32, FilterType::Triangle)
            .to_rgb8();

        // HWC bytes to CHW floats.
        let mut image = vec![0.0f32; 3 * image_size * image_size];
        for (x, y, pixel) in img.enumerate_pixels() {
            let offset = y as usize * image_size + x as usize;
            for c in 0..3 {
                image[c * image_size * image_size + offset] = pixel[c] as f32 / 255.0;
            }
        }

        Ok(Self { image, label })
    }
}

/// Lazy dataset over (path, label) pairs; images are decoded on access.
#[derive(Debug, Clone)]
pub struct LeafImageDataset {
    samples: Vec<(PathBuf, usize)>,
    image_size: usize,
}

impl LeafImageDataset {
    pub fn new(samples: Vec<(PathBuf, usize)>, image_size: usize) -> Self {
        Self {
            samples,
            image_size,
        }
    }

    /// Decode the sample at `index`, propagating read/decode failures.
    pub fn load(&self, index: usize) -> Result<LeafImageItem> {
        let (path, label) = self.samples.get(index).ok_or_else(|| {
            TrainError::Training(format!(
                "sample index {index} out of range ({} samples)",
                self.samples.len()
            ))
        })?;
        LeafImageItem::from_path(path, *label, self.image_size)
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Immediate subdirectory names of `dir`, sorted for a stable label order.
pub(crate) fn class_directories(dir: &Path) -> Result<Vec<String>> {
    let mut classes = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                classes.push(name.to_string());
            }
        }
    }
    classes.sort();
    Ok(classes)
}

/// Enumerate image files of every class under `dir`, labeled by catalog
/// position. Deterministic: classes in catalog order, files sorted by name.
pub(crate) fn collect_class_samples(
    dir: &Path,
    catalog: &ClassCatalog,
) -> Result<Vec<(PathBuf, usize)>> {
    let mut samples = Vec::new();
    for (label, class_name) in catalog.names().iter().enumerate() {
        let class_dir = dir.join(class_name);
        let mut files = Vec::new();
        for entry in WalkDir::new(&class_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path().to_path_buf();
            if is_image_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        debug!(
            "class '{}' (label {}): {} images",
            class_name,
            label,
            files.len()
        );
        samples.extend(files.into_iter().map(|p| (p, label)));
    }
    Ok(samples)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_effective_num_classes_fallbacks() {
        assert_eq!(effective_num_classes(None), 2);
        let one = ClassCatalog::new(vec!["healthy".to_string()]);
        assert_eq!(effective_num_classes(Some(&one)), 2);
        let two = ClassCatalog::new(vec!["healthy".to_string(), "ripe".to_string()]);
        assert_eq!(effective_num_classes(Some(&two)), 2);
        let five = ClassCatalog::new((0..5).map(|i| format!("c{i}")).collect());
        assert_eq!(effective_num_classes(Some(&five)), 5);
    }

    #[test]
    fn test_class_catalog_lookup() {
        let catalog = ClassCatalog::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(catalog.index_of("b"), Some(1));
        assert_eq!(catalog.index_of("missing"), None);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_item_from_path_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("leaf.png");
        let mut img = RgbImage::new(2, 2);
        for pixel in img.pixels_mut() {
            *pixel = Rgb([255, 0, 127]);
        }
        img.save(&path).unwrap();

        let item = LeafImageItem::from_path(&path, 3, 2).unwrap();
        assert_eq!(item.label, 3);
        assert_eq!(item.image.len(), 3 * 2 * 2);
        // Channel planes: all red, then all green, then all blue.
        assert!(item.image[..4].iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(item.image[4..8].iter().all(|&v| v.abs() < 1e-6));
        assert!(item.image[8..]
            .iter()
            .all(|&v| (v - 127.0 / 255.0).abs() < 1e-6));
    }

    #[test]
    fn test_dataset_load_out_of_range() {
        let dataset = LeafImageDataset::new(Vec::new(), 32);
        assert!(dataset.is_empty());
        assert!(dataset.load(0).is_err());
    }
}
