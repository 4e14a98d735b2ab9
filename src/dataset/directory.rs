//! Local directory dataset source.
//!
//! Expected layout:
//!
//! ```text
//! <root>/
//!   train/<class_name>/*.jpg
//!   val/<class_name>/*.jpg
//! ```
//!
//! Class subdirectories of `train/` define the label order (sorted by name);
//! `val/` must expose the same set.

use std::path::Path;

use tracing::info;

use super::stream::LabeledImageStream;
use super::{class_directories, collect_class_samples, ClassCatalog, LeafImageDataset};
use crate::config::{absolute_path, DatasetSpec};
use crate::error::{Result, TrainError};

/// Train and validation streams plus the class set shared by both.
pub struct DirectorySource {
    pub train: LabeledImageStream,
    pub val: LabeledImageStream,
    pub classes: ClassCatalog,
}

impl DirectorySource {
    /// Build both streams from a class-per-subdirectory tree.
    ///
    /// The root is resolved to an absolute path and the layout is validated
    /// before any image file is opened.
    pub fn open(spec: &DatasetSpec, seed: u64) -> Result<Self> {
        let root = absolute_path(Path::new(&spec.source))?;
        info!("loading dataset from local directory {:?}", root);

        let train_dir = root.join("train");
        let val_dir = root.join("val");
        if !train_dir.is_dir() || !val_dir.is_dir() {
            return Err(TrainError::Configuration(format!(
                "{root:?} must contain `train` and `val` subdirectories with one folder per class"
            )));
        }

        let class_names = class_directories(&train_dir)?;
        if class_names.is_empty() {
            return Err(TrainError::Configuration(format!(
                "no class subdirectories found under {train_dir:?}"
            )));
        }
        let val_class_names = class_directories(&val_dir)?;
        if val_class_names != class_names {
            return Err(TrainError::Configuration(format!(
                "`val` classes {val_class_names:?} do not match `train` classes {class_names:?}"
            )));
        }
        let classes = ClassCatalog::new(class_names);

        let train_samples = collect_class_samples(&train_dir, &classes)?;
        let val_samples = collect_class_samples(&val_dir, &classes)?;
        if train_samples.is_empty() {
            return Err(TrainError::Configuration(format!(
                "no images found under {train_dir:?}"
            )));
        }
        info!(
            "found {} classes, {} train / {} val images",
            classes.len(),
            train_samples.len(),
            val_samples.len()
        );

        let train = LabeledImageStream::shuffled(
            LeafImageDataset::new(train_samples, spec.image_size),
            spec.batch_size,
            seed,
        );
        let val = LabeledImageStream::sequential(
            LeafImageDataset::new(val_samples, spec.image_size),
            spec.batch_size,
        );

        Ok(Self {
            train,
            val,
            classes,
        })
    }
}
