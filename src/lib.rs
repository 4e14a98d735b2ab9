//! # Madurez Trainer
//!
//! Transfer-learning trainer for plant ripeness/disease image classification.
//!
//! The crate fine-tunes a classifier with a frozen convolutional feature
//! extractor and a small trainable head (global average pooling, dropout,
//! linear). Data comes from either a local `train/`+`val/` directory tree or
//! a named dataset in the local catalog registry.
//!
//! ## Modules
//!
//! - `config`: run configuration, dataset specs, split expressions
//! - `resolver`: picks the dataset source (local directory vs catalog)
//! - `dataset`: image loading, batching, per-epoch streams
//! - `model`: classifier architecture
//! - `training`: fit loop with checkpoints and early stopping
//! - `backend`: compute backend selection (ndarray by default, wgpu feature)

pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod model;
pub mod resolver;
pub mod training;

pub use config::{DatasetSpec, RunConfig, SplitExpr};
pub use dataset::{ClassCatalog, LabeledImageStream, LeafImageDataset, LeafImageItem};
pub use error::{Result, TrainError};
pub use model::{LeafClassifier, LeafClassifierConfig};
pub use resolver::{resolve_source, SourceDecision};
pub use training::{run, FitOutcome, RunOutcome};

/// Default square resize applied to every image.
pub const DEFAULT_IMAGE_SIZE: usize = 224;

/// Default batch size for both streams.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default number of fit epochs.
pub const DEFAULT_EPOCHS: usize = 6;

/// Default Adam learning rate.
pub const DEFAULT_LEARNING_RATE: f64 = 1e-3;

/// Catalog dataset used when no local directory is given.
pub const DEFAULT_CATALOG_DATASET: &str = "plant_village";

/// Head size used when class names cannot be determined (or only one class
/// directory exists).
pub const FALLBACK_NUM_CLASSES: usize = 2;

/// Capacity of the shuffle buffer applied to catalog training streams.
pub const SHUFFLE_BUFFER_CAPACITY: usize = 1024;

/// Epochs without validation improvement before training stops.
pub const EARLY_STOPPING_PATIENCE: usize = 4;

/// Default process-wide random seed.
pub const DEFAULT_SEED: u64 = 42;
