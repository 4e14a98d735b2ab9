//! Model architecture.
//!
//! A single fixed architecture: frozen convolutional feature extractor plus
//! a trainable head (global average pooling, dropout, linear). No
//! architecture search, no alternatives.

pub mod classifier;

// Re-export main types for convenience
pub use classifier::{FeatureExtractor, LeafClassifier, LeafClassifierConfig};

/// Dropout rate applied before the classification head.
pub const HEAD_DROPOUT: f64 = 0.3;
