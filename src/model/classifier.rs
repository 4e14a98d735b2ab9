//! Classifier architecture for transfer learning.
//!
//! A convolutional feature extractor (standing in for a pretrained
//! MobileNet-style backbone, optionally initialized from a weight record)
//! feeds a small trainable head: global average pooling, dropout, and a
//! linear layer sized to the class count. The extractor is always frozen;
//! only the head receives gradient updates.

use std::fs;
use std::path::Path;

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

use super::HEAD_DROPOUT;
use crate::error::Result;

/// Architecture description, persisted beside the exported weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafClassifierConfig {
    /// Number of output classes
    pub num_classes: usize,
    /// Input image size (square)
    pub image_size: usize,
    /// Number of input channels (3 for RGB)
    pub in_channels: usize,
    /// Base number of convolutional filters
    pub base_filters: usize,
    /// Dropout rate applied before the head
    pub dropout_rate: f64,
}

impl LeafClassifierConfig {
    pub fn new(num_classes: usize, image_size: usize) -> Self {
        Self {
            num_classes,
            image_size,
            in_channels: 3,
            base_filters: 32,
            dropout_rate: HEAD_DROPOUT,
        }
    }

    /// Output channel count of the feature extractor.
    pub fn feature_channels(&self) -> usize {
        self.base_filters * 8
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Conv -> ReLU -> MaxPool block.
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    relu: Relu,
    pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(in_channels: usize, out_channels: usize, device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();

        Self {
            conv,
            relu: Relu::new(),
            pool,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// The backbone: four conv blocks, channels 3 -> 32 -> 64 -> 128 -> 256.
///
/// Public so its weights can be exported or loaded independently of the head.
#[derive(Module, Debug)]
pub struct FeatureExtractor<B: Backend> {
    pub conv1: ConvBlock<B>,
    pub conv2: ConvBlock<B>,
    pub conv3: ConvBlock<B>,
    pub conv4: ConvBlock<B>,
}

impl<B: Backend> FeatureExtractor<B> {
    pub fn new(config: &LeafClassifierConfig, device: &B::Device) -> Self {
        let base = config.base_filters;
        Self {
            conv1: ConvBlock::new(config.in_channels, base, device),
            conv2: ConvBlock::new(base, base * 2, device),
            conv3: ConvBlock::new(base * 2, base * 4, device),
            conv4: ConvBlock::new(base * 4, base * 8, device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.conv3.forward(x);
        self.conv4.forward(x)
    }
}

/// Frozen feature extractor with a trainable classification head.
#[derive(Module, Debug)]
pub struct LeafClassifier<B: Backend> {
    features: FeatureExtractor<B>,
    global_pool: AdaptiveAvgPool2d,
    dropout: Dropout,
    head: Linear<B>,
    num_classes: usize,
}

impl<B: Backend> LeafClassifier<B> {
    /// Build the model. The extractor is frozen on construction.
    pub fn new(config: &LeafClassifierConfig, device: &B::Device) -> Self {
        let features = FeatureExtractor::new(config, device).no_grad();
        let global_pool = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let dropout = DropoutConfig::new(config.dropout_rate).init();
        let head = LinearConfig::new(config.feature_channels(), config.num_classes).init(device);

        Self {
            features,
            global_pool,
            dropout,
            head,
            num_classes: config.num_classes,
        }
    }

    /// Replace the extractor weights with a pretrained record, keeping the
    /// result frozen.
    pub fn with_pretrained(mut self, path: &Path, device: &B::Device) -> Result<Self> {
        let recorder = CompactRecorder::new();
        let features = self
            .features
            .load_file(path.to_path_buf(), &recorder, device)?;
        self.features = features.no_grad();
        Ok(self)
    }

    /// Forward pass returning logits `[batch_size, num_classes]`.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.features.forward(x);

        // Global pooling: [B, C, H, W] -> [B, C]
        let x = self.global_pool.forward(x);
        let [batch_size, channels, _, _] = x.dims();
        let x = x.reshape([batch_size, channels]);

        let x = self.dropout.forward(x);
        self.head.forward(x)
    }

    /// Forward pass with softmax for inference.
    pub fn forward_probs(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    #[test]
    fn test_classifier_output_shape() {
        let device = Default::default();
        let config = LeafClassifierConfig::new(5, 64);
        let model = LeafClassifier::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 64, 64], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 5]);
    }

    #[test]
    fn test_probs_sum_to_one() {
        let device = Default::default();
        let config = LeafClassifierConfig::new(3, 32);
        let model = LeafClassifier::<TestBackend>::new(&config, &device);

        let input = Tensor::<TestBackend, 4>::zeros([1, 3, 32, 32], &device);
        let probs = model.forward_probs(input);
        let total: f32 = probs.sum().into_scalar();

        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let config = LeafClassifierConfig::new(4, 224);
        config.save(&path).unwrap();

        let loaded = LeafClassifierConfig::load(&path).unwrap();
        assert_eq!(loaded.num_classes, 4);
        assert_eq!(loaded.image_size, 224);
        assert_eq!(loaded.dropout_rate, HEAD_DROPOUT);
        assert_eq!(loaded.feature_channels(), 256);
    }
}
