//! The fit loop.
//!
//! Sequential epochs over the training stream with Adam updates on the
//! trainable head, validation after every epoch, a checkpoint per epoch,
//! early stopping on validation loss (patience 4) with the best epoch's
//! weights restored, and a final export of weights plus metadata.

use std::path::{Path, PathBuf};

use burn::{
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::backend::{AutodiffBackend, Backend},
    tensor::ElementConversion,
};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{absolute_path, RunConfig};
use crate::dataset::{LabeledImageStream, LeafBatch, LeafBatcher};
use crate::error::{Result, TrainError};
use crate::model::{LeafClassifier, LeafClassifierConfig};
use crate::training::loss::LossKind;
use crate::EARLY_STOPPING_PATIENCE;

/// Summary of a completed fit run.
#[derive(Debug)]
pub struct FitOutcome {
    /// Resolved directory holding the exported model and checkpoints.
    pub artifact_dir: PathBuf,
    pub best_val_loss: f64,
    pub best_val_accuracy: f64,
    pub epochs_run: usize,
}

/// Metadata written beside the exported weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub model: LeafClassifierConfig,
    pub class_names: Option<Vec<String>>,
}

impl ArtifactMetadata {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

struct BestEpoch {
    epoch: usize,
    val_loss: f64,
    val_accuracy: f64,
    checkpoint: PathBuf,
}

/// Train the classifier over the two streams and export the artifact.
///
/// The output directory is resolved and created before the first epoch so a
/// bad path fails in seconds, not hours.
pub fn fit<B: AutodiffBackend>(
    model_config: &LeafClassifierConfig,
    config: &RunConfig,
    train: &LabeledImageStream,
    val: &LabeledImageStream,
    class_names: Option<&[String]>,
    device: &B::Device,
) -> Result<FitOutcome> {
    let artifact_dir = absolute_path(&config.output_dir)?;
    std::fs::create_dir_all(&artifact_dir)?;
    info!("artifacts will be written to {:?}", artifact_dir);

    let mut model = LeafClassifier::<B>::new(model_config, device);
    if let Some(weights) = &config.backbone_weights {
        info!("initializing feature extractor from {:?}", weights);
        model = model.with_pretrained(weights, device)?;
    } else {
        warn!("no --backbone_weights given; the frozen extractor keeps its random initialization");
    }

    let loss_kind = LossKind::for_classes(model_config.num_classes);
    info!(
        "training {} classes with {:?} loss, lr {}, batch size {}",
        model_config.num_classes, loss_kind, config.learning_rate, config.batch_size
    );

    let mut optimizer = AdamConfig::new().init();
    let batcher = LeafBatcher::<B>::new(device.clone(), model_config.image_size);
    let inner_device = <B::InnerBackend as Backend>::Device::default();
    let val_batcher = LeafBatcher::<B::InnerBackend>::new(inner_device, model_config.image_size);

    println!(
        "{}",
        format!(
            "Training: {} train / {} val images, up to {} epochs",
            train.num_samples(),
            val.num_samples(),
            config.epochs
        )
        .green()
        .bold()
    );

    let mut best: Option<BestEpoch> = None;
    let mut epochs_without_improvement = 0usize;
    let mut epochs_run = 0usize;

    for epoch in 1..=config.epochs {
        epochs_run = epoch;

        let (updated, train_loss, train_acc) = match train_epoch(
            model,
            &mut optimizer,
            loss_kind,
            train,
            &batcher,
            config.learning_rate,
            epoch,
        ) {
            Ok(result) => result,
            Err(err) => {
                error!("epoch {epoch} failed: {err}");
                return Err(err);
            }
        };
        model = updated;

        let (val_loss, val_acc) = evaluate(&model, loss_kind, val, &val_batcher, epoch)?;

        info!(
            "epoch {}/{}: train loss {:.4} acc {:.2}% | val loss {:.4} acc {:.2}%",
            epoch, config.epochs, train_loss, train_acc, val_loss, val_acc
        );
        println!(
            "  {} epoch {}/{}: loss {:.4} | val loss {:.4} | val acc {:.2}%",
            "→".cyan(),
            epoch,
            config.epochs,
            train_loss,
            val_loss,
            val_acc
        );

        // Checkpoint every epoch, best or not.
        let checkpoint = artifact_dir.join(format!("ckpt_{epoch}"));
        save_weights(&model, &checkpoint)?;

        let improved = best.as_ref().map_or(true, |b| val_loss < b.val_loss);
        if improved {
            best = Some(BestEpoch {
                epoch,
                val_loss,
                val_accuracy: val_acc,
                checkpoint,
            });
            epochs_without_improvement = 0;
        } else {
            epochs_without_improvement += 1;
            if epochs_without_improvement >= EARLY_STOPPING_PATIENCE {
                warn!(
                    "early stopping at epoch {epoch}: no validation improvement for {} epochs",
                    epochs_without_improvement
                );
                break;
            }
        }
    }

    let best = best.ok_or_else(|| TrainError::Training("no epochs were run".to_string()))?;
    if best.epoch != epochs_run {
        info!("restoring best weights from epoch {}", best.epoch);
        model = load_weights(model, &best.checkpoint, device)?;
    }

    // Export weights (no optimizer state) and the architecture metadata.
    save_weights(&model, &artifact_dir.join("model"))?;
    let metadata = ArtifactMetadata {
        model: model_config.clone(),
        class_names: class_names.map(|names| names.to_vec()),
    };
    metadata.save(&artifact_dir.join("model.json"))?;

    println!(
        "{}",
        format!("Model exported to {:?}", artifact_dir).green().bold()
    );

    Ok(FitOutcome {
        artifact_dir,
        best_val_loss: best.val_loss,
        best_val_accuracy: best.val_accuracy,
        epochs_run,
    })
}

/// One training pass. Returns the stepped model with epoch-average loss and
/// accuracy (percent).
fn train_epoch<B, O>(
    mut model: LeafClassifier<B>,
    optimizer: &mut O,
    loss_kind: LossKind,
    stream: &LabeledImageStream,
    batcher: &LeafBatcher<B>,
    learning_rate: f64,
    epoch: usize,
) -> Result<(LeafClassifier<B>, f64, f64)>
where
    B: AutodiffBackend,
    O: Optimizer<LeafClassifier<B>, B>,
{
    let mut total_loss = 0.0;
    let mut num_batches = 0usize;
    let mut correct = 0usize;
    let mut seen = 0usize;

    for batch in stream.epoch(epoch) {
        let items = batch?;
        if items.is_empty() {
            continue;
        }
        let batch: LeafBatch<B> = batcher.batch(items);

        let output = model.forward(batch.images);
        let loss = loss_kind.forward(output.clone(), batch.targets.clone());

        let loss_value: f64 = loss.clone().into_scalar().elem();
        if !loss_value.is_finite() {
            return Err(TrainError::Training(format!(
                "non-finite loss at epoch {epoch}, batch {num_batches}"
            )));
        }
        total_loss += loss_value;
        num_batches += 1;

        let predictions = output.argmax(1).squeeze::<1>(1);
        let batch_correct: i64 = predictions
            .equal(batch.targets.clone())
            .int()
            .sum()
            .into_scalar()
            .elem();
        correct += batch_correct as usize;
        seen += batch.targets.dims()[0];

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optimizer.step(learning_rate, model, grads);
    }

    let avg_loss = total_loss / num_batches.max(1) as f64;
    let accuracy = 100.0 * correct as f64 / seen.max(1) as f64;
    Ok((model, avg_loss, accuracy))
}

/// Validation pass on the inner (non-autodiff) backend.
fn evaluate<B: AutodiffBackend>(
    model: &LeafClassifier<B>,
    loss_kind: LossKind,
    stream: &LabeledImageStream,
    batcher: &LeafBatcher<B::InnerBackend>,
    epoch: usize,
) -> Result<(f64, f64)> {
    let model = model.valid();

    let mut total_loss = 0.0;
    let mut num_batches = 0usize;
    let mut correct = 0usize;
    let mut seen = 0usize;

    for batch in stream.epoch(epoch) {
        let items = batch?;
        if items.is_empty() {
            continue;
        }
        let batch = batcher.batch(items);

        let output = model.forward(batch.images);
        let loss = loss_kind.forward(output.clone(), batch.targets.clone());
        total_loss += loss.into_scalar().elem::<f64>();
        num_batches += 1;

        let predictions = output.argmax(1).squeeze::<1>(1);
        let batch_correct: i64 = predictions
            .equal(batch.targets.clone())
            .int()
            .sum()
            .into_scalar()
            .elem();
        correct += batch_correct as usize;
        seen += batch.targets.dims()[0];
    }

    let avg_loss = total_loss / num_batches.max(1) as f64;
    let accuracy = 100.0 * correct as f64 / seen.max(1) as f64;
    Ok((avg_loss, accuracy))
}

fn save_weights<B: AutodiffBackend>(model: &LeafClassifier<B>, path: &Path) -> Result<()> {
    let recorder = CompactRecorder::new();
    model.clone().save_file(path.to_path_buf(), &recorder)?;
    Ok(())
}

fn load_weights<B: AutodiffBackend>(
    model: LeafClassifier<B>,
    path: &Path,
    device: &B::Device,
) -> Result<LeafClassifier<B>> {
    let recorder = CompactRecorder::new();
    Ok(model.load_file(path.to_path_buf(), &recorder, device)?)
}
