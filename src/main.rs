//! Madurez trainer CLI
//!
//! Entry point for fine-tuning the plant ripeness/disease classifier from a
//! local directory tree or a catalog dataset, using the Burn framework.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::{error, info};

use madurez_trainer::backend::{backend_name, default_device, seed_backend, DefaultBackend, TrainingBackend};
use madurez_trainer::config::RunConfig;
use madurez_trainer::dataset::LocalCatalogProvider;
use madurez_trainer::logging::{init_logging, LogConfig};
use madurez_trainer::training::{run, RunOutcome};
use madurez_trainer::DEFAULT_CATALOG_DATASET;

/// Madurez transfer-learning trainer
///
/// Fine-tunes an image classifier (frozen feature extractor, trainable head)
/// on a plant-disease dataset and exports the model.
#[derive(Parser, Debug)]
#[command(name = "madurez_trainer")]
#[command(version)]
#[command(about = "Transfer-learning trainer for plant disease images", long_about = None)]
struct Cli {
    /// Local dataset root with train/ and val/ class subfolders
    #[arg(long = "data_dir")]
    data_dir: Option<PathBuf>,

    /// Where the exported model and checkpoints go
    #[arg(long = "output_dir", default_value = "./models/madurez_savedmodel")]
    output_dir: PathBuf,

    /// Square resize applied to every image
    #[arg(long = "img_size", default_value_t = 224)]
    img_size: usize,

    /// Batch size for both streams
    #[arg(long = "batch_size", default_value_t = 32)]
    batch_size: usize,

    /// Number of training epochs
    #[arg(long, default_value_t = 6)]
    epochs: usize,

    /// Adam learning rate
    #[arg(long = "learning_rate", default_value_t = 1e-3)]
    learning_rate: f64,

    /// Catalog dataset used when --data_dir is absent
    #[arg(long = "catalog_name", default_value = DEFAULT_CATALOG_DATASET)]
    catalog_name: String,

    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Pretrained feature-extractor record for the frozen backbone
    #[arg(long = "backbone_weights")]
    backbone_weights: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    if let Err(msg) = init_logging(&log_config) {
        eprintln!("{msg}");
    }

    seed_backend::<DefaultBackend>(cli.seed);
    info!("backend: {}, seed: {}", backend_name(), cli.seed);

    let config = RunConfig {
        data_dir: cli.data_dir,
        output_dir: cli.output_dir,
        image_size: cli.img_size,
        batch_size: cli.batch_size,
        epochs: cli.epochs,
        learning_rate: cli.learning_rate,
        catalog_name: cli.catalog_name,
        seed: cli.seed,
        backbone_weights: cli.backbone_weights,
    };

    let provider = LocalCatalogProvider::from_env();
    let device = default_device();

    match run::<TrainingBackend, _>(&config, &provider, &device) {
        Ok(RunOutcome::Completed(outcome)) => {
            println!("{}", "Training finished.".green().bold());
            println!("  artifact: {:?}", outcome.artifact_dir);
            println!(
                "  best val loss: {:.4} | best val acc: {:.2}% | epochs: {}",
                outcome.best_val_loss, outcome.best_val_accuracy, outcome.epochs_run
            );
            Ok(())
        }
        Ok(RunOutcome::SourceMissing(message)) => {
            println!("{}", message.yellow());
            Ok(())
        }
        Err(err) => {
            error!("{err}");
            eprintln!("{}", format!("Error: {err}").red().bold());
            Err(err.into())
        }
    }
}
