//! Training orchestration.
//!
//! This module provides:
//! - The fit loop with checkpoints and early stopping (`fit`)
//! - Loss selection (`loss`)
//! - The full pipeline from configuration to exported artifact (`run`)

pub mod fit;
pub mod loss;

// Re-export main types for convenience
pub use fit::{fit, ArtifactMetadata, FitOutcome};
pub use loss::LossKind;

use burn::tensor::backend::AutodiffBackend;
use tracing::{error, info, warn};

use crate::config::{DatasetSpec, RunConfig, SplitExpr};
use crate::dataset::catalog::{open_catalog, CatalogProvider};
use crate::dataset::{effective_num_classes, DirectorySource};
use crate::error::Result;
use crate::model::LeafClassifierConfig;
use crate::resolver::{resolve_source, SourceDecision};

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(FitOutcome),
    /// No usable dataset source; the message tells the operator what to do.
    /// This is a normal early return, not an error.
    SourceMissing(String),
}

/// The whole pipeline: resolve the source, build streams, size the head,
/// fit, export.
pub fn run<B, P>(config: &RunConfig, provider: &P, device: &B::Device) -> Result<RunOutcome>
where
    B: AutodiffBackend,
    P: CatalogProvider + ?Sized,
{
    let decision = resolve_source(
        config.data_dir.as_deref(),
        &config.catalog_name,
        provider.is_available(),
    );

    let (train, val, classes) = match decision {
        SourceDecision::LocalDirectory(dir) => {
            let spec = DatasetSpec::local_directory(&dir, config.image_size, config.batch_size)?;
            let source = DirectorySource::open(&spec, config.seed)?;
            (source.train, source.val, Some(source.classes))
        }
        SourceDecision::Catalog(name) => {
            let spec = DatasetSpec::catalog(
                &name,
                config.image_size,
                config.batch_size,
                SplitExpr::default_train(),
                SplitExpr::default_val(),
            )?;
            match open_catalog(provider, &spec, config.seed) {
                Ok(source) => (source.train, source.val, source.classes),
                Err(err) => {
                    // No silent fallback: report and stop.
                    error!("catalog dataset `{name}` could not be loaded: {err}");
                    return Ok(RunOutcome::SourceMissing(format!(
                        "Catalog dataset `{name}` is not usable ({err}). \
                         Pass --data_dir with local train/ and val/ folders."
                    )));
                }
            }
        }
        SourceDecision::Unavailable => {
            return Ok(RunOutcome::SourceMissing(
                "No dataset available: the catalog is absent and no --data_dir was given. \
                 Download a dataset and pass --data_dir with train/ and val/ folders."
                    .to_string(),
            ));
        }
    };

    match &classes {
        Some(catalog) => info!("classes: {:?}", catalog.names()),
        None => warn!("the source exposes no class names"),
    }
    let num_classes = effective_num_classes(classes.as_ref());
    let model_config = LeafClassifierConfig::new(num_classes, config.image_size);

    let outcome = fit::fit::<B>(
        &model_config,
        config,
        &train,
        &val,
        classes.as_ref().map(|c| c.names()),
        device,
    )?;
    Ok(RunOutcome::Completed(outcome))
}
