//! Named-catalog dataset source.
//!
//! The catalog is a local registry of downloaded datasets: one subdirectory
//! per dataset name under `$MADUREZ_CATALOG_DIR` (default `data/catalog`),
//! each laid out class-per-subdirectory. Availability is probed once at
//! startup and handed to the resolver as a plain flag; the probe is never
//! repeated mid-run.

use std::env;
use std::path::{Path, PathBuf};

use tracing::info;

use super::stream::LabeledImageStream;
use super::{class_directories, collect_class_samples, ClassCatalog, LeafImageDataset};
use crate::config::DatasetSpec;
use crate::error::{Result, TrainError};
use crate::SHUFFLE_BUFFER_CAPACITY;

/// Environment variable overriding the registry location.
pub const CATALOG_DIR_ENV: &str = "MADUREZ_CATALOG_DIR";

/// Registry location used when the environment variable is unset.
pub const DEFAULT_CATALOG_DIR: &str = "data/catalog";

/// A provider of named datasets.
pub trait CatalogProvider {
    /// Whether the provider can serve datasets at all in this environment.
    fn is_available(&self) -> bool;

    /// All samples of the named dataset, in a deterministic order.
    fn list_samples(&self, dataset: &str) -> Result<Vec<(PathBuf, usize)>>;

    /// Ordered class names, when the dataset carries a label vocabulary.
    fn class_names(&self, dataset: &str) -> Result<Option<ClassCatalog>>;
}

/// Registry rooted at a local directory.
pub struct LocalCatalogProvider {
    root: PathBuf,
}

impl LocalCatalogProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root from `$MADUREZ_CATALOG_DIR`, falling back to `data/catalog`.
    pub fn from_env() -> Self {
        let root = env::var(CATALOG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CATALOG_DIR));
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dataset_dir(&self, dataset: &str) -> Result<PathBuf> {
        let dir = self.root.join(dataset);
        if !dir.is_dir() {
            return Err(TrainError::SourceUnavailable(format!(
                "dataset `{dataset}` not found under {:?}",
                self.root
            )));
        }
        Ok(dir)
    }
}

impl CatalogProvider for LocalCatalogProvider {
    fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    fn list_samples(&self, dataset: &str) -> Result<Vec<(PathBuf, usize)>> {
        let dir = self.dataset_dir(dataset)?;
        let catalog = self.class_names(dataset)?.ok_or_else(|| {
            TrainError::SourceUnavailable(format!(
                "dataset `{dataset}` has no class subdirectories, so samples carry no labels"
            ))
        })?;
        collect_class_samples(&dir, &catalog)
    }

    fn class_names(&self, dataset: &str) -> Result<Option<ClassCatalog>> {
        let dir = self.dataset_dir(dataset)?;
        let names = class_directories(&dir)?;
        if names.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ClassCatalog::new(names)))
        }
    }
}

/// Streams for a named catalog dataset. `classes` is `None` when the
/// provider exposes no label vocabulary.
pub struct CatalogSource {
    pub train: LabeledImageStream,
    pub val: LabeledImageStream,
    pub classes: Option<ClassCatalog>,
}

/// Slice the provider's ordered sample list by the spec's split expressions
/// and wrap both slices in streams. The training stream shuffles through a
/// fixed-capacity buffer; validation keeps list order.
pub fn open_catalog<P: CatalogProvider + ?Sized>(
    provider: &P,
    spec: &DatasetSpec,
    seed: u64,
) -> Result<CatalogSource> {
    if !provider.is_available() {
        return Err(TrainError::SourceUnavailable(
            "no dataset catalog is present in this environment; \
             pass --data_dir with local train/ and val/ folders"
                .to_string(),
        ));
    }
    info!(
        "loading catalog dataset `{}` (splits {} / {})",
        spec.source, spec.train_split, spec.val_split
    );

    let samples = provider.list_samples(&spec.source)?;
    if samples.is_empty() {
        return Err(TrainError::SourceUnavailable(format!(
            "catalog dataset `{}` contains no samples",
            spec.source
        )));
    }

    let train_samples = samples[spec.train_split.bounds(samples.len())].to_vec();
    let val_samples = samples[spec.val_split.bounds(samples.len())].to_vec();
    info!(
        "catalog `{}`: {} samples, {} train / {} val",
        spec.source,
        samples.len(),
        train_samples.len(),
        val_samples.len()
    );

    let classes = provider.class_names(&spec.source)?;
    let train = LabeledImageStream::with_shuffle_buffer(
        LeafImageDataset::new(train_samples, spec.image_size),
        spec.batch_size,
        SHUFFLE_BUFFER_CAPACITY,
        seed,
    );
    let val = LabeledImageStream::sequential(
        LeafImageDataset::new(val_samples, spec.image_size),
        spec.batch_size,
    );

    Ok(CatalogSource {
        train,
        val,
        classes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitExpr;

    /// In-memory provider for exercising the split logic without disk I/O.
    struct StubProvider {
        available: bool,
        samples: Vec<(PathBuf, usize)>,
        classes: Option<ClassCatalog>,
    }

    impl StubProvider {
        fn with_samples(count: usize) -> Self {
            Self {
                available: true,
                samples: (0..count)
                    .map(|i| (PathBuf::from(format!("/fake/img_{i}.jpg")), i % 2))
                    .collect(),
                classes: Some(ClassCatalog::new(vec![
                    "healthy".to_string(),
                    "diseased".to_string(),
                ])),
            }
        }
    }

    impl CatalogProvider for StubProvider {
        fn is_available(&self) -> bool {
            self.available
        }

        fn list_samples(&self, _dataset: &str) -> Result<Vec<(PathBuf, usize)>> {
            Ok(self.samples.clone())
        }

        fn class_names(&self, _dataset: &str) -> Result<Option<ClassCatalog>> {
            Ok(self.classes.clone())
        }
    }

    fn catalog_spec() -> DatasetSpec {
        DatasetSpec::catalog(
            "plant_village",
            32,
            4,
            SplitExpr::default_train(),
            SplitExpr::default_val(),
        )
        .unwrap()
    }

    #[test]
    fn test_default_splits_partition_stub_exactly() {
        for count in [10, 40, 100, 101] {
            let provider = StubProvider::with_samples(count);
            let source = open_catalog(&provider, &catalog_spec(), 42).unwrap();
            assert_eq!(
                source.train.num_samples() + source.val.num_samples(),
                count,
                "splits must cover all {count} samples exactly once"
            );
            assert_eq!(source.train.num_samples(), count * 85 / 100);
        }
    }

    #[test]
    fn test_unavailable_provider_is_source_error() {
        let provider = StubProvider {
            available: false,
            samples: Vec::new(),
            classes: None,
        };
        let result = open_catalog(&provider, &catalog_spec(), 42);
        assert!(matches!(result, Err(TrainError::SourceUnavailable(_))));
    }

    #[test]
    fn test_empty_dataset_is_source_error() {
        let provider = StubProvider {
            available: true,
            samples: Vec::new(),
            classes: None,
        };
        let result = open_catalog(&provider, &catalog_spec(), 42);
        assert!(matches!(result, Err(TrainError::SourceUnavailable(_))));
    }

    #[test]
    fn test_class_names_pass_through() {
        let provider = StubProvider::with_samples(20);
        let source = open_catalog(&provider, &catalog_spec(), 42).unwrap();
        let classes = source.classes.unwrap();
        assert_eq!(classes.names(), ["healthy", "diseased"]);
    }
}
