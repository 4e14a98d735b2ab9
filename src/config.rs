//! Run configuration and dataset source description.
//!
//! A `RunConfig` is assembled once from the CLI and never mutated. The
//! `DatasetSpec` derived from it fixes the source, image geometry and (for
//! catalog sources) the split expressions before any data is touched.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{Result, TrainError};
use crate::{
    DEFAULT_BATCH_SIZE, DEFAULT_CATALOG_DATASET, DEFAULT_EPOCHS, DEFAULT_IMAGE_SIZE,
    DEFAULT_LEARNING_RATE, DEFAULT_SEED,
};

/// Everything the trainer needs for one run, as given on the command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Local dataset root with `train/` and `val/` class subfolders.
    pub data_dir: Option<PathBuf>,
    /// Where the exported model and checkpoints go.
    pub output_dir: PathBuf,
    /// Square resize applied to every image.
    pub image_size: usize,
    /// Batch size for both streams.
    pub batch_size: usize,
    /// Number of fit epochs.
    pub epochs: usize,
    /// Adam learning rate.
    pub learning_rate: f64,
    /// Catalog dataset name, used when `data_dir` is absent.
    pub catalog_name: String,
    /// Process-wide random seed.
    pub seed: u64,
    /// Optional pretrained feature-extractor record.
    pub backbone_weights: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            output_dir: PathBuf::from("./models/madurez_savedmodel"),
            image_size: DEFAULT_IMAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
            catalog_name: DEFAULT_CATALOG_DATASET.to_string(),
            seed: DEFAULT_SEED,
            backbone_weights: None,
        }
    }
}

/// Which acquisition strategy a `DatasetSpec` describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    LocalDirectory,
    CatalogNamed,
}

/// Immutable description of the dataset source, built once at startup.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub kind: SourceKind,
    /// Directory path or catalog dataset name, depending on `kind`.
    pub source: String,
    pub image_size: usize,
    pub batch_size: usize,
    /// Training slice of the catalog sample list. Unused for directories.
    pub train_split: SplitExpr,
    /// Validation slice of the catalog sample list. Unused for directories.
    pub val_split: SplitExpr,
}

impl DatasetSpec {
    /// Spec for a local `train/`+`val/` tree.
    pub fn local_directory(root: &Path, image_size: usize, batch_size: usize) -> Result<Self> {
        validate_dims(image_size, batch_size)?;
        Ok(Self {
            kind: SourceKind::LocalDirectory,
            source: root.to_string_lossy().into_owned(),
            image_size,
            batch_size,
            train_split: SplitExpr::default_train(),
            val_split: SplitExpr::default_val(),
        })
    }

    /// Spec for a named catalog dataset with explicit splits.
    pub fn catalog(
        name: &str,
        image_size: usize,
        batch_size: usize,
        train_split: SplitExpr,
        val_split: SplitExpr,
    ) -> Result<Self> {
        validate_dims(image_size, batch_size)?;
        if name.is_empty() {
            return Err(TrainError::Configuration(
                "catalog dataset name must not be empty".to_string(),
            ));
        }
        if train_split.base != val_split.base {
            return Err(TrainError::Configuration(format!(
                "train and validation splits must slice the same base split, got `{}` and `{}`",
                train_split.base, val_split.base
            )));
        }
        if train_split.overlaps(&val_split) {
            return Err(TrainError::Configuration(format!(
                "train split `{train_split}` overlaps validation split `{val_split}`"
            )));
        }
        Ok(Self {
            kind: SourceKind::CatalogNamed,
            source: name.to_string(),
            image_size,
            batch_size,
            train_split,
            val_split,
        })
    }
}

fn validate_dims(image_size: usize, batch_size: usize) -> Result<()> {
    if image_size == 0 {
        return Err(TrainError::Configuration(
            "image size must be greater than zero".to_string(),
        ));
    }
    if batch_size == 0 {
        return Err(TrainError::Configuration(
            "batch size must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// A percentage slice of a named base split, e.g. `train[:85%]`.
///
/// Open ends default to 0% and 100%; a bare name covers everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitExpr {
    pub base: String,
    pub start_pct: u32,
    pub end_pct: u32,
}

impl SplitExpr {
    /// Default training slice: first 85% of `train`.
    pub fn default_train() -> Self {
        Self {
            base: "train".to_string(),
            start_pct: 0,
            end_pct: 85,
        }
    }

    /// Default validation slice: last 15% of `train`.
    pub fn default_val() -> Self {
        Self {
            base: "train".to_string(),
            start_pct: 85,
            end_pct: 100,
        }
    }

    /// Parse `base`, `base[A%:B%]`, `base[:B%]` or `base[A%:]`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (base, range) = match input.find('[') {
            Some(open) => {
                let Some(inner) = input[open + 1..].strip_suffix(']') else {
                    return Err(TrainError::Configuration(format!(
                        "split expression `{input}` is missing a closing `]`"
                    )));
                };
                (&input[..open], inner)
            }
            None => (input, ""),
        };
        if base.is_empty() {
            return Err(TrainError::Configuration(format!(
                "split expression `{input}` has no base split name"
            )));
        }
        let (start_pct, end_pct) = if range.is_empty() {
            (0, 100)
        } else {
            let (start, end) = range.split_once(':').ok_or_else(|| {
                TrainError::Configuration(format!(
                    "split range `[{range}]` must contain a `:` separator"
                ))
            })?;
            (parse_percent(start, 0)?, parse_percent(end, 100)?)
        };
        if end_pct > 100 {
            return Err(TrainError::Configuration(format!(
                "split end {end_pct}% exceeds 100%"
            )));
        }
        if start_pct > end_pct {
            return Err(TrainError::Configuration(format!(
                "split start {start_pct}% lies after end {end_pct}%"
            )));
        }
        Ok(Self {
            base: base.to_string(),
            start_pct,
            end_pct,
        })
    }

    /// Map the percentage range onto index bounds over a list of `len`
    /// samples. Both edges floor, so adjacent expressions tile a list
    /// without gaps or double-counting.
    pub fn bounds(&self, len: usize) -> std::ops::Range<usize> {
        let start = len * self.start_pct as usize / 100;
        let end = len * self.end_pct as usize / 100;
        start..end
    }

    /// Whether two expressions over the same base claim common samples.
    pub fn overlaps(&self, other: &SplitExpr) -> bool {
        self.base == other.base
            && self.start_pct < other.end_pct
            && other.start_pct < self.end_pct
    }
}

fn parse_percent(field: &str, default: u32) -> Result<u32> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(default);
    }
    let digits = field.strip_suffix('%').ok_or_else(|| {
        TrainError::Configuration(format!("split bound `{field}` must end in `%`"))
    })?;
    digits.trim().parse().map_err(|_| {
        TrainError::Configuration(format!("split bound `{field}` is not a whole percentage"))
    })
}

impl fmt::Display for SplitExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}%:{}%]",
            self.base, self.start_pct, self.end_pct
        )
    }
}

/// Resolve a possibly-relative path against the current directory and
/// collapse `.`/`..` segments lexically, without touching the filesystem.
///
/// Used for the dataset root and the output directory so a misdirected path
/// surfaces before the first write.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut resolved = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_open_start() {
        let expr = SplitExpr::parse("train[:85%]").unwrap();
        assert_eq!(expr.base, "train");
        assert_eq!(expr.start_pct, 0);
        assert_eq!(expr.end_pct, 85);
    }

    #[test]
    fn test_parse_open_end() {
        let expr = SplitExpr::parse("train[85%:]").unwrap();
        assert_eq!(expr.start_pct, 85);
        assert_eq!(expr.end_pct, 100);
    }

    #[test]
    fn test_parse_bare_name() {
        let expr = SplitExpr::parse("validation").unwrap();
        assert_eq!(expr.base, "validation");
        assert_eq!(expr.bounds(40), 0..40);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(SplitExpr::parse("train[85%]").is_err());
        assert!(SplitExpr::parse("[:50%]").is_err());
        assert!(SplitExpr::parse("train[90%:80%]").is_err());
        assert!(SplitExpr::parse("train[:120%]").is_err());
        assert!(SplitExpr::parse("train[:85").is_err());
        assert!(SplitExpr::parse("train[:eighty%]").is_err());
    }

    #[test]
    fn test_default_splits_partition_any_length() {
        let train = SplitExpr::default_train();
        let val = SplitExpr::default_val();
        for len in [0, 1, 7, 20, 100, 1013] {
            let t = train.bounds(len);
            let v = val.bounds(len);
            assert_eq!(t.start, 0);
            assert_eq!(t.end, v.start, "gap or overlap at len {len}");
            assert_eq!(v.end, len);
        }
    }

    #[test]
    fn test_overlap_detection() {
        let a = SplitExpr::parse("train[:50%]").unwrap();
        let b = SplitExpr::parse("train[40%:]").unwrap();
        let c = SplitExpr::parse("train[50%:]").unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));

        let other_base = SplitExpr::parse("test[:50%]").unwrap();
        assert!(!a.overlaps(&other_base));
    }

    #[test]
    fn test_catalog_spec_rejects_overlap() {
        let train = SplitExpr::parse("train[:60%]").unwrap();
        let val = SplitExpr::parse("train[50%:]").unwrap();
        let result = DatasetSpec::catalog("plant_village", 224, 32, train, val);
        assert!(matches!(result, Err(TrainError::Configuration(_))));
    }

    #[test]
    fn test_spec_rejects_zero_dims() {
        assert!(DatasetSpec::local_directory(Path::new("/data"), 0, 32).is_err());
        assert!(DatasetSpec::local_directory(Path::new("/data"), 224, 0).is_err());
    }

    #[test]
    fn test_absolute_path_collapses_traversal() {
        let resolved = absolute_path(Path::new("/srv/models/../exports/./run1")).unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/exports/run1"));
    }

    #[test]
    fn test_absolute_path_anchors_relative_input() {
        let resolved = absolute_path(Path::new("models/../out")).unwrap();
        assert!(resolved.is_absolute());
        assert!(!resolved
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::CurDir)));
        assert!(resolved.ends_with("out"));
    }
}
