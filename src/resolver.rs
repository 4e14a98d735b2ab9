//! Dataset source selection.
//!
//! Local data always wins. The catalog is only attempted when its startup
//! availability probe passed; with neither, the run ends early with a
//! corrective message instead of guessing.

use std::path::{Path, PathBuf};

use tracing::info;

/// Which acquisition strategy to use, decided once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDecision {
    /// `--data_dir` was given: use the local tree unconditionally.
    LocalDirectory(PathBuf),
    /// No local data, but the catalog probe passed: fetch the named dataset.
    Catalog(String),
    /// Nothing usable; the caller prints the corrective message and stops.
    Unavailable,
}

/// Pick the dataset source. `catalog_available` is the result of the one-time
/// startup probe; it is never re-checked here.
pub fn resolve_source(
    data_dir: Option<&Path>,
    catalog_name: &str,
    catalog_available: bool,
) -> SourceDecision {
    if let Some(dir) = data_dir {
        info!("using local dataset directory {:?}", dir);
        return SourceDecision::LocalDirectory(dir.to_path_buf());
    }
    if catalog_available {
        info!("no --data_dir given; using catalog dataset `{catalog_name}`");
        return SourceDecision::Catalog(catalog_name.to_string());
    }
    SourceDecision::Unavailable
}
