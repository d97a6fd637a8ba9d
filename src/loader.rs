//! Snapshot loaders.
//!
//! The front-end exports each analysed root as JSON under
//! `<root>/.symtool/snapshot-<mode>.json`. [`JsonSnapshotLoader`] reads that
//! export; [`SourceLoader`] builds a snapshot directly from `.go` sources with
//! the fixture front-end.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use symtool_core::error::{SymtoolError, SymtoolResult};
use symtool_core::snapshot::Snapshot;
use thiserror::Error;
use tracing::{debug, info};

use crate::fixture::{load_sources, source_dirs};

/// Directory holding front-end exports, relative to the root.
pub const EXPORT_DIR: &str = ".symtool";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no snapshot export at {}", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("export mode is '{found}', expected '{expected}'")]
    ModeMismatch { expected: String, found: String },
}

/// Supplies snapshots for a (root, mode) pair.
pub trait SnapshotLoader: Send + Sync {
    fn load(&self, root: &Path, mode: &str) -> SymtoolResult<Snapshot>;

    /// Files whose modification makes a loaded snapshot stale.
    fn tracked_paths(&self, root: &Path, _mode: &str, snapshot: &Snapshot) -> Vec<PathBuf> {
        snapshot.files.iter().map(|f| root.join(&f.path)).collect()
    }
}

impl<F> SnapshotLoader for F
where
    F: Fn(&Path, &str) -> SymtoolResult<Snapshot> + Send + Sync,
{
    fn load(&self, root: &Path, mode: &str) -> SymtoolResult<Snapshot> {
        self(root, mode)
    }
}

/// Reads the front-end's JSON export.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSnapshotLoader;

impl JsonSnapshotLoader {
    pub fn export_path(root: &Path, mode: &str) -> PathBuf {
        root.join(EXPORT_DIR).join(format!("snapshot-{}.json", mode))
    }

    fn read(root: &Path, mode: &str) -> Result<Snapshot, LoadError> {
        let path = Self::export_path(root, mode);
        let text = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                LoadError::Missing { path: path.clone() }
            } else {
                LoadError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        let mut snapshot: Snapshot =
            serde_json::from_str(&text).map_err(|source| LoadError::Decode { path, source })?;
        if snapshot.mode != mode {
            return Err(LoadError::ModeMismatch {
                expected: mode.to_string(),
                found: snapshot.mode,
            });
        }
        // Exports may be produced elsewhere; paths resolve against this root.
        snapshot.root = root.to_path_buf();
        snapshot.restore_indexes();
        Ok(snapshot)
    }
}

impl SnapshotLoader for JsonSnapshotLoader {
    fn load(&self, root: &Path, mode: &str) -> SymtoolResult<Snapshot> {
        let snapshot =
            Self::read(root, mode).map_err(|e| SymtoolError::load_failure(root.display(), e.to_string()))?;
        snapshot
            .validate()
            .map_err(|e| SymtoolError::load_failure(root.display(), e.to_string()))?;
        info!(
            root = %root.display(),
            mode,
            files = snapshot.files.len(),
            decls = snapshot.decls.len(),
            id = %snapshot.id,
            "loaded snapshot export"
        );
        Ok(snapshot)
    }

    fn tracked_paths(&self, root: &Path, mode: &str, snapshot: &Snapshot) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = snapshot.files.iter().map(|f| root.join(&f.path)).collect();
        paths.push(Self::export_path(root, mode));
        paths
    }
}

/// Parses `.go` sources under the root with the fixture front-end.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceLoader;

impl SnapshotLoader for SourceLoader {
    fn load(&self, root: &Path, mode: &str) -> SymtoolResult<Snapshot> {
        let snapshot = load_sources(root, mode)?;
        debug!(root = %root.display(), mode, files = snapshot.files.len(), "parsed sources");
        Ok(snapshot)
    }

    /// Parsed files plus every walked directory, so new `.go` files count.
    fn tracked_paths(&self, root: &Path, _mode: &str, snapshot: &Snapshot) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = snapshot.files.iter().map(|f| root.join(&f.path)).collect();
        paths.extend(source_dirs(root));
        paths
    }
}

/// Prefer the JSON export when one exists for the mode, else parse sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoLoader;

impl SnapshotLoader for AutoLoader {
    fn load(&self, root: &Path, mode: &str) -> SymtoolResult<Snapshot> {
        if JsonSnapshotLoader::export_path(root, mode).is_file() {
            JsonSnapshotLoader.load(root, mode)
        } else {
            SourceLoader.load(root, mode)
        }
    }

    fn tracked_paths(&self, root: &Path, mode: &str, snapshot: &Snapshot) -> Vec<PathBuf> {
        if JsonSnapshotLoader::export_path(root, mode).is_file() {
            JsonSnapshotLoader.tracked_paths(root, mode, snapshot)
        } else {
            // An export appearing later takes over from the sources.
            let mut paths = SourceLoader.tracked_paths(root, mode, snapshot);
            paths.push(JsonSnapshotLoader::export_path(root, mode));
            paths
        }
    }
}
