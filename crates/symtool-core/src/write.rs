//! Safe file writes.
//!
//! Every write goes through a sibling temporary file that is atomically
//! renamed over the target, so readers see either the old or the new
//! content and a crash mid-write never truncates the original.
//!
//! Multi-file writes are atomic per file only. When a write fails after
//! earlier files were replaced, those files stay replaced and are reported
//! through [`SymtoolError::PartialWriteFailure`].

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{SymtoolError, SymtoolResult};

/// Write `content` to `path` atomically using temp + rename.
///
/// The temporary file is created in the target's directory so the final
/// rename never crosses filesystems. An existing file's permissions are
/// carried over.
pub fn safe_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.flush()?;
    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file().set_permissions(metadata.permissions())?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// New content for one root-relative file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub content: String,
}

impl FileChange {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        FileChange {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Write each change under `root` in order, stopping at the first failure.
///
/// Returns the paths written. On failure, the error lists every path that
/// was already replaced.
pub fn write_changes(root: &Path, changes: &[FileChange]) -> SymtoolResult<Vec<String>> {
    let mut written = Vec::with_capacity(changes.len());
    for change in changes {
        let target = root.join(&change.path);
        if let Err(err) = safe_write(&target, change.content.as_bytes()) {
            warn!(
                file = %change.path,
                written = written.len(),
                error = %err,
                "write failed; earlier files stay changed"
            );
            return Err(SymtoolError::PartialWriteFailure {
                changed_files: written,
                failed_file: change.path.clone(),
                message: err.to_string(),
            });
        }
        debug!(file = %change.path, bytes = change.content.len(), "wrote file");
        written.push(change.path.clone());
    }
    Ok(written)
}
