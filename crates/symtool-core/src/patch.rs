//! Text edits and their application.
//!
//! Rename and rewrite both produce byte-span replacements per file. This
//! module splices them into new file content and then either previews the
//! result as unified diffs or writes it through [`write_changes`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diff::unified_diff;
use crate::error::{SymtoolError, SymtoolResult};
use crate::types::Span;
use crate::write::{write_changes, FileChange};

/// Replace the bytes of `span` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Span,
    pub text: String,
}

impl Edit {
    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        Edit {
            span,
            text: text.into(),
        }
    }
}

/// Apply non-overlapping edits to `source`.
///
/// Edits may come in any order. Overlapping or out-of-range edits are an
/// internal error.
pub fn apply_edits(source: &str, edits: &[Edit]) -> SymtoolResult<String> {
    let mut sorted: Vec<&Edit> = edits.iter().collect();
    sorted.sort_by_key(|e| (e.span.start, e.span.end));

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for edit in sorted {
        let Span { start, end } = edit.span;
        if start < cursor || end > source.len() || start > end {
            return Err(SymtoolError::internal(format!(
                "edit {}..{} overlaps or exceeds source of {} bytes",
                start,
                end,
                source.len()
            )));
        }
        if !source.is_char_boundary(start) || !source.is_char_boundary(end) {
            return Err(SymtoolError::internal(format!(
                "edit {}..{} splits a character",
                start, end
            )));
        }
        out.push_str(&source[cursor..start]);
        out.push_str(&edit.text);
        cursor = end;
    }
    out.push_str(&source[cursor..]);
    Ok(out)
}

/// New content computed for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub path: String,
    pub original: String,
    pub updated: String,
    /// Number of edits applied.
    pub edits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub file: String,
    pub diff: String,
}

/// Outcome of applying pending files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applied {
    pub changed_files: Vec<String>,
    /// Unified diffs, present for dry runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffs: Option<Vec<FileDiff>>,
}

/// Preview (`dry_run`) or write pending files under `root`.
///
/// Files with no edits are skipped. Writes are atomic per file only: on
/// failure the error lists the files already written.
pub fn apply_pending(root: &Path, files: &[PendingFile], dry_run: bool) -> SymtoolResult<Applied> {
    let changed: Vec<&PendingFile> = files
        .iter()
        .filter(|f| f.edits > 0 && f.updated != f.original)
        .collect();
    let changed_files: Vec<String> = changed.iter().map(|f| f.path.clone()).collect();

    if dry_run {
        let diffs = changed
            .iter()
            .map(|f| FileDiff {
                file: f.path.clone(),
                diff: unified_diff(&f.path, &f.original, &f.updated),
            })
            .collect();
        return Ok(Applied {
            changed_files,
            diffs: Some(diffs),
        });
    }

    let changes: Vec<FileChange> = changed
        .iter()
        .map(|f| FileChange::new(f.path.clone(), f.updated.clone()))
        .collect();
    let written = write_changes(root, &changes)?;
    info!(files = written.len(), "applied changes");
    Ok(Applied {
        changed_files: written,
        diffs: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    mod edits {
        use super::*;

        #[test]
        fn unordered_edits_apply_left_to_right() {
            let out = apply_edits(
                "foo(bar)",
                &[Edit::replace(Span::new(4, 7), "baz"), Edit::replace(Span::new(0, 3), "qux")],
            )
            .unwrap();
            assert_eq!(out, "qux(baz)");
        }

        #[test]
        fn overlap_is_an_error() {
            let err = apply_edits(
                "abcdef",
                &[Edit::replace(Span::new(0, 3), "x"), Edit::replace(Span::new(2, 4), "y")],
            )
            .unwrap_err();
            assert!(matches!(err, SymtoolError::Internal { .. }));
        }
    }

    mod pending {
        use super::*;

        fn pending(path: &str, original: &str, updated: &str) -> PendingFile {
            PendingFile {
                path: path.to_string(),
                original: original.to_string(),
                updated: updated.to_string(),
                edits: usize::from(original != updated),
            }
        }

        #[test]
        fn dry_run_never_writes() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("a.go"), "x := 1\n").unwrap();
            let files = [pending("a.go", "x := 1\n", "y := 1\n"), pending("b.go", "same\n", "same\n")];
            let applied = apply_pending(dir.path(), &files, true).unwrap();
            assert_eq!(applied.changed_files, ["a.go"]);
            let diffs = applied.diffs.unwrap();
            assert!(diffs[0].diff.contains("-x := 1\n+y := 1\n"));
            assert_eq!(fs::read_to_string(dir.path().join("a.go")).unwrap(), "x := 1\n");
        }

        #[test]
        fn real_run_writes_changed_files() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("a.go"), "x := 1\n").unwrap();
            let files = [pending("a.go", "x := 1\n", "y := 1\n")];
            let applied = apply_pending(dir.path(), &files, false).unwrap();
            assert_eq!(applied.changed_files, ["a.go"]);
            assert!(applied.diffs.is_none());
            assert_eq!(fs::read_to_string(dir.path().join("a.go")).unwrap(), "y := 1\n");
        }
    }
}
