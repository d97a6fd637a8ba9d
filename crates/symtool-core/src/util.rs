//! General utilities shared across modules.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::snapshot::{SnapshotId, SourceFile};

/// Generate a deterministic snapshot id from root, mode, and file contents.
///
/// Returns a string like `snap_0123456789abcdef`. Identical inputs always
/// produce the same id, so a reload of unchanged sources keeps its id.
pub fn generate_snapshot_id(root: &Path, mode: &str, files: &[SourceFile]) -> SnapshotId {
    let mut hasher = Sha256::new();
    hasher.update(root.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(mode.as_bytes());
    hasher.update(b"\0");
    for file in files {
        hasher.update(file.path.as_bytes());
        hasher.update(b":");
        hasher.update(Sha256::digest(file.source.as_bytes()));
        hasher.update(b"\n");
    }
    let hash = hasher.finalize();
    SnapshotId(format!("snap_{}", hex::encode(&hash[..8])))
}

/// Normalize a path to forward slashes for output.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_file;

    fn file(path: &str, source: &str) -> SourceFile {
        let mut next_id = 0;
        SourceFile::new(path, source, parse_file(source, &mut next_id).unwrap())
    }

    #[test]
    fn snapshot_id_format() {
        let id = generate_snapshot_id(Path::new("/ws"), "default", &[]);
        assert!(id.as_str().starts_with("snap_"), "{}", id);
        assert_eq!(id.as_str().len(), 21, "{}", id);
    }

    #[test]
    fn snapshot_id_tracks_content_and_mode() {
        let a = [file("a.go", "package a\n")];
        let b = [file("a.go", "package a\n\nvar x = 1\n")];
        let root = Path::new("/ws");
        assert_eq!(
            generate_snapshot_id(root, "default", &a),
            generate_snapshot_id(root, "default", &a)
        );
        assert_ne!(
            generate_snapshot_id(root, "default", &a),
            generate_snapshot_id(root, "default", &b)
        );
        assert_ne!(
            generate_snapshot_id(root, "default", &a),
            generate_snapshot_id(root, "tests", &a)
        );
    }
}
