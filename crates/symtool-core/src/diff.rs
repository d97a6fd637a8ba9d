//! Unified diff generation and application.
//!
//! Diffs are computed line by line with `similar` and rendered in standard
//! unified format with three lines of context. Output is deterministic:
//! identical inputs produce byte-identical diffs, and identical old/new
//! content produces an empty diff.

use similar::TextDiff;
use thiserror::Error;

/// Context lines around each change.
pub const CONTEXT_LINES: usize = 3;

const NO_NEWLINE: &str = "\\ No newline at end of file\n";

/// Split into lines, keeping terminators so a missing final newline is
/// distinguishable.
fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// Render a unified diff of one file. Returns an empty string when the
/// contents are identical.
pub fn unified_diff(path: &str, old: &str, new: &str) -> String {
    if old == new {
        return String::new();
    }
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .missing_newline_hint(true)
        .header(&format!("a/{}", path), &format!("b/{}", path))
        .to_string()
}

// ============================================================================
// Application
// ============================================================================

/// Error applying a diff to content it was not generated from.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("malformed hunk header: {0}")]
    MalformedHeader(String),
    #[error("hunk context does not match at line {line}")]
    ContextMismatch { line: usize },
}

/// Apply a single-file unified diff produced by [`unified_diff`].
pub fn apply_unified_diff(original: &str, diff: &str) -> Result<String, DiffError> {
    let old_lines = split_lines(original);
    let mut out = String::with_capacity(original.len());
    let mut cursor = 0usize;
    let mut lines = diff.split_inclusive('\n').peekable();

    while let Some(line) = lines.next() {
        if line.starts_with("--- ") || line.starts_with("+++ ") {
            continue;
        }
        let Some(header) = line.strip_prefix("@@ -") else {
            continue;
        };
        let (old_start, old_len) = parse_header(header)
            .ok_or_else(|| DiffError::MalformedHeader(line.trim_end().to_string()))?;
        let first = if old_len == 0 {
            old_start
        } else {
            old_start
                .checked_sub(1)
                .ok_or_else(|| DiffError::MalformedHeader(line.trim_end().to_string()))?
        };
        if first < cursor || first > old_lines.len() {
            return Err(DiffError::ContextMismatch { line: old_start });
        }
        for kept in &old_lines[cursor..first] {
            out.push_str(kept);
        }
        cursor = first;

        while let Some(body) = lines.peek() {
            if body.starts_with("@@") {
                break;
            }
            let body = lines.next().unwrap_or_default();
            let no_newline = lines.peek().is_some_and(|next| *next == NO_NEWLINE);
            if no_newline {
                lines.next();
            }
            let (marker, text) = body.split_at(1);
            let text = if no_newline {
                text.strip_suffix('\n').unwrap_or(text)
            } else {
                text
            };
            match marker {
                " " | "-" => {
                    if old_lines.get(cursor) != Some(&text) {
                        return Err(DiffError::ContextMismatch { line: cursor + 1 });
                    }
                    if marker == " " {
                        out.push_str(text);
                    }
                    cursor += 1;
                }
                "+" => out.push_str(text),
                _ => return Err(DiffError::MalformedHeader(body.trim_end().to_string())),
            }
        }
    }
    for kept in &old_lines[cursor..] {
        out.push_str(kept);
    }
    Ok(out)
}

/// Parse `l,n +l,n @@` (the part after `@@ -`) into the old start and length.
fn parse_header(header: &str) -> Option<(usize, usize)> {
    let old = header.split_whitespace().next()?;
    let (start, len) = old.split_once(',').unwrap_or((old, "1"));
    Some((start.parse().ok()?, len.parse().ok()?))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_has_empty_diff() {
        assert_eq!(unified_diff("a.go", "x\ny\n", "x\ny\n"), "");
    }

    #[test]
    fn single_line_change() {
        let diff = unified_diff("a.go", "a\nb\nc\n", "a\nB\nc\n");
        assert_eq!(
            diff,
            "--- a/a.go\n+++ b/a.go\n@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n"
        );
    }

    #[test]
    fn distant_changes_get_separate_hunks() {
        let old: String = (1..=20).map(|i| format!("line{}\n", i)).collect();
        let new = old.replace("line2\n", "two\n").replace("line18\n", "eighteen\n");
        let diff = unified_diff("f.go", &old, &new);
        assert_eq!(diff.matches("@@ -").count(), 2);
        assert!(diff.contains("@@ -1,5 +1,5 @@"));
        assert!(diff.contains("@@ -15,6 +15,6 @@"));
    }

    #[test]
    fn large_files_with_changes_at_both_ends() {
        let old: String = (0..20_000).map(|i| format!("line{}\n", i)).collect();
        let new = old
            .replacen("line0\n", "first\n", 1)
            .replace("line19999\n", "last\n");
        let diff = unified_diff("big.go", &old, &new);
        assert_eq!(diff.matches("@@ -").count(), 2);
        assert_eq!(apply_unified_diff(&old, &diff).unwrap(), new);
    }

    #[test]
    fn single_line_ranges_omit_length() {
        let diff = unified_diff("f.go", "x\n", "y\n");
        assert!(diff.contains("@@ -1 +1 @@\n"));
        assert_eq!(apply_unified_diff("x\n", &diff).unwrap(), "y\n");
    }

    #[test]
    fn missing_trailing_newline_is_marked() {
        let diff = unified_diff("f.go", "a\nb", "a\nc");
        assert!(diff.contains("-b\n\\ No newline at end of file\n"));
        assert_eq!(apply_unified_diff("a\nb", &diff).unwrap(), "a\nc");
    }

    #[test]
    fn apply_reproduces_new_content() {
        let old = "package a\n\nfunc Foo() {}\n\nfunc bar() { Foo() }\n";
        let new = "package a\n\nfunc MyFoo() {}\n\nfunc bar() { MyFoo() }\n";
        let diff = unified_diff("a.go", old, new);
        assert_eq!(apply_unified_diff(old, &diff).unwrap(), new);
    }

    #[test]
    fn apply_handles_insertions_and_deletions() {
        let old = "a\nb\nc\nd\n";
        let new = "a\nc\nd\ne\nf\n";
        let diff = unified_diff("x", old, new);
        assert_eq!(apply_unified_diff(old, &diff).unwrap(), new);
        assert_eq!(apply_unified_diff("", &unified_diff("x", "", "z\n")).unwrap(), "z\n");
    }

    #[test]
    fn apply_rejects_wrong_base() {
        let diff = unified_diff("a.go", "a\nb\nc\n", "a\nB\nc\n");
        assert!(matches!(
            apply_unified_diff("a\nx\nc\n", &diff),
            Err(DiffError::ContextMismatch { .. })
        ));
    }
}
