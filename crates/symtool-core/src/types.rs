//! Common types shared between the snapshot model, errors, and output.
//!
//! This module contains types that are used across the crate, avoiding
//! circular dependencies between `snapshot`, `error`, and `output`.

use serde::{Deserialize, Serialize};

// ============================================================================
// Span
// ============================================================================

/// Byte range within a single source file.
///
/// - `start`: inclusive byte offset
/// - `end`: exclusive byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span overlaps with another.
    ///
    /// Adjacent spans (one ends where another starts) do NOT overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Shift the span by `base` bytes.
    pub fn offset(&self, base: usize) -> Span {
        Span {
            start: self.start + base,
            end: self.end + base,
        }
    }
}

// ============================================================================
// Location
// ============================================================================

/// Location in a source file.
///
/// - `file`: root-relative path
/// - `line`: 1-indexed line number
/// - `col`: 1-indexed column, UTF-8 bytes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Location {
    /// File path (root-relative).
    pub file: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, UTF-8 bytes).
    pub col: u32,
}

impl Location {
    /// Create a new location.
    pub fn new(file: impl Into<String>, line: u32, col: u32) -> Self {
        Location {
            file: file.into(),
            line,
            col,
        }
    }

    /// Parse a location from "path:line:col" format.
    ///
    /// Robust against paths containing colons.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.rsplitn(3, ':').collect();
        if parts.len() != 3 {
            return None;
        }
        let col: u32 = parts[0].parse().ok()?;
        let line: u32 = parts[1].parse().ok()?;
        Some(Location::new(parts[2], line, col))
    }

    fn sort_key(&self) -> (&str, u32, u32) {
        (&self.file, self.line, self.col)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_overlap_excludes_adjacent() {
        let a = Span::new(0, 5);
        assert!(!a.overlaps(&Span::new(5, 8)));
        assert!(a.overlaps(&Span::new(4, 8)));
        assert!(a.contains(&Span::new(1, 3)));
    }

    #[test]
    fn location_parse_handles_colons_in_path() {
        let loc = Location::parse("C:/work/main.go:12:4").unwrap();
        assert_eq!(loc.file, "C:/work/main.go");
        assert_eq!((loc.line, loc.col), (12, 4));
        assert!(Location::parse("main.go:12").is_none());
    }

    #[test]
    fn location_orders_by_file_then_position() {
        let mut locs = vec![
            Location::new("b.go", 1, 1),
            Location::new("a.go", 9, 2),
            Location::new("a.go", 9, 1),
        ];
        locs.sort();
        assert_eq!(locs[0], Location::new("a.go", 9, 1));
        assert_eq!(locs[2].file, "b.go");
    }
}
