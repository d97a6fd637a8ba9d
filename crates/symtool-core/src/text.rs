//! Text position utilities for byte offset and line:column conversions.
//!
//! ## Coordinate Conventions
//!
//! - Lines and columns are **1-indexed** (matching editor conventions)
//! - Columns count bytes, not characters
//! - Byte offsets are **0-indexed**

use crate::types::Span;

// ============================================================================
// Line Index
// ============================================================================

/// Precomputed line starts for one file, so repeated offset lookups are
/// logarithmic instead of rescanning the content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Build the index for `content`.
    pub fn new(content: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in content.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineIndex {
            line_starts,
            len: content.len(),
        }
    }

    /// Convert a byte offset to a 1-indexed `(line, col)` pair.
    ///
    /// Offsets past the end clamp to the end of content.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let col = offset - self.line_starts[line];
        (line as u32 + 1, col as u32 + 1)
    }

    /// 1-indexed line containing `offset`.
    pub fn line_of(&self, offset: usize) -> u32 {
        self.position(offset).0
    }

    /// Byte span of a 1-indexed line, excluding its newline.
    pub fn line_span(&self, line: u32) -> Option<Span> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(idx)?;
        let end = match self.line_starts.get(idx + 1) {
            Some(next) => next - 1,
            None => self.len,
        };
        Some(Span::new(start, end.max(start)))
    }

    /// Number of lines, ignoring a trailing newline.
    pub fn line_count(&self) -> u32 {
        if self.len == 0 {
            0
        } else if self.line_starts.last() == Some(&self.len) {
            (self.line_starts.len() - 1) as u32
        } else {
            self.line_starts.len() as u32
        }
    }
}

// ============================================================================
// Free Functions
// ============================================================================

/// Convert a byte offset to 1-indexed line and column.
pub fn byte_offset_to_position(content: &str, offset: usize) -> (u32, u32) {
    LineIndex::new(content).position(offset)
}

/// Text of the 1-indexed line, without the newline or a trailing `\r`.
pub fn line_text(content: &str, line: u32) -> Option<&str> {
    let span = LineIndex::new(content).line_span(line)?;
    extract_span(content, &span).map(|text| text.trim_end_matches('\r'))
}

/// Extract the text covered by `span`, if it lies on char boundaries.
pub fn extract_span<'a>(content: &'a str, span: &Span) -> Option<&'a str> {
    content.get(span.start..span.end)
}

/// Trimmed single-line snippet for the line containing `offset`.
pub fn snippet_at(content: &str, index: &LineIndex, offset: usize) -> String {
    index
        .line_span(index.line_of(offset))
        .and_then(|span| extract_span(content, &span))
        .map(|line| line.trim().to_string())
        .unwrap_or_default()
}

/// Count the number of lines in the content.
pub fn line_count(content: &str) -> u32 {
    LineIndex::new(content).line_count()
}

// ============================================================================
// Tests
// ============================================================================
