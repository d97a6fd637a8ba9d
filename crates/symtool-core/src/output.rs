//! JSON output types and serialization for CLI responses.
//!
//! ## Design Principles
//!
//! 1. **Status first:** every response has `status` as its first field
//! 2. **Deterministic:** same input gives the same output, field order and
//!    array ordering included
//! 3. **Versioned:** `schema_version` enables forward compatibility

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{OutputErrorCode, SymtoolError, SymtoolResult};

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Pagination
// ============================================================================

/// One page of a result list.
///
/// `total` always counts the full, untruncated list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

impl<T> Paged<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
            has_more: self.has_more,
        }
    }
}

/// Slice `items[offset..offset + limit]`.
///
/// An offset past the end yields an empty page. A zero limit is invalid.
pub fn paginate<T>(items: Vec<T>, limit: usize, offset: usize) -> SymtoolResult<Paged<T>> {
    if limit == 0 {
        return Err(SymtoolError::invalid_input("limit must be at least 1"));
    }
    let total = items.len();
    let page: Vec<T> = items.into_iter().skip(offset).take(limit).collect();
    Ok(Paged {
        has_more: offset.saturating_add(page.len()) < total,
        items: page,
        total,
        offset,
        limit,
    })
}

/// Results sharing one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileGroup<T> {
    pub file: String,
    pub items: Vec<T>,
}

/// Group items by file, files sorted by path, item order preserved.
pub fn group_by_file<T>(items: Vec<T>, file_of: impl Fn(&T) -> &str) -> Vec<FileGroup<T>> {
    let mut groups: Vec<FileGroup<T>> = Vec::new();
    for item in items {
        let file = file_of(&item);
        match groups.binary_search_by(|g| g.file.as_str().cmp(file)) {
            Ok(idx) => groups[idx].items.push(item),
            Err(idx) => {
                let file = file.to_string();
                groups.insert(
                    idx,
                    FileGroup {
                        file,
                        items: vec![item],
                    },
                );
            }
        }
    }
    groups
}

// ============================================================================
// Response Envelopes
// ============================================================================

/// Successful response wrapping an operation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<T> {
    /// Status: "ok".
    pub status: String,
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    pub result: T,
}

impl<T> Response<T> {
    pub fn ok(snapshot_id: Option<String>, result: T) -> Self {
        Response {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            snapshot_id,
            result,
        }
    }
}

/// Error details for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code, also the process exit code.
    pub code: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn from_error(err: &SymtoolError) -> Self {
        ErrorInfo {
            code: OutputErrorCode::from(err).code(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    pub schema_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &SymtoolError, snapshot_id: Option<String>) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            snapshot_id,
            error: ErrorInfo::from_error(err),
        }
    }
}

/// Emit a response as pretty-printed JSON followed by a newline.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod pagination {
        use super::*;

        #[test]
        fn page_size_is_bounded_by_remaining_items() {
            let items: Vec<u32> = (0..7).collect();
            for limit in 1..10 {
                for offset in 0..10 {
                    let page = paginate(items.clone(), limit, offset).unwrap();
                    assert_eq!(page.items.len(), limit.min(7usize.saturating_sub(offset)));
                    assert_eq!(page.total, 7);
                    assert_eq!(page.has_more, offset + page.items.len() < 7);
                }
            }
        }

        #[test]
        fn zero_limit_is_invalid() {
            let err = paginate(vec![1, 2, 3], 0, 0).unwrap_err();
            assert_eq!(OutputErrorCode::from(&err).code(), 2);
        }
    }

    mod grouping {
        use super::*;

        #[test]
        fn groups_sorted_by_file_with_stable_items() {
            let items = vec![("b.go", 1), ("a.go", 2), ("b.go", 3)];
            let groups = group_by_file(items, |item| item.0);
            assert_eq!(groups.len(), 2);
            assert_eq!(groups[0].file, "a.go");
            assert_eq!(groups[1].items, vec![("b.go", 1), ("b.go", 3)]);
        }
    }

    mod envelopes {
        use super::*;

        #[test]
        fn status_comes_first() {
            let response = Response::ok(Some("snap_1".to_string()), vec![1]);
            let json = serde_json::to_string(&response).unwrap();
            assert!(json.starts_with("{\"status\":\"ok\""));
        }

        #[test]
        fn error_response_carries_code_and_details() {
            let err = SymtoolError::PartialWriteFailure {
                changed_files: vec!["a.go".to_string()],
                failed_file: "b.go".to_string(),
                message: "denied".to_string(),
            };
            let response = ErrorResponse::from_error(&err, None);
            let value = serde_json::to_value(&response).unwrap();
            assert_eq!(value["status"], "error");
            assert_eq!(value["error"]["code"], 4);
            assert_eq!(value["error"]["details"]["changed_files"][0], "a.go");
        }
    }
}
