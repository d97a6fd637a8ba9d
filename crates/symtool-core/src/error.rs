//! Error types and error code constants for symtool.
//!
//! This module provides a unified error type (`SymtoolError`) that bridges
//! domain-specific errors from different subsystems (parsing, loading,
//! writing) into a common format suitable for JSON output.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid input (bad names, malformed patterns, bad pagination)
//! - `3`: Resolution errors (symbol not found, wrong kind)
//! - `4`: Partial write failure (some files already written)
//! - `6`: Snapshot load failure
//! - `7`: Cancelled
//! - `10`: Internal errors (bugs, unexpected state)

use std::fmt;

use thiserror::Error;

use crate::syntax::ParseError;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Error codes for JSON output.
///
/// These codes map to CLI exit codes and appear in JSON error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OutputErrorCode {
    /// Invalid input from caller, detected before any file I/O.
    InvalidInput = 2,
    /// Target symbol absent or of the wrong kind.
    ResolutionError = 3,
    /// Some files were written before an I/O error.
    PartialWrite = 4,
    /// The front-end could not produce a snapshot.
    LoadFailure = 6,
    /// Cooperative cancellation observed.
    Cancelled = 7,
    /// Internal errors (bugs, unexpected state).
    InternalError = 10,
}

impl OutputErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for OutputErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for analysis and refactoring requests.
#[derive(Debug, Error)]
pub enum SymtoolError {
    /// Target symbol or interface absent. Terminal, never retried.
    #[error("{what} not found: {name}")]
    NotFound { what: String, name: String },

    /// Target resolved to a declaration of the wrong shape.
    #[error("{name} is a {actual}, expected {expected}")]
    WrongKind {
        name: String,
        expected: String,
        actual: String,
    },

    /// Bad request input, detected before any file I/O.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// The front-end could not produce a snapshot.
    #[error("failed to load snapshot for {root}: {message}")]
    LoadFailure { root: String, message: String },

    /// Cooperative cancellation observed mid-traversal.
    #[error("operation cancelled")]
    Cancelled,

    /// An I/O error after some files were already written.
    ///
    /// `changed_files` lists every file written before the failure; those
    /// writes are not rolled back.
    #[error("failed to write {failed_file} after {} file(s) changed: {message}", .changed_files.len())]
    PartialWriteFailure {
        changed_files: Vec<String>,
        failed_file: String,
        message: String,
    },

    /// Internal error (bug or unexpected state).
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result alias used throughout the crate.
pub type SymtoolResult<T> = Result<T, SymtoolError>;

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&SymtoolError> for OutputErrorCode {
    fn from(err: &SymtoolError) -> Self {
        match err {
            SymtoolError::NotFound { .. } => OutputErrorCode::ResolutionError,
            SymtoolError::WrongKind { .. } => OutputErrorCode::ResolutionError,
            SymtoolError::InvalidInput { .. } => OutputErrorCode::InvalidInput,
            SymtoolError::LoadFailure { .. } => OutputErrorCode::LoadFailure,
            SymtoolError::Cancelled => OutputErrorCode::Cancelled,
            SymtoolError::PartialWriteFailure { .. } => OutputErrorCode::PartialWrite,
            SymtoolError::Internal { .. } => OutputErrorCode::InternalError,
        }
    }
}

impl From<SymtoolError> for OutputErrorCode {
    fn from(err: SymtoolError) -> Self {
        OutputErrorCode::from(&err)
    }
}

// ============================================================================
// Bridges
// ============================================================================

impl From<ParseError> for SymtoolError {
    fn from(err: ParseError) -> Self {
        SymtoolError::InvalidInput {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SymtoolError {
    fn from(err: serde_json::Error) -> Self {
        SymtoolError::Internal {
            message: format!("JSON error: {}", err),
        }
    }
}

impl From<std::io::Error> for SymtoolError {
    fn from(err: std::io::Error) -> Self {
        SymtoolError::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl SymtoolError {
    /// Create a not-found error for a symbol name.
    pub fn symbol_not_found(name: impl Into<String>) -> Self {
        SymtoolError::NotFound {
            what: "symbol".to_string(),
            name: name.into(),
        }
    }

    /// Create a not-found error for an interface name.
    pub fn interface_not_found(name: impl Into<String>) -> Self {
        SymtoolError::NotFound {
            what: "interface".to_string(),
            name: name.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        SymtoolError::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a load failure for a root.
    pub fn load_failure(root: impl fmt::Display, message: impl Into<String>) -> Self {
        SymtoolError::LoadFailure {
            root: root.to_string(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        SymtoolError::Internal {
            message: message.into(),
        }
    }

    /// Files already written when the error occurred, if any.
    pub fn changed_files(&self) -> &[String] {
        match self {
            SymtoolError::PartialWriteFailure { changed_files, .. } => changed_files,
            _ => &[],
        }
    }

    /// Structured details for JSON error output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            SymtoolError::PartialWriteFailure {
                changed_files,
                failed_file,
                ..
            } => Some(serde_json::json!({
                "changed_files": changed_files,
                "failed_file": failed_file,
            })),
            SymtoolError::WrongKind {
                expected, actual, ..
            } => Some(serde_json::json!({
                "expected": expected,
                "actual": actual,
            })),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod code_mapping {
        use super::*;

        #[test]
        fn resolution_errors_share_a_code() {
            let not_found = SymtoolError::symbol_not_found("Foo");
            let wrong_kind = SymtoolError::WrongKind {
                name: "Foo".to_string(),
                expected: "interface".to_string(),
                actual: "struct".to_string(),
            };
            assert_eq!(OutputErrorCode::from(&not_found).code(), 3);
            assert_eq!(OutputErrorCode::from(&wrong_kind).code(), 3);
        }

        #[test]
        fn other_codes() {
            assert_eq!(
                OutputErrorCode::from(SymtoolError::invalid_input("x")).code(),
                2
            );
            assert_eq!(OutputErrorCode::from(SymtoolError::Cancelled).code(), 7);
            assert_eq!(
                OutputErrorCode::from(SymtoolError::load_failure("/ws", "boom")).code(),
                6
            );
            assert_eq!(OutputErrorCode::from(SymtoolError::internal("x")).code(), 10);
        }
    }

    mod partial_write {
        use super::*;

        #[test]
        fn changed_files_surface_in_details() {
            let err = SymtoolError::PartialWriteFailure {
                changed_files: vec!["a.go".to_string()],
                failed_file: "b.go".to_string(),
                message: "permission denied".to_string(),
            };
            assert_eq!(err.changed_files(), ["a.go".to_string()]);
            let details = err.details().unwrap();
            assert_eq!(details["failed_file"], "b.go");
            assert_eq!(OutputErrorCode::from(&err).code(), 4);
            assert!(err.to_string().contains("1 file(s) changed"));
        }

        #[test]
        fn parse_errors_become_invalid_input() {
            let err: SymtoolError = ParseError::new(3, "expected expression").into();
            assert!(matches!(err, SymtoolError::InvalidInput { .. }));
        }
    }
}
