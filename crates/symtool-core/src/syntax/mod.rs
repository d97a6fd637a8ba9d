//! Syntax tree, traversal, and the expression/pattern parser.
//!
//! Snapshots arrive with their trees already built by the front-end. The
//! parser here exists for user-supplied rewrite patterns, which are parsed as
//! standalone expressions, and for building small snapshots from source text
//! in tests.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod visit;

use thiserror::Error;

pub use ast::*;
pub use parser::{parse_expr, parse_file};
pub use visit::{collect_idents, VisitResult, Visitor};

/// Syntax error with the byte offset where it was detected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("syntax error at byte {offset}: {message}")]
pub struct ParseError {
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        ParseError {
            offset,
            message: message.into(),
        }
    }
}

/// Layout-insensitive rendering of a source fragment: its tokens joined by
/// single spaces, with comments and inserted semicolons dropped.
///
/// Fragments that fail to tokenize fall back to whitespace normalization.
pub fn canonical_text(fragment: &str) -> String {
    match lexer::tokenize(fragment) {
        Ok(tokens) => tokens
            .iter()
            .filter(|t| !matches!(t.kind, lexer::TokenKind::Eof | lexer::TokenKind::Semi { auto: true }))
            .map(|t| t.text)
            .collect::<Vec<_>>()
            .join(" "),
        Err(_) => fragment.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}
