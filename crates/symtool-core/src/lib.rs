//! Core infrastructure for symtool.
//!
//! This crate provides the shared pieces the analysis engines build on:
//! - Snapshot data model: files, trees, declarations, usage tables
//! - Syntax tree, visitor, and expression parser
//! - Type shapes and structural identity
//! - Text edits, unified diffs, safe writes, and JSON output envelopes
//! - Error types and error codes

pub mod diff;
pub mod error;
pub mod output;
pub mod patch;
pub mod shape;
pub mod snapshot;
pub mod syntax;
pub mod text;
pub mod types;
pub mod util;
pub mod write;
