//! symtool: semantic symbol index and refactoring engine.
//!
//! Builds derived views over a front-end snapshot (syntax trees plus
//! resolved declaration and usage tables): symbol resolution, references,
//! dead-code detection, interface implementations, complexity metrics,
//! symbol context, identifier rename, and structural expression rewrite.

// Core infrastructure - re-exported from symtool-core
pub use symtool_core::diff;
pub use symtool_core::error;
pub use symtool_core::output;
pub use symtool_core::patch;
pub use symtool_core::shape;
pub use symtool_core::snapshot;
pub use symtool_core::syntax;
pub use symtool_core::text;
pub use symtool_core::types;
pub use symtool_core::util;
pub use symtool_core::write;

// Snapshot supply
pub mod cache;
pub mod cancel;
pub mod config;
pub mod fixture;
pub mod loader;

// Read-only engines
pub mod complexity;
pub mod context;
pub mod implementations;
pub mod index;
pub mod liveness;
pub mod usages;

// Mutating engines
pub mod rename;
pub mod rewrite;
pub mod validation;

// Front door
pub mod cli;
