//! Compile-only test to verify public API surface.
//!
//! This file serves as a compile-time contract for the public API.
//! If this file fails to compile, the public API has regressed.
//!
//! Run with: cargo test --test api_surface

// Allow unused imports - this test is about compile-time verification, not runtime usage
#![allow(unused_imports)]

// ============================================================================
// Core Infrastructure Types
// ============================================================================

use symtool::diff::{apply_unified_diff, unified_diff, DiffError, CONTEXT_LINES};
use symtool::error::{OutputErrorCode, SymtoolError, SymtoolResult};
use symtool::output::{
    emit_response, group_by_file, paginate, ErrorInfo, ErrorResponse, FileGroup, Paged, Response,
    SCHEMA_VERSION,
};
use symtool::patch::{apply_edits, apply_pending, Applied, Edit, FileDiff, PendingFile};
use symtool::shape::{contains_identical, FieldShape, MethodSig, Signature, TypeShape};
use symtool::snapshot::{
    is_exported, is_generated_source, is_test_path, Binding, DeclId, DeclKey, DeclKind,
    Declaration, Snapshot, SnapshotId, SourceFile,
};
use symtool::syntax::{
    canonical_text, collect_idents, parse_expr, parse_file, Expr, File, Ident, NodeId, ParseError,
    VisitResult, Visitor,
};
use symtool::text::LineIndex;
use symtool::types::{Location, Span};
use symtool::util::{generate_snapshot_id, normalize_path};
use symtool::write::{safe_write, write_changes, FileChange};

// ============================================================================
// Snapshot Supply
// ============================================================================

use symtool::cache::{CacheKey, CacheStats, SnapshotCache};
use symtool::cancel::{check, CancelCheck, CancellationToken};
use symtool::config::{
    CliOverrides, ConfigError, ConfigSource, ConfigValue, ResolvedConfig, CONFIG_FILE,
};
use symtool::fixture::{load_sources, snapshot_from_sources, FixtureBuilder, PRODUCTION_MODE};
use symtool::loader::{AutoLoader, JsonSnapshotLoader, LoadError, SnapshotLoader, SourceLoader};

// ============================================================================
// Engines
// ============================================================================

use symtool::complexity::{complexity_report, file_complexity, measure, Complexity, FunctionComplexity};
use symtool::context::{best_context, ContextLimits, Definition, Dependency, SymbolContext};
use symtool::implementations::{find_implementations, satisfies, Implementation, ImplementationReport};
use symtool::index::{matches_across_representations, same_declaration, SymbolIndex, SymbolInfo};
use symtool::liveness::{find_dead, is_candidate, DeadCodeReport, DeadPackage, DeadSymbol};
use symtool::rename::{find_collisions, rename, RenameRequest, RenameResult};
use symtool::rewrite::{rewrite, structurally_equal, Pattern, RewriteResult};
use symtool::usages::{
    collect, collect_all, collect_best_context, references, FileFilter, References, UsageEdge,
    UsageRole,
};
use symtool::validation::{is_keyword, validate_identifier, ValidationError, KEYWORDS};

// ============================================================================
// Front Door
// ============================================================================

use symtool::cli::{resolve_symbol, Engine, Operation, Resolution};

#[test]
fn api_surface_compiles() {
    // Compile-time check only.
}
