//! Identifier rename across a snapshot.
//!
//! Every identifier that resolves to the target is replaced in place; the
//! rest of each file is left byte-for-byte intact. A dry run returns unified
//! diffs and touches nothing. A real run writes each changed file with
//! [`safe_write`](symtool_core::write::safe_write), one file at a time, and
//! does not roll back earlier files if a later write fails.
//!
//! Collisions with existing declarations are reported as warnings and do not
//! stop the rename.

use serde::Serialize;
use symtool_core::error::{SymtoolError, SymtoolResult};
use symtool_core::patch::{apply_edits, apply_pending, Applied, Edit, PendingFile};
use symtool_core::snapshot::{is_exported, DeclKind, Declaration, Snapshot, SourceFile};
use symtool_core::syntax::Decl;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::index::{identity_rule, SymbolIndex, SymbolInfo};
use crate::usages::for_each_ident;
use crate::validation::validate_identifier;

#[derive(Debug, Clone)]
pub struct RenameRequest<'r> {
    /// Plain name or `Owner.Member`.
    pub target: &'r str,
    pub new_name: &'r str,
    pub kind: Option<DeclKind>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameResult {
    pub symbol: SymbolInfo,
    pub new_name: String,
    pub dry_run: bool,
    /// Identifier occurrences rewritten.
    pub edits: usize,
    #[serde(flatten)]
    pub applied: Applied,
    pub collisions: Vec<String>,
}

impl RenameResult {
    pub fn changed_files(&self) -> &[String] {
        &self.applied.changed_files
    }
}

/// Rename a symbol and every reference to it.
pub fn rename(
    snapshot: &Snapshot,
    request: &RenameRequest<'_>,
    token: &CancellationToken,
) -> SymtoolResult<RenameResult> {
    let old_name = request.target.rsplit('.').next().unwrap_or(request.target);
    if old_name == request.new_name {
        return Err(SymtoolError::invalid_input(format!(
            "new name is the same as the old name: {}",
            request.new_name
        )));
    }
    validate_identifier(request.new_name)?;

    let target = SymbolIndex::new(snapshot).resolve_target(request.target, request.kind)?;
    let collisions = find_collisions(snapshot, target, request.new_name);
    for collision in &collisions {
        warn!(symbol = %target.name, "{}", collision);
    }

    let mut pending = Vec::new();
    let mut edits = 0;
    for file in &snapshot.files {
        let file_edits = occurrence_edits(snapshot, file, target, request.new_name, token)?;
        if file_edits.is_empty() {
            continue;
        }
        edits += file_edits.len();
        pending.push(PendingFile {
            path: file.path.clone(),
            original: file.source.clone(),
            updated: apply_edits(&file.source, &file_edits)?,
            edits: file_edits.len(),
        });
    }
    debug!(symbol = %target.name, edits, files = pending.len(), "rename computed");

    let applied = apply_pending(snapshot.root(), &pending, request.dry_run)?;
    if !request.dry_run {
        info!(
            from = %target.name,
            to = request.new_name,
            files = applied.changed_files.len(),
            "renamed symbol"
        );
    }
    Ok(RenameResult {
        symbol: SymbolInfo::new(snapshot, target),
        new_name: request.new_name.to_string(),
        dry_run: request.dry_run,
        edits,
        applied,
        collisions,
    })
}

/// Edits replacing every occurrence of `target` in `file`.
fn occurrence_edits(
    snapshot: &Snapshot,
    file: &SourceFile,
    target: &Declaration,
    new_name: &str,
    token: &CancellationToken,
) -> SymtoolResult<Vec<Edit>> {
    let matches = identity_rule(snapshot, target);
    let mut edits = Vec::new();
    for_each_ident(file, token, |ident| {
        let Some(decl) = snapshot.resolve(ident.id).and_then(|id| snapshot.decl(id)) else {
            return;
        };
        if !matches(decl, target) {
            return;
        }
        if file.source.get(ident.span.start..ident.span.end) != Some(ident.name.as_str()) {
            warn!(file = %file.path, offset = ident.span.start, "identifier span does not match source; skipped");
            return;
        }
        edits.push(Edit::replace(ident.span, new_name));
    })?;
    Ok(edits)
}

// ============================================================================
// Collisions
// ============================================================================

/// Existing declarations the new name would clash with, plus exported-ness
/// changes.
pub fn find_collisions(snapshot: &Snapshot, target: &Declaration, new_name: &str) -> Vec<String> {
    let mut collisions = Vec::new();
    let index = SymbolIndex::new(snapshot);

    let existing = if target.is_package_level() {
        snapshot
            .scope_lookup(&target.package, new_name)
            .and_then(|id| snapshot.decl(id))
    } else if let Some(owner) = target.owner.and_then(|id| snapshot.decl(id)) {
        index.resolve_member(owner, new_name)
    } else if target.is_local {
        local_clash(snapshot, target, new_name)
    } else {
        None
    };
    if let Some(existing) = existing {
        let at = existing
            .location
            .as_ref()
            .map(|loc| format!(" at {}", loc))
            .unwrap_or_default();
        collisions.push(format!(
            "{} '{}' already exists in the same scope{}",
            existing.kind, new_name, at
        ));
    }

    if !target.is_local && is_exported(&target.name) != is_exported(new_name) {
        let change = if is_exported(new_name) {
            "exports"
        } else {
            "unexports"
        };
        collisions.push(format!(
            "renaming '{}' to '{}' {} the symbol",
            target.name, new_name, change
        ));
    }
    collisions
}

/// A local or parameter named `new_name` declared in the same function.
fn local_clash<'s>(
    snapshot: &'s Snapshot,
    target: &Declaration,
    new_name: &str,
) -> Option<&'s Declaration> {
    let file = target.file()?;
    let offset = target.offset?;
    let tree = &snapshot.file(file)?.tree;
    let body = tree.decls.iter().find_map(|decl| match decl {
        Decl::Func(func) if func.span.start <= offset && offset < func.span.end => Some(func.span),
        _ => None,
    })?;
    snapshot.decls.iter().find(|d| {
        d.is_local
            && d.name == new_name
            && d.file() == Some(file)
            && d.offset.is_some_and(|o| body.start <= o && o < body.end)
    })
}
