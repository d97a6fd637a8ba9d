//! Usage collection: identifier occurrences linked to declarations.
//!
//! Every collector walks the syntax trees with a cancellable visitor and
//! emits one [`UsageEdge`] per identifier that resolves to a declaration.
//! Identifiers with no resolution are dropped.

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use symtool_core::error::{SymtoolError, SymtoolResult};
use symtool_core::output::{group_by_file, paginate, FileGroup, Paged};
use symtool_core::snapshot::{DeclId, DeclKind, Declaration, Snapshot, SourceFile};
use symtool_core::syntax::{visit::walk_file, Ident, VisitResult, Visitor};
use tracing::debug;

use crate::cancel::{CancelCheck, CancellationToken};
use crate::index::{identity_rule, SymbolIndex, SymbolInfo};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageRole {
    /// The identifier declares the symbol.
    Definition,
    Usage,
    /// A use inside a test file.
    TestUsage,
}

/// One identifier occurrence linked to the declaration it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageEdge {
    #[serde(skip)]
    pub decl: DeclId,
    pub name: String,
    pub file: String,
    pub line: u32,
    pub col: u32,
    /// Byte offset of the identifier.
    pub offset: usize,
    pub snippet: String,
    pub role: UsageRole,
}

impl UsageEdge {
    fn new(file: &SourceFile, ident: &Ident, decl: DeclId, role: UsageRole) -> Self {
        let (line, col) = file.lines().position(ident.span.start);
        UsageEdge {
            decl,
            name: ident.name.clone(),
            file: file.path.clone(),
            line,
            col,
            offset: ident.span.start,
            snippet: file.snippet(ident.span.start),
            role,
        }
    }

    pub fn is_definition(&self) -> bool {
        self.role == UsageRole::Definition
    }
}

/// Restricts collection to some files.
#[derive(Debug, Clone, Default)]
pub enum FileFilter {
    #[default]
    All,
    /// One root-relative path.
    Exact(String),
    Glob(GlobMatcher),
}

impl FileFilter {
    /// Exact path, or a glob when the pattern contains glob syntax.
    pub fn parse(pattern: Option<&str>) -> SymtoolResult<Self> {
        let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
            return Ok(FileFilter::All);
        };
        if !pattern.contains(['*', '?', '[', '{']) {
            return Ok(FileFilter::Exact(pattern.to_string()));
        }
        let glob = Glob::new(pattern).map_err(|e| {
            SymtoolError::invalid_input(format!("invalid file pattern '{}': {}", pattern, e))
        })?;
        Ok(FileFilter::Glob(glob.compile_matcher()))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            FileFilter::All => true,
            FileFilter::Exact(exact) => exact == path,
            FileFilter::Glob(matcher) => matcher.is_match(path),
        }
    }
}

// ============================================================================
// Traversal
// ============================================================================

struct IdentWalker<'t, F> {
    check: CancelCheck<'t>,
    on_ident: F,
}

impl<'a, F: FnMut(&'a Ident)> Visitor<'a> for IdentWalker<'_, F> {
    fn enter_node(&mut self) -> VisitResult {
        self.check.poll()
    }

    fn visit_ident(&mut self, node: &'a Ident) -> VisitResult {
        (self.on_ident)(node);
        VisitResult::Continue
    }
}

/// Call `on_ident` for every identifier in `file`, polling `token` per node.
pub(crate) fn for_each_ident<'a>(
    file: &'a SourceFile,
    token: &CancellationToken,
    on_ident: impl FnMut(&'a Ident),
) -> SymtoolResult<()> {
    let mut walker = IdentWalker {
        check: CancelCheck::new(token),
        on_ident,
    };
    walk_file(&mut walker, &file.tree);
    walker.check.finish(())
}

fn role_of(snapshot: &Snapshot, file: &SourceFile, ident: &Ident) -> UsageRole {
    if snapshot.is_definition(ident.id) {
        UsageRole::Definition
    } else if file.is_test {
        UsageRole::TestUsage
    } else {
        UsageRole::Usage
    }
}

// ============================================================================
// Collectors
// ============================================================================

/// Every occurrence that resolves to `target`, in file order then visitation
/// order.
///
/// `target` may come from another load of the same workspace; matching uses
/// [`identity_rule`].
pub fn collect(
    snapshot: &Snapshot,
    target: &Declaration,
    filter: &FileFilter,
    token: &CancellationToken,
) -> SymtoolResult<Vec<UsageEdge>> {
    let matches = identity_rule(snapshot, target);
    let mut edges = Vec::new();
    for file in snapshot.files.iter().filter(|f| filter.matches(&f.path)) {
        for_each_ident(file, token, |ident| {
            let Some(id) = snapshot.resolve(ident.id) else {
                return;
            };
            let Some(decl) = snapshot.decl(id) else {
                return;
            };
            if matches(decl, target) {
                edges.push(UsageEdge::new(file, ident, id, role_of(snapshot, file, ident)));
            }
        })?;
    }
    debug!(symbol = %target.name, edges = edges.len(), "collected usages");
    Ok(edges)
}

/// Every resolved occurrence of every declaration, in one pass.
pub fn collect_all(snapshot: &Snapshot, token: &CancellationToken) -> SymtoolResult<Vec<UsageEdge>> {
    let mut edges = Vec::new();
    for file in &snapshot.files {
        for_each_ident(file, token, |ident| {
            if let Some(id) = snapshot.resolve(ident.id) {
                edges.push(UsageEdge::new(file, ident, id, role_of(snapshot, file, ident)));
            }
        })?;
    }
    Ok(edges)
}

/// Like [`collect`], deduplicated by `(file, line)` and sorted by file then
/// line. When a line holds both a definition and a use, the definition wins.
pub fn collect_best_context(
    snapshot: &Snapshot,
    target: &Declaration,
    filter: &FileFilter,
    token: &CancellationToken,
) -> SymtoolResult<Vec<UsageEdge>> {
    let mut edges = collect(snapshot, target, filter, token)?;
    edges.sort_by(|a, b| {
        (a.file.as_str(), a.line, !a.is_definition(), a.col).cmp(&(
            b.file.as_str(),
            b.line,
            !b.is_definition(),
            b.col,
        ))
    });
    edges.dedup_by(|later, earlier| later.file == earlier.file && later.line == earlier.line);
    Ok(edges)
}

// ============================================================================
// References Query
// ============================================================================

/// One page of references to a symbol, grouped by file.
///
/// Pagination applies to the flat, sorted edge list; `total` counts edges.
#[derive(Debug, Clone, Serialize)]
pub struct References {
    pub symbol: SymbolInfo,
    #[serde(flatten)]
    pub page: Paged<FileGroup<UsageEdge>>,
}

pub fn references(
    snapshot: &Snapshot,
    target: &str,
    kind: Option<DeclKind>,
    filter: &FileFilter,
    limit: usize,
    offset: usize,
    token: &CancellationToken,
) -> SymtoolResult<References> {
    let decl = SymbolIndex::new(snapshot).resolve_target(target, kind)?;
    let mut edges = collect(snapshot, decl, filter, token)?;
    edges.sort_by(|a, b| (a.file.as_str(), a.offset).cmp(&(b.file.as_str(), b.offset)));
    let page = paginate(edges, limit, offset)?;
    let groups = group_by_file(page.items, |edge| edge.file.as_str());
    Ok(References {
        symbol: SymbolInfo::new(snapshot, decl),
        page: Paged {
            items: groups,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
            has_more: page.has_more,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::snapshot_from_sources;

    const LIB: &str = "package lib\n\nfunc Helper() int {\n\treturn 1\n}\n\nfunc Use() int {\n\treturn Helper() + Helper()\n}\n";
    const LIB_TEST: &str = "package lib\n\nfunc TestHelper() {\n\t_ = Helper()\n}\n";

    fn snapshot() -> Snapshot {
        snapshot_from_sources(&[("lib.go", LIB), ("lib_test.go", LIB_TEST)]).unwrap()
    }

    fn helper(snap: &Snapshot) -> &Declaration {
        SymbolIndex::new(snap).resolve("Helper", None).unwrap()
    }

    mod collect {
        use super::*;

        #[test]
        fn roles_follow_position_and_file() {
            let snap = snapshot();
            let edges = collect(&snap, helper(&snap), &FileFilter::All, &CancellationToken::new())
                .unwrap();
            let roles: Vec<UsageRole> = edges.iter().map(|e| e.role).collect();
            assert_eq!(
                roles,
                [
                    UsageRole::Definition,
                    UsageRole::Usage,
                    UsageRole::Usage,
                    UsageRole::TestUsage
                ]
            );
            assert_eq!(edges[1].line, 8);
            assert_eq!(edges[1].snippet, "return Helper() + Helper()");
        }

        #[test]
        fn file_filters() {
            let snap = snapshot();
            let token = CancellationToken::new();
            let exact = FileFilter::parse(Some("lib_test.go")).unwrap();
            assert_eq!(collect(&snap, helper(&snap), &exact, &token).unwrap().len(), 1);
            let glob = FileFilter::parse(Some("*_test.go")).unwrap();
            assert_eq!(collect(&snap, helper(&snap), &glob, &token).unwrap().len(), 1);
            let err = FileFilter::parse(Some("[lib")).unwrap_err();
            assert!(matches!(err, SymtoolError::InvalidInput { .. }));
        }

        #[test]
        fn target_from_a_previous_load_matches_after_edits() {
            let previous = snapshot();
            let shifted = format!("// Package lib helpers.\n{}", LIB);
            let edited =
                snapshot_from_sources(&[("lib.go", shifted.as_str()), ("lib_test.go", LIB_TEST)]).unwrap();
            let target = helper(&previous);
            assert!(edited.decls.iter().all(|d| d.key() != target.key()));

            let edges = collect(&edited, target, &FileFilter::All, &CancellationToken::new()).unwrap();
            let lines: Vec<(&str, u32)> = edges.iter().map(|e| (e.file.as_str(), e.line)).collect();
            assert_eq!(lines, [("lib.go", 4), ("lib.go", 9), ("lib.go", 9), ("lib_test.go", 4)]);
            assert_eq!(edges[0].role, UsageRole::Definition);
        }

        #[test]
        fn cancelled_walk_returns_cancelled() {
            let snap = snapshot();
            let token = CancellationToken::new();
            token.cancel();
            let err = collect(&snap, helper(&snap), &FileFilter::All, &token).unwrap_err();
            assert!(matches!(err, SymtoolError::Cancelled));
        }
    }

    mod best_context {
        use super::*;

        #[test]
        fn dedups_by_line() {
            let snap = snapshot();
            let edges = collect_best_context(
                &snap,
                helper(&snap),
                &FileFilter::All,
                &CancellationToken::new(),
            )
            .unwrap();
            let lines: Vec<(&str, u32)> = edges.iter().map(|e| (e.file.as_str(), e.line)).collect();
            assert_eq!(lines, [("lib.go", 3), ("lib.go", 8), ("lib_test.go", 4)]);
        }
    }

    mod references {
        use super::*;

        #[test]
        fn pages_are_grouped_by_file() {
            let snap = snapshot();
            let token = CancellationToken::new();
            let refs = references(&snap, "Helper", None, &FileFilter::All, 3, 1, &token).unwrap();
            assert_eq!(refs.page.total, 4);
            assert!(!refs.page.has_more);
            assert_eq!(refs.page.items.len(), 2);
            assert_eq!(refs.page.items[0].items.len(), 2);
            assert_eq!(refs.page.items[1].file, "lib_test.go");
            assert_eq!(refs.symbol.kind, DeclKind::Function);
        }
    }
}
