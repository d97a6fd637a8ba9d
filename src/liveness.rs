//! Dead-code detection.
//!
//! A declaration is a candidate when it is package-level (or a method of a
//! concrete type), not blank, not an entry point, not a test function, not
//! in a generated file, and not exported (unless exported names are
//! included). Exported methods are never candidates: they may satisfy an
//! interface outside the snapshot. A candidate is dead when no identifier
//! other than its own declaration resolves to it.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use symtool_core::error::SymtoolResult;
use symtool_core::snapshot::{DeclKind, Declaration, Snapshot};
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::usages::collect_all;

/// Names the runtime calls.
const ENTRY_POINTS: &[&str] = &["main", "init"];

/// Prefixes of functions the test runner calls.
const TEST_PREFIXES: &[&str] = &["Test", "Benchmark", "Example", "Fuzz"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadSymbol {
    pub name: String,
    pub kind: DeclKind,
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadPackage {
    pub package: String,
    /// Dead declarations in this package, before truncation.
    pub count: usize,
    pub symbols: Vec<DeadSymbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadCodeReport {
    /// Dead declarations found, before truncation.
    pub total: usize,
    pub has_more: bool,
    /// Counts per kind, before truncation.
    pub by_kind: BTreeMap<DeclKind, usize>,
    pub packages: Vec<DeadPackage>,
}

impl DeadCodeReport {
    /// Listed symbols, in package order.
    pub fn symbols(&self) -> impl Iterator<Item = &DeadSymbol> {
        self.packages.iter().flat_map(|p| p.symbols.iter())
    }
}

fn is_test_function(decl: &Declaration, snapshot: &Snapshot) -> bool {
    let in_test_file = decl
        .file()
        .and_then(|path| snapshot.file(path))
        .is_some_and(|file| file.is_test);
    in_test_file
        && decl.kind == DeclKind::Function
        && TEST_PREFIXES.iter().any(|prefix| {
            decl.name.strip_prefix(prefix).is_some_and(|rest| {
                rest.chars().next().is_none_or(|c| !c.is_lowercase())
            })
        })
}

fn in_generated_file(decl: &Declaration, snapshot: &Snapshot) -> bool {
    decl.file()
        .and_then(|path| snapshot.file(path))
        .is_some_and(|file| file.generated)
}

/// Whether liveness analysis considers `decl` at all.
pub fn is_candidate(snapshot: &Snapshot, decl: &Declaration, include_exported: bool) -> bool {
    if decl.name == "_" || decl.is_local {
        return false;
    }
    let kind_ok = match decl.kind {
        DeclKind::Method => {
            if decl.exported {
                return false;
            }
            // Interface methods have no body to remove.
            decl.owner
                .and_then(|id| snapshot.decl(id))
                .is_some_and(|owner| snapshot.interface_methods(owner).is_none())
        }
        DeclKind::Function => !ENTRY_POINTS.contains(&decl.name.as_str()),
        DeclKind::Variable | DeclKind::Constant | DeclKind::Type => true,
        _ => false,
    };
    kind_ok
        && (decl.kind == DeclKind::Method || decl.is_package_level())
        && (include_exported || !decl.exported)
        && !is_test_function(decl, snapshot)
        && !in_generated_file(decl, snapshot)
}

/// Find dead declarations, listing at most `max_results` of them.
pub fn find_dead(
    snapshot: &Snapshot,
    include_exported: bool,
    max_results: usize,
    token: &CancellationToken,
) -> SymtoolResult<DeadCodeReport> {
    let used: HashSet<_> = collect_all(snapshot, token)?
        .into_iter()
        .filter(|edge| !edge.is_definition())
        .map(|edge| edge.decl)
        .collect();

    let mut dead: Vec<&Declaration> = Vec::new();
    for decl in &snapshot.decls {
        if !is_candidate(snapshot, decl, include_exported) || used.contains(&decl.id) {
            continue;
        }
        if decl.location.is_none() {
            warn!(symbol = %decl.name, "skipping declaration without a position");
            continue;
        }
        dead.push(decl);
    }
    dead.sort_by(|a, b| (&a.package, &a.location, &a.name).cmp(&(&b.package, &b.location, &b.name)));

    let total = dead.len();
    let mut by_kind = BTreeMap::new();
    let mut packages: Vec<DeadPackage> = Vec::new();
    for (idx, decl) in dead.into_iter().enumerate() {
        *by_kind.entry(decl.kind).or_insert(0) += 1;
        if packages.last().is_none_or(|p| p.package != decl.package) {
            packages.push(DeadPackage {
                package: decl.package.clone(),
                count: 0,
                symbols: Vec::new(),
            });
        }
        let Some(group) = packages.last_mut() else {
            continue;
        };
        group.count += 1;
        if idx < max_results {
            group.symbols.push(dead_symbol(snapshot, decl));
        }
    }
    debug!(total, packages = packages.len(), "dead code analysis complete");
    Ok(DeadCodeReport {
        total,
        has_more: total > max_results,
        by_kind,
        packages,
    })
}

fn dead_symbol(snapshot: &Snapshot, decl: &Declaration) -> DeadSymbol {
    let (file, line) = decl
        .location
        .as_ref()
        .map(|loc| (loc.file.clone(), loc.line))
        .unwrap_or_default();
    DeadSymbol {
        name: decl.name.clone(),
        kind: decl.kind,
        file,
        line,
        owner: decl
            .owner
            .and_then(|id| snapshot.decl(id))
            .map(|owner| owner.name.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::snapshot_from_sources;

    const SERVICE: &str = r#"package service

var unusedVar = 1

const unusedConst = "x"

type unusedType struct{}

type Worker struct {
	count int
}

func (w *Worker) helper() int {
	return w.count
}

func (w *Worker) DoSomething() int {
	return used()
}

func used() int {
	return 1
}

func main() {
	w := &Worker{}
	w.DoSomething()
}

var _ = used
"#;

    fn names(report: &DeadCodeReport) -> Vec<&str> {
        report.symbols().map(|s| s.name.as_str()).collect()
    }

    mod find {
        use super::*;

        #[test]
        fn unexported_unused_declarations() {
            let snap = snapshot_from_sources(&[("service.go", SERVICE)]).unwrap();
            let report = find_dead(&snap, false, 100, &CancellationToken::new()).unwrap();
            assert_eq!(names(&report), ["unusedVar", "unusedConst", "unusedType", "helper"]);
            assert_eq!(report.total, 4);
            assert_eq!(report.by_kind[&DeclKind::Method], 1);
            assert_eq!(report.packages[0].count, 4);
        }

        #[test]
        fn exported_types_only_when_requested() {
            let src = "package p\n\ntype Unused struct{}\n\ntype Used struct{}\n\nfunc (u Used) Method() {}\n";
            let snap = snapshot_from_sources(&[("p.go", src)]).unwrap();
            let token = CancellationToken::new();
            assert_eq!(find_dead(&snap, false, 10, &token).unwrap().total, 0);
            let report = find_dead(&snap, true, 10, &token).unwrap();
            // Exported methods stay excluded either way.
            assert_eq!(names(&report), ["Unused"]);
        }

        #[test]
        fn truncation_keeps_total() {
            let snap = snapshot_from_sources(&[("service.go", SERVICE)]).unwrap();
            let report = find_dead(&snap, false, 2, &CancellationToken::new()).unwrap();
            assert_eq!(report.total, 4);
            assert!(report.has_more);
            assert_eq!(report.symbols().count(), 2);
            assert_eq!(report.packages[0].count, 4);
        }
    }

    mod exclusions {
        use super::*;

        #[test]
        fn test_functions_and_generated_files() {
            let test_src = "package p\n\nfunc TestThing() {}\n\nfunc helperForTests() {}\n";
            let generated = "// Code generated by tool. DO NOT EDIT.\n\npackage p\n\nvar table = 1\n";
            let snap = snapshot_from_sources(&[
                ("p_test.go", test_src),
                ("p_gen.go", generated),
            ])
            .unwrap();
            let report = find_dead(&snap, false, 10, &CancellationToken::new()).unwrap();
            assert_eq!(names(&report), ["helperForTests"]);
        }

        #[test]
        fn interface_methods_are_not_candidates() {
            let src = "package p\n\ntype store interface {\n\tload() int\n}\n\nvar _ store\n";
            let snap = snapshot_from_sources(&[("p.go", src)]).unwrap();
            let report = find_dead(&snap, false, 10, &CancellationToken::new()).unwrap();
            assert!(report.packages.is_empty());
        }
    }
}
