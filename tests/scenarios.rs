//! End-to-end behavior over on-disk workspaces.
//!
//! Each test writes a small Go workspace into a temp directory, loads it the
//! way the CLI does, and checks one observable property.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use symtool::cancel::CancellationToken;
use symtool::complexity::complexity_report;
use symtool::diff::apply_unified_diff;
use symtool::error::SymtoolError;
use symtool::fixture::load_sources;
use symtool::implementations::find_implementations;
use symtool::liveness::find_dead;
use symtool::rename::{rename, RenameRequest};
use symtool::rewrite::rewrite;
use symtool::snapshot::Snapshot;
use symtool::usages::{references, FileFilter};

// ============================================================================
// Test Infrastructure
// ============================================================================

fn workspace(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let target = dir.path().join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(target, content).unwrap();
    }
    dir
}

fn load(dir: &Path) -> Snapshot {
    load_sources(dir, "default").unwrap()
}

fn read(dir: &Path, path: &str) -> String {
    fs::read_to_string(dir.join(path)).unwrap()
}

/// Every file under `dir` with its content, sorted.
fn tree(dir: &Path) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(next) = pending.pop() {
        for entry in fs::read_dir(next).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                let rel = path.strip_prefix(dir).unwrap().to_string_lossy().into_owned();
                out.push((rel, fs::read_to_string(&path).unwrap()));
            }
        }
    }
    out.sort();
    out
}

const SERVICE: &str = r#"package service

var unusedVar = 1

const unusedConst = "x"

type unusedType struct{}

type Service struct {
	name string
}

func (s *Service) helper() string {
	return s.name
}

func (s *Service) DoSomething() string {
	return s.name
}

func main() {
	s := &Service{name: "svc"}
	_ = s.DoSomething()
}
"#;

// ============================================================================
// Dead code
// ============================================================================

#[test]
fn dead_code_scenario() {
    let dir = workspace(&[("service.go", SERVICE)]);
    let snapshot = load(dir.path());
    let report = find_dead(&snapshot, false, 100, &CancellationToken::new()).unwrap();

    let mut names: Vec<&str> = report.symbols().map(|s| s.name.as_str()).collect();
    names.sort();
    assert_eq!(names, ["helper", "unusedConst", "unusedType", "unusedVar"]);
    assert_eq!(report.total, 4);
    assert!(!report.has_more);
}

#[test]
fn dead_code_cap_keeps_total() {
    let dir = workspace(&[("service.go", SERVICE)]);
    let snapshot = load(dir.path());
    let report = find_dead(&snapshot, false, 2, &CancellationToken::new()).unwrap();
    assert_eq!(report.total, 4);
    assert_eq!(report.symbols().count(), 2);
    assert!(report.has_more);
}

// ============================================================================
// Complexity
// ============================================================================

#[test]
fn complexity_scenario() {
    let src = "package m\n\nfunc flat() int {\n\treturn 1\n}\n\nfunc loop(xs []int) int {\n\tn := 0\n\tfor _, x := range xs {\n\t\tif x > 0 {\n\t\t\tn++\n\t\t}\n\t}\n\treturn n\n}\n";
    let dir = workspace(&[("m.go", src)]);
    let snapshot = load(dir.path());
    let report = complexity_report(&snapshot, 1, 10, 0, &CancellationToken::new()).unwrap();
    let get = |name: &str| report.items.iter().find(|f| f.name == name).unwrap();
    assert_eq!(get("flat").metrics.cyclomatic, 1);
    assert!(get("loop").metrics.cyclomatic >= 3);
    assert!(get("loop").metrics.max_nesting >= 2);
}

// ============================================================================
// Implementations
// ============================================================================

#[test]
fn implementations_scenario() {
    let src = r#"package store

type Storage interface {
	Save(key string, data []byte) error
	Load(key string) ([]byte, error)
}

type diskStore struct{}

func (d *diskStore) Save(key string, data []byte) error { return nil }
func (d *diskStore) Load(key string) ([]byte, error) { return nil, nil }

type counter struct{}

func (c counter) Inc() {}
"#;
    let dir = workspace(&[("store.go", src)]);
    let snapshot = load(dir.path());
    let report = find_implementations(&snapshot, "Storage", &CancellationToken::new()).unwrap();
    assert_eq!(report.implementations.len(), 1);
    assert_eq!(report.implementations[0].name, "diskStore");
    assert!(report.implementations[0].is_type);

    let err = find_implementations(&snapshot, "counter", &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, SymtoolError::WrongKind { .. }));
}

// ============================================================================
// Pagination
// ============================================================================

#[test]
fn pagination_invariants() {
    let lib = "package lib\n\nfunc Helper() int {\n\treturn 1\n}\n";
    let user = "package lib\n\nfunc a() int {\n\treturn Helper() + Helper() + Helper()\n}\n\nfunc b() int {\n\treturn Helper() * Helper()\n}\n";
    let dir = workspace(&[("lib.go", lib), ("user.go", user)]);
    let snapshot = load(dir.path());
    let token = CancellationToken::new();

    let all = references(&snapshot, "Helper", None, &FileFilter::All, 100, 0, &token).unwrap();
    let total = all.page.total;
    assert_eq!(total, 6);

    for limit in 1..=7 {
        for offset in 0..=8 {
            let page = references(&snapshot, "Helper", None, &FileFilter::All, limit, offset, &token).unwrap();
            let count: usize = page.page.items.iter().map(|g| g.items.len()).sum();
            assert_eq!(count, limit.min(total.saturating_sub(offset)), "limit={limit} offset={offset}");
            assert_eq!(page.page.total, total);
            assert_eq!(page.page.has_more, offset + count < total);
        }
    }

    let err = references(&snapshot, "Helper", None, &FileFilter::All, 0, 0, &token).unwrap_err();
    assert!(matches!(err, SymtoolError::InvalidInput { .. }));
}

// ============================================================================
// Rename
// ============================================================================

const FOO: &str = "package app\n\ntype Foo struct{}\n\nfunc build() *Foo {\n\treturn &Foo{}\n}\n";
const BAR: &str = "package app\n\nfunc bar() int {\n\treturn 2\n}\n";

#[test]
fn rename_scenario() {
    let dir = workspace(&[("foo.go", FOO), ("bar.go", BAR)]);
    let snapshot = load(dir.path());
    let request = RenameRequest {
        target: "Foo",
        new_name: "MyFoo",
        kind: None,
        dry_run: false,
    };
    let result = rename(&snapshot, &request, &CancellationToken::new()).unwrap();
    assert_eq!(result.changed_files(), ["foo.go"]);

    let renamed = read(dir.path(), "foo.go");
    assert!(renamed.contains("type MyFoo struct{}"));
    assert!(renamed.contains("func build() *MyFoo {"));
    assert!(renamed.contains("return &MyFoo{}"));
    assert!(!renamed.replace("MyFoo", "").contains("Foo"));
    assert_eq!(read(dir.path(), "bar.go"), BAR);
}

#[test]
fn rename_dry_run_is_idempotent() {
    let dir = workspace(&[("foo.go", FOO), ("bar.go", BAR)]);
    let before = tree(dir.path());
    let snapshot = load(dir.path());
    let request = RenameRequest {
        target: "Foo",
        new_name: "Widget",
        kind: None,
        dry_run: true,
    };
    let token = CancellationToken::new();
    let first = rename(&snapshot, &request, &token).unwrap();
    let second = rename(&snapshot, &request, &token).unwrap();
    assert_eq!(first.applied.diffs, second.applied.diffs);
    assert_eq!(tree(dir.path()), before);
}

#[test]
fn rename_reports_partial_writes() {
    let helper = "package app\n\nfunc Shared() int {\n\treturn 1\n}\n";
    let user = "package app\n\nfunc use() int {\n\treturn Shared()\n}\n";
    let dir = workspace(&[("a.go", helper), ("sub/b.go", user)]);
    let snapshot = load(dir.path());
    fs::remove_dir_all(dir.path().join("sub")).unwrap();

    let request = RenameRequest {
        target: "Shared",
        new_name: "Common",
        kind: None,
        dry_run: false,
    };
    let err = rename(&snapshot, &request, &CancellationToken::new()).unwrap_err();
    match &err {
        SymtoolError::PartialWriteFailure {
            changed_files,
            failed_file,
            ..
        } => {
            assert_eq!(changed_files, &["a.go"]);
            assert_eq!(failed_file, "sub/b.go");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(read(dir.path(), "a.go").contains("func Common() int"));
}

// ============================================================================
// Rewrite
// ============================================================================

#[test]
fn rewrite_round_trip() {
    let src = "package p\n\nimport \"strings\"\n\nfunc has(s string) bool {\n\treturn strings.Index(s, \"x\") >= 0\n}\n\nfunc hasAgain(s string) bool {\n\tok := strings.Index(s, \"x\") >= 0\n\treturn ok\n}\n";
    let dir = workspace(&[("p.go", src)]);
    let snapshot = load(dir.path());
    let token = CancellationToken::new();
    let find = "strings.Index(s, \"x\") >= 0";
    let replace = "strings.Contains(s, \"x\")";

    let preview = rewrite(&snapshot, find, replace, true, &token).unwrap();
    assert_eq!(preview.total_changes, 2);
    assert_eq!(read(dir.path(), "p.go"), src);
    let diffs = preview.applied.diffs.as_ref().unwrap();
    let predicted = apply_unified_diff(src, &diffs[0].diff).unwrap();

    let applied = rewrite(&snapshot, find, replace, false, &token).unwrap();
    assert_eq!(applied.changed_files(), ["p.go"]);
    assert_eq!(read(dir.path(), "p.go"), predicted);
}

#[test]
fn rewrite_rejects_bad_patterns_before_io() {
    let dir = workspace(&[("bar.go", BAR)]);
    let snapshot = load(dir.path());
    let err = rewrite(&snapshot, "return 2", "3", false, &CancellationToken::new()).unwrap_err();
    assert!(matches!(err, SymtoolError::InvalidInput { .. }));
    assert_eq!(read(dir.path(), "bar.go"), BAR);
}
