//! Symbol context: definition, key usages, and direct dependencies.

use serde::{Deserialize, Serialize};
use symtool_core::error::SymtoolResult;
use symtool_core::snapshot::{DeclKind, Declaration, Snapshot};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::index::{same_declaration, SymbolIndex, SymbolInfo};
use crate::usages::{collect_best_context, FileFilter, UsageEdge, UsageRole};

/// Files listed per dependency.
const FILES_PER_DEPENDENCY: usize = 3;

/// Result caps for [`best_context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLimits {
    pub usages: usize,
    pub test_usages: usize,
    pub dependencies: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        ContextLimits {
            usages: 3,
            test_usages: 2,
            dependencies: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Definition {
    #[serde(flatten)]
    pub symbol: SymbolInfo,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub import_path: String,
    /// Up to three files importing the path, sorted.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolContext {
    pub definition: Definition,
    pub additional_definitions: Vec<Definition>,
    pub key_usages: Vec<UsageEdge>,
    pub total_usages: usize,
    pub test_usages: Vec<UsageEdge>,
    pub total_test_usages: usize,
    pub dependencies: Vec<Dependency>,
}

fn definition(snapshot: &Snapshot, decl: &Declaration) -> Definition {
    let snippet = match (decl.file().and_then(|p| snapshot.file(p)), decl.offset) {
        (Some(file), Some(offset)) => file.snippet(offset),
        _ => String::new(),
    };
    Definition {
        symbol: SymbolInfo::new(snapshot, decl),
        snippet,
    }
}

/// Gather context for the symbol `target` (plain or `Owner.Member`).
pub fn best_context(
    snapshot: &Snapshot,
    target: &str,
    kind: Option<DeclKind>,
    limits: ContextLimits,
    token: &CancellationToken,
) -> SymtoolResult<SymbolContext> {
    let index = SymbolIndex::new(snapshot);
    let primary = index.resolve_target(target, kind)?;
    let additional_definitions = index
        .resolve_all(&primary.name, kind)
        .into_iter()
        .filter(|decl| !same_declaration(decl, primary))
        .map(|decl| definition(snapshot, decl))
        .collect();

    let edges = collect_best_context(snapshot, primary, &FileFilter::All, token)?;
    let (mut key_usages, mut test_usages): (Vec<UsageEdge>, Vec<UsageEdge>) = edges
        .into_iter()
        .filter(|edge| !edge.is_definition())
        .partition(|edge| edge.role == UsageRole::Usage);
    let total_usages = key_usages.len();
    let total_test_usages = test_usages.len();
    key_usages.truncate(limits.usages);
    test_usages.truncate(limits.test_usages);

    let dependencies = dependencies(snapshot, primary, limits.dependencies);
    debug!(
        symbol = %primary.name,
        usages = total_usages,
        test_usages = total_test_usages,
        dependencies = dependencies.len(),
        "built symbol context"
    );
    Ok(SymbolContext {
        definition: definition(snapshot, primary),
        additional_definitions,
        key_usages,
        total_usages,
        test_usages,
        total_test_usages,
        dependencies,
    })
}

/// Imports of the defining file, each with files that import the same path.
fn dependencies(snapshot: &Snapshot, decl: &Declaration, limit: usize) -> Vec<Dependency> {
    let Some(file) = decl.file().and_then(|p| snapshot.file(p)) else {
        return Vec::new();
    };
    let mut paths: Vec<&String> = file.imports.iter().collect();
    paths.sort();
    paths.dedup();
    paths
        .into_iter()
        .take(limit)
        .map(|path| Dependency {
            import_path: path.clone(),
            files: snapshot
                .files
                .iter()
                .filter(|f| f.imports_path(path))
                .map(|f| f.path.clone())
                .take(FILES_PER_DEPENDENCY)
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::fixture::snapshot_from_sources;

    const CORE: &str = "package core\n\nimport (\n\t\"fmt\"\n\t\"strings\"\n)\n\nfunc Format(s string) string {\n\treturn fmt.Sprint(strings.TrimSpace(s))\n}\n";
    const USERS: [&str; 4] = [
        "package core\n\nimport \"fmt\"\n\nfunc a() { Format(\"a\"); fmt.Println() }\n",
        "package core\n\nimport \"fmt\"\n\nfunc b() { Format(\"b\"); fmt.Println() }\n",
        "package core\n\nimport \"fmt\"\n\nfunc c() {\n\tFormat(\"c\")\n\tFormat(\"c\")\n\tfmt.Println()\n}\n",
        "package core\n\nfunc TestFormat() { Format(\"t\") }\n",
    ];

    fn snapshot() -> Snapshot {
        snapshot_from_sources(&[
            ("core.go", CORE),
            ("a.go", USERS[0]),
            ("b.go", USERS[1]),
            ("c.go", USERS[2]),
            ("core_test.go", USERS[3]),
        ])
        .unwrap()
    }

    #[test]
    fn usages_are_capped_and_separated() {
        let snap = snapshot();
        let ctx = best_context(&snap, "Format", None, ContextLimits::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(ctx.definition.symbol.name, "Format");
        assert_eq!(ctx.definition.snippet, "func Format(s string) string {");
        assert_eq!(ctx.total_usages, 4);
        let files: Vec<&str> = ctx.key_usages.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(files, ["a.go", "b.go", "c.go"]);
        assert_eq!(ctx.test_usages.len(), 1);
        assert!(ctx.additional_definitions.is_empty());
    }

    #[test]
    fn dependencies_come_from_the_defining_file() {
        let snap = snapshot();
        let limits = ContextLimits {
            dependencies: 1,
            ..ContextLimits::default()
        };
        let ctx = best_context(&snap, "Format", None, limits, &CancellationToken::new()).unwrap();
        assert_eq!(ctx.dependencies.len(), 1);
        assert_eq!(ctx.dependencies[0].import_path, "fmt");
        assert_eq!(ctx.dependencies[0].files, ["a.go", "b.go", "c.go"]);
    }

    #[test]
    fn same_name_in_other_packages_is_reported_separately() {
        let other = "package other\n\nfunc Format() {}\n";
        let snap = snapshot_from_sources(&[("core.go", CORE), ("other/other.go", other)]).unwrap();
        let ctx = best_context(&snap, "Format", None, ContextLimits::default(), &CancellationToken::new())
            .unwrap();
        assert_eq!(ctx.definition.symbol.package, "core");
        assert_eq!(ctx.additional_definitions.len(), 1);
        assert_eq!(ctx.additional_definitions[0].symbol.package, "other");
    }
}
