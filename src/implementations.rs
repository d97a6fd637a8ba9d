//! Interface implementation discovery.
//!
//! Two relationships are reported together:
//!
//! - a type implements the interface when its method set (value and pointer
//!   receivers, plus promoted methods) contains every interface method with
//!   an identical signature
//! - another interface extends the interface when its method set equals or
//!   structurally contains the interface's

use serde::Serialize;
use symtool_core::error::{SymtoolError, SymtoolResult};
use symtool_core::shape::{contains_identical, MethodSig};
use symtool_core::snapshot::{DeclKind, Declaration, Snapshot};
use tracing::debug;

use crate::cancel::{check, CancellationToken};
use crate::index::{same_declaration, SymbolIndex, SymbolInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Implementation {
    pub name: String,
    pub package: String,
    pub file: String,
    pub line: u32,
    /// A type implementing the interface, as opposed to an interface
    /// extending it.
    pub is_type: bool,
    /// Only the pointer type implements the interface.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub pointer_receiver: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImplementationReport {
    pub interface: SymbolInfo,
    pub methods: Vec<String>,
    pub implementations: Vec<Implementation>,
}

/// Whether every method of `required` appears in `set` with an identical
/// signature.
pub fn satisfies(set: &[MethodSig], required: &[MethodSig]) -> bool {
    required.iter().all(|method| contains_identical(set, method))
}

/// Find types and interfaces that implement or extend `interface_name`.
pub fn find_implementations(
    snapshot: &Snapshot,
    interface_name: &str,
    token: &CancellationToken,
) -> SymtoolResult<ImplementationReport> {
    let target = SymbolIndex::new(snapshot)
        .resolve_target(interface_name, None)
        .map_err(|err| match err {
            SymtoolError::NotFound { .. } => SymtoolError::interface_not_found(interface_name),
            other => other,
        })?;
    let required = interface_of(snapshot, target)?;

    let mut found = Vec::new();
    for decl in snapshot.decls.iter().filter(|d| d.kind == DeclKind::Type) {
        check(token)?;
        if same_declaration(decl, target) {
            continue;
        }
        let entry = match snapshot.interface_methods(decl) {
            Some(methods) => satisfies(methods, required).then_some((false, false)),
            None => {
                let set = snapshot.method_set(decl);
                satisfies(&set, required).then(|| (true, needs_pointer(snapshot, decl, required)))
            }
        };
        let Some((is_type, pointer_receiver)) = entry else {
            continue;
        };
        let Some(location) = &decl.location else {
            debug!(name = %decl.name, "skipping implementation without a position");
            continue;
        };
        found.push(Implementation {
            name: decl.name.clone(),
            package: decl.package.clone(),
            file: location.file.clone(),
            line: location.line,
            is_type,
            pointer_receiver,
        });
    }
    found.sort_by(|a, b| (&a.package, &a.file, a.line).cmp(&(&b.package, &b.file, b.line)));
    debug!(interface = %target.name, found = found.len(), "implementation search complete");

    let mut methods: Vec<String> = required.iter().map(|m| format!("{}{}", m.name, m.sig)).collect();
    methods.sort();
    Ok(ImplementationReport {
        interface: SymbolInfo::new(snapshot, target),
        methods,
        implementations: found,
    })
}

fn interface_of<'s>(snapshot: &'s Snapshot, decl: &'s Declaration) -> SymtoolResult<&'s [MethodSig]> {
    snapshot
        .interface_methods(decl)
        .ok_or_else(|| SymtoolError::WrongKind {
            name: decl.name.clone(),
            expected: "interface".to_string(),
            actual: match decl.kind {
                DeclKind::Type => snapshot.underlying(&decl.ty).kind_name().to_string(),
                other => other.to_string(),
            },
        })
}

/// Whether a required method is declared with a pointer receiver directly on
/// `decl`.
fn needs_pointer(snapshot: &Snapshot, decl: &Declaration, required: &[MethodSig]) -> bool {
    decl.methods
        .iter()
        .filter_map(|id| snapshot.decl(*id))
        .any(|m| m.pointer_receiver && required.iter().any(|r| r.name == m.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::snapshot_from_sources;

    const STORAGE: &str = r#"package store

type Storage interface {
	Save(key string, data []byte) error
	Load(key string) ([]byte, error)
}

type ReadWriteStorage interface {
	Storage
	Delete(key string) error
}

type Loader interface {
	Load(key string) ([]byte, error)
}

type memStore struct{}

func (m *memStore) Save(key string, data []byte) error { return nil }

func (m *memStore) Load(key string) ([]byte, error) { return nil, nil }

type logger struct{}

func (l logger) Save(key string) error { return nil }

type count int
"#;

    fn snapshot() -> Snapshot {
        snapshot_from_sources(&[("store.go", STORAGE)]).unwrap()
    }

    #[test]
    fn matching_type_and_extending_interface() {
        let snap = snapshot();
        let report = find_implementations(&snap, "Storage", &CancellationToken::new()).unwrap();
        let found: Vec<(&str, bool)> = report
            .implementations
            .iter()
            .map(|i| (i.name.as_str(), i.is_type))
            .collect();
        assert_eq!(found, [("ReadWriteStorage", false), ("memStore", true)]);
        assert!(report.implementations[1].pointer_receiver);
        assert_eq!(report.methods.len(), 2);
    }

    #[test]
    fn smaller_interfaces_collect_more_implementations() {
        let snap = snapshot();
        let report = find_implementations(&snap, "Loader", &CancellationToken::new()).unwrap();
        let names: Vec<&str> = report.implementations.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Storage", "ReadWriteStorage", "memStore"]);
    }

    #[test]
    fn errors() {
        let snap = snapshot();
        let token = CancellationToken::new();
        let err = find_implementations(&snap, "Missing", &token).unwrap_err();
        assert_eq!(err.to_string(), "interface not found: Missing");
        let err = find_implementations(&snap, "count", &token).unwrap_err();
        assert!(matches!(err, SymtoolError::WrongKind { ref actual, .. } if actual == "basic"));
    }
}
