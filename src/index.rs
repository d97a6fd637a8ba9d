//! Symbol resolution and declaration identity.
//!
//! Names resolve in two steps: package-scope lookup by exact name, then a
//! scan of the definition table, which reaches methods, fields, and other
//! declarations that no package scope holds.
//!
//! Identity across snapshot loads uses the `(package, file, offset)` key of
//! [`DeclKey`](symtool_core::snapshot::DeclKey). When a target's key is
//! absent from the snapshot being searched, [`identity_rule`] falls back to
//! the looser [`matches_across_representations`] rule. That rule is
//! best-effort and lossy: two distinct declarations with the same name and
//! shape in one package match.

use std::collections::HashSet;
use std::ptr;

use serde::{Deserialize, Serialize};
use symtool_core::error::{SymtoolError, SymtoolResult};
use symtool_core::shape::TypeShape;
use symtool_core::snapshot::{DeclId, DeclKind, Declaration, Snapshot};
use symtool_core::types::Location;
use tracing::debug;

/// Declaration summary for JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: DeclKind,
    pub package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub exported: bool,
    /// Rendered type, omitted when unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl SymbolInfo {
    pub fn new(snapshot: &Snapshot, decl: &Declaration) -> Self {
        SymbolInfo {
            name: decl.name.clone(),
            kind: decl.kind,
            package: decl.package.clone(),
            location: decl.location.clone(),
            exported: decl.exported,
            ty: (!decl.ty.is_unknown() && decl.kind != DeclKind::Type).then(|| decl.ty.to_string()),
            owner: decl
                .owner
                .and_then(|id| snapshot.decl(id))
                .map(|owner| owner.name.clone()),
        }
    }
}

/// Name-to-declaration lookups over one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SymbolIndex<'s> {
    snapshot: &'s Snapshot,
}

impl<'s> SymbolIndex<'s> {
    pub fn new(snapshot: &'s Snapshot) -> Self {
        SymbolIndex { snapshot }
    }

    pub fn snapshot(&self) -> &'s Snapshot {
        self.snapshot
    }

    /// Resolve a plain name, optionally restricted to one kind.
    pub fn resolve(&self, name: &str, kind: Option<DeclKind>) -> SymtoolResult<&'s Declaration> {
        self.resolve_all(name, kind)
            .into_iter()
            .next()
            .ok_or_else(|| SymtoolError::symbol_not_found(name))
    }

    /// Every declaration with this name: package-scope hits first, then the
    /// definition table in order.
    pub fn resolve_all(&self, name: &str, kind: Option<DeclKind>) -> Vec<&'s Declaration> {
        let matches_kind = |decl: &Declaration| kind.is_none_or(|k| decl.kind == k);
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for id in self.snapshot.package_level(name) {
            if let Some(decl) = self.snapshot.decl(id) {
                if matches_kind(decl) && seen.insert(decl.id) {
                    found.push(decl);
                }
            }
        }
        for binding in &self.snapshot.defs {
            let Some(decl) = self.snapshot.decl(binding.decl) else {
                continue;
            };
            if decl.name == name && matches_kind(decl) && seen.insert(decl.id) {
                found.push(decl);
            }
        }
        found
    }

    /// Resolve `Owner.Member` or `package.Name`; anything else resolves as a
    /// plain name.
    ///
    /// The kind filter applies to the final declaration.
    pub fn resolve_target(
        &self,
        target: &str,
        kind: Option<DeclKind>,
    ) -> SymtoolResult<&'s Declaration> {
        let Some((qualifier, member)) = target.split_once('.') else {
            return self.resolve(target, kind);
        };
        if qualifier.is_empty() || member.is_empty() || member.contains('.') {
            return Err(SymtoolError::invalid_input(format!(
                "malformed qualified name: {}",
                target
            )));
        }

        if let Some(id) = self.snapshot.scope_lookup(qualifier, member) {
            if let Some(decl) = self.snapshot.decl(id) {
                if kind.is_none_or(|k| decl.kind == k) {
                    return Ok(decl);
                }
            }
        }

        let owner = self.resolve(qualifier, Some(DeclKind::Type))?;
        let decl = self
            .resolve_member(owner, member)
            .ok_or_else(|| SymtoolError::symbol_not_found(target))?;
        match kind {
            Some(k) if decl.kind != k => Err(SymtoolError::WrongKind {
                name: target.to_string(),
                expected: k.to_string(),
                actual: decl.kind.to_string(),
            }),
            _ => Ok(decl),
        }
    }

    /// Method or field `member` of a type declaration, including members
    /// promoted through embedded fields. Shallower members win.
    pub fn resolve_member(&self, owner: &Declaration, member: &str) -> Option<&'s Declaration> {
        let mut visited = HashSet::new();
        let mut level = vec![owner.id];
        while !level.is_empty() {
            let mut next = Vec::new();
            for ty in level {
                if !visited.insert(ty) {
                    continue;
                }
                let Some(decl) = self.snapshot.decl(ty) else {
                    continue;
                };
                let direct = decl
                    .methods
                    .iter()
                    .filter_map(|id| self.snapshot.decl(*id))
                    .chain(self.snapshot.members(ty))
                    .find(|m| m.name == member);
                if let Some(found) = direct {
                    return Some(found);
                }
                next.extend(self.embedded_types(decl));
            }
            level = next;
        }
        debug!(owner = %owner.name, member, "member not found");
        None
    }

    fn embedded_types(&self, decl: &Declaration) -> Vec<DeclId> {
        match self.snapshot.underlying(&decl.ty) {
            TypeShape::Struct { fields } => fields
                .iter()
                .filter(|f| f.embedded)
                .filter_map(|f| self.snapshot.named_type(&f.ty))
                .map(|d| d.id)
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Same logical declaration: the same instance, or equal package-plus-position
/// keys across loads.
pub fn same_declaration(a: &Declaration, b: &Declaration) -> bool {
    if ptr::eq(a, b) {
        return true;
    }
    match (a.key(), b.key()) {
        (Some(ka), Some(kb)) => ka == kb,
        _ => false,
    }
}

/// Looser equivalence for declarations reached through different
/// representations, such as a direct identifier and a qualified selector.
///
/// Matches when names agree and shapes are identical, when names agree in
/// one package and the types are mutually assignable, or when canonical
/// renderings are equal.
pub fn matches_across_representations(a: &Declaration, b: &Declaration) -> bool {
    if same_declaration(a, b) {
        return true;
    }
    if a.name == b.name {
        if a.ty.identical(&b.ty) {
            return true;
        }
        if a.package == b.package && assignable(&a.ty, &b.ty) && assignable(&b.ty, &a.ty) {
            return true;
        }
    }
    canonical(a) == canonical(b)
}

/// The rule for matching declarations of `snapshot` against `target`.
///
/// A target whose key exists in `snapshot` matches by [`same_declaration`].
/// A target taken from another load whose position no longer exists here
/// falls back to [`matches_across_representations`], restricted to the same
/// kind and package.
pub fn identity_rule(snapshot: &Snapshot, target: &Declaration) -> fn(&Declaration, &Declaration) -> bool {
    if snapshot.decls.iter().any(|decl| same_declaration(decl, target)) {
        return same_declaration;
    }
    debug!(symbol = %target.name, "target not anchored in snapshot; matching by representation");
    relocated
}

fn relocated(a: &Declaration, b: &Declaration) -> bool {
    a.kind == b.kind && a.package == b.package && matches_across_representations(a, b)
}

/// Assignability without a type checker: identical shapes, or any value to an
/// empty interface.
fn assignable(from: &TypeShape, to: &TypeShape) -> bool {
    if from.identical(to) {
        return true;
    }
    match to {
        TypeShape::Interface { methods } => methods.is_empty() && !from.is_unknown(),
        TypeShape::Basic { name } => name == "any" && !from.is_unknown(),
        _ => false,
    }
}

fn canonical(decl: &Declaration) -> String {
    format!("{} {}.{} {}", decl.kind, decl.package, decl.name, decl.ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::snapshot_from_sources;

    const SHAPES: &str = r#"package shapes

type Base struct{}

func (b *Base) Area() int { return 0 }

type Square struct {
	Base
	side int
}

type Namer interface {
	Name() string
}

func Area() int { return 1 }

var side = 2
"#;

    fn snapshot() -> Snapshot {
        snapshot_from_sources(&[("shapes.go", SHAPES)]).unwrap()
    }

    mod resolve {
        use super::*;

        #[test]
        fn package_scope_wins_over_definition_table() {
            let snap = snapshot();
            let index = SymbolIndex::new(&snap);
            let decl = index.resolve("Area", None).unwrap();
            assert_eq!(decl.kind, DeclKind::Function);
            let all = index.resolve_all("Area", None);
            assert_eq!(all.len(), 2);
            assert_eq!(all[1].kind, DeclKind::Method);
        }

        #[test]
        fn kind_filter_reaches_methods() {
            let snap = snapshot();
            let index = SymbolIndex::new(&snap);
            let decl = index.resolve("Area", Some(DeclKind::Method)).unwrap();
            assert_eq!(decl.owner, snap.scope_lookup("shapes", "Base"));
        }

        #[test]
        fn missing_name_is_not_found() {
            let snap = snapshot();
            let err = SymbolIndex::new(&snap).resolve("Circle", None).unwrap_err();
            assert!(matches!(err, SymtoolError::NotFound { .. }));
        }
    }

    mod qualified {
        use super::*;

        #[test]
        fn owner_member_includes_promoted_methods() {
            let snap = snapshot();
            let index = SymbolIndex::new(&snap);
            let field = index.resolve_target("Square.side", None).unwrap();
            assert_eq!(field.kind, DeclKind::Field);
            let promoted = index.resolve_target("Square.Area", None).unwrap();
            assert_eq!(promoted.kind, DeclKind::Method);
            assert_eq!(promoted.owner, snap.scope_lookup("shapes", "Base"));
            let iface = index.resolve_target("Namer.Name", None).unwrap();
            assert_eq!(iface.kind, DeclKind::Method);
        }

        #[test]
        fn package_qualifier() {
            let snap = snapshot();
            let decl = SymbolIndex::new(&snap)
                .resolve_target("shapes.side", None)
                .unwrap();
            assert_eq!(decl.kind, DeclKind::Variable);
        }

        #[test]
        fn wrong_kind_and_malformed() {
            let snap = snapshot();
            let index = SymbolIndex::new(&snap);
            let err = index
                .resolve_target("Square.side", Some(DeclKind::Method))
                .unwrap_err();
            assert!(matches!(err, SymtoolError::WrongKind { .. }));
            let err = index.resolve_target("Square.", None).unwrap_err();
            assert!(matches!(err, SymtoolError::InvalidInput { .. }));
        }
    }

    mod identity {
        use super::*;

        #[test]
        fn reloads_reconcile_by_position() {
            let first = snapshot();
            let second = snapshot();
            let a = SymbolIndex::new(&first).resolve("Square", None).unwrap();
            let b = SymbolIndex::new(&second).resolve("Square", None).unwrap();
            assert!(!ptr::eq(a, b));
            assert!(same_declaration(a, b));
            let other = SymbolIndex::new(&second).resolve("Base", None).unwrap();
            assert!(!same_declaration(a, other));
        }

        #[test]
        fn loose_match_on_name_and_shape() {
            let snap = snapshot();
            let moved = snapshot_from_sources(&[(
                "other.go",
                "package shapes\n\n// moved\nvar side = 2\n",
            )])
            .unwrap();
            let a = SymbolIndex::new(&snap).resolve("side", Some(DeclKind::Variable)).unwrap();
            let b = SymbolIndex::new(&moved).resolve("side", None).unwrap();
            assert!(!same_declaration(a, b));
            assert!(matches_across_representations(a, b));
        }

        #[test]
        fn identity_rule_relaxes_only_for_unanchored_targets() {
            let snap = snapshot();
            let moved = snapshot_from_sources(&[(
                "other.go",
                "package shapes\n\n// moved\nvar side = 2\n",
            )])
            .unwrap();
            let a = SymbolIndex::new(&snap).resolve("side", Some(DeclKind::Variable)).unwrap();
            let b = SymbolIndex::new(&moved).resolve("side", None).unwrap();
            assert!(!identity_rule(&snap, a)(b, a));
            assert!(identity_rule(&moved, a)(b, a));

            let field = SymbolIndex::new(&snap).resolve("side", Some(DeclKind::Field)).unwrap();
            assert!(!identity_rule(&moved, field)(b, field));
        }
    }
}
