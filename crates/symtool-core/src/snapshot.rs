//! Semantic snapshot: syntax trees plus resolved declaration and usage tables.
//!
//! A snapshot is produced by an external front-end for one `(root, mode)`
//! pair and is immutable once built. Declarations live in an arena indexed by
//! [`DeclId`]; identifier occurrences are linked to declarations through the
//! definition and usage tables, keyed by the [`NodeId`] carried on every
//! [`Ident`](crate::syntax::Ident).
//!
//! Lookup indexes are not serialized. Call [`Snapshot::restore_indexes`]
//! after deserializing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SymtoolError, SymtoolResult};
use crate::shape::{MethodSig, TypeShape};
use crate::syntax::{File, NodeId};
use crate::text::{snippet_at, LineIndex};
use crate::types::Location;
use crate::util::generate_snapshot_id;

/// Upper bound on `Named` indirections followed when resolving shapes.
const MAX_NAMED_DEPTH: usize = 32;

// ============================================================================
// Identifiers
// ============================================================================

/// Index of a declaration in its snapshot's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl_{}", self.0)
    }
}

/// Content-derived snapshot identifier, e.g. `snap_0123456789abcdef`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Function,
    Method,
    Variable,
    Constant,
    Type,
    Package,
    Field,
    Parameter,
}

impl DeclKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::Function => "function",
            DeclKind::Method => "method",
            DeclKind::Variable => "variable",
            DeclKind::Constant => "constant",
            DeclKind::Type => "type",
            DeclKind::Package => "package",
            DeclKind::Field => "field",
            DeclKind::Parameter => "parameter",
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeclKind {
    type Err = SymtoolError;

    /// Accepts the canonical names plus the short forms `func`, `var`, `const`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "function" | "func" => DeclKind::Function,
            "method" => DeclKind::Method,
            "variable" | "var" => DeclKind::Variable,
            "constant" | "const" => DeclKind::Constant,
            "type" => DeclKind::Type,
            "package" => DeclKind::Package,
            "field" => DeclKind::Field,
            "parameter" | "param" => DeclKind::Parameter,
            other => {
                return Err(SymtoolError::invalid_input(format!(
                    "unknown declaration kind: {}",
                    other
                )))
            }
        };
        Ok(kind)
    }
}

/// Cross-snapshot identity: package plus source position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclKey {
    pub package: String,
    pub file: String,
    pub offset: usize,
}

/// A named entity's defining occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: DeclId,
    pub name: String,
    pub kind: DeclKind,
    /// Owning package.
    pub package: String,
    /// Position of the declaring identifier. Absent for declarations the
    /// front-end synthesized without a source position.
    #[serde(default)]
    pub location: Option<Location>,
    /// Byte offset of the declaring identifier within its file.
    #[serde(default)]
    pub offset: Option<usize>,
    pub exported: bool,
    /// Receiver type for methods, struct type for fields, interface type for
    /// interface methods.
    #[serde(default)]
    pub owner: Option<DeclId>,
    /// Declared inside a function body or signature.
    #[serde(default)]
    pub is_local: bool,
    /// Resolved type. For type declarations, the underlying shape.
    #[serde(default)]
    pub ty: TypeShape,
    #[serde(default)]
    pub pointer_receiver: bool,
    /// Method declarations of a type declaration.
    #[serde(default)]
    pub methods: Vec<DeclId>,
}

impl Declaration {
    /// Package-plus-position key, if the declaration has a position.
    pub fn key(&self) -> Option<DeclKey> {
        let location = self.location.as_ref()?;
        Some(DeclKey {
            package: self.package.clone(),
            file: location.file.clone(),
            offset: self.offset?,
        })
    }

    pub fn file(&self) -> Option<&str> {
        self.location.as_ref().map(|loc| loc.file.as_str())
    }

    pub fn is_field(&self) -> bool {
        self.kind == DeclKind::Field
    }

    /// Declared at package scope: reachable by name from the package scope.
    pub fn is_package_level(&self) -> bool {
        self.owner.is_none()
            && !self.is_local
            && matches!(
                self.kind,
                DeclKind::Function | DeclKind::Variable | DeclKind::Constant | DeclKind::Type
            )
    }
}

/// Exported names start with an upper-case letter.
pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

// ============================================================================
// Source Files
// ============================================================================

/// One file of the snapshot with its tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Root-relative path.
    pub path: String,
    pub package: String,
    pub source: String,
    pub tree: File,
    /// Import paths, in declaration order.
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub is_test: bool,
    #[serde(default)]
    pub generated: bool,
    #[serde(skip)]
    lines: LineIndex,
}

impl SourceFile {
    /// Build a file record, deriving package, imports, and flags from the
    /// path, source, and tree.
    pub fn new(path: impl Into<String>, source: impl Into<String>, tree: File) -> Self {
        let path = path.into();
        let source = source.into();
        SourceFile {
            package: tree.package.name.clone(),
            imports: tree.imports.iter().map(|i| i.path.clone()).collect(),
            is_test: is_test_path(&path),
            generated: is_generated_source(&source),
            lines: LineIndex::new(&source),
            path,
            source,
            tree,
        }
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn location(&self, offset: usize) -> Location {
        let (line, col) = self.lines.position(offset);
        Location::new(self.path.clone(), line, col)
    }

    /// Trimmed source line containing `offset`.
    pub fn snippet(&self, offset: usize) -> String {
        snippet_at(&self.source, &self.lines, offset)
    }

    /// Whether the import path is referenced by this file.
    pub fn imports_path(&self, path: &str) -> bool {
        self.imports.iter().any(|p| p == path)
    }
}

/// Test files end in `_test.go`.
pub fn is_test_path(path: &str) -> bool {
    path.ends_with("_test.go")
}

/// Generated files carry a `// Code generated ... DO NOT EDIT.` line before
/// the package clause.
pub fn is_generated_source(source: &str) -> bool {
    source
        .lines()
        .take_while(|line| !line.trim_start().starts_with("package "))
        .any(|line| {
            let line = line.trim();
            line.starts_with("// Code generated") && line.contains("DO NOT EDIT")
        })
}

// ============================================================================
// Snapshot
// ============================================================================

/// Identifier-to-declaration table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub ident: NodeId,
    pub decl: DeclId,
}

impl Binding {
    pub fn new(ident: NodeId, decl: DeclId) -> Self {
        Binding { ident, decl }
    }
}

/// Immutable front-end view of a root at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub id: SnapshotId,
    pub root: PathBuf,
    pub mode: String,
    /// Files, sorted by path.
    pub files: Vec<SourceFile>,
    /// Declaration arena; `decls[i].id == DeclId(i)`.
    pub decls: Vec<Declaration>,
    /// Declaring identifier occurrences.
    pub defs: Vec<Binding>,
    /// Referring identifier occurrences.
    pub uses: Vec<Binding>,
    #[serde(skip)]
    def_index: HashMap<NodeId, DeclId>,
    #[serde(skip)]
    use_index: HashMap<NodeId, DeclId>,
    #[serde(skip)]
    scopes: BTreeMap<String, HashMap<String, DeclId>>,
    #[serde(skip)]
    path_index: HashMap<String, usize>,
}

impl Snapshot {
    /// Assemble a snapshot, sorting files by path and computing its id.
    pub fn new(
        root: impl Into<PathBuf>,
        mode: impl Into<String>,
        mut files: Vec<SourceFile>,
        decls: Vec<Declaration>,
        defs: Vec<Binding>,
        uses: Vec<Binding>,
    ) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let mut snapshot = Snapshot {
            id: SnapshotId::default(),
            root: root.into(),
            mode: mode.into(),
            files,
            decls,
            defs,
            uses,
            def_index: HashMap::new(),
            use_index: HashMap::new(),
            scopes: BTreeMap::new(),
            path_index: HashMap::new(),
        };
        snapshot.restore_indexes();
        snapshot
    }

    /// Rebuild lookup indexes and per-file line tables.
    ///
    /// Must be called after deserializing. Also fills in the snapshot id when
    /// the export did not carry one.
    pub fn restore_indexes(&mut self) {
        for file in &mut self.files {
            file.lines = LineIndex::new(&file.source);
        }
        self.path_index = self
            .files
            .iter()
            .enumerate()
            .map(|(idx, file)| (file.path.clone(), idx))
            .collect();
        self.def_index = self.defs.iter().map(|b| (b.ident, b.decl)).collect();
        self.use_index = self.uses.iter().map(|b| (b.ident, b.decl)).collect();

        self.scopes.clear();
        for decl in self.decls.iter().filter(|d| d.is_package_level()) {
            self.scopes
                .entry(decl.package.clone())
                .or_default()
                .entry(decl.name.clone())
                .or_insert(decl.id);
        }

        if self.id.0.is_empty() {
            self.id = generate_snapshot_id(&self.root, &self.mode, &self.files);
        }
    }

    /// Check internal references: arena ids, owners, methods, and bindings
    /// must all point inside the arena.
    pub fn validate(&self) -> SymtoolResult<()> {
        let in_range = |id: DeclId| id.index() < self.decls.len();
        for (idx, decl) in self.decls.iter().enumerate() {
            if decl.id.index() != idx {
                return Err(SymtoolError::internal(format!(
                    "declaration {} stored at index {}",
                    decl.id, idx
                )));
            }
            let dangling = decl
                .owner
                .iter()
                .chain(decl.methods.iter())
                .find(|id| !in_range(**id));
            if let Some(id) = dangling {
                return Err(SymtoolError::internal(format!(
                    "declaration {} refers to missing {}",
                    decl.id, id
                )));
            }
        }
        if let Some(binding) = self
            .defs
            .iter()
            .chain(self.uses.iter())
            .find(|b| !in_range(b.decl))
        {
            return Err(SymtoolError::internal(format!(
                "{} bound to missing {}",
                binding.ident, binding.decl
            )));
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file(&self, path: &str) -> Option<&SourceFile> {
        self.path_index.get(path).map(|&idx| &self.files[idx])
    }

    pub fn decl(&self, id: DeclId) -> Option<&Declaration> {
        self.decls.get(id.index())
    }

    /// Declaration introduced by a declaring identifier.
    pub fn definition(&self, node: NodeId) -> Option<DeclId> {
        self.def_index.get(&node).copied()
    }

    /// Declaration a referring identifier resolves to.
    pub fn usage(&self, node: NodeId) -> Option<DeclId> {
        self.use_index.get(&node).copied()
    }

    /// Declaration an identifier occurrence resolves to, declaring or not.
    pub fn resolve(&self, node: NodeId) -> Option<DeclId> {
        self.definition(node).or_else(|| self.usage(node))
    }

    pub fn is_definition(&self, node: NodeId) -> bool {
        self.def_index.contains_key(&node)
    }

    /// Package-scope lookup by exact name.
    pub fn scope_lookup(&self, package: &str, name: &str) -> Option<DeclId> {
        self.scopes.get(package)?.get(name).copied()
    }

    /// Package names with a non-empty scope, sorted.
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }

    /// Package-level declarations with this name, in package order.
    pub fn package_level(&self, name: &str) -> Vec<DeclId> {
        self.scopes
            .values()
            .filter_map(|scope| scope.get(name).copied())
            .collect()
    }

    /// Type declaration a shape names, looking through one pointer.
    pub fn named_type(&self, shape: &TypeShape) -> Option<&Declaration> {
        match shape.deref() {
            TypeShape::Named { package, name } => {
                let decl = self.decl(self.scope_lookup(package, name)?)?;
                (decl.kind == DeclKind::Type).then_some(decl)
            }
            _ => None,
        }
    }

    /// Follow `Named` shapes to their underlying shape.
    ///
    /// Returns the last shape reached if a name does not resolve.
    pub fn underlying<'s>(&'s self, mut shape: &'s TypeShape) -> &'s TypeShape {
        for _ in 0..MAX_NAMED_DEPTH {
            match shape {
                TypeShape::Named { .. } => match self.named_type(shape) {
                    Some(decl) => shape = &decl.ty,
                    None => return shape,
                },
                _ => return shape,
            }
        }
        shape
    }

    /// Method signatures of an interface type declaration, or `None` when
    /// the declaration's underlying shape is not an interface.
    pub fn interface_methods<'a>(&'a self, decl: &'a Declaration) -> Option<&'a [MethodSig]> {
        if decl.kind != DeclKind::Type {
            return None;
        }
        match self.underlying(&decl.ty) {
            TypeShape::Interface { methods } => Some(methods),
            _ => None,
        }
    }

    /// Method set of a type declaration.
    ///
    /// Value and pointer receiver methods are both included, as are methods
    /// promoted through embedded fields. For interface types this is the
    /// interface's own method list. Shallower methods shadow deeper ones.
    pub fn method_set(&self, decl: &Declaration) -> Vec<MethodSig> {
        let mut set = Vec::new();
        let mut seen_types = HashSet::new();
        self.collect_methods(decl, &mut set, &mut seen_types);
        set
    }

    fn collect_methods(
        &self,
        decl: &Declaration,
        set: &mut Vec<MethodSig>,
        seen_types: &mut HashSet<DeclId>,
    ) {
        if !seen_types.insert(decl.id) {
            return;
        }
        fn push(method: MethodSig, set: &mut Vec<MethodSig>) {
            if !set.iter().any(|m| m.name == method.name) {
                set.push(method);
            }
        }

        for method in decl.methods.iter().filter_map(|id| self.decl(*id)) {
            if let TypeShape::Func { sig } = &method.ty {
                push(MethodSig::new(method.name.clone(), sig.clone()), set);
            }
        }

        match self.underlying(&decl.ty) {
            TypeShape::Interface { methods } => {
                for method in methods {
                    push(method.clone(), set);
                }
            }
            TypeShape::Struct { fields } => {
                let embedded: Vec<&Declaration> = fields
                    .iter()
                    .filter(|f| f.embedded)
                    .filter_map(|f| self.named_type(&f.ty))
                    .collect();
                for inner in embedded {
                    self.collect_methods(inner, set, seen_types);
                }
            }
            _ => {}
        }
    }

    /// Members (methods and fields) owned by a declaration.
    pub fn members(&self, owner: DeclId) -> impl Iterator<Item = &Declaration> {
        self.decls.iter().filter(move |d| d.owner == Some(owner))
    }
}

// ============================================================================
// Tests
// ============================================================================
