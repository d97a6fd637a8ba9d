//! Fixture front-end: builds snapshots from Go-subset source text.
//!
//! This is test tooling, not a type checker. It parses each file with the
//! crate's parser and resolves identifiers with simple rules:
//!
//! - lexical block scopes inside function bodies, then file imports, then
//!   the package scope
//! - `pkg.Name` through an import resolves in the imported package's scope,
//!   where the package name is the last import path element
//! - `x.Member` resolves a method or field on the static type of `x`,
//!   including members promoted through embedded fields
//! - keys of keyed struct literals resolve to fields
//!
//! Types are inferred only as far as member resolution needs: declared
//! types, literals, composite literals, `&` of those, calls, and indexing.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use symtool_core::error::{SymtoolError, SymtoolResult};
use symtool_core::shape::{FieldShape, MethodSig, Signature, TypeShape};
use symtool_core::snapshot::{
    is_exported, is_test_path, Binding, DeclId, DeclKind, Declaration, Snapshot, SourceFile,
};
use symtool_core::syntax::{
    parse_file, Block, CaseClause, CompositeLit, Decl, DeclToken, Expr, Field, FuncType, GenDecl,
    Ident, LitKind, NodeId, SelectorExpr, Spec, Stmt, UnaryOp,
};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Mode that leaves `_test.go` files out of the snapshot.
pub const PRODUCTION_MODE: &str = "production";

/// Predeclared type names.
const BASIC_TYPES: &[&str] = &[
    "any", "bool", "byte", "complex128", "complex64", "error", "float32", "float64", "int",
    "int16", "int32", "int64", "int8", "rune", "string", "uint", "uint16", "uint32", "uint64",
    "uint8", "uintptr",
];

/// Nesting bound when flattening embedded interfaces.
const MAX_EMBED_DEPTH: usize = 16;

// ============================================================================
// Builder
// ============================================================================

/// Builds a [`Snapshot`] from in-memory sources.
///
/// ```
/// use symtool::fixture::FixtureBuilder;
///
/// let snapshot = FixtureBuilder::new("/ws")
///     .file("main.go", "package main\n\nfunc main() {}\n")
///     .build()
///     .unwrap();
/// assert_eq!(snapshot.files.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FixtureBuilder {
    root: PathBuf,
    mode: String,
    sources: Vec<(String, String)>,
}

impl FixtureBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FixtureBuilder {
            root: root.into(),
            mode: "default".to_string(),
            sources: Vec::new(),
        }
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn file(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.push((path.into(), source.into()));
        self
    }

    /// Parse and resolve all files. Syntax errors map to `InvalidInput`.
    pub fn build(self) -> SymtoolResult<Snapshot> {
        let mut sources = self.sources;
        if self.mode == PRODUCTION_MODE {
            sources.retain(|(path, _)| !is_test_path(path));
        }
        sources.sort_by(|a, b| a.0.cmp(&b.0));

        let mut next_id = 0;
        let mut files = Vec::with_capacity(sources.len());
        for (path, source) in sources {
            let tree = parse_file(&source, &mut next_id).map_err(|err| {
                SymtoolError::invalid_input(format!("{}: {}", path, err))
            })?;
            files.push(SourceFile::new(path, source, tree));
        }

        let (decls, defs, uses) = {
            let mut resolver = Resolver::new(&files);
            resolver.run();
            (resolver.decls, resolver.defs, resolver.uses)
        };
        debug!(
            files = files.len(),
            decls = decls.len(),
            uses = uses.len(),
            "built fixture snapshot"
        );
        Ok(Snapshot::new(self.root, self.mode, files, decls, defs, uses))
    }
}

/// Snapshot of in-memory `(path, source)` pairs under a placeholder root.
pub fn snapshot_from_sources(files: &[(&str, &str)]) -> SymtoolResult<Snapshot> {
    files
        .iter()
        .fold(FixtureBuilder::new("/fixture"), |builder, (path, source)| {
            builder.file(*path, *source)
        })
        .build()
}

/// Snapshot of every `.go` file under `root`, skipping hidden directories
/// and `vendor/`. Symlinks are not followed.
pub fn load_sources(root: &Path, mode: &str) -> SymtoolResult<Snapshot> {
    let mut builder = FixtureBuilder::new(root).mode(mode);
    for entry in source_walk(root) {
        let entry = entry.map_err(|e| SymtoolError::load_failure(root.display(), e.to_string()))?;
        if !entry.file_type().is_file() || entry.path().extension().is_none_or(|ext| ext != "go") {
            continue;
        }
        let path = entry.path();
        let source = fs::read_to_string(path)
            .map_err(|e| SymtoolError::load_failure(path.display(), e.to_string()))?;
        let relative = path.strip_prefix(root).unwrap_or(path);
        builder = builder.file(symtool_core::util::normalize_path(relative), source);
    }
    builder
        .build()
        .map_err(|err| SymtoolError::load_failure(root.display(), err.to_string()))
}

/// Directories [`load_sources`] descends into, `root` first. A file added or
/// removed in any of them advances that directory's mtime.
pub fn source_dirs(root: &Path) -> Vec<PathBuf> {
    source_walk(root)
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_dir())
        .map(DirEntry::into_path)
        .collect()
}

fn source_walk(root: &Path) -> impl Iterator<Item = walkdir::Result<DirEntry>> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry))
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && (name.starts_with('.') || name == "vendor")
}

// ============================================================================
// Resolver
// ============================================================================

/// An import visible in one file: its package declaration and the name of
/// the package it refers to.
#[derive(Debug, Clone)]
struct Import {
    decl: DeclId,
    package: String,
}

struct Resolver<'f> {
    files: &'f [SourceFile],
    decls: Vec<Declaration>,
    defs: Vec<Binding>,
    uses: Vec<Binding>,
    def_index: HashMap<NodeId, DeclId>,
    /// Package name to package-scope names.
    packages: HashMap<String, HashMap<String, DeclId>>,
    /// Per file: import local name to import.
    imports: Vec<HashMap<String, Import>>,
    /// Type declaration to its type expression.
    type_exprs: HashMap<DeclId, &'f Expr>,
    /// Fields and interface methods by owner.
    members: HashMap<DeclId, Vec<DeclId>>,
    // Current position during binding.
    file: usize,
    blocks: Vec<HashMap<String, DeclId>>,
}

impl<'f> Resolver<'f> {
    fn new(files: &'f [SourceFile]) -> Self {
        Resolver {
            files,
            decls: Vec::new(),
            defs: Vec::new(),
            uses: Vec::new(),
            def_index: HashMap::new(),
            packages: HashMap::new(),
            imports: vec![HashMap::new(); files.len()],
            type_exprs: HashMap::new(),
            members: HashMap::new(),
            file: 0,
            blocks: Vec::new(),
        }
    }

    fn run(&mut self) {
        let files = self.files;
        for (idx, file) in files.iter().enumerate() {
            self.file = idx;
            self.declare_imports(file);
            self.declare_package_level(file);
        }
        for (idx, file) in files.iter().enumerate() {
            self.file = idx;
            self.declare_members(file);
        }
        for (idx, file) in files.iter().enumerate() {
            self.file = idx;
            self.assign_shapes(file);
        }
        for (idx, file) in files.iter().enumerate() {
            self.file = idx;
            self.bind_file(file);
        }
    }

    fn package(&self) -> &'f str {
        &self.files[self.file].package
    }

    /// New declaration named by `ident`, recorded as its definition.
    fn add_decl(
        &mut self,
        ident: &Ident,
        kind: DeclKind,
        owner: Option<DeclId>,
        is_local: bool,
    ) -> DeclId {
        let id = self.new_decl(&ident.name, ident.span.start, kind, owner, is_local);
        self.defs.push(Binding::new(ident.id, id));
        self.def_index.insert(ident.id, id);
        id
    }

    fn new_decl(
        &mut self,
        name: &str,
        offset: usize,
        kind: DeclKind,
        owner: Option<DeclId>,
        is_local: bool,
    ) -> DeclId {
        let file = &self.files[self.file];
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Declaration {
            id,
            name: name.to_string(),
            kind,
            package: file.package.clone(),
            location: Some(file.location(offset)),
            offset: Some(offset),
            exported: !is_local && kind != DeclKind::Package && is_exported(name),
            owner,
            is_local,
            ty: TypeShape::Unknown,
            pointer_receiver: false,
            methods: Vec::new(),
        });
        id
    }

    fn bind_use(&mut self, ident: &Ident, decl: DeclId) {
        self.uses.push(Binding::new(ident.id, decl));
    }

    fn declare_in_package(&mut self, name: &str, id: DeclId) {
        if name == "_" {
            return;
        }
        let package = self.package().to_string();
        self.packages
            .entry(package)
            .or_default()
            .entry(name.to_string())
            .or_insert(id);
    }

    // ------------------------------------------------------------------------
    // Declaration passes
    // ------------------------------------------------------------------------

    fn declare_imports(&mut self, file: &'f SourceFile) {
        for spec in &file.tree.imports {
            let local = spec.local_name().to_string();
            if local == "_" || local == "." {
                continue;
            }
            let package = spec.path.rsplit('/').next().unwrap_or(&spec.path).to_string();
            // Unaliased imports have no identifier to bind.
            let decl = match &spec.name {
                Some(alias) => self.add_decl(alias, DeclKind::Package, None, false),
                None => self.new_decl(&local, spec.span.start, DeclKind::Package, None, false),
            };
            self.imports[self.file].insert(local, Import { decl, package });
        }
    }

    fn declare_package_level(&mut self, file: &'f SourceFile) {
        for decl in &file.tree.decls {
            match decl {
                Decl::Func(func) if func.recv.is_none() => {
                    let id = self.add_decl(&func.name, DeclKind::Function, None, false);
                    self.declare_in_package(&func.name.name, id);
                }
                Decl::Func(_) => {}
                Decl::Gen(gen) => {
                    for spec in &gen.specs {
                        match spec {
                            Spec::Type(ts) => {
                                let id = self.add_decl(&ts.name, DeclKind::Type, None, false);
                                self.declare_in_package(&ts.name.name, id);
                                self.type_exprs.insert(id, &ts.ty);
                            }
                            Spec::Value(vs) => {
                                let kind = value_kind(gen.tok);
                                for name in &vs.names {
                                    let id = self.add_decl(name, kind, None, false);
                                    self.declare_in_package(&name.name, id);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn declare_members(&mut self, file: &'f SourceFile) {
        for decl in &file.tree.decls {
            match decl {
                Decl::Func(func) => {
                    let Some((recv_type, pointer)) = func.receiver_type() else {
                        continue;
                    };
                    let owner = self
                        .package_lookup(self.package(), recv_type)
                        .filter(|id| self.decls[id.index()].kind == DeclKind::Type);
                    let id = self.add_decl(&func.name, DeclKind::Method, owner, false);
                    self.decls[id.index()].pointer_receiver = pointer;
                    if let Some(owner) = owner {
                        self.decls[owner.index()].methods.push(id);
                    }
                }
                Decl::Gen(gen) => {
                    for spec in &gen.specs {
                        let Spec::Type(ts) = spec else { continue };
                        let Some(owner) = self.package_lookup(self.package(), &ts.name.name)
                        else {
                            continue;
                        };
                        if self.decls[owner.index()].offset != Some(ts.name.span.start) {
                            continue;
                        }
                        match &ts.ty {
                            Expr::StructType(st) => {
                                for field in &st.fields {
                                    for name in &field.names {
                                        let id = self.add_decl(name, DeclKind::Field, Some(owner), false);
                                        self.members.entry(owner).or_default().push(id);
                                    }
                                }
                            }
                            Expr::InterfaceType(it) => {
                                for method in &it.methods {
                                    for name in &method.names {
                                        let id = self.add_decl(name, DeclKind::Method, Some(owner), false);
                                        self.members.entry(owner).or_default().push(id);
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
    }

    fn assign_shapes(&mut self, file: &'f SourceFile) {
        // Types first, then functions, so value inference can see both.
        let mut values = Vec::new();
        for decl in &file.tree.decls {
            match decl {
                Decl::Gen(gen) => {
                    for spec in &gen.specs {
                        match spec {
                            Spec::Type(ts) => {
                                if let Some(id) = self.def_of(&ts.name) {
                                    let shape = self.shape_of(&ts.ty);
                                    self.decls[id.index()].ty = shape;
                                }
                                self.assign_member_shapes(&ts.ty);
                            }
                            Spec::Value(vs) => values.push(vs),
                        }
                    }
                }
                Decl::Func(func) => {
                    if let Some(id) = self.def_of(&func.name) {
                        let sig = self.signature_of(&func.ty);
                        self.decls[id.index()].ty = TypeShape::Func { sig };
                    }
                }
            }
        }
        for vs in values {
            let declared = vs.ty.as_ref().map(|ty| self.shape_of(ty));
            for (i, name) in vs.names.iter().enumerate() {
                let shape = match &declared {
                    Some(shape) => shape.clone(),
                    None => self.value_shape(&vs.values, i, vs.names.len()),
                };
                if let Some(id) = self.def_of(name) {
                    self.decls[id.index()].ty = shape;
                }
            }
        }
    }

    fn assign_member_shapes(&mut self, ty: &Expr) {
        let fields: &[Field] = match ty {
            Expr::StructType(st) => &st.fields,
            Expr::InterfaceType(it) => &it.methods,
            _ => return,
        };
        for field in fields {
            let shape = match &field.ty {
                Expr::FuncType(ft) if matches!(ty, Expr::InterfaceType(_)) => TypeShape::Func {
                    sig: self.signature_of(ft),
                },
                other => self.shape_of(other),
            };
            for name in &field.names {
                if let Some(id) = self.def_of(name) {
                    self.decls[id.index()].ty = shape.clone();
                }
            }
        }
    }

    fn def_of(&self, ident: &Ident) -> Option<DeclId> {
        self.def_index.get(&ident.id).copied()
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    fn package_lookup(&self, package: &str, name: &str) -> Option<DeclId> {
        self.packages.get(package)?.get(name).copied()
    }

    /// Lexical lookup: blocks, then file imports, then package scope.
    fn lookup(&self, name: &str) -> Option<DeclId> {
        for block in self.blocks.iter().rev() {
            if let Some(id) = block.get(name) {
                return Some(*id);
            }
        }
        if let Some(import) = self.imports[self.file].get(name) {
            return Some(import.decl);
        }
        self.package_lookup(self.package(), name)
    }

    fn import_package(&self, decl: DeclId) -> Option<&str> {
        self.imports[self.file]
            .values()
            .find(|i| i.decl == decl)
            .map(|i| i.package.as_str())
    }

    fn declare_local(&mut self, ident: &Ident, kind: DeclKind, ty: TypeShape) {
        let id = self.add_decl(ident, kind, None, true);
        self.decls[id.index()].ty = ty;
        if ident.is_blank() {
            return;
        }
        if let Some(block) = self.blocks.last_mut() {
            block.insert(ident.name.clone(), id);
        }
    }

    fn push_block(&mut self) {
        self.blocks.push(HashMap::new());
    }

    fn pop_block(&mut self) {
        self.blocks.pop();
    }

    // ------------------------------------------------------------------------
    // Shapes
    // ------------------------------------------------------------------------

    fn named_shape(&self, decl: DeclId) -> TypeShape {
        let decl = &self.decls[decl.index()];
        TypeShape::named(decl.package.clone(), decl.name.clone())
    }

    fn shape_of(&self, expr: &Expr) -> TypeShape {
        match expr {
            Expr::Ident(ident) => match self.lookup(&ident.name) {
                Some(id) if self.decls[id.index()].kind == DeclKind::Type => self.named_shape(id),
                None if BASIC_TYPES.contains(&ident.name.as_str()) => {
                    TypeShape::basic(ident.name.clone())
                }
                _ => TypeShape::Unknown,
            },
            Expr::Selector(sel) => match sel.x.as_ref() {
                Expr::Ident(x) => match self.lookup(&x.name).and_then(|d| self.import_package(d)) {
                    Some(package) => TypeShape::named(package, sel.sel.name.clone()),
                    None => TypeShape::Unknown,
                },
                _ => TypeShape::Unknown,
            },
            Expr::Paren(p) => self.shape_of(&p.x),
            Expr::Star(s) => TypeShape::pointer(self.shape_of(&s.x)),
            Expr::ArrayType(a) => {
                let elem = Box::new(self.shape_of(&a.elem));
                match a.len.as_deref() {
                    None => TypeShape::Slice { elem },
                    Some(Expr::BasicLit(lit)) => TypeShape::Array {
                        len: lit.value.parse().ok(),
                        elem,
                    },
                    Some(_) => TypeShape::Array { len: None, elem },
                }
            }
            Expr::MapType(m) => TypeShape::Map {
                key: Box::new(self.shape_of(&m.key)),
                value: Box::new(self.shape_of(&m.value)),
            },
            Expr::ChanType(c) => TypeShape::Chan {
                elem: Box::new(self.shape_of(&c.value)),
            },
            Expr::FuncType(ft) => TypeShape::Func {
                sig: self.signature_of(ft),
            },
            Expr::StructType(st) => TypeShape::Struct {
                fields: st
                    .fields
                    .iter()
                    .flat_map(|field| {
                        let ty = self.shape_of(&field.ty);
                        if field.names.is_empty() {
                            vec![FieldShape {
                                name: embedded_name(&field.ty).unwrap_or_default(),
                                ty,
                                embedded: true,
                            }]
                        } else {
                            field
                                .names
                                .iter()
                                .map(|name| FieldShape {
                                    name: name.name.clone(),
                                    ty: ty.clone(),
                                    embedded: false,
                                })
                                .collect()
                        }
                    })
                    .collect(),
            },
            Expr::InterfaceType(_) => {
                let mut methods = Vec::new();
                self.interface_methods(expr, &mut methods, 0);
                TypeShape::Interface { methods }
            }
            Expr::Ellipsis(e) => TypeShape::Slice {
                elem: Box::new(
                    e.elt
                        .as_deref()
                        .map_or(TypeShape::Unknown, |elt| self.shape_of(elt)),
                ),
            },
            _ => TypeShape::Unknown,
        }
    }

    /// Flatten an interface body, following embedded interfaces.
    fn interface_methods(&self, expr: &Expr, out: &mut Vec<MethodSig>, depth: usize) {
        if depth > MAX_EMBED_DEPTH {
            return;
        }
        let Expr::InterfaceType(it) = expr else {
            return;
        };
        for entry in &it.methods {
            if entry.names.is_empty() {
                let embedded = match &entry.ty {
                    Expr::Ident(ident) => self.lookup(&ident.name),
                    _ => None,
                };
                if let Some(ty) = embedded.and_then(|id| self.type_exprs.get(&id)) {
                    self.interface_methods(ty, out, depth + 1);
                }
                continue;
            }
            let sig = match &entry.ty {
                Expr::FuncType(ft) => self.signature_of(ft),
                _ => Signature::default(),
            };
            for name in &entry.names {
                if !out.iter().any(|m| m.name == name.name) {
                    out.push(MethodSig::new(name.name.clone(), sig.clone()));
                }
            }
        }
    }

    fn signature_of(&self, ft: &FuncType) -> Signature {
        let expand = |fields: &[Field]| -> Vec<TypeShape> {
            fields
                .iter()
                .flat_map(|field| {
                    let shape = self.shape_of(&field.ty);
                    std::iter::repeat_n(shape, field.names.len().max(1))
                })
                .collect()
        };
        Signature {
            params: expand(&ft.params),
            results: expand(&ft.results),
            variadic: ft
                .params
                .last()
                .is_some_and(|field| matches!(field.ty, Expr::Ellipsis(_))),
        }
    }

    /// Shape of the `i`th name in `names = values`.
    fn value_shape(&self, values: &[Expr], i: usize, names: usize) -> TypeShape {
        if values.len() == names {
            return self.expr_type(&values[i]);
        }
        match values {
            // Multi-value call, or a comma-ok index, assertion, or receive.
            [single] => match self.call_results(single) {
                Some(results) => results.get(i).cloned().unwrap_or_default(),
                None if i == 0 => self.expr_type(single),
                None if i == 1 => TypeShape::basic("bool"),
                None => TypeShape::Unknown,
            },
            _ => TypeShape::Unknown,
        }
    }

    fn call_results(&self, expr: &Expr) -> Option<Vec<TypeShape>> {
        let Expr::Call(call) = expr.unparen() else {
            return None;
        };
        match self.expr_type(&call.fun) {
            TypeShape::Func { sig } => Some(sig.results),
            _ => None,
        }
    }

    /// Static type of an expression, as far as the simple rules reach.
    fn expr_type(&self, expr: &Expr) -> TypeShape {
        match expr {
            Expr::Ident(ident) => match self.lookup(&ident.name) {
                Some(id) => {
                    let decl = &self.decls[id.index()];
                    match decl.kind {
                        DeclKind::Type => self.named_shape(id),
                        DeclKind::Package => TypeShape::Unknown,
                        _ => decl.ty.clone(),
                    }
                }
                None => TypeShape::Unknown,
            },
            Expr::BasicLit(lit) => TypeShape::basic(match lit.kind {
                LitKind::Int => "int",
                LitKind::Float => "float64",
                LitKind::Imag => "complex128",
                LitKind::Char => "rune",
                LitKind::String => "string",
            }),
            Expr::Paren(p) => self.expr_type(&p.x),
            Expr::Unary(u) if u.op == UnaryOp::Addr => TypeShape::pointer(self.expr_type(&u.x)),
            Expr::Unary(u) if u.op == UnaryOp::Recv => match self.underlying(&self.expr_type(&u.x)) {
                TypeShape::Chan { elem } => *elem,
                _ => TypeShape::Unknown,
            },
            Expr::Unary(u) => self.expr_type(&u.x),
            Expr::Star(s) => match self.expr_type(&s.x) {
                TypeShape::Pointer { elem } => *elem,
                _ => TypeShape::Unknown,
            },
            Expr::CompositeLit(lit) => lit
                .ty
                .as_deref()
                .map_or(TypeShape::Unknown, |ty| self.shape_of(ty)),
            Expr::FuncLit(f) => TypeShape::Func {
                sig: self.signature_of(&f.ty),
            },
            Expr::TypeAssert(ta) => ta
                .ty
                .as_deref()
                .map_or(TypeShape::Unknown, |ty| self.shape_of(ty)),
            Expr::Call(call) => {
                if let Some(conversion) = self.conversion_type(&call.fun) {
                    return conversion;
                }
                match self.expr_type(&call.fun) {
                    TypeShape::Func { sig } => sig.results.into_iter().next().unwrap_or_default(),
                    _ => TypeShape::Unknown,
                }
            }
            Expr::Index(ix) => match self.underlying(&self.expr_type(&ix.x)) {
                TypeShape::Slice { elem } | TypeShape::Array { elem, .. } => *elem,
                TypeShape::Map { value, .. } => *value,
                _ => TypeShape::Unknown,
            },
            Expr::Slice(s) => self.expr_type(&s.x),
            Expr::Selector(sel) => self
                .selector_target(sel)
                .map(|id| {
                    let decl = &self.decls[id.index()];
                    match decl.kind {
                        DeclKind::Type => self.named_shape(id),
                        _ => decl.ty.clone(),
                    }
                })
                .unwrap_or_default(),
            _ => TypeShape::Unknown,
        }
    }

    fn conversion_type(&self, fun: &Expr) -> Option<TypeShape> {
        match fun.unparen() {
            Expr::Ident(ident) => match self.lookup(&ident.name) {
                Some(id) if self.decls[id.index()].kind == DeclKind::Type => {
                    Some(self.named_shape(id))
                }
                None if BASIC_TYPES.contains(&ident.name.as_str()) => {
                    Some(TypeShape::basic(ident.name.clone()))
                }
                _ => None,
            },
            Expr::ArrayType(_) | Expr::MapType(_) | Expr::Star(_) | Expr::ChanType(_) => {
                Some(self.shape_of(fun.unparen()))
            }
            _ => None,
        }
    }

    fn type_decl(&self, shape: &TypeShape) -> Option<DeclId> {
        match shape.deref() {
            TypeShape::Named { package, name } => self
                .package_lookup(package, name)
                .filter(|id| self.decls[id.index()].kind == DeclKind::Type),
            _ => None,
        }
    }

    fn underlying(&self, shape: &TypeShape) -> TypeShape {
        let mut current = shape.clone();
        for _ in 0..MAX_EMBED_DEPTH {
            match self.type_decl(&current) {
                Some(id) if matches!(current, TypeShape::Named { .. }) => {
                    current = self.decls[id.index()].ty.clone();
                }
                _ => break,
            }
        }
        current
    }

    /// Method or field `name` reachable from a value of type `shape`.
    fn find_member(&self, shape: &TypeShape, name: &str) -> Option<DeclId> {
        let mut seen = HashSet::new();
        self.member_of(self.type_decl(shape)?, name, &mut seen)
    }

    fn member_of(&self, ty: DeclId, name: &str, seen: &mut HashSet<DeclId>) -> Option<DeclId> {
        if !seen.insert(ty) {
            return None;
        }
        let decl = &self.decls[ty.index()];
        let direct = decl
            .methods
            .iter()
            .chain(self.members.get(&ty).into_iter().flatten())
            .find(|id| self.decls[id.index()].name == name);
        if let Some(id) = direct {
            return Some(*id);
        }
        if let TypeShape::Struct { fields } = &decl.ty {
            for field in fields.iter().filter(|f| f.embedded) {
                if let Some(inner) = self.type_decl(&field.ty) {
                    if let Some(found) = self.member_of(inner, name, seen) {
                        return Some(found);
                    }
                }
            }
        }
        if let Some(Expr::InterfaceType(it)) = self.type_exprs.get(&ty) {
            for entry in it.methods.iter().filter(|m| m.names.is_empty()) {
                if let Expr::Ident(embedded) = &entry.ty {
                    if let Some(inner) = self.package_lookup(&decl.package, &embedded.name) {
                        if let Some(found) = self.member_of(inner, name, seen) {
                            return Some(found);
                        }
                    }
                }
            }
        }
        None
    }

    /// Declaration a selector's `sel` resolves to, without binding anything.
    fn selector_target(&self, sel: &SelectorExpr) -> Option<DeclId> {
        if let Expr::Ident(x) = sel.x.as_ref() {
            if let Some(package) = self.lookup(&x.name).and_then(|d| self.import_package(d)) {
                return self.package_lookup(package, &sel.sel.name);
            }
        }
        self.find_member(&self.expr_type(&sel.x), &sel.sel.name)
    }

    // ------------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------------

    fn bind_file(&mut self, file: &'f SourceFile) {
        for decl in &file.tree.decls {
            match decl {
                Decl::Func(func) => {
                    self.push_block();
                    if let Some(recv) = &func.recv {
                        self.bind_type(&recv.ty);
                        self.declare_params(std::slice::from_ref(recv.as_ref()));
                    }
                    self.bind_func_type(&func.ty, true);
                    if let Some(body) = &func.body {
                        self.bind_block(body);
                    }
                    self.pop_block();
                }
                Decl::Gen(gen) => self.bind_package_gen(gen),
            }
        }
    }

    fn bind_package_gen(&mut self, gen: &GenDecl) {
        for spec in &gen.specs {
            match spec {
                Spec::Type(ts) => self.bind_type(&ts.ty),
                Spec::Value(vs) => {
                    if let Some(ty) = &vs.ty {
                        self.bind_type(ty);
                    }
                    for value in &vs.values {
                        self.bind_expr(value);
                    }
                }
            }
        }
    }

    /// Resolve names used inside a type expression. Field and method names of
    /// struct and interface bodies are declarations, not uses.
    fn bind_type(&mut self, ty: &Expr) {
        match ty {
            Expr::StructType(st) => {
                for field in &st.fields {
                    self.bind_type(&field.ty);
                }
            }
            Expr::InterfaceType(it) => {
                for entry in &it.methods {
                    self.bind_type(&entry.ty);
                }
            }
            Expr::FuncType(ft) => self.bind_func_type(ft, false),
            other => self.bind_expr(other),
        }
    }

    /// Resolve parameter types, declaring parameter names when `declare`.
    fn bind_func_type(&mut self, ft: &FuncType, declare: bool) {
        for field in ft.params.iter().chain(&ft.results) {
            self.bind_type(&field.ty);
        }
        if declare {
            self.declare_params(&ft.params);
            self.declare_params(&ft.results);
        }
    }

    fn declare_params(&mut self, fields: &[Field]) {
        for field in fields {
            let shape = self.shape_of(&field.ty);
            for name in &field.names {
                self.declare_local(name, DeclKind::Parameter, shape.clone());
            }
        }
    }

    fn bind_block(&mut self, block: &Block) {
        self.push_block();
        self.bind_stmts(&block.stmts);
        self.pop_block();
    }

    fn bind_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.bind_stmt(stmt);
        }
    }

    fn bind_opt_stmt(&mut self, stmt: Option<&Stmt>) {
        if let Some(stmt) = stmt {
            self.bind_stmt(stmt);
        }
    }

    fn bind_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(e) => self.bind_expr(e),
            Stmt::Assign(assign) => {
                for rhs in &assign.rhs {
                    self.bind_expr(rhs);
                }
                if assign.is_define() {
                    for (i, lhs) in assign.lhs.iter().enumerate() {
                        match lhs {
                            Expr::Ident(ident) => self.define_or_reuse(ident, &assign.rhs, i, assign.lhs.len()),
                            other => self.bind_expr(other),
                        }
                    }
                } else {
                    for lhs in &assign.lhs {
                        self.bind_expr(lhs);
                    }
                }
            }
            Stmt::IncDec(s) => self.bind_expr(&s.x),
            Stmt::Send(s) => {
                self.bind_expr(&s.chan);
                self.bind_expr(&s.value);
            }
            Stmt::Decl(gen) => self.bind_local_gen(gen),
            Stmt::Return(r) => {
                for result in &r.results {
                    self.bind_expr(result);
                }
            }
            Stmt::Branch(_) => {}
            Stmt::Block(block) => self.bind_block(block),
            Stmt::If(s) => {
                self.push_block();
                self.bind_opt_stmt(s.init.as_deref());
                self.bind_expr(&s.cond);
                self.bind_block(&s.body);
                self.bind_opt_stmt(s.els.as_deref());
                self.pop_block();
            }
            Stmt::For(s) => {
                self.push_block();
                self.bind_opt_stmt(s.init.as_deref());
                if let Some(cond) = &s.cond {
                    self.bind_expr(cond);
                }
                self.bind_opt_stmt(s.post.as_deref());
                self.bind_block(&s.body);
                self.pop_block();
            }
            Stmt::Range(s) => {
                self.bind_expr(&s.x);
                self.push_block();
                let (key_ty, value_ty) = self.range_types(&s.x);
                for (expr, ty) in [(s.key.as_deref(), key_ty), (s.value.as_deref(), value_ty)] {
                    match expr {
                        Some(Expr::Ident(ident)) if s.define => {
                            self.declare_local(ident, DeclKind::Variable, ty);
                        }
                        Some(other) => self.bind_expr(other),
                        None => {}
                    }
                }
                self.bind_block(&s.body);
                self.pop_block();
            }
            Stmt::Switch(s) => {
                self.push_block();
                self.bind_opt_stmt(s.init.as_deref());
                if let Some(tag) = &s.tag {
                    self.bind_expr(tag);
                }
                self.bind_clauses(&s.clauses);
                self.pop_block();
            }
            Stmt::TypeSwitch(s) => {
                self.push_block();
                self.bind_opt_stmt(s.init.as_deref());
                match s.assign.as_ref() {
                    Stmt::Assign(assign) if assign.is_define() => {
                        for rhs in &assign.rhs {
                            self.bind_expr(rhs);
                        }
                        let subject = match assign.rhs.first() {
                            Some(Expr::TypeAssert(ta)) => self.expr_type(&ta.x),
                            _ => TypeShape::Unknown,
                        };
                        if let Some(Expr::Ident(ident)) = assign.lhs.first() {
                            self.declare_local(ident, DeclKind::Variable, subject);
                        }
                    }
                    other => self.bind_stmt(other),
                }
                self.bind_clauses(&s.clauses);
                self.pop_block();
            }
            Stmt::Select(s) => {
                for clause in &s.clauses {
                    self.push_block();
                    self.bind_opt_stmt(clause.comm.as_deref());
                    self.bind_stmts(&clause.body);
                    self.pop_block();
                }
            }
            Stmt::Go(call) | Stmt::Defer(call) => self.bind_expr(&call.call),
        }
    }

    fn bind_clauses(&mut self, clauses: &[CaseClause]) {
        for clause in clauses {
            self.push_block();
            for expr in &clause.list {
                self.bind_expr(expr);
            }
            self.bind_stmts(&clause.body);
            self.pop_block();
        }
    }

    fn define_or_reuse(&mut self, ident: &Ident, rhs: &[Expr], i: usize, count: usize) {
        if ident.is_blank() {
            return;
        }
        let existing = self.blocks.last().and_then(|b| b.get(&ident.name)).copied();
        match existing {
            Some(id) => self.bind_use(ident, id),
            None => {
                let ty = self.value_shape(rhs, i, count);
                self.declare_local(ident, DeclKind::Variable, ty);
            }
        }
    }

    fn bind_local_gen(&mut self, gen: &GenDecl) {
        for spec in &gen.specs {
            match spec {
                Spec::Type(ts) => {
                    let id = self.add_decl(&ts.name, DeclKind::Type, None, true);
                    if let Some(block) = self.blocks.last_mut() {
                        block.insert(ts.name.name.clone(), id);
                    }
                    self.bind_type(&ts.ty);
                    self.decls[id.index()].ty = self.shape_of(&ts.ty);
                }
                Spec::Value(vs) => {
                    if let Some(ty) = &vs.ty {
                        self.bind_type(ty);
                    }
                    for value in &vs.values {
                        self.bind_expr(value);
                    }
                    let declared = vs.ty.as_ref().map(|ty| self.shape_of(ty));
                    for (i, name) in vs.names.iter().enumerate() {
                        let ty = declared
                            .clone()
                            .unwrap_or_else(|| self.value_shape(&vs.values, i, vs.names.len()));
                        self.declare_local(name, value_kind(gen.tok), ty);
                    }
                }
            }
        }
    }

    fn range_types(&self, x: &Expr) -> (TypeShape, TypeShape) {
        match self.underlying(&self.expr_type(x)) {
            TypeShape::Slice { elem } | TypeShape::Array { elem, .. } => {
                (TypeShape::basic("int"), *elem)
            }
            TypeShape::Map { key, value } => (*key, *value),
            TypeShape::Chan { elem } => (*elem, TypeShape::Unknown),
            TypeShape::Basic { name } if name == "string" => {
                (TypeShape::basic("int"), TypeShape::basic("rune"))
            }
            _ => (TypeShape::Unknown, TypeShape::Unknown),
        }
    }

    fn bind_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident(ident) => {
                if let Some(id) = self.lookup(&ident.name) {
                    self.bind_use(ident, id);
                }
            }
            Expr::BasicLit(_) => {}
            Expr::Binary(b) => {
                self.bind_expr(&b.x);
                self.bind_expr(&b.y);
            }
            Expr::Unary(u) => self.bind_expr(&u.x),
            Expr::Paren(p) => self.bind_expr(&p.x),
            Expr::Selector(sel) => self.bind_selector(sel),
            Expr::Call(call) => {
                self.bind_expr(&call.fun);
                for arg in &call.args {
                    self.bind_expr(arg);
                }
            }
            Expr::Index(ix) => {
                self.bind_expr(&ix.x);
                self.bind_expr(&ix.index);
            }
            Expr::Slice(s) => {
                self.bind_expr(&s.x);
                for bound in [s.low.as_deref(), s.high.as_deref(), s.max.as_deref()].into_iter().flatten() {
                    self.bind_expr(bound);
                }
            }
            Expr::Star(s) => self.bind_expr(&s.x),
            Expr::TypeAssert(ta) => {
                self.bind_expr(&ta.x);
                if let Some(ty) = &ta.ty {
                    self.bind_type(ty);
                }
            }
            Expr::CompositeLit(lit) => self.bind_composite(lit),
            Expr::KeyValue(kv) => {
                self.bind_expr(&kv.key);
                self.bind_expr(&kv.value);
            }
            Expr::FuncLit(f) => {
                self.push_block();
                self.bind_func_type(&f.ty, true);
                self.bind_block(&f.body);
                self.pop_block();
            }
            Expr::ArrayType(a) => {
                if let Some(len) = &a.len {
                    self.bind_expr(len);
                }
                self.bind_type(&a.elem);
            }
            Expr::MapType(m) => {
                self.bind_type(&m.key);
                self.bind_type(&m.value);
            }
            Expr::ChanType(c) => self.bind_type(&c.value),
            Expr::FuncType(_) | Expr::StructType(_) | Expr::InterfaceType(_) => self.bind_type(expr),
            Expr::Ellipsis(e) => {
                if let Some(elt) = &e.elt {
                    self.bind_type(elt);
                }
            }
        }
    }

    fn bind_selector(&mut self, sel: &SelectorExpr) {
        if let Expr::Ident(x) = sel.x.as_ref() {
            if let Some(id) = self.lookup(&x.name) {
                if let Some(package) = self.import_package(id).map(str::to_owned) {
                    self.bind_use(x, id);
                    if let Some(target) = self.package_lookup(&package, &sel.sel.name) {
                        self.bind_use(&sel.sel, target);
                    }
                    return;
                }
            }
        }
        self.bind_expr(&sel.x);
        if let Some(member) = self.find_member(&self.expr_type(&sel.x), &sel.sel.name) {
            self.bind_use(&sel.sel, member);
        }
    }

    fn bind_composite(&mut self, lit: &CompositeLit) {
        if let Some(ty) = &lit.ty {
            self.bind_type(ty);
        }
        let struct_ty = lit
            .ty
            .as_deref()
            .map(|ty| self.shape_of(ty))
            .filter(|shape| matches!(self.underlying(shape), TypeShape::Struct { .. }));
        for elt in &lit.elts {
            match (elt, &struct_ty) {
                (Expr::KeyValue(kv), Some(shape)) => {
                    match kv.key.as_ref() {
                        Expr::Ident(key) => {
                            if let Some(field) = self.find_member(shape, &key.name) {
                                self.bind_use(key, field);
                            }
                        }
                        other => self.bind_expr(other),
                    }
                    self.bind_expr(&kv.value);
                }
                (other, _) => self.bind_expr(other),
            }
        }
    }
}

fn value_kind(tok: DeclToken) -> DeclKind {
    match tok {
        DeclToken::Const => DeclKind::Constant,
        _ => DeclKind::Variable,
    }
}

/// Field name of an embedded field: the base type name.
fn embedded_name(ty: &Expr) -> Option<String> {
    match ty {
        Expr::Ident(ident) => Some(ident.name.clone()),
        Expr::Star(star) => embedded_name(&star.x),
        Expr::Selector(sel) => Some(sel.sel.name.clone()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
