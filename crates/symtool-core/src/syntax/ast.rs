//! Syntax tree node types.
//!
//! The tree is a closed set of tagged variants: `Decl`, `Spec`, `Stmt`, and
//! `Expr` enumerate every node shape the front-end produces. Every node
//! carries a byte [`Span`] into its file; every [`Ident`] carries a
//! [`NodeId`] that keys the snapshot's definition and usage tables.

use serde::{Deserialize, Serialize};

use crate::types::Span;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier occurrence key, unique within one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// An identifier occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(id: NodeId, name: impl Into<String>, span: Span) -> Self {
        Ident {
            id,
            name: name.into(),
            span,
        }
    }

    /// The blank identifier `_`.
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

// ============================================================================
// Files and Declarations
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub package: Ident,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
    pub span: Span,
}

/// `import alias "path"`. `path` is stored unquoted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSpec {
    pub name: Option<Ident>,
    pub path: String,
    pub span: Span,
}

impl ImportSpec {
    /// Name the import is referenced by inside the file.
    pub fn local_name(&self) -> &str {
        match &self.name {
            Some(alias) => &alias.name,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decl {
    Func(FuncDecl),
    Gen(GenDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Func(func) => func.span,
            Decl::Gen(gen) => gen.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDecl {
    pub recv: Option<Box<Field>>,
    pub name: Ident,
    pub ty: FuncType,
    pub body: Option<Block>,
    pub span: Span,
}

impl FuncDecl {
    /// Receiver base type name and whether the receiver is a pointer.
    pub fn receiver_type(&self) -> Option<(&str, bool)> {
        let recv = self.recv.as_ref()?;
        match &recv.ty {
            Expr::Ident(ident) => Some((&ident.name, false)),
            Expr::Star(star) => match star.x.as_ref() {
                Expr::Ident(ident) => Some((&ident.name, true)),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclToken {
    Var,
    Const,
    Type,
}

impl DeclToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclToken::Var => "var",
            DeclToken::Const => "const",
            DeclToken::Type => "type",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenDecl {
    pub tok: DeclToken,
    pub specs: Vec<Spec>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Spec {
    Value(ValueSpec),
    Type(TypeSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSpec {
    pub names: Vec<Ident>,
    pub ty: Option<Expr>,
    pub values: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSpec {
    pub name: Ident,
    pub ty: Expr,
    pub span: Span,
}

/// Parameter, result, struct field, or interface method entry.
///
/// Embedded fields and interface embeddings have no names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub names: Vec<Ident>,
    pub ty: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncType {
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    Expr(Expr),
    Assign(AssignStmt),
    IncDec(IncDecStmt),
    Send(SendStmt),
    Decl(GenDecl),
    Return(ReturnStmt),
    Branch(BranchStmt),
    Block(Block),
    If(IfStmt),
    For(ForStmt),
    Range(RangeStmt),
    Switch(SwitchStmt),
    TypeSwitch(TypeSwitchStmt),
    Select(SelectStmt),
    Go(CallStmt),
    Defer(CallStmt),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(expr) => expr.span(),
            Stmt::Assign(s) => s.span,
            Stmt::IncDec(s) => s.span,
            Stmt::Send(s) => s.span,
            Stmt::Decl(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Branch(s) => s.span,
            Stmt::Block(s) => s.span,
            Stmt::If(s) => s.span,
            Stmt::For(s) => s.span,
            Stmt::Range(s) => s.span,
            Stmt::Switch(s) => s.span,
            Stmt::TypeSwitch(s) => s.span,
            Stmt::Select(s) => s.span,
            Stmt::Go(s) | Stmt::Defer(s) => s.span,
        }
    }

    /// Conditionals, loops, switches, and selects.
    pub fn is_branching(&self) -> bool {
        matches!(
            self,
            Stmt::If(_)
                | Stmt::For(_)
                | Stmt::Range(_)
                | Stmt::Switch(_)
                | Stmt::TypeSwitch(_)
                | Stmt::Select(_)
        )
    }
}

/// `lhs tok rhs` where `tok` is `=`, `:=`, or an operator assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStmt {
    pub lhs: Vec<Expr>,
    pub tok: String,
    pub rhs: Vec<Expr>,
    pub span: Span,
}

impl AssignStmt {
    pub fn is_define(&self) -> bool {
        self.tok == ":="
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncDecStmt {
    pub x: Expr,
    pub inc: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendStmt {
    pub chan: Expr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub results: Vec<Expr>,
    pub span: Span,
}

/// `break`, `continue`, `goto`, or `fallthrough`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchStmt {
    pub tok: String,
    pub label: Option<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Expr,
    pub body: Block,
    pub els: Option<Box<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    pub init: Option<Box<Stmt>>,
    pub cond: Option<Expr>,
    pub post: Option<Box<Stmt>>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeStmt {
    pub key: Option<Box<Expr>>,
    pub value: Option<Box<Expr>>,
    pub define: bool,
    pub x: Box<Expr>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStmt {
    pub init: Option<Box<Stmt>>,
    pub tag: Option<Expr>,
    pub clauses: Vec<CaseClause>,
    pub span: Span,
}

/// `switch [init;] [v :=] x.(type) { ... }`. `assign` is either an
/// expression statement or a `:=` assignment holding the type assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSwitchStmt {
    pub init: Option<Box<Stmt>>,
    pub assign: Box<Stmt>,
    pub clauses: Vec<CaseClause>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStmt {
    pub clauses: Vec<CommClause>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallStmt {
    pub call: Expr,
    pub span: Span,
}

/// Switch case; an empty `list` is the `default` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseClause {
    pub list: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Select case; `comm == None` is the `default` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommClause {
    pub comm: Option<Box<Stmt>>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Ident(Ident),
    BasicLit(BasicLit),
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Paren(ParenExpr),
    Selector(SelectorExpr),
    Call(CallExpr),
    Index(IndexExpr),
    Slice(SliceExpr),
    Star(StarExpr),
    TypeAssert(TypeAssertExpr),
    CompositeLit(CompositeLit),
    KeyValue(KeyValueExpr),
    FuncLit(FuncLit),
    ArrayType(ArrayType),
    MapType(MapType),
    ChanType(ChanType),
    FuncType(FuncType),
    StructType(StructType),
    InterfaceType(InterfaceType),
    Ellipsis(Ellipsis),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(e) => e.span,
            Expr::BasicLit(e) => e.span,
            Expr::Binary(e) => e.span,
            Expr::Unary(e) => e.span,
            Expr::Paren(e) => e.span,
            Expr::Selector(e) => e.span,
            Expr::Call(e) => e.span,
            Expr::Index(e) => e.span,
            Expr::Slice(e) => e.span,
            Expr::Star(e) => e.span,
            Expr::TypeAssert(e) => e.span,
            Expr::CompositeLit(e) => e.span,
            Expr::KeyValue(e) => e.span,
            Expr::FuncLit(e) => e.span,
            Expr::ArrayType(e) => e.span,
            Expr::MapType(e) => e.span,
            Expr::ChanType(e) => e.span,
            Expr::FuncType(e) => e.span,
            Expr::StructType(e) => e.span,
            Expr::InterfaceType(e) => e.span,
            Expr::Ellipsis(e) => e.span,
        }
    }

    /// Variant name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Ident(_) => "ident",
            Expr::BasicLit(_) => "basic_lit",
            Expr::Binary(_) => "binary",
            Expr::Unary(_) => "unary",
            Expr::Paren(_) => "paren",
            Expr::Selector(_) => "selector",
            Expr::Call(_) => "call",
            Expr::Index(_) => "index",
            Expr::Slice(_) => "slice",
            Expr::Star(_) => "star",
            Expr::TypeAssert(_) => "type_assert",
            Expr::CompositeLit(_) => "composite_lit",
            Expr::KeyValue(_) => "key_value",
            Expr::FuncLit(_) => "func_lit",
            Expr::ArrayType(_) => "array_type",
            Expr::MapType(_) => "map_type",
            Expr::ChanType(_) => "chan_type",
            Expr::FuncType(_) => "func_type",
            Expr::StructType(_) => "struct_type",
            Expr::InterfaceType(_) => "interface_type",
            Expr::Ellipsis(_) => "ellipsis",
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn unparen(&self) -> &Expr {
        match self {
            Expr::Paren(paren) => paren.x.unparen(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    String,
}

/// Literal; `value` is the literal's source text, quotes included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicLit {
    pub kind: LitKind,
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    LogOr,
    LogAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Or,
    Xor,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    And,
    AndNot,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::LogOr => "||",
            BinaryOp::LogAnd => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::And => "&",
            BinaryOp::AndNot => "&^",
        }
    }

    pub fn from_token(text: &str) -> Option<BinaryOp> {
        let op = match text {
            "||" => BinaryOp::LogOr,
            "&&" => BinaryOp::LogAnd,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "|" => BinaryOp::Or,
            "^" => BinaryOp::Xor,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "&" => BinaryOp::And,
            "&^" => BinaryOp::AndNot,
            _ => return None,
        };
        Some(op)
    }

    /// Binding strength, 1 (`||`) through 5 (multiplicative).
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::LogOr => 1,
            BinaryOp::LogAnd => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 3,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Or | BinaryOp::Xor => 4,
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::And
            | BinaryOp::AndNot => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
    Xor,
    Addr,
    Recv,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Pos => "+",
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Xor => "^",
            UnaryOp::Addr => "&",
            UnaryOp::Recv => "<-",
        }
    }

    pub fn from_token(text: &str) -> Option<UnaryOp> {
        let op = match text {
            "+" => UnaryOp::Pos,
            "-" => UnaryOp::Neg,
            "!" => UnaryOp::Not,
            "^" => UnaryOp::Xor,
            "&" => UnaryOp::Addr,
            "<-" => UnaryOp::Recv,
            _ => return None,
        };
        Some(op)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub x: Box<Expr>,
    pub y: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub x: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParenExpr {
    pub x: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorExpr {
    pub x: Box<Expr>,
    pub sel: Ident,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub fun: Box<Expr>,
    pub args: Vec<Expr>,
    /// Trailing `...` on the last argument.
    pub ellipsis: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexExpr {
    pub x: Box<Expr>,
    pub index: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceExpr {
    pub x: Box<Expr>,
    pub low: Option<Box<Expr>>,
    pub high: Option<Box<Expr>>,
    /// Capacity bound of a three-index slice `x[l:h:m]`.
    pub max: Option<Box<Expr>>,
    pub span: Span,
}

/// `*x`: pointer dereference or pointer type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StarExpr {
    pub x: Box<Expr>,
    pub span: Span,
}

/// `x.(T)`; `ty == None` for the `x.(type)` form of a type switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeAssertExpr {
    pub x: Box<Expr>,
    pub ty: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeLit {
    pub ty: Option<Box<Expr>>,
    pub elts: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueExpr {
    pub key: Box<Expr>,
    pub value: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncLit {
    pub ty: FuncType,
    pub body: Block,
    pub span: Span,
}

/// `[len]elem`; `len == None` for slice types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayType {
    pub len: Option<Box<Expr>>,
    pub elem: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapType {
    pub key: Box<Expr>,
    pub value: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChanType {
    pub dir: ChanDir,
    pub value: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructType {
    pub fields: Vec<Field>,
    pub span: Span,
}

/// Interface body. Method entries have one name and a `FuncType`;
/// embedded interfaces have no names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceType {
    pub methods: Vec<Field>,
    pub span: Span,
}

/// `...T` in a variadic parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipsis {
    pub elt: Option<Box<Expr>>,
    pub span: Span,
}
