//! Read-only traversal over the syntax tree.
//!
//! # Traversal Order
//!
//! - **Depth-first, pre-order** for `visit_*` methods
//! - **Post-order** for `leave_*` methods
//! - Children are visited in source order
//!
//! Every walk function first calls [`Visitor::enter_node`], so a visitor can
//! observe cancellation once per node. Returning [`VisitResult::Stop`] from
//! any hook unwinds the whole walk without calling further `leave_*` hooks.
//! [`VisitResult::SkipChildren`] skips the node's children but still calls its
//! `leave_*` hook, which keeps enter/leave pairs balanced.

use super::ast::*;

/// Result of a `visit_*` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    /// Visit this node's children.
    Continue,
    /// Do not visit children; continue with siblings.
    SkipChildren,
    /// Abort the traversal.
    Stop,
}

/// Read-only syntax tree visitor.
///
/// All hooks default to no-ops that continue the traversal.
#[allow(unused_variables)]
pub trait Visitor<'a> {
    /// Called before every node-specific hook.
    fn enter_node(&mut self) -> VisitResult {
        VisitResult::Continue
    }

    fn visit_file(&mut self, node: &'a File) -> VisitResult {
        VisitResult::Continue
    }
    fn leave_file(&mut self, node: &'a File) {}

    fn visit_decl(&mut self, node: &'a Decl) -> VisitResult {
        VisitResult::Continue
    }
    fn leave_decl(&mut self, node: &'a Decl) {}

    fn visit_block(&mut self, node: &'a Block) -> VisitResult {
        VisitResult::Continue
    }
    fn leave_block(&mut self, node: &'a Block) {}

    fn visit_stmt(&mut self, node: &'a Stmt) -> VisitResult {
        VisitResult::Continue
    }
    fn leave_stmt(&mut self, node: &'a Stmt) {}

    fn visit_case_clause(&mut self, node: &'a CaseClause) -> VisitResult {
        VisitResult::Continue
    }
    fn leave_case_clause(&mut self, node: &'a CaseClause) {}

    fn visit_comm_clause(&mut self, node: &'a CommClause) -> VisitResult {
        VisitResult::Continue
    }
    fn leave_comm_clause(&mut self, node: &'a CommClause) {}

    fn visit_expr(&mut self, node: &'a Expr) -> VisitResult {
        VisitResult::Continue
    }
    fn leave_expr(&mut self, node: &'a Expr) {}

    /// Every identifier occurrence, declaring or referring.
    fn visit_ident(&mut self, node: &'a Ident) -> VisitResult {
        VisitResult::Continue
    }
}

// ============================================================================
// Helpers
// ============================================================================

macro_rules! try_walk {
    ($e:expr) => {
        if $e == VisitResult::Stop {
            return VisitResult::Stop;
        }
    };
}

fn begin<'a, V: Visitor<'a>>(visitor: &mut V, hook: impl FnOnce(&mut V) -> VisitResult) -> VisitResult {
    match visitor.enter_node() {
        VisitResult::Continue => hook(visitor),
        other => other,
    }
}

fn walk_idents<'a, V: Visitor<'a>>(visitor: &mut V, idents: &'a [Ident]) -> VisitResult {
    for ident in idents {
        try_walk!(walk_ident(visitor, ident));
    }
    VisitResult::Continue
}

fn walk_exprs<'a, V: Visitor<'a>>(visitor: &mut V, exprs: &'a [Expr]) -> VisitResult {
    for expr in exprs {
        try_walk!(walk_expr(visitor, expr));
    }
    VisitResult::Continue
}

fn walk_stmts<'a, V: Visitor<'a>>(visitor: &mut V, stmts: &'a [Stmt]) -> VisitResult {
    for stmt in stmts {
        try_walk!(walk_stmt(visitor, stmt));
    }
    VisitResult::Continue
}

fn walk_opt_stmt<'a, V: Visitor<'a>>(visitor: &mut V, stmt: &'a Option<Box<Stmt>>) -> VisitResult {
    match stmt {
        Some(stmt) => walk_stmt(visitor, stmt),
        None => VisitResult::Continue,
    }
}

fn walk_opt_expr<'a, V: Visitor<'a>>(visitor: &mut V, expr: Option<&'a Expr>) -> VisitResult {
    match expr {
        Some(expr) => walk_expr(visitor, expr),
        None => VisitResult::Continue,
    }
}

// ============================================================================
// Walk Functions
// ============================================================================

pub fn walk_ident<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a Ident) -> VisitResult {
    match begin(visitor, |v| v.visit_ident(node)) {
        VisitResult::Stop => VisitResult::Stop,
        _ => VisitResult::Continue,
    }
}

pub fn walk_file<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a File) -> VisitResult {
    match begin(visitor, |v| v.visit_file(node)) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::SkipChildren => {}
        VisitResult::Continue => {
            try_walk!(walk_ident(visitor, &node.package));
            for import in &node.imports {
                if let Some(alias) = &import.name {
                    try_walk!(walk_ident(visitor, alias));
                }
            }
            for decl in &node.decls {
                try_walk!(walk_decl(visitor, decl));
            }
        }
    }
    visitor.leave_file(node);
    VisitResult::Continue
}

pub fn walk_decl<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a Decl) -> VisitResult {
    match begin(visitor, |v| v.visit_decl(node)) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::SkipChildren => {}
        VisitResult::Continue => match node {
            Decl::Func(func) => {
                if let Some(recv) = &func.recv {
                    try_walk!(walk_field(visitor, recv));
                }
                try_walk!(walk_ident(visitor, &func.name));
                try_walk!(walk_func_type(visitor, &func.ty));
                if let Some(body) = &func.body {
                    try_walk!(walk_block(visitor, body));
                }
            }
            Decl::Gen(gen) => try_walk!(walk_gen_decl(visitor, gen)),
        },
    }
    visitor.leave_decl(node);
    VisitResult::Continue
}

pub fn walk_gen_decl<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a GenDecl) -> VisitResult {
    for spec in &node.specs {
        match spec {
            Spec::Value(value) => {
                try_walk!(walk_idents(visitor, &value.names));
                try_walk!(walk_opt_expr(visitor, value.ty.as_ref()));
                try_walk!(walk_exprs(visitor, &value.values));
            }
            Spec::Type(ty) => {
                try_walk!(walk_ident(visitor, &ty.name));
                try_walk!(walk_expr(visitor, &ty.ty));
            }
        }
    }
    VisitResult::Continue
}

pub fn walk_field<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a Field) -> VisitResult {
    try_walk!(walk_idents(visitor, &node.names));
    walk_expr(visitor, &node.ty)
}

pub fn walk_func_type<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a FuncType) -> VisitResult {
    for field in node.params.iter().chain(&node.results) {
        try_walk!(walk_field(visitor, field));
    }
    VisitResult::Continue
}

pub fn walk_block<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a Block) -> VisitResult {
    match begin(visitor, |v| v.visit_block(node)) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::SkipChildren => {}
        VisitResult::Continue => try_walk!(walk_stmts(visitor, &node.stmts)),
    }
    visitor.leave_block(node);
    VisitResult::Continue
}

pub fn walk_stmt<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a Stmt) -> VisitResult {
    match begin(visitor, |v| v.visit_stmt(node)) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::SkipChildren => {}
        VisitResult::Continue => try_walk!(walk_stmt_children(visitor, node)),
    }
    visitor.leave_stmt(node);
    VisitResult::Continue
}

fn walk_stmt_children<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a Stmt) -> VisitResult {
    match node {
        Stmt::Expr(expr) => try_walk!(walk_expr(visitor, expr)),
        Stmt::Assign(assign) => {
            try_walk!(walk_exprs(visitor, &assign.lhs));
            try_walk!(walk_exprs(visitor, &assign.rhs));
        }
        Stmt::IncDec(inc) => try_walk!(walk_expr(visitor, &inc.x)),
        Stmt::Send(send) => {
            try_walk!(walk_expr(visitor, &send.chan));
            try_walk!(walk_expr(visitor, &send.value));
        }
        Stmt::Decl(gen) => try_walk!(walk_gen_decl(visitor, gen)),
        Stmt::Return(ret) => try_walk!(walk_exprs(visitor, &ret.results)),
        Stmt::Branch(branch) => {
            if let Some(label) = &branch.label {
                try_walk!(walk_ident(visitor, label));
            }
        }
        Stmt::Block(block) => try_walk!(walk_block(visitor, block)),
        Stmt::If(stmt) => {
            try_walk!(walk_opt_stmt(visitor, &stmt.init));
            try_walk!(walk_expr(visitor, &stmt.cond));
            try_walk!(walk_block(visitor, &stmt.body));
            try_walk!(walk_opt_stmt(visitor, &stmt.els));
        }
        Stmt::For(stmt) => {
            try_walk!(walk_opt_stmt(visitor, &stmt.init));
            try_walk!(walk_opt_expr(visitor, stmt.cond.as_ref()));
            try_walk!(walk_opt_stmt(visitor, &stmt.post));
            try_walk!(walk_block(visitor, &stmt.body));
        }
        Stmt::Range(stmt) => {
            try_walk!(walk_opt_expr(visitor, stmt.key.as_deref()));
            try_walk!(walk_opt_expr(visitor, stmt.value.as_deref()));
            try_walk!(walk_expr(visitor, &stmt.x));
            try_walk!(walk_block(visitor, &stmt.body));
        }
        Stmt::Switch(stmt) => {
            try_walk!(walk_opt_stmt(visitor, &stmt.init));
            try_walk!(walk_opt_expr(visitor, stmt.tag.as_ref()));
            for clause in &stmt.clauses {
                try_walk!(walk_case_clause(visitor, clause));
            }
        }
        Stmt::TypeSwitch(stmt) => {
            try_walk!(walk_opt_stmt(visitor, &stmt.init));
            try_walk!(walk_stmt(visitor, &stmt.assign));
            for clause in &stmt.clauses {
                try_walk!(walk_case_clause(visitor, clause));
            }
        }
        Stmt::Select(stmt) => {
            for clause in &stmt.clauses {
                try_walk!(walk_comm_clause(visitor, clause));
            }
        }
        Stmt::Go(call) | Stmt::Defer(call) => try_walk!(walk_expr(visitor, &call.call)),
    }
    VisitResult::Continue
}

pub fn walk_case_clause<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a CaseClause) -> VisitResult {
    match begin(visitor, |v| v.visit_case_clause(node)) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::SkipChildren => {}
        VisitResult::Continue => {
            try_walk!(walk_exprs(visitor, &node.list));
            try_walk!(walk_stmts(visitor, &node.body));
        }
    }
    visitor.leave_case_clause(node);
    VisitResult::Continue
}

pub fn walk_comm_clause<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a CommClause) -> VisitResult {
    match begin(visitor, |v| v.visit_comm_clause(node)) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::SkipChildren => {}
        VisitResult::Continue => {
            try_walk!(walk_opt_stmt(visitor, &node.comm));
            try_walk!(walk_stmts(visitor, &node.body));
        }
    }
    visitor.leave_comm_clause(node);
    VisitResult::Continue
}

pub fn walk_expr<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a Expr) -> VisitResult {
    match begin(visitor, |v| v.visit_expr(node)) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::SkipChildren => {}
        VisitResult::Continue => try_walk!(walk_expr_children(visitor, node)),
    }
    visitor.leave_expr(node);
    VisitResult::Continue
}

fn walk_expr_children<'a, V: Visitor<'a>>(visitor: &mut V, node: &'a Expr) -> VisitResult {
    match node {
        Expr::Ident(ident) => try_walk!(walk_ident(visitor, ident)),
        Expr::BasicLit(_) => {}
        Expr::Binary(e) => {
            try_walk!(walk_expr(visitor, &e.x));
            try_walk!(walk_expr(visitor, &e.y));
        }
        Expr::Unary(e) => try_walk!(walk_expr(visitor, &e.x)),
        Expr::Paren(e) => try_walk!(walk_expr(visitor, &e.x)),
        Expr::Selector(e) => {
            try_walk!(walk_expr(visitor, &e.x));
            try_walk!(walk_ident(visitor, &e.sel));
        }
        Expr::Call(e) => {
            try_walk!(walk_expr(visitor, &e.fun));
            try_walk!(walk_exprs(visitor, &e.args));
        }
        Expr::Index(e) => {
            try_walk!(walk_expr(visitor, &e.x));
            try_walk!(walk_expr(visitor, &e.index));
        }
        Expr::Slice(e) => {
            try_walk!(walk_expr(visitor, &e.x));
            try_walk!(walk_opt_expr(visitor, e.low.as_deref()));
            try_walk!(walk_opt_expr(visitor, e.high.as_deref()));
            try_walk!(walk_opt_expr(visitor, e.max.as_deref()));
        }
        Expr::Star(e) => try_walk!(walk_expr(visitor, &e.x)),
        Expr::TypeAssert(e) => {
            try_walk!(walk_expr(visitor, &e.x));
            try_walk!(walk_opt_expr(visitor, e.ty.as_deref()));
        }
        Expr::CompositeLit(e) => {
            try_walk!(walk_opt_expr(visitor, e.ty.as_deref()));
            try_walk!(walk_exprs(visitor, &e.elts));
        }
        Expr::KeyValue(e) => {
            try_walk!(walk_expr(visitor, &e.key));
            try_walk!(walk_expr(visitor, &e.value));
        }
        Expr::FuncLit(e) => {
            try_walk!(walk_func_type(visitor, &e.ty));
            try_walk!(walk_block(visitor, &e.body));
        }
        Expr::ArrayType(e) => {
            try_walk!(walk_opt_expr(visitor, e.len.as_deref()));
            try_walk!(walk_expr(visitor, &e.elem));
        }
        Expr::MapType(e) => {
            try_walk!(walk_expr(visitor, &e.key));
            try_walk!(walk_expr(visitor, &e.value));
        }
        Expr::ChanType(e) => try_walk!(walk_expr(visitor, &e.value)),
        Expr::FuncType(e) => try_walk!(walk_func_type(visitor, e)),
        Expr::StructType(e) => {
            for field in &e.fields {
                try_walk!(walk_field(visitor, field));
            }
        }
        Expr::InterfaceType(e) => {
            for method in &e.methods {
                try_walk!(walk_field(visitor, method));
            }
        }
        Expr::Ellipsis(e) => try_walk!(walk_opt_expr(visitor, e.elt.as_deref())),
    }
    VisitResult::Continue
}

// ============================================================================
// Identifier Collection
// ============================================================================

struct IdentCollector<'a> {
    idents: Vec<&'a Ident>,
}

impl<'a> Visitor<'a> for IdentCollector<'a> {
    fn visit_ident(&mut self, node: &'a Ident) -> VisitResult {
        self.idents.push(node);
        VisitResult::Continue
    }
}

/// Every identifier in `file`, in traversal order.
pub fn collect_idents(file: &File) -> Vec<&Ident> {
    let mut collector = IdentCollector { idents: Vec::new() };
    walk_file(&mut collector, file);
    collector.idents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_file;

    struct Counter {
        nodes: usize,
        limit: usize,
        leaves: usize,
    }

    impl<'a> Visitor<'a> for Counter {
        fn enter_node(&mut self) -> VisitResult {
            self.nodes += 1;
            if self.nodes > self.limit {
                VisitResult::Stop
            } else {
                VisitResult::Continue
            }
        }

        fn leave_stmt(&mut self, _node: &'a Stmt) {
            self.leaves += 1;
        }
    }

    const SRC: &str = "package p\n\nfunc f(a int) int {\n\tb := a + 1\n\treturn b\n}\n";

    #[test]
    fn idents_in_source_order() {
        let file = parse_file(SRC, &mut 0).unwrap();
        let names: Vec<&str> = collect_idents(&file).iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["p", "f", "a", "int", "int", "b", "a", "b"]);
    }

    #[test]
    fn stop_unwinds_without_leave_hooks() {
        let file = parse_file(SRC, &mut 0).unwrap();
        let mut full = Counter {
            nodes: 0,
            limit: usize::MAX,
            leaves: 0,
        };
        walk_file(&mut full, &file);
        assert_eq!(full.leaves, 2);

        let mut cut = Counter {
            nodes: 0,
            limit: 3,
            leaves: 0,
        };
        assert_eq!(walk_file(&mut cut, &file), VisitResult::Stop);
        assert_eq!(cut.nodes, 4);
        assert_eq!(cut.leaves, 0);
    }
}
