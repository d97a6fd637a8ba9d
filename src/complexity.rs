//! Function complexity metrics.
//!
//! Cyclomatic complexity starts at 1 and adds one per conditional, loop,
//! switch, type switch, select, and case clause. Nesting depth rises when a
//! branching statement is entered and falls when it is left; the deepest
//! level reached is reported.
//!
//! Function literals are measured on their own. The enclosing function's
//! metrics do not include them.

use serde::Serialize;
use symtool_core::error::SymtoolResult;
use symtool_core::output::{paginate, Paged};
use symtool_core::snapshot::{Snapshot, SourceFile};
use symtool_core::syntax::visit::{walk_block, walk_expr};
use symtool_core::syntax::{
    Block, CaseClause, CommClause, Decl, Expr, FuncLit, Spec, Stmt, VisitResult, Visitor,
};
use symtool_core::text::LineIndex;
use tracing::debug;

use crate::cancel::{CancelCheck, CancellationToken};

/// Metrics for one function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Complexity {
    /// Lines spanned by the body, braces included.
    pub lines: u32,
    pub max_nesting: u32,
    pub cyclomatic: u32,
}

// ============================================================================
// Measurement
// ============================================================================

struct Measure<'a, 't> {
    check: CancelCheck<'t>,
    cyclomatic: u32,
    depth: u32,
    max_nesting: u32,
    nested: Vec<&'a FuncLit>,
}

impl<'a, 't> Measure<'a, 't> {
    fn new(token: &'t CancellationToken) -> Self {
        Measure {
            check: CancelCheck::new(token),
            cyclomatic: 1,
            depth: 0,
            max_nesting: 0,
            nested: Vec::new(),
        }
    }
}

impl<'a> Visitor<'a> for Measure<'a, '_> {
    fn enter_node(&mut self) -> VisitResult {
        self.check.poll()
    }

    fn visit_stmt(&mut self, node: &'a Stmt) -> VisitResult {
        if node.is_branching() {
            self.cyclomatic += 1;
            self.depth += 1;
            self.max_nesting = self.max_nesting.max(self.depth);
        }
        VisitResult::Continue
    }

    fn leave_stmt(&mut self, node: &'a Stmt) {
        if node.is_branching() {
            self.depth -= 1;
        }
    }

    fn visit_case_clause(&mut self, _node: &'a CaseClause) -> VisitResult {
        self.cyclomatic += 1;
        VisitResult::Continue
    }

    fn visit_comm_clause(&mut self, _node: &'a CommClause) -> VisitResult {
        self.cyclomatic += 1;
        VisitResult::Continue
    }

    fn visit_expr(&mut self, node: &'a Expr) -> VisitResult {
        match node {
            Expr::FuncLit(lit) => {
                self.nested.push(lit);
                VisitResult::SkipChildren
            }
            _ => VisitResult::Continue,
        }
    }
}

fn line_count(lines: &LineIndex, body: &Block) -> u32 {
    let last = body.span.end.saturating_sub(1).max(body.span.start);
    lines.line_of(last) - lines.line_of(body.span.start) + 1
}

fn measure_with_nested<'a>(
    body: &'a Block,
    lines: &LineIndex,
    token: &CancellationToken,
) -> SymtoolResult<(Complexity, Vec<&'a FuncLit>)> {
    let mut visitor = Measure::new(token);
    walk_block(&mut visitor, body);
    let complexity = Complexity {
        lines: line_count(lines, body),
        max_nesting: visitor.max_nesting,
        cyclomatic: visitor.cyclomatic,
    };
    visitor.check.finish((complexity, visitor.nested))
}

/// Measure one function body.
pub fn measure(body: &Block, lines: &LineIndex, token: &CancellationToken) -> SymtoolResult<Complexity> {
    measure_with_nested(body, lines, token).map(|(complexity, _)| complexity)
}

// ============================================================================
// Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionComplexity {
    /// `Name`, `Recv.Name` for methods, `Outer.funcN` for literals.
    pub name: String,
    pub file: String,
    pub line: u32,
    #[serde(flatten)]
    pub metrics: Complexity,
}

fn push_function(
    out: &mut Vec<FunctionComplexity>,
    file: &SourceFile,
    name: String,
    offset: usize,
    body: &Block,
    token: &CancellationToken,
) -> SymtoolResult<()> {
    let (metrics, nested) = measure_with_nested(body, file.lines(), token)?;
    out.push(FunctionComplexity {
        name: name.clone(),
        file: file.path.clone(),
        line: file.lines().line_of(offset),
        metrics,
    });
    push_literals(out, file, &name, nested, token)
}

fn push_literals(
    out: &mut Vec<FunctionComplexity>,
    file: &SourceFile,
    owner: &str,
    literals: Vec<&FuncLit>,
    token: &CancellationToken,
) -> SymtoolResult<()> {
    for (n, lit) in literals.into_iter().enumerate() {
        let name = format!("{}.func{}", owner, n + 1);
        push_function(out, file, name, lit.span.start, &lit.body, token)?;
    }
    Ok(())
}

/// Every function, method, and function literal in one file.
pub fn file_complexity(file: &SourceFile, token: &CancellationToken) -> SymtoolResult<Vec<FunctionComplexity>> {
    let mut out = Vec::new();
    for decl in &file.tree.decls {
        match decl {
            Decl::Func(func) => {
                let Some(body) = &func.body else { continue };
                let name = match func.receiver_type() {
                    Some((recv, _)) => format!("{}.{}", recv, func.name.name),
                    None => func.name.name.clone(),
                };
                push_function(&mut out, file, name, func.name.span.start, body, token)?;
            }
            Decl::Gen(gen) => {
                for spec in &gen.specs {
                    let Spec::Value(value) = spec else { continue };
                    let mut visitor = Measure::new(token);
                    for expr in &value.values {
                        walk_expr(&mut visitor, expr);
                    }
                    let literals = visitor.check.finish(visitor.nested)?;
                    let owner = value.names.first().map_or("_", |n| n.name.as_str());
                    push_literals(&mut out, file, owner, literals, token)?;
                }
            }
        }
    }
    Ok(out)
}

/// Functions with cyclomatic complexity of at least `min_cyclomatic`, most
/// complex first.
pub fn complexity_report(
    snapshot: &Snapshot,
    min_cyclomatic: u32,
    limit: usize,
    offset: usize,
    token: &CancellationToken,
) -> SymtoolResult<Paged<FunctionComplexity>> {
    let mut all = Vec::new();
    for file in &snapshot.files {
        all.extend(file_complexity(file, token)?);
    }
    all.retain(|f| f.metrics.cyclomatic >= min_cyclomatic);
    all.sort_by(|a, b| {
        b.metrics
            .cyclomatic
            .cmp(&a.metrics.cyclomatic)
            .then_with(|| (&a.file, a.line, &a.name).cmp(&(&b.file, b.line, &b.name)))
    });
    debug!(functions = all.len(), min_cyclomatic, "complexity report");
    paginate(all, limit, offset)
}
