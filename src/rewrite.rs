//! Structural find-and-replace over expressions.
//!
//! The find pattern is matched against every expression node by shape:
//! same variant, same operator or literal value, and recursively equal
//! children. Layout and comments never matter. Variants with no dedicated
//! rule (function literals and type expressions) compare by canonical text.
//!
//! A matched node is replaced by the replacement pattern's text, wrapped in
//! parentheses when the surrounding operator binds tighter. Matched subtrees
//! are not searched further.

use serde::Serialize;
use symtool_core::error::{SymtoolError, SymtoolResult};
use symtool_core::patch::{apply_edits, apply_pending, Applied, Edit, PendingFile};
use symtool_core::snapshot::{Snapshot, SourceFile};
use symtool_core::syntax::lexer::tokenize;
use symtool_core::syntax::visit::walk_file;
use symtool_core::syntax::{canonical_text, parse_expr, Expr, VisitResult, Visitor};
use symtool_core::types::Span;
use tracing::{debug, info};

use crate::cancel::{CancelCheck, CancellationToken};

/// A parsed find/replace pair.
#[derive(Debug, Clone)]
pub struct Pattern {
    find: Expr,
    find_src: String,
    replace: Expr,
    replace_src: String,
}

impl Pattern {
    /// Parse both sides; either failing is `InvalidInput`.
    pub fn parse(find: &str, replace: &str) -> SymtoolResult<Self> {
        let find_expr = parse_expr(find).map_err(|e| {
            SymtoolError::invalid_input(format!("invalid find pattern '{}': {}", find, e))
        })?;
        let replace_expr = parse_expr(replace).map_err(|e| {
            SymtoolError::invalid_input(format!("invalid replace pattern '{}': {}", replace, e))
        })?;
        Ok(Pattern {
            find: find_expr,
            find_src: find.to_string(),
            replace: replace_expr,
            replace_src: replace.trim().to_string(),
        })
    }

    /// Whether `node` (from `src`) matches the find pattern.
    pub fn matches(&self, node: &Expr, src: &str) -> bool {
        structurally_equal(node, src, &self.find, &self.find_src)
    }

    /// Replacement text for a match at `matched` in `src` whose parent
    /// expression is `parent`.
    fn replacement_for(&self, parent: Option<&Expr>, matched: Span, src: &str) -> String {
        let before = src.get(..matched.start).and_then(|s| s.chars().next_back());
        if needs_parens(parent, matched, &self.replace) || glues(before, &self.replace_src) {
            format!("({})", self.replace_src)
        } else {
            self.replace_src.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RewriteResult {
    pub find: String,
    pub replace: String,
    pub dry_run: bool,
    pub total_changes: usize,
    #[serde(flatten)]
    pub applied: Applied,
}

impl RewriteResult {
    pub fn changed_files(&self) -> &[String] {
        &self.applied.changed_files
    }
}

/// Replace every expression matching `find` with `replace`.
pub fn rewrite(
    snapshot: &Snapshot,
    find: &str,
    replace: &str,
    dry_run: bool,
    token: &CancellationToken,
) -> SymtoolResult<RewriteResult> {
    let pattern = Pattern::parse(find, replace)?;

    let mut pending = Vec::new();
    let mut total_changes = 0;
    for file in &snapshot.files {
        let edits = match_edits(&pattern, file, token)?;
        if edits.is_empty() {
            continue;
        }
        debug!(file = %file.path, matches = edits.len(), "pattern matched");
        total_changes += edits.len();
        pending.push(PendingFile {
            path: file.path.clone(),
            original: file.source.clone(),
            updated: apply_edits(&file.source, &edits)?,
            edits: edits.len(),
        });
    }

    let applied = apply_pending(snapshot.root(), &pending, dry_run)?;
    if !dry_run {
        info!(
            find,
            replace,
            changes = total_changes,
            files = applied.changed_files.len(),
            "rewrote expressions"
        );
    }
    Ok(RewriteResult {
        find: find.to_string(),
        replace: replace.to_string(),
        dry_run,
        total_changes,
        applied,
    })
}

// ============================================================================
// Matching
// ============================================================================

struct MatchCollector<'p, 'a> {
    pattern: &'p Pattern,
    source: &'a str,
    check: CancelCheck<'p>,
    parents: Vec<&'a Expr>,
    edits: Vec<Edit>,
}

impl<'a> Visitor<'a> for MatchCollector<'_, 'a> {
    fn enter_node(&mut self) -> VisitResult {
        self.check.poll()
    }

    fn visit_expr(&mut self, node: &'a Expr) -> VisitResult {
        if self.pattern.matches(node, self.source) {
            let span = node.span();
            let text = self
                .pattern
                .replacement_for(self.parents.last().copied(), span, self.source);
            self.edits.push(Edit::replace(span, text));
            self.parents.push(node);
            return VisitResult::SkipChildren;
        }
        self.parents.push(node);
        VisitResult::Continue
    }

    fn leave_expr(&mut self, _node: &'a Expr) {
        self.parents.pop();
    }
}

fn match_edits(
    pattern: &Pattern,
    file: &SourceFile,
    token: &CancellationToken,
) -> SymtoolResult<Vec<Edit>> {
    let mut collector = MatchCollector {
        pattern,
        source: &file.source,
        check: CancelCheck::new(token),
        parents: Vec::new(),
        edits: Vec::new(),
    };
    walk_file(&mut collector, &file.tree);
    collector.check.finish(collector.edits)
}

fn slice(src: &str, span: Span) -> &str {
    src.get(span.start..span.end).unwrap_or_default()
}

fn opt_equal(a: Option<&Expr>, a_src: &str, b: Option<&Expr>, b_src: &str) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => structurally_equal(a, a_src, b, b_src),
        _ => false,
    }
}

fn all_equal(a: &[Expr], a_src: &str, b: &[Expr], b_src: &str) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| structurally_equal(x, a_src, y, b_src))
}

/// Shape equality of two expressions from (possibly) different sources.
pub fn structurally_equal(a: &Expr, a_src: &str, b: &Expr, b_src: &str) -> bool {
    let eq = |x: &Expr, y: &Expr| structurally_equal(x, a_src, y, b_src);
    match (a, b) {
        (Expr::Ident(x), Expr::Ident(y)) => x.name == y.name,
        (Expr::BasicLit(x), Expr::BasicLit(y)) => x.kind == y.kind && x.value == y.value,
        (Expr::Binary(x), Expr::Binary(y)) => x.op == y.op && eq(&x.x, &y.x) && eq(&x.y, &y.y),
        (Expr::Unary(x), Expr::Unary(y)) => x.op == y.op && eq(&x.x, &y.x),
        (Expr::Paren(x), Expr::Paren(y)) => eq(&x.x, &y.x),
        (Expr::Selector(x), Expr::Selector(y)) => x.sel.name == y.sel.name && eq(&x.x, &y.x),
        (Expr::Call(x), Expr::Call(y)) => {
            x.ellipsis == y.ellipsis
                && eq(&x.fun, &y.fun)
                && all_equal(&x.args, a_src, &y.args, b_src)
        }
        (Expr::Index(x), Expr::Index(y)) => eq(&x.x, &y.x) && eq(&x.index, &y.index),
        (Expr::Slice(x), Expr::Slice(y)) => {
            eq(&x.x, &y.x)
                && opt_equal(x.low.as_deref(), a_src, y.low.as_deref(), b_src)
                && opt_equal(x.high.as_deref(), a_src, y.high.as_deref(), b_src)
                && opt_equal(x.max.as_deref(), a_src, y.max.as_deref(), b_src)
        }
        (Expr::Star(x), Expr::Star(y)) => eq(&x.x, &y.x),
        (Expr::TypeAssert(x), Expr::TypeAssert(y)) => {
            eq(&x.x, &y.x) && opt_equal(x.ty.as_deref(), a_src, y.ty.as_deref(), b_src)
        }
        (Expr::CompositeLit(x), Expr::CompositeLit(y)) => {
            opt_equal(x.ty.as_deref(), a_src, y.ty.as_deref(), b_src)
                && all_equal(&x.elts, a_src, &y.elts, b_src)
        }
        (Expr::KeyValue(x), Expr::KeyValue(y)) => eq(&x.key, &y.key) && eq(&x.value, &y.value),
        (x, y) if x.kind_name() == y.kind_name() => {
            canonical_text(slice(a_src, x.span())) == canonical_text(slice(b_src, y.span()))
        }
        _ => false,
    }
}

// ============================================================================
// Parenthesization
// ============================================================================

/// Whether `replacement`, placed at `matched` under `parent`, must be wrapped
/// to keep its meaning.
fn needs_parens(parent: Option<&Expr>, matched: Span, replacement: &Expr) -> bool {
    let rank = match replacement {
        Expr::Binary(b) => b.op.precedence(),
        // Unary operands are fine everywhere except as a selector/call base.
        Expr::Unary(_) | Expr::Star(_) => 6,
        _ => return false,
    };
    let is_base = |base: &Expr| base.span() == matched;
    match parent {
        Some(Expr::Binary(p)) => {
            let outer = p.op.precedence();
            rank < outer || (rank == outer && p.y.span() == matched)
        }
        Some(Expr::Unary(_)) | Some(Expr::Star(_)) => rank < 6,
        Some(Expr::Selector(p)) => is_base(&p.x),
        Some(Expr::Call(p)) => is_base(&p.fun),
        Some(Expr::Index(p)) => is_base(&p.x),
        Some(Expr::Slice(p)) => is_base(&p.x),
        Some(Expr::TypeAssert(p)) => is_base(&p.x),
        _ => false,
    }
}

/// Whether `replacement` placed right after `before` would lex differently,
/// as `-` followed by `-y` becomes `--`.
fn glues(before: Option<char>, replacement: &str) -> bool {
    let Some(before) = before.filter(|c| !c.is_whitespace()) else {
        return false;
    };
    let joined = format!("{}{}", before, replacement);
    match tokenize(&joined) {
        Ok(tokens) => tokens
            .first()
            .is_none_or(|first| first.span.end != before.len_utf8()),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{snapshot_from_sources, FixtureBuilder};
    use std::fs;
    use symtool_core::diff::apply_unified_diff;
    use symtool_core::syntax::parse_file;
    use tempfile::TempDir;

    const MATH: &str = "package calc\n\nfunc f(a, b int) int {\n\tx := a + b\n\ty := (a + b) * 2\n\tz := a +\n\t\tb\n\treturn x + y + z\n}\n";

    fn dry(snap: &Snapshot, find: &str, replace: &str) -> RewriteResult {
        rewrite(snap, find, replace, true, &CancellationToken::new()).unwrap()
    }

    fn preview(result: &RewriteResult, original: &str) -> String {
        let diffs = result.applied.diffs.as_ref().unwrap();
        apply_unified_diff(original, &diffs[0].diff).unwrap()
    }

    mod matching {
        use super::*;

        #[test]
        fn layout_does_not_matter() {
            let snap = snapshot_from_sources(&[("calc.go", MATH)]).unwrap();
            let result = dry(&snap, "a+b", "add(a, b)");
            assert_eq!(result.total_changes, 3);
            let out = preview(&result, MATH);
            assert!(out.contains("\tx := add(a, b)\n"));
            assert!(out.contains("\ty := (add(a, b)) * 2\n"));
            assert!(out.contains("\tz := add(a, b)\n"));
            assert!(out.contains("return x + y + z"));
        }

        #[test]
        fn operators_and_operands_must_agree() {
            let snap = snapshot_from_sources(&[("calc.go", MATH)]).unwrap();
            assert_eq!(dry(&snap, "a - b", "0").total_changes, 0);
            assert_eq!(dry(&snap, "b + a", "0").total_changes, 0);
            // Left-associative: x + y is a subtree, y + z is not.
            assert_eq!(dry(&snap, "x + y", "s").total_changes, 1);
            assert_eq!(dry(&snap, "y + z", "s").total_changes, 0);
        }

        #[test]
        fn selectors_calls_and_literals() {
            let src = "package p\n\nimport \"strings\"\n\nfunc g(s string) bool {\n\treturn strings.Index(s, \"x\") >= 0 || strings.Index(s, `x`) >= 0\n}\n";
            let snap = snapshot_from_sources(&[("p.go", src)]).unwrap();
            let result = dry(&snap, "strings.Index(s, \"x\") >= 0", "strings.Contains(s, \"x\")");
            assert_eq!(result.total_changes, 1);
            let out = preview(&result, src);
            assert!(out.contains("return strings.Contains(s, \"x\") || strings.Index(s, `x`) >= 0"));
        }

        #[test]
        fn function_literals_compare_by_canonical_text() {
            let src = "package p\n\nfunc h() {\n\tk := func() int {\n\t\treturn 1 // one\n\t}\n\t_ = k\n}\n";
            let snap = snapshot_from_sources(&[("p.go", src)]).unwrap();
            let result = dry(&snap, "func() int { return 1 }", "one");
            assert_eq!(result.total_changes, 1);
            assert!(preview(&result, src).contains("\tk := one\n"));
        }
    }

    mod replacement {
        use super::*;

        #[test]
        fn binary_replacements_are_parenthesized_when_needed() {
            let src = "package p\n\nfunc d(n int) int {\n\tv := double(n)\n\treturn double(n) * 3\n}\n";
            let snap = snapshot_from_sources(&[("p.go", src)]).unwrap();
            let out = preview(&dry(&snap, "double(n)", "n + n"), src);
            assert!(out.contains("\tv := n + n\n"));
            assert!(out.contains("\treturn (n + n) * 3\n"));
        }

        #[test]
        fn unary_operators_never_merge_into_one_token() {
            let src = "package p\n\nfunc f(s T) {\n\ta := -s.n\n\tb := &s.n\n\tc := s.n\n\t_, _, _ = a, b, c\n}\n";
            let snap = snapshot_from_sources(&[("p.go", src)]).unwrap();

            let negated = preview(&dry(&snap, "s.n", "-s.m"), src);
            assert!(negated.contains("\ta := -(-s.m)\n"));
            assert!(negated.contains("\tb := &-s.m\n"));
            assert!(negated.contains("\tc := -s.m\n"));
            assert!(parse_file(&negated, &mut 0).is_ok());

            let addressed = preview(&dry(&snap, "s.n", "&s.m"), src);
            assert!(addressed.contains("\ta := -&s.m\n"));
            assert!(addressed.contains("\tb := &(&s.m)\n"));
            assert!(parse_file(&addressed, &mut 0).is_ok());
        }

        #[test]
        fn gluing_checks_the_preceding_character() {
            assert!(glues(Some('-'), "-y"));
            assert!(glues(Some('<'), "-ch"));
            assert!(glues(Some('/'), "*p"));
            assert!(!glues(Some('-'), "!y"));
            assert!(!glues(Some('('), "-y"));
            assert!(!glues(Some(' '), "-y"));
            assert!(!glues(None, "-y"));
        }

        #[test]
        fn parens_follow_precedence() {
            let add = parse_expr("a + b").unwrap();
            let mul = parse_expr("a * b").unwrap();
            let parent = parse_expr("x - y").unwrap();
            let Expr::Binary(p) = &parent else {
                panic!("expected binary");
            };
            assert!(!needs_parens(Some(&parent), p.x.span(), &add));
            assert!(needs_parens(Some(&parent), p.y.span(), &add));
            assert!(!needs_parens(Some(&parent), p.y.span(), &mul));
            assert!(!needs_parens(None, p.x.span(), &add));
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn malformed_patterns_are_invalid_input() {
            let snap = snapshot_from_sources(&[("calc.go", MATH)]).unwrap();
            let token = CancellationToken::new();
            for (find, replace) in [("a +", "b"), ("a", "(b"), ("", "b"), ("a b", "c")] {
                let err = rewrite(&snap, find, replace, true, &token).unwrap_err();
                assert!(matches!(err, SymtoolError::InvalidInput { .. }), "{find:?} -> {replace:?}");
            }
        }

        #[test]
        fn cancellation_is_reported() {
            let snap = snapshot_from_sources(&[("calc.go", MATH)]).unwrap();
            let token = CancellationToken::new();
            token.cancel();
            let err = rewrite(&snap, "a + b", "c", true, &token).unwrap_err();
            assert!(matches!(err, SymtoolError::Cancelled));
        }
    }

    mod writes {
        use super::*;

        #[test]
        fn real_run_matches_dry_run_preview() {
            let dir = TempDir::new().unwrap();
            fs::write(dir.path().join("calc.go"), MATH).unwrap();
            let snap = FixtureBuilder::new(dir.path()).file("calc.go", MATH).build().unwrap();
            let token = CancellationToken::new();

            let planned = rewrite(&snap, "a + b", "sum(a, b)", true, &token).unwrap();
            let expected = preview(&planned, MATH);
            assert_eq!(fs::read_to_string(dir.path().join("calc.go")).unwrap(), MATH);

            let done = rewrite(&snap, "a + b", "sum(a, b)", false, &token).unwrap();
            assert_eq!(done.changed_files(), ["calc.go"]);
            assert_eq!(done.total_changes, planned.total_changes);
            assert_eq!(fs::read_to_string(dir.path().join("calc.go")).unwrap(), expected);
        }
    }
}
