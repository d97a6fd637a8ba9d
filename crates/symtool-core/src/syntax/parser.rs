//! Recursive-descent parser producing [`ast`](super::ast) nodes.
//!
//! Covers the statement and expression forms the syntax tree models. Binary
//! expressions use precedence climbing over the five Go precedence levels.
//! Inside `if`/`for`/`switch` headers a bare type name followed by `{` opens
//! the statement body, not a composite literal.

use super::ast::*;
use super::lexer::{tokenize, Token, TokenKind};
use super::ParseError;
use crate::types::Span;

type PResult<T> = Result<T, ParseError>;

/// Parse one standalone expression. Identifier ids start at zero and spans
/// are relative to `src`.
pub fn parse_expr(src: &str) -> PResult<Expr> {
    let mut parser = Parser::new(src, 0)?;
    parser.skip_semis();
    if parser.at_eof() {
        return Err(ParseError::new(0, "empty expression"));
    }
    let expr = parser.expr()?;
    parser.skip_semis();
    if !parser.at_eof() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

/// Parse a whole source file. Identifier ids are allocated from `next_id`,
/// which is advanced past the last id used.
pub fn parse_file(src: &str, next_id: &mut u32) -> PResult<File> {
    let mut parser = Parser::new(src, *next_id)?;
    let file = parser.file(src.len())?;
    *next_id = parser.next_id;
    Ok(file)
}

const ASSIGN_OPS: &[&str] = &[
    "=", ":=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", "&^=",
];

enum Param {
    Bare(Expr),
    Named(Ident, Expr),
}

enum Simple {
    Stmt(Stmt),
    Range {
        key: Option<Box<Expr>>,
        value: Option<Box<Expr>>,
        define: bool,
        x: Box<Expr>,
    },
}

struct Parser<'s> {
    tokens: Vec<Token<'s>>,
    pos: usize,
    next_id: u32,
    prev_end: usize,
    /// Set while parsing control clause headers.
    no_lit: bool,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str, first_id: u32) -> PResult<Self> {
        Ok(Parser {
            tokens: tokenize(src)?,
            pos: 0,
            next_id: first_id,
            prev_end: 0,
            no_lit: false,
        })
    }

    // ------------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------------

    fn peek(&self) -> Token<'s> {
        self.tokens[self.pos]
    }

    fn peek_at(&self, n: usize) -> Token<'s> {
        self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token<'s> {
        let tok = self.peek();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        if !tok.is_semi() {
            self.prev_end = tok.span.end;
        }
        tok
    }

    fn at(&self, text: &str) -> bool {
        self.peek().is(text)
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> PResult<Token<'s>> {
        if self.at(text) {
            Ok(self.bump())
        } else {
            Err(self.error(&format!("expected '{}'", text)))
        }
    }

    fn skip_semis(&mut self) {
        while self.peek().is_semi() {
            self.bump();
        }
    }

    /// Statement terminator; a closing `)` or `}` also ends a statement.
    fn expect_semi(&mut self) -> PResult<()> {
        if self.peek().is_semi() {
            self.bump();
            Ok(())
        } else if self.at(")") || self.at("}") || self.at_eof() {
            Ok(())
        } else {
            Err(self.error("expected ';' or newline"))
        }
    }

    fn error(&self, message: &str) -> ParseError {
        let tok = self.peek();
        let found = match tok.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Semi { auto: true } => "newline".to_string(),
            _ => format!("'{}'", tok.text),
        };
        ParseError::new(tok.span.start, format!("{}, found {}", message, found))
    }

    fn start(&self) -> usize {
        self.peek().span.start
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    fn ident(&mut self) -> PResult<Ident> {
        let tok = self.peek();
        if tok.kind != TokenKind::Ident {
            return Err(self.error("expected identifier"));
        }
        self.bump();
        let id = NodeId(self.next_id);
        self.next_id += 1;
        Ok(Ident::new(id, tok.text, tok.span))
    }

    fn ident_list(&mut self) -> PResult<Vec<Ident>> {
        let mut names = vec![self.ident()?];
        while self.eat(",") {
            names.push(self.ident()?);
        }
        Ok(names)
    }

    fn with_lit<T>(&mut self, allow: bool, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let saved = self.no_lit;
        self.no_lit = !allow;
        let result = f(self);
        self.no_lit = saved;
        result
    }

    // ------------------------------------------------------------------------
    // Files and declarations
    // ------------------------------------------------------------------------

    fn file(&mut self, len: usize) -> PResult<File> {
        self.skip_semis();
        self.expect("package")?;
        let package = self.ident()?;
        self.expect_semi()?;

        let mut imports = Vec::new();
        loop {
            self.skip_semis();
            if !self.eat("import") {
                break;
            }
            if self.eat("(") {
                loop {
                    self.skip_semis();
                    if self.at(")") {
                        break;
                    }
                    imports.push(self.import_spec()?);
                    self.expect_semi()?;
                }
                self.expect(")")?;
            } else {
                imports.push(self.import_spec()?);
            }
            self.expect_semi()?;
        }

        let mut decls = Vec::new();
        loop {
            self.skip_semis();
            if self.at_eof() {
                break;
            }
            let decl = if self.at("func") {
                Decl::Func(self.func_decl()?)
            } else if self.at("var") || self.at("const") || self.at("type") {
                Decl::Gen(self.gen_decl()?)
            } else {
                return Err(self.error("expected declaration"));
            };
            decls.push(decl);
            self.expect_semi()?;
        }

        Ok(File {
            package,
            imports,
            decls,
            span: Span::new(0, len),
        })
    }

    fn import_spec(&mut self) -> PResult<ImportSpec> {
        let start = self.start();
        let name = match self.peek().kind {
            TokenKind::Ident => Some(self.ident()?),
            _ if self.at(".") => {
                let tok = self.bump();
                let id = NodeId(self.next_id);
                self.next_id += 1;
                Some(Ident::new(id, ".", tok.span))
            }
            _ => None,
        };
        let tok = self.peek();
        if tok.kind != TokenKind::String {
            return Err(self.error("expected import path"));
        }
        self.bump();
        let path = tok.text.trim_matches(|c| c == '"' || c == '`').to_string();
        Ok(ImportSpec {
            name,
            path,
            span: self.span_from(start),
        })
    }

    fn func_decl(&mut self) -> PResult<FuncDecl> {
        let start = self.start();
        self.expect("func")?;
        let recv = if self.at("(") {
            let recv_start = self.start();
            let mut params = self.param_list()?;
            if params.len() != 1 {
                return Err(ParseError::new(recv_start, "method has multiple receivers"));
            }
            Some(Box::new(params.remove(0)))
        } else {
            None
        };
        let name = self.ident()?;
        let ty = self.func_signature(self.start())?;
        let body = if self.at("{") {
            Some(self.with_lit(true, |p| p.block())?)
        } else {
            None
        };
        Ok(FuncDecl {
            recv,
            name,
            ty,
            body,
            span: self.span_from(start),
        })
    }

    fn gen_decl(&mut self) -> PResult<GenDecl> {
        let start = self.start();
        let tok = match self.bump().text {
            "var" => DeclToken::Var,
            "const" => DeclToken::Const,
            _ => DeclToken::Type,
        };
        let mut specs = Vec::new();
        if self.eat("(") {
            loop {
                self.skip_semis();
                if self.at(")") {
                    break;
                }
                specs.push(self.spec(tok)?);
                self.expect_semi()?;
            }
            self.expect(")")?;
        } else {
            specs.push(self.spec(tok)?);
        }
        Ok(GenDecl {
            tok,
            specs,
            span: self.span_from(start),
        })
    }

    fn spec(&mut self, tok: DeclToken) -> PResult<Spec> {
        let start = self.start();
        if tok == DeclToken::Type {
            let name = self.ident()?;
            self.eat("=");
            let ty = self.parse_type()?;
            return Ok(Spec::Type(TypeSpec {
                name,
                ty,
                span: self.span_from(start),
            }));
        }
        let names = self.ident_list()?;
        let ty = if !self.at("=") && !self.peek().is_semi() && !self.at(")") && !self.at_eof() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let values = if self.eat("=") {
            self.expr_list()?
        } else {
            Vec::new()
        };
        Ok(Spec::Value(ValueSpec {
            names,
            ty,
            values,
            span: self.span_from(start),
        }))
    }

    // ------------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------------

    fn type_start_at(&self, n: usize) -> bool {
        let tok = self.peek_at(n);
        tok.kind == TokenKind::Ident
            || ["*", "[", "map", "chan", "func", "struct", "interface", "<-", "..."]
                .iter()
                .any(|t| tok.is(t))
    }

    fn parse_type(&mut self) -> PResult<Expr> {
        let tok = self.peek();
        let start = tok.span.start;
        if tok.kind == TokenKind::Ident {
            let ident = self.ident()?;
            if self.at(".") && self.peek_at(1).kind == TokenKind::Ident {
                self.bump();
                let sel = self.ident()?;
                return Ok(Expr::Selector(SelectorExpr {
                    x: Box::new(Expr::Ident(ident)),
                    sel,
                    span: self.span_from(start),
                }));
            }
            return Ok(Expr::Ident(ident));
        }
        if tok.kind != TokenKind::Op && tok.kind != TokenKind::Keyword {
            return Err(self.error("expected type"));
        }
        match tok.text {
            "*" => {
                self.bump();
                let x = self.parse_type()?;
                Ok(Expr::Star(StarExpr {
                    x: Box::new(x),
                    span: self.span_from(start),
                }))
            }
            "(" => {
                self.bump();
                let x = self.parse_type()?;
                self.expect(")")?;
                Ok(Expr::Paren(ParenExpr {
                    x: Box::new(x),
                    span: self.span_from(start),
                }))
            }
            "[" => {
                self.bump();
                let len = if self.eat("]") {
                    None
                } else {
                    let len = if self.at("...") {
                        let dots = self.bump();
                        Expr::Ellipsis(Ellipsis {
                            elt: None,
                            span: dots.span,
                        })
                    } else {
                        self.with_lit(true, |p| p.expr())?
                    };
                    self.expect("]")?;
                    Some(Box::new(len))
                };
                let elem = self.parse_type()?;
                Ok(Expr::ArrayType(ArrayType {
                    len,
                    elem: Box::new(elem),
                    span: self.span_from(start),
                }))
            }
            "map" => {
                self.bump();
                self.expect("[")?;
                let key = self.parse_type()?;
                self.expect("]")?;
                let value = self.parse_type()?;
                Ok(Expr::MapType(MapType {
                    key: Box::new(key),
                    value: Box::new(value),
                    span: self.span_from(start),
                }))
            }
            "chan" | "<-" => {
                let dir = if self.eat("<-") {
                    self.expect("chan")?;
                    ChanDir::Recv
                } else {
                    self.bump();
                    if self.eat("<-") {
                        ChanDir::Send
                    } else {
                        ChanDir::Both
                    }
                };
                let value = self.parse_type()?;
                Ok(Expr::ChanType(ChanType {
                    dir,
                    value: Box::new(value),
                    span: self.span_from(start),
                }))
            }
            "func" => {
                self.bump();
                Ok(Expr::FuncType(self.func_signature(start)?))
            }
            "struct" => self.struct_type(),
            "interface" => self.interface_type(),
            "..." => {
                self.bump();
                let elt = self.parse_type()?;
                Ok(Expr::Ellipsis(Ellipsis {
                    elt: Some(Box::new(elt)),
                    span: self.span_from(start),
                }))
            }
            _ => Err(self.error("expected type")),
        }
    }

    /// Parameters and results, starting at the opening `(`.
    fn func_signature(&mut self, start: usize) -> PResult<FuncType> {
        let params = self.param_list()?;
        let results = if self.at("(") {
            self.param_list()?
        } else if self.type_start_at(0) && !self.at("...") {
            let ty = self.parse_type()?;
            let span = ty.span();
            vec![Field {
                names: Vec::new(),
                ty,
                span,
            }]
        } else {
            Vec::new()
        };
        Ok(FuncType {
            params,
            results,
            span: self.span_from(start),
        })
    }

    fn param_list(&mut self) -> PResult<Vec<Field>> {
        self.expect("(")?;
        let entries = self.with_lit(true, |p| {
            let mut entries = Vec::new();
            while !p.at(")") {
                let first = p.parse_type()?;
                if p.at(",") || p.at(")") {
                    entries.push(Param::Bare(first));
                } else {
                    let name = match first {
                        Expr::Ident(ident) => ident,
                        other => {
                            return Err(ParseError::new(
                                other.span().start,
                                "expected parameter name",
                            ))
                        }
                    };
                    let ty = p.parse_type()?;
                    entries.push(Param::Named(name, ty));
                }
                if !p.eat(",") {
                    break;
                }
            }
            Ok(entries)
        })?;
        self.expect(")")?;

        let any_named = entries.iter().any(|e| matches!(e, Param::Named(..)));
        if !any_named {
            return Ok(entries
                .into_iter()
                .filter_map(|e| match e {
                    Param::Bare(ty) => {
                        let span = ty.span();
                        Some(Field {
                            names: Vec::new(),
                            ty,
                            span,
                        })
                    }
                    Param::Named(..) => None,
                })
                .collect());
        }

        let mut fields = Vec::new();
        let mut pending: Vec<Ident> = Vec::new();
        for entry in entries {
            match entry {
                Param::Bare(Expr::Ident(ident)) => pending.push(ident),
                Param::Bare(other) => {
                    return Err(ParseError::new(
                        other.span().start,
                        "mixed named and unnamed parameters",
                    ))
                }
                Param::Named(name, ty) => {
                    pending.push(name);
                    let span = Span::new(pending[0].span.start, ty.span().end);
                    fields.push(Field {
                        names: std::mem::take(&mut pending),
                        ty,
                        span,
                    });
                }
            }
        }
        if let Some(last) = pending.first() {
            return Err(ParseError::new(last.span.start, "missing parameter type"));
        }
        Ok(fields)
    }

    fn struct_type(&mut self) -> PResult<Expr> {
        let start = self.start();
        self.expect("struct")?;
        self.expect("{")?;
        let mut fields = Vec::new();
        loop {
            self.skip_semis();
            if self.at("}") {
                break;
            }
            let field_start = self.start();
            let named = self.peek().kind == TokenKind::Ident
                && (self.peek_at(1).is(",") || self.type_start_at(1));
            let (names, ty) = if named {
                let names = self.ident_list()?;
                (names, self.parse_type()?)
            } else {
                (Vec::new(), self.parse_type()?)
            };
            if self.peek().kind == TokenKind::String {
                self.bump();
            }
            fields.push(Field {
                names,
                ty,
                span: self.span_from(field_start),
            });
            self.expect_semi()?;
        }
        self.expect("}")?;
        Ok(Expr::StructType(StructType {
            fields,
            span: self.span_from(start),
        }))
    }

    fn interface_type(&mut self) -> PResult<Expr> {
        let start = self.start();
        self.expect("interface")?;
        self.expect("{")?;
        let mut methods = Vec::new();
        loop {
            self.skip_semis();
            if self.at("}") {
                break;
            }
            let entry_start = self.start();
            if self.peek().kind == TokenKind::Ident && self.peek_at(1).is("(") {
                let name = self.ident()?;
                let sig = self.func_signature(self.start())?;
                methods.push(Field {
                    names: vec![name],
                    ty: Expr::FuncType(sig),
                    span: self.span_from(entry_start),
                });
            } else {
                let ty = self.parse_type()?;
                methods.push(Field {
                    names: Vec::new(),
                    ty,
                    span: self.span_from(entry_start),
                });
            }
            self.expect_semi()?;
        }
        self.expect("}")?;
        Ok(Expr::InterfaceType(InterfaceType {
            methods,
            span: self.span_from(start),
        }))
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn block(&mut self) -> PResult<Block> {
        let start = self.start();
        self.expect("{")?;
        let stmts = self.stmt_list()?;
        self.expect("}")?;
        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    fn stmt_list(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_semis();
            if self.at("}") || self.at("case") || self.at("default") || self.at_eof() {
                break;
            }
            stmts.push(self.stmt()?);
            self.expect_semi()?;
        }
        Ok(stmts)
    }

    fn stmt(&mut self) -> PResult<Stmt> {
        let tok = self.peek();
        let start = tok.span.start;
        if tok.kind == TokenKind::Keyword {
            match tok.text {
                "var" | "const" | "type" => return Ok(Stmt::Decl(self.gen_decl()?)),
                "return" => {
                    self.bump();
                    let results = if self.peek().is_semi() || self.at("}") || self.at_eof() {
                        Vec::new()
                    } else {
                        self.expr_list()?
                    };
                    return Ok(Stmt::Return(ReturnStmt {
                        results,
                        span: self.span_from(start),
                    }));
                }
                "break" | "continue" | "goto" | "fallthrough" => {
                    self.bump();
                    let label = if self.peek().kind == TokenKind::Ident {
                        Some(self.ident()?)
                    } else {
                        None
                    };
                    return Ok(Stmt::Branch(BranchStmt {
                        tok: tok.text.to_string(),
                        label,
                        span: self.span_from(start),
                    }));
                }
                "if" => return Ok(Stmt::If(self.if_stmt()?)),
                "for" => return self.for_stmt(),
                "switch" => return self.switch_stmt(),
                "select" => return self.select_stmt(),
                "go" | "defer" => {
                    self.bump();
                    let call = self.expr()?;
                    let stmt = CallStmt {
                        call,
                        span: self.span_from(start),
                    };
                    return Ok(if tok.text == "go" {
                        Stmt::Go(stmt)
                    } else {
                        Stmt::Defer(stmt)
                    });
                }
                _ => {}
            }
        }
        if tok.is("{") {
            return Ok(Stmt::Block(self.block()?));
        }
        self.simple_stmt(false)?.into_stmt()
    }

    fn simple_stmt(&mut self, range_ok: bool) -> PResult<Simple> {
        let start = self.start();
        if range_ok && self.eat("range") {
            let x = Box::new(self.expr()?);
            return Ok(Simple::Range {
                key: None,
                value: None,
                define: false,
                x,
            });
        }
        let lhs = self.expr_list()?;
        let tok = self.peek();
        if tok.kind == TokenKind::Op {
            if ASSIGN_OPS.contains(&tok.text) {
                self.bump();
                if range_ok && (tok.text == "=" || tok.text == ":=") && self.eat("range") {
                    let x = Box::new(self.expr()?);
                    let mut lhs = lhs.into_iter().map(Box::new);
                    return Ok(Simple::Range {
                        key: lhs.next(),
                        value: lhs.next(),
                        define: tok.text == ":=",
                        x,
                    });
                }
                let rhs = self.expr_list()?;
                return Ok(Simple::Stmt(Stmt::Assign(AssignStmt {
                    lhs,
                    tok: tok.text.to_string(),
                    rhs,
                    span: self.span_from(start),
                })));
            }
            if tok.text == "++" || tok.text == "--" {
                self.bump();
                let x = single(lhs, start)?;
                return Ok(Simple::Stmt(Stmt::IncDec(IncDecStmt {
                    x,
                    inc: tok.text == "++",
                    span: self.span_from(start),
                })));
            }
            if tok.text == "<-" {
                self.bump();
                let chan = single(lhs, start)?;
                let value = self.expr()?;
                return Ok(Simple::Stmt(Stmt::Send(SendStmt {
                    chan,
                    value,
                    span: self.span_from(start),
                })));
            }
        }
        Ok(Simple::Stmt(Stmt::Expr(single(lhs, start)?)))
    }

    fn if_stmt(&mut self) -> PResult<IfStmt> {
        let start = self.start();
        self.expect("if")?;
        let (init, cond) = self.with_lit(false, |p| {
            let first = p.simple_stmt(false)?.into_stmt()?;
            if p.peek().is_semi() {
                p.bump();
                let cond = p.expr()?;
                Ok((Some(Box::new(first)), cond))
            } else {
                Ok((None, stmt_into_expr(first)?))
            }
        })?;
        let body = self.block()?;
        let els = if self.eat("else") {
            if self.at("if") {
                Some(Box::new(Stmt::If(self.if_stmt()?)))
            } else if self.at("{") {
                Some(Box::new(Stmt::Block(self.block()?)))
            } else {
                return Err(self.error("expected 'if' or block after 'else'"));
            }
        } else {
            None
        };
        Ok(IfStmt {
            init,
            cond,
            body,
            els,
            span: self.span_from(start),
        })
    }

    fn for_stmt(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect("for")?;
        if self.at("{") {
            let body = self.block()?;
            return Ok(Stmt::For(ForStmt {
                init: None,
                cond: None,
                post: None,
                body,
                span: self.span_from(start),
            }));
        }

        enum Header {
            Loop(Option<Box<Stmt>>, Option<Expr>, Option<Box<Stmt>>),
            Range(Option<Box<Expr>>, Option<Box<Expr>>, bool, Box<Expr>),
        }

        let header = self.with_lit(false, |p| {
            let mut init = None;
            let mut cond = None;
            let mut post = None;
            if !p.peek().is_semi() {
                match p.simple_stmt(true)? {
                    Simple::Range {
                        key,
                        value,
                        define,
                        x,
                    } => return Ok(Header::Range(key, value, define, x)),
                    Simple::Stmt(stmt) => {
                        if p.peek().is_semi() {
                            init = Some(Box::new(stmt));
                        } else {
                            cond = Some(stmt_into_expr(stmt)?);
                        }
                    }
                }
            }
            if p.peek().is_semi() {
                p.bump();
                if !p.peek().is_semi() {
                    cond = Some(p.expr()?);
                }
                if !p.peek().is_semi() {
                    return Err(p.error("expected ';' in for clause"));
                }
                p.bump();
                if !p.at("{") {
                    post = Some(Box::new(p.simple_stmt(false)?.into_stmt()?));
                }
            }
            Ok(Header::Loop(init, cond, post))
        })?;

        let body = self.block()?;
        let span = self.span_from(start);
        Ok(match header {
            Header::Loop(init, cond, post) => Stmt::For(ForStmt {
                init,
                cond,
                post,
                body,
                span,
            }),
            Header::Range(key, value, define, x) => Stmt::Range(RangeStmt {
                key,
                value,
                define,
                x,
                body,
                span,
            }),
        })
    }

    fn switch_stmt(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect("switch")?;
        let (init, tag) = self.with_lit(false, |p| {
            let mut init = None;
            let mut tag = None;
            if !p.at("{") {
                let first = if p.peek().is_semi() {
                    None
                } else {
                    Some(p.simple_stmt(false)?.into_stmt()?)
                };
                if p.peek().is_semi() {
                    p.bump();
                    init = first.map(Box::new);
                    if !p.at("{") {
                        tag = Some(p.simple_stmt(false)?.into_stmt()?);
                    }
                } else {
                    tag = first;
                }
            }
            Ok((init, tag))
        })?;

        self.expect("{")?;
        let mut clauses = Vec::new();
        loop {
            self.skip_semis();
            if self.at("}") {
                break;
            }
            clauses.push(self.case_clause()?);
        }
        self.expect("}")?;
        let span = self.span_from(start);

        match tag {
            Some(guard) if is_type_switch_guard(&guard) => Ok(Stmt::TypeSwitch(TypeSwitchStmt {
                init,
                assign: Box::new(guard),
                clauses,
                span,
            })),
            tag => Ok(Stmt::Switch(SwitchStmt {
                init,
                tag: tag.map(stmt_into_expr).transpose()?,
                clauses,
                span,
            })),
        }
    }

    fn case_clause(&mut self) -> PResult<CaseClause> {
        let start = self.start();
        let list = if self.eat("case") {
            self.expr_list()?
        } else {
            self.expect("default")?;
            Vec::new()
        };
        self.expect(":")?;
        let body = self.stmt_list()?;
        Ok(CaseClause {
            list,
            body,
            span: self.span_from(start),
        })
    }

    fn select_stmt(&mut self) -> PResult<Stmt> {
        let start = self.start();
        self.expect("select")?;
        self.expect("{")?;
        let mut clauses = Vec::new();
        loop {
            self.skip_semis();
            if self.at("}") {
                break;
            }
            let clause_start = self.start();
            let comm = if self.eat("case") {
                Some(Box::new(self.simple_stmt(false)?.into_stmt()?))
            } else {
                self.expect("default")?;
                None
            };
            self.expect(":")?;
            let body = self.stmt_list()?;
            clauses.push(CommClause {
                comm,
                body,
                span: self.span_from(clause_start),
            });
        }
        self.expect("}")?;
        Ok(Stmt::Select(SelectStmt {
            clauses,
            span: self.span_from(start),
        }))
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn expr_list(&mut self) -> PResult<Vec<Expr>> {
        let mut exprs = vec![self.expr()?];
        while self.eat(",") {
            exprs.push(self.expr()?);
        }
        Ok(exprs)
    }

    fn expr(&mut self) -> PResult<Expr> {
        self.binary_expr(1)
    }

    fn binary_expr(&mut self, min_prec: u8) -> PResult<Expr> {
        let mut x = self.unary_expr()?;
        loop {
            let tok = self.peek();
            let op = match (tok.kind, BinaryOp::from_token(tok.text)) {
                (TokenKind::Op, Some(op)) if op.precedence() >= min_prec => op,
                _ => break,
            };
            self.bump();
            let y = self.binary_expr(op.precedence() + 1)?;
            let span = x.span().to(y.span());
            x = Expr::Binary(BinaryExpr {
                op,
                x: Box::new(x),
                y: Box::new(y),
                span,
            });
        }
        Ok(x)
    }

    fn unary_expr(&mut self) -> PResult<Expr> {
        let tok = self.peek();
        if tok.kind == TokenKind::Op {
            if tok.text == "*" {
                self.bump();
                let x = self.unary_expr()?;
                let span = tok.span.to(x.span());
                return Ok(Expr::Star(StarExpr {
                    x: Box::new(x),
                    span,
                }));
            }
            if let Some(op) = UnaryOp::from_token(tok.text) {
                self.bump();
                let x = self.unary_expr()?;
                let span = tok.span.to(x.span());
                return Ok(Expr::Unary(UnaryExpr {
                    op,
                    x: Box::new(x),
                    span,
                }));
            }
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> PResult<Expr> {
        let mut x = self.operand()?;
        loop {
            let start = x.span().start;
            if self.eat(".") {
                if self.eat("(") {
                    let ty = if self.eat("type") {
                        None
                    } else {
                        Some(Box::new(self.parse_type()?))
                    };
                    self.expect(")")?;
                    x = Expr::TypeAssert(TypeAssertExpr {
                        x: Box::new(x),
                        ty,
                        span: self.span_from(start),
                    });
                } else {
                    let sel = self.ident()?;
                    x = Expr::Selector(SelectorExpr {
                        x: Box::new(x),
                        sel,
                        span: self.span_from(start),
                    });
                }
            } else if self.eat("[") {
                x = self.with_lit(true, |p| {
                    let low = if p.at(":") { None } else { Some(p.expr()?) };
                    if p.eat(":") {
                        let high = if p.at("]") || p.at(":") {
                            None
                        } else {
                            Some(Box::new(p.expr()?))
                        };
                        let max = if p.eat(":") {
                            if high.is_none() {
                                return Err(p.error("middle index required in 3-index slice"));
                            }
                            if p.at("]") {
                                return Err(p.error("final index required in 3-index slice"));
                            }
                            Some(Box::new(p.expr()?))
                        } else {
                            None
                        };
                        p.expect("]")?;
                        Ok(Expr::Slice(SliceExpr {
                            x: Box::new(x),
                            low: low.map(Box::new),
                            high,
                            max,
                            span: p.span_from(start),
                        }))
                    } else {
                        let index = low.ok_or_else(|| p.error("expected index expression"))?;
                        p.expect("]")?;
                        Ok(Expr::Index(IndexExpr {
                            x: Box::new(x),
                            index: Box::new(index),
                            span: p.span_from(start),
                        }))
                    }
                })?;
            } else if self.eat("(") {
                let (args, ellipsis) = self.with_lit(true, |p| {
                    let mut args = Vec::new();
                    let mut ellipsis = false;
                    loop {
                        p.skip_semis();
                        if p.at(")") {
                            break;
                        }
                        args.push(p.expr()?);
                        if p.eat("...") {
                            ellipsis = true;
                        }
                        if !p.eat(",") {
                            break;
                        }
                    }
                    p.skip_semis();
                    Ok((args, ellipsis))
                })?;
                self.expect(")")?;
                x = Expr::Call(CallExpr {
                    fun: Box::new(x),
                    args,
                    ellipsis,
                    span: self.span_from(start),
                });
            } else if self.at("{") && self.literal_allowed(&x) {
                x = self.composite_lit(Some(x))?;
            } else {
                break;
            }
        }
        Ok(x)
    }

    fn literal_allowed(&self, ty: &Expr) -> bool {
        match ty {
            Expr::Ident(_) | Expr::Index(_) => !self.no_lit,
            Expr::Selector(sel) => !self.no_lit && matches!(sel.x.as_ref(), Expr::Ident(_)),
            Expr::ArrayType(_) | Expr::MapType(_) | Expr::StructType(_) => true,
            _ => false,
        }
    }

    fn operand(&mut self) -> PResult<Expr> {
        let tok = self.peek();
        let start = tok.span.start;
        let lit_kind = match tok.kind {
            TokenKind::Ident => return Ok(Expr::Ident(self.ident()?)),
            TokenKind::Int => Some(LitKind::Int),
            TokenKind::Float => Some(LitKind::Float),
            TokenKind::Imag => Some(LitKind::Imag),
            TokenKind::Char => Some(LitKind::Char),
            TokenKind::String => Some(LitKind::String),
            _ => None,
        };
        if let Some(kind) = lit_kind {
            self.bump();
            return Ok(Expr::BasicLit(BasicLit {
                kind,
                value: tok.text.to_string(),
                span: tok.span,
            }));
        }
        if tok.is("(") {
            self.bump();
            let x = self.with_lit(true, |p| p.expr())?;
            self.expect(")")?;
            return Ok(Expr::Paren(ParenExpr {
                x: Box::new(x),
                span: self.span_from(start),
            }));
        }
        if tok.is("func") {
            self.bump();
            let ty = self.func_signature(start)?;
            if self.at("{") {
                let body = self.with_lit(true, |p| p.block())?;
                return Ok(Expr::FuncLit(FuncLit {
                    ty,
                    body,
                    span: self.span_from(start),
                }));
            }
            return Ok(Expr::FuncType(ty));
        }
        if ["[", "map", "chan", "struct", "interface"]
            .iter()
            .any(|t| tok.is(t))
        {
            return self.parse_type();
        }
        Err(self.error("expected expression"))
    }

    fn composite_lit(&mut self, ty: Option<Expr>) -> PResult<Expr> {
        let start = match &ty {
            Some(ty) => ty.span().start,
            None => self.start(),
        };
        self.expect("{")?;
        let elts = self.with_lit(true, |p| {
            let mut elts = Vec::new();
            loop {
                p.skip_semis();
                if p.at("}") {
                    break;
                }
                let elt = p.element()?;
                let elt = if p.eat(":") {
                    let value = p.element()?;
                    let span = elt.span().to(value.span());
                    Expr::KeyValue(KeyValueExpr {
                        key: Box::new(elt),
                        value: Box::new(value),
                        span,
                    })
                } else {
                    elt
                };
                elts.push(elt);
                if !p.eat(",") {
                    break;
                }
            }
            p.skip_semis();
            Ok(elts)
        })?;
        self.expect("}")?;
        Ok(Expr::CompositeLit(CompositeLit {
            ty: ty.map(Box::new),
            elts,
            span: self.span_from(start),
        }))
    }

    fn element(&mut self) -> PResult<Expr> {
        if self.at("{") {
            self.composite_lit(None)
        } else {
            self.expr()
        }
    }
}

impl Simple {
    fn into_stmt(self) -> PResult<Stmt> {
        match self {
            Simple::Stmt(stmt) => Ok(stmt),
            Simple::Range { x, .. } => Err(ParseError::new(
                x.span().start,
                "range clause outside of for statement",
            )),
        }
    }
}

fn single(mut exprs: Vec<Expr>, start: usize) -> PResult<Expr> {
    if exprs.len() != 1 {
        return Err(ParseError::new(start, "expected a single expression"));
    }
    Ok(exprs.remove(0))
}

fn stmt_into_expr(stmt: Stmt) -> PResult<Expr> {
    match stmt {
        Stmt::Expr(expr) => Ok(expr),
        other => Err(ParseError::new(other.span().start, "expected expression")),
    }
}

fn is_type_assert_guard(expr: &Expr) -> bool {
    matches!(expr, Expr::TypeAssert(assert) if assert.ty.is_none())
}

fn is_type_switch_guard(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(expr) => is_type_assert_guard(expr),
        Stmt::Assign(assign) => {
            assign.is_define() && assign.rhs.len() == 1 && is_type_assert_guard(&assign.rhs[0])
        }
        _ => false,
    }
}
