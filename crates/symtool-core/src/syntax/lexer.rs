//! Tokenizer for Go-style source and expression patterns.
//!
//! Token classes are recognized with `winnow` parsers; the driver loop
//! handles whitespace, comments, and automatic semicolon insertion: a newline
//! (or end of input) after an identifier, literal, `break`, `continue`,
//! `fallthrough`, `return`, `++`, `--`, `)`, `]`, or `}` produces a `;`.

use winnow::combinator::{alt, opt, repeat};
use winnow::error::ErrMode;
use winnow::prelude::*;
use winnow::token::{any, none_of, one_of, take_till, take_until, take_while};
use winnow::ModalResult;

use super::ParseError;
use crate::types::Span;

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    Int,
    Float,
    Imag,
    Char,
    String,
    Op,
    /// Explicit `;` or an inserted one (`auto == true`).
    Semi {
        auto: bool,
    },
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'s> {
    pub kind: TokenKind,
    pub text: &'s str,
    pub span: Span,
}

impl Token<'_> {
    /// True for an operator or keyword token with exactly this text.
    pub fn is(&self, text: &str) -> bool {
        matches!(self.kind, TokenKind::Op | TokenKind::Keyword) && self.text == text
    }

    pub fn is_semi(&self) -> bool {
        matches!(self.kind, TokenKind::Semi { .. })
    }

    fn ends_statement(&self) -> bool {
        match self.kind {
            TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Imag
            | TokenKind::Char
            | TokenKind::String => true,
            TokenKind::Keyword => {
                matches!(self.text, "break" | "continue" | "fallthrough" | "return")
            }
            TokenKind::Op => matches!(self.text, "++" | "--" | ")" | "]" | "}"),
            TokenKind::Semi { .. } | TokenKind::Eof => false,
        }
    }
}

pub const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Operators and punctuation, longest first.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "*", "/", "%", "&",
    "|", "^", "<", ">", "=", "!", "(", ")", "[", "]", "{", "}", ",", ";", ".", ":", "~",
];

// ============================================================================
// Driver
// ============================================================================

/// Split `src` into tokens, ending with a single `Eof` token.
pub fn tokenize(src: &str) -> Result<Vec<Token<'_>>, ParseError> {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut input = src;

    loop {
        input = input.trim_start_matches([' ', '\t', '\r']);
        let offset = src.len() - input.len();

        if input.is_empty() {
            insert_semi(&mut tokens, offset, "");
            tokens.push(Token {
                kind: TokenKind::Eof,
                text: "",
                span: Span::new(offset, offset),
            });
            return Ok(tokens);
        }

        if let Some(rest) = input.strip_prefix('\n') {
            insert_semi(&mut tokens, offset, &src[offset..offset + 1]);
            input = rest;
            continue;
        }

        if input.starts_with("//") {
            input = match input.find('\n') {
                Some(end) => &input[end..],
                None => "",
            };
            continue;
        }

        if input.starts_with("/*") {
            let body = block_comment(&mut input)
                .map_err(|_| ParseError::new(offset, "unterminated block comment"))?;
            if body.contains('\n') {
                insert_semi(&mut tokens, offset, "");
            }
            continue;
        }

        let (kind, text) = token(&mut input).map_err(|_| {
            let ch = input.chars().next().unwrap_or(' ');
            ParseError::new(offset, format!("unexpected character '{}'", ch))
        })?;
        tokens.push(Token {
            kind,
            text,
            span: Span::new(offset, offset + text.len()),
        });
    }
}

fn insert_semi<'s>(tokens: &mut Vec<Token<'s>>, offset: usize, text: &'s str) {
    if tokens.last().is_some_and(|last| last.ends_statement()) {
        tokens.push(Token {
            kind: TokenKind::Semi { auto: true },
            text,
            span: Span::new(offset, offset + text.len()),
        });
    }
}

// ============================================================================
// Token Parsers
// ============================================================================

fn token<'s>(input: &mut &'s str) -> ModalResult<(TokenKind, &'s str)> {
    alt((
        ident_or_keyword,
        number,
        interpreted_string.map(|s| (TokenKind::String, s)),
        raw_string.map(|s| (TokenKind::String, s)),
        char_lit.map(|s| (TokenKind::Char, s)),
        operator,
    ))
    .parse_next(input)
}

fn block_comment<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    ("/*", take_until(0.., "*/"), "*/")
        .map(|(_, body, _)| body)
        .parse_next(input)
}

fn ident_or_keyword<'s>(input: &mut &'s str) -> ModalResult<(TokenKind, &'s str)> {
    let text = (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)?;
    let kind = if is_keyword(text) {
        TokenKind::Keyword
    } else {
        TokenKind::Ident
    };
    Ok((kind, text))
}

fn digits<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_while(1.., |c: char| c.is_ascii_digit() || c == '_').parse_next(input)
}

fn exponent<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    (one_of(['e', 'E', 'p', 'P']), opt(one_of(['+', '-'])), digits)
        .take()
        .parse_next(input)
}

fn number<'s>(input: &mut &'s str) -> ModalResult<(TokenKind, &'s str)> {
    let ((body, imag), text) = (
        alt((
            (
                '0',
                one_of(['x', 'X', 'b', 'B', 'o', 'O']),
                take_while(1.., |c: char| c.is_ascii_hexdigit() || c == '_'),
            )
                .take(),
            (digits, opt(('.', opt(digits))), opt(exponent)).take(),
            ('.', digits, opt(exponent)).take(),
        )),
        opt('i'),
    )
        .with_taken()
        .parse_next(input)?;

    let is_prefixed = body.len() > 1
        && body.starts_with('0')
        && matches!(body.as_bytes()[1], b'x' | b'X' | b'b' | b'B' | b'o' | b'O');
    let kind = if imag.is_some() {
        TokenKind::Imag
    } else if !is_prefixed && body.contains(['.', 'e', 'E']) {
        TokenKind::Float
    } else {
        TokenKind::Int
    };
    Ok((kind, text))
}

fn interpreted_string<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    (
        '"',
        repeat::<_, _, (), _, _>(
            0..,
            alt((('\\', any).void(), none_of(['"', '\\', '\n']).void())),
        ),
        '"',
    )
        .take()
        .parse_next(input)
}

fn raw_string<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    ('`', take_till(0.., '`'), '`').take().parse_next(input)
}

fn char_lit<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    (
        '\'',
        alt((
            ('\\', any, take_till(0.., '\'')).void(),
            none_of(['\'', '\\', '\n']).void(),
        )),
        '\'',
    )
        .take()
        .parse_next(input)
}

fn operator<'s>(input: &mut &'s str) -> ModalResult<(TokenKind, &'s str)> {
    for op in OPERATORS {
        if input.starts_with(op) {
            let (text, rest) = input.split_at(op.len());
            *input = rest;
            let kind = if text == ";" {
                TokenKind::Semi { auto: false }
            } else {
                TokenKind::Op
            };
            return Ok((kind, text));
        }
    }
    Err(ErrMode::from_input(input))
}
