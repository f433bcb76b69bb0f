//! Toy expression language used as the built-in parser/generator pair.
//!
//! The toy language is small enough to read in one sitting but exercises
//! every path of the validation protocol: operator precedence, literal
//! quoting, local-variable disambiguation, comments and encodings.
//!
//! ## Syntax
//!
//! ```text
//! program  := stmt ((NEWLINE | ';') stmt)*
//! stmt     := IDENT '=' stmt | expr
//! expr     := term (('+' | '-') term)*
//! term     := unary (('*' | '/') unary)*
//! unary    := '-' unary | primary
//! primary  := INT | FLOAT | STRING | SYMBOL | nil | true | false
//!           | __LINE__ | __FILE__ | IDENT ['(' args ')'] | '(' stmts ')'
//! ```
//!
//! `# ...` starts a comment. A `-` directly followed by a numeric literal
//! folds into a negative literal.
//!
//! ## Trees
//!
//! | source        | tree                          |
//! |---------------|-------------------------------|
//! | `1`           | `(int 1)`                     |
//! | `"a"`         | `(str "a")`                   |
//! | `x = 1; x`    | `(begin (lvasgn :x (int 1)) (lvar :x))` |
//! | `f(1)`        | `(send nil :f (int 1))`       |
//! | `a + b`       | `(send (send nil :a) :+ (send nil :b))` |
//! | `-a`          | `(send (send nil :a) :-@)`    |

use crate::either::Either;
use crate::error::{GenerateError, SyntaxError};
use crate::source::{Encoding, SourceText};
use crate::tree::{Atom, Child, Comment, Node, Span, Tree};
use crate::validation::{SourceGenerator, SourceParser};
use std::collections::BTreeSet;

pub const TOY_VERSION: &str = "1.0";

/// File extension of toy-language sources.
pub const TOY_EXTENSION: &str = "toy";

const KEYWORDS: &[&str] = &["nil", "true", "false", "__LINE__", "__FILE__"];
const OPERATORS: &[&str] = &["+", "-", "*", "/", "-@"];

/// Deepest expression nesting the parser accepts. Parenthesized groups,
/// call arguments, assignments, unary minus and each binary operator in a
/// chain count as one level.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Float(f64),
    Str(String),
    /// String literal whose byte escapes do not form valid text.
    Bytes(Vec<u8>),
    Sym(String),
    Ident(String),
    Nil,
    True,
    False,
    Line,
    File,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    Sep,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    begin: usize,
    end: usize,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    line_start: usize,
    encoding: Encoding,
    identification: &'a str,
    comments: Vec<Comment>,
}

impl Lexer<'_> {
    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(
            self.identification,
            self.line,
            self.pos - self.line_start + 1,
            message,
        )
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn tokens(mut self) -> Result<(Vec<Token>, Vec<Comment>), SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            while matches!(self.peek(), Some(' ' | '\t' | '\r')) {
                self.pos += 1;
            }
            let begin = self.pos;
            let line = self.line;
            let column = begin - self.line_start + 1;
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    tok: Tok::Eof,
                    begin,
                    end: begin,
                    line,
                    column,
                });
                return Ok((tokens, self.comments));
            };
            let tok = match c {
                '#' => {
                    self.comment(begin);
                    continue;
                }
                '\n' => {
                    self.pos += 1;
                    self.line += 1;
                    self.line_start = self.pos;
                    Tok::Sep
                }
                ';' => self.single(Tok::Sep),
                '(' => self.single(Tok::LParen),
                ')' => self.single(Tok::RParen),
                ',' => self.single(Tok::Comma),
                '+' => self.single(Tok::Plus),
                '-' => self.single(Tok::Minus),
                '*' => self.single(Tok::Star),
                '/' => self.single(Tok::Slash),
                '=' => self.single(Tok::Assign),
                '"' => self.string()?,
                ':' => Tok::Sym(self.symbol()?),
                c if c.is_ascii_digit() => self.number()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(),
                other => return Err(self.error(format!("unexpected character {other:?}"))),
            };
            tokens.push(Token {
                tok,
                begin,
                end: self.pos,
                line,
                column,
            });
        }
    }

    fn single(&mut self, tok: Tok) -> Tok {
        self.pos += 1;
        tok
    }

    fn comment(&mut self, begin: usize) {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.comments.push(Comment {
            text: text.trim_end().to_string(),
            span: Some(Span {
                begin,
                end: self.pos,
                line: self.line,
            }),
        });
    }

    fn ident_chars(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn word(&mut self) -> Tok {
        let word = self.ident_chars();
        match word.as_str() {
            "nil" => Tok::Nil,
            "true" => Tok::True,
            "false" => Tok::False,
            "__LINE__" => Tok::Line,
            "__FILE__" => Tok::File,
            _ => Tok::Ident(word),
        }
    }

    fn symbol(&mut self) -> Result<String, SyntaxError> {
        self.pos += 1;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => Ok(self.ident_chars()),
            Some('-') if self.peek_at(1) == Some('@') => {
                self.pos += 2;
                Ok("-@".to_string())
            }
            Some(c @ ('+' | '-' | '*' | '/')) => {
                self.pos += 1;
                Ok(c.to_string())
            }
            _ => Err(self.error("malformed symbol")),
        }
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Result<Tok, SyntaxError> {
        let start = self.pos;
        let mut float = false;
        self.digits();
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            float = true;
            self.pos += 1;
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                float = true;
                self.pos += 1 + sign;
                self.digits();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|e| self.error(format!("invalid float {text}: {e}")))
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|e| self.error(format!("invalid integer {text}: {e}")))
        }
    }

    fn string(&mut self) -> Result<Tok, SyntaxError> {
        self.pos += 1;
        let mut out: Vec<u8> = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("unterminated string"));
            };
            self.pos += 1;
            match c {
                '"' => {
                    return Ok(match String::from_utf8(out) {
                        Ok(text) => Tok::Str(text),
                        Err(error) => Tok::Bytes(error.into_bytes()),
                    });
                }
                '\n' => {
                    out.push(b'\n');
                    self.line += 1;
                    self.line_start = self.pos;
                }
                '\\' => match self.escape()? {
                    Escaped::Char(c) => out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
                    Escaped::Byte(b) => out.push(b),
                },
                c => out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
            }
        }
    }

    fn escape(&mut self) -> Result<Escaped, SyntaxError> {
        let Some(c) = self.peek() else {
            return Err(self.error("unterminated escape"));
        };
        self.pos += 1;
        match c {
            'n' => Ok(Escaped::Char('\n')),
            't' => Ok(Escaped::Char('\t')),
            'r' => Ok(Escaped::Char('\r')),
            '0' => Ok(Escaped::Char('\0')),
            '\\' => Ok(Escaped::Char('\\')),
            '"' => Ok(Escaped::Char('"')),
            'x' => {
                let hex: String = self.chars[self.pos..(self.pos + 2).min(self.chars.len())]
                    .iter()
                    .collect();
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|_| self.error(format!("invalid byte escape \\x{hex}")))?;
                self.pos += 2;
                Ok(match self.encoding {
                    Encoding::Binary => Escaped::Char(char::from(byte)),
                    Encoding::Utf8 | Encoding::UsAscii if byte < 0x80 => {
                        Escaped::Char(char::from(byte))
                    }
                    Encoding::Utf8 | Encoding::UsAscii => Escaped::Byte(byte),
                })
            }
            'u' => {
                if self.peek() != Some('{') {
                    return Err(self.error("expected `{` after \\u"));
                }
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != '}') {
                    self.pos += 1;
                }
                let hex: String = self.chars[start..self.pos].iter().collect();
                if self.peek() != Some('}') {
                    return Err(self.error("unterminated unicode escape"));
                }
                self.pos += 1;
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .map(Escaped::Char)
                    .ok_or_else(|| self.error(format!("invalid unicode escape \\u{{{hex}}}")))
            }
            other => Err(self.error(format!("unknown escape \\{other}"))),
        }
    }
}

/// One escape sequence inside a string literal.
enum Escaped {
    Char(char),
    /// A raw high byte; only valid text when it completes a UTF-8 sequence.
    Byte(u8),
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    locals: BTreeSet<String>,
    identification: &'a str,
    depth: usize,
}

fn atom(value: Atom) -> Child {
    Child::Atom(value)
}

fn span_between(first: &Token, last_end: usize) -> Span {
    Span {
        begin: first.begin,
        end: last_end,
        line: first.line,
    }
}

fn end_of(node: &Node) -> usize {
    node.span.map_or(0, |span| span.end)
}

impl Parser<'_> {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].tok
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let token = &self.tokens[self.pos];
        SyntaxError::new(self.identification, token.line, token.column, message)
    }

    fn descend(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        Ok(())
    }

    fn skip_seps(&mut self) {
        while *self.peek() == Tok::Sep {
            self.advance();
        }
    }

    fn program(&mut self) -> Result<Option<Node>, SyntaxError> {
        self.skip_seps();
        let stmts = self.stmts(&Tok::Eof)?;
        Ok(wrap_begin(stmts))
    }

    /// Statements up to (not including) `terminator`.
    fn stmts(&mut self, terminator: &Tok) -> Result<Vec<Node>, SyntaxError> {
        let mut stmts = Vec::new();
        while self.peek() != terminator {
            stmts.push(self.stmt()?);
            if self.peek() == terminator {
                break;
            }
            if *self.peek() != Tok::Sep {
                return Err(self.error(format!("unexpected token {:?}", self.peek())));
            }
            self.skip_seps();
        }
        Ok(stmts)
    }

    fn stmt(&mut self) -> Result<Node, SyntaxError> {
        self.descend()?;
        let node = self.statement();
        self.depth -= 1;
        node
    }

    fn statement(&mut self) -> Result<Node, SyntaxError> {
        if let Tok::Ident(name) = self.peek().clone()
            && *self.peek_at(1) == Tok::Assign
        {
            let first = self.advance();
            self.advance();
            self.locals.insert(name.clone());
            let value = self.stmt()?;
            let end = end_of(&value);
            return Ok(Node::new(
                "lvasgn",
                vec![atom(Atom::Sym(name)), Child::Node(value)],
            )
            .with_span(span_between(&first, end)));
        }
        self.expr()
    }

    fn expr(&mut self) -> Result<Node, SyntaxError> {
        let base = self.depth;
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => "+",
                Tok::Minus => "-",
                _ => break,
            };
            self.advance();
            self.descend()?;
            let rhs = self.term()?;
            lhs = binary(lhs, op, rhs);
        }
        self.depth = base;
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Node, SyntaxError> {
        let base = self.depth;
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => "*",
                Tok::Slash => "/",
                _ => break,
            };
            self.advance();
            self.descend()?;
            let rhs = self.unary()?;
            lhs = binary(lhs, op, rhs);
        }
        self.depth = base;
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node, SyntaxError> {
        if *self.peek() != Tok::Minus {
            return self.primary();
        }
        let minus = self.advance();
        match self.peek().clone() {
            Tok::Int(value) => {
                let literal = self.advance();
                Ok(Node::new("int", vec![atom(Atom::Int(-value))])
                    .with_span(span_between(&minus, literal.end)))
            }
            Tok::Float(value) => {
                let literal = self.advance();
                Ok(Node::new("float", vec![atom(Atom::Float(-value))])
                    .with_span(span_between(&minus, literal.end)))
            }
            _ => {
                self.descend()?;
                let operand = self.unary();
                self.depth -= 1;
                let operand = operand?;
                let end = end_of(&operand);
                Ok(Node::new(
                    "send",
                    vec![Child::Node(operand), atom(Atom::Sym("-@".to_string()))],
                )
                .with_span(span_between(&minus, end)))
            }
        }
    }

    fn primary(&mut self) -> Result<Node, SyntaxError> {
        let start = self.pos;
        let token = self.advance();
        let span = span_between(&token, token.end);
        let leaf = |kind: &str, children: Vec<Child>| -> Result<Node, SyntaxError> {
            Ok(Node::new(kind, children).with_span(span))
        };
        match token.tok.clone() {
            Tok::Int(value) => leaf("int", vec![atom(Atom::Int(value))]),
            Tok::Float(value) => leaf("float", vec![atom(Atom::Float(value))]),
            Tok::Str(value) => leaf("str", vec![atom(Atom::Str(value))]),
            Tok::Bytes(value) => leaf("str", vec![atom(Atom::Bytes(value))]),
            Tok::Sym(value) => leaf("sym", vec![atom(Atom::Sym(value))]),
            Tok::Nil => leaf("nil", vec![]),
            Tok::True => leaf("true", vec![]),
            Tok::False => leaf("false", vec![]),
            Tok::Line => leaf("int", vec![atom(Atom::Int(token.line as i64))]),
            Tok::File => leaf(
                "str",
                vec![atom(Atom::Str(self.identification.to_string()))],
            ),
            Tok::Ident(name) => self.identifier(&token, name),
            Tok::LParen => {
                self.skip_seps();
                let stmts = self.stmts(&Tok::RParen)?;
                let close = self.advance();
                let node = wrap_begin(stmts).unwrap_or_else(|| Node::new("begin", vec![]));
                if node.span.is_some() {
                    Ok(node)
                } else {
                    Ok(node.with_span(span_between(&token, close.end)))
                }
            }
            other => {
                self.pos = start;
                Err(self.error(format!("unexpected token {other:?}")))
            }
        }
    }

    fn identifier(&mut self, token: &Token, name: String) -> Result<Node, SyntaxError> {
        if *self.peek() != Tok::LParen {
            let span = span_between(token, token.end);
            let node = if self.locals.contains(&name) {
                Node::new("lvar", vec![atom(Atom::Sym(name))])
            } else {
                Node::new(
                    "send",
                    vec![atom(Atom::Nil), atom(Atom::Sym(name))],
                )
            };
            return Ok(node.with_span(span));
        }
        self.advance();
        let mut children = vec![atom(Atom::Nil), atom(Atom::Sym(name))];
        while *self.peek() != Tok::RParen {
            children.push(Child::Node(self.stmt()?));
            match self.peek() {
                Tok::Comma => {
                    self.advance();
                }
                Tok::RParen => {}
                other => return Err(self.error(format!("expected `,` or `)`, got {other:?}"))),
            }
        }
        let close = self.advance();
        Ok(Node::new("send", children).with_span(span_between(token, close.end)))
    }
}

fn binary(lhs: Node, op: &str, rhs: Node) -> Node {
    let span = match (lhs.span, rhs.span) {
        (Some(l), Some(r)) => Some(Span {
            begin: l.begin,
            end: r.end,
            line: l.line,
        }),
        _ => None,
    };
    let mut node = Node::new(
        "send",
        vec![
            Child::Node(lhs),
            Child::Atom(Atom::Sym(op.to_string())),
            Child::Node(rhs),
        ],
    );
    node.span = span;
    node
}

/// Collapse a statement list: none, the single statement, or a `begin`.
fn wrap_begin(mut stmts: Vec<Node>) -> Option<Node> {
    match stmts.len() {
        0 => None,
        1 => stmts.pop(),
        _ => {
            let span = match (stmts.first().and_then(|n| n.span), stmts.last().and_then(|n| n.span)) {
                (Some(first), Some(last)) => Some(Span {
                    begin: first.begin,
                    end: last.end,
                    line: first.line,
                }),
                _ => None,
            };
            let mut node = Node::new("begin", stmts.into_iter().map(Child::Node).collect());
            node.span = span;
            Some(node)
        }
    }
}

/// Parser for the toy language.
#[derive(Debug, Clone)]
pub struct ToyParser {
    keep_comments: bool,
}

impl Default for ToyParser {
    fn default() -> Self {
        Self {
            keep_comments: true,
        }
    }
}

impl ToyParser {
    /// A parser that drops comments, producing trees with `comments: None`.
    pub fn without_comments() -> Self {
        Self {
            keep_comments: false,
        }
    }

    pub fn parse_str(&self, text: &str, identification: &str) -> Either<SyntaxError, Tree> {
        self.parse(&SourceText::utf8(text), identification)
    }
}

impl SourceParser for ToyParser {
    fn version(&self) -> &str {
        TOY_VERSION
    }

    fn parse(&self, source: &SourceText, identification: &str) -> Either<SyntaxError, Tree> {
        let lexer = Lexer {
            chars: source.text().chars().collect(),
            pos: 0,
            line: 1,
            line_start: 0,
            encoding: source.encoding,
            identification,
            comments: Vec::new(),
        };
        let result = lexer.tokens().and_then(|(tokens, comments)| {
            let mut parser = Parser {
                tokens,
                pos: 0,
                locals: BTreeSet::new(),
                identification,
                depth: 0,
            };
            let root = parser.program()?;
            let tree = Tree::new(root);
            Ok(if self.keep_comments {
                tree.with_comments(comments)
            } else {
                tree
            })
        });
        result.into()
    }
}

/// Canonical generator for the toy language.
#[derive(Debug, Clone, Default)]
pub struct ToyGenerator;

const PREC_ASSIGN: u8 = 0;
const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_UNARY: u8 = 3;
const PREC_ATOM: u8 = 4;

fn unsupported(node: &Node) -> GenerateError {
    GenerateError::Unsupported {
        kind: node.to_string(),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !KEYWORDS.contains(&name)
}

fn wrap(text: String, prec: u8, min: u8) -> String {
    if prec < min { format!("({text})") } else { text }
}

struct Emitter {
    locals: BTreeSet<String>,
}

impl Emitter {
    fn stmt(&mut self, node: &Node) -> Result<String, GenerateError> {
        self.expr(node).map(|(text, _)| text)
    }

    fn expr(&mut self, node: &Node) -> Result<(String, u8), GenerateError> {
        let children = node.children.as_slice();
        match (node.kind.as_str(), children) {
            ("int", [Child::Atom(Atom::Int(value))]) => {
                let prec = if *value < 0 { PREC_UNARY } else { PREC_ATOM };
                Ok((value.to_string(), prec))
            }
            ("float", [Child::Atom(Atom::Float(value))]) => {
                if !value.is_finite() {
                    return Err(GenerateError::Other {
                        message: format!("non-finite float {value} has no literal form"),
                    });
                }
                let prec = if value.is_sign_negative() {
                    PREC_UNARY
                } else {
                    PREC_ATOM
                };
                Ok((format!("{value:?}"), prec))
            }
            ("str", [Child::Atom(Atom::Str(value))]) => Ok((quote_string(value), PREC_ATOM)),
            ("str", [Child::Atom(Atom::Bytes(bytes))]) => Err(invalid_bytes(bytes)),
            ("sym", [Child::Atom(Atom::Sym(value))]) => {
                if is_identifier(value) || OPERATORS.contains(&value.as_str()) {
                    Ok((format!(":{value}"), PREC_ATOM))
                } else {
                    Err(unsupported(node))
                }
            }
            ("nil", []) => Ok(("nil".to_string(), PREC_ATOM)),
            ("true", []) => Ok(("true".to_string(), PREC_ATOM)),
            ("false", []) => Ok(("false".to_string(), PREC_ATOM)),
            ("lvar", [Child::Atom(Atom::Sym(name))]) if is_identifier(name) => {
                Ok((name.clone(), PREC_ATOM))
            }
            ("lvasgn", [Child::Atom(Atom::Sym(name)), Child::Node(value)])
                if is_identifier(name) =>
            {
                self.locals.insert(name.clone());
                let value = self.stmt(value)?;
                Ok((format!("{name} = {value}"), PREC_ASSIGN))
            }
            ("begin", stmts) => {
                let mut parts = Vec::with_capacity(stmts.len());
                for stmt in stmts {
                    let Child::Node(stmt) = stmt else {
                        return Err(unsupported(node));
                    };
                    parts.push(self.stmt(stmt)?);
                }
                Ok((format!("({})", parts.join("; ")), PREC_ATOM))
            }
            ("send", [Child::Node(operand), Child::Atom(Atom::Sym(op))]) if op == "-@" => {
                let numeric = matches!(operand.kind.as_str(), "int" | "float");
                let (text, prec) = self.expr(operand)?;
                let text = if numeric {
                    format!("({text})")
                } else {
                    wrap(text, prec, PREC_UNARY)
                };
                Ok((format!("-{text}"), PREC_UNARY))
            }
            (
                "send",
                [
                    Child::Node(lhs),
                    Child::Atom(Atom::Sym(op)),
                    Child::Node(rhs),
                ],
            ) if matches!(op.as_str(), "+" | "-" | "*" | "/") => {
                let prec = if matches!(op.as_str(), "+" | "-") {
                    PREC_ADD
                } else {
                    PREC_MUL
                };
                let (left, left_prec) = self.expr(lhs)?;
                let (right, right_prec) = self.expr(rhs)?;
                Ok((
                    format!(
                        "{} {op} {}",
                        wrap(left, left_prec, prec),
                        wrap(right, right_prec, prec + 1)
                    ),
                    prec,
                ))
            }
            ("send", [Child::Atom(Atom::Nil), Child::Atom(Atom::Sym(name)), args @ ..])
                if is_identifier(name) =>
            {
                if args.is_empty() {
                    let text = if self.locals.contains(name) {
                        format!("{name}()")
                    } else {
                        name.clone()
                    };
                    return Ok((text, PREC_ATOM));
                }
                let mut rendered = Vec::with_capacity(args.len());
                for arg in args {
                    let Child::Node(arg) = arg else {
                        return Err(unsupported(node));
                    };
                    rendered.push(self.stmt(arg)?);
                }
                Ok((format!("{name}({})", rendered.join(", ")), PREC_ATOM))
            }
            _ => Err(unsupported(node)),
        }
    }
}

/// A literal that is not valid UTF-8 has no spelling in generated text.
fn invalid_bytes(bytes: &[u8]) -> GenerateError {
    let valid = std::str::from_utf8(bytes).map_or_else(|e| e.valid_up_to(), str::len);
    let sequence = bytes[valid..]
        .iter()
        .take(1)
        .map(|b| format!("\\x{b:02x}"))
        .collect();
    GenerateError::InvalidEscape {
        sequence,
        encoding: Encoding::Utf8.to_string(),
    }
}

fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl SourceGenerator for ToyGenerator {
    fn generate(&self, tree: &Tree) -> Either<GenerateError, String> {
        let mut emitter = Emitter {
            locals: BTreeSet::new(),
        };
        let body = match &tree.root {
            None => Ok(Vec::new()),
            Some(root) if root.kind == "begin" && root.children.len() > 1 => root
                .children
                .iter()
                .map(|child| match child {
                    Child::Node(stmt) => emitter.stmt(stmt),
                    Child::Atom(_) => Err(unsupported(root)),
                })
                .collect::<Result<Vec<_>, _>>(),
            Some(root) => emitter.stmt(root).map(|text| vec![text]),
        };
        let result = body.map(|mut lines| {
            if let Some(comments) = &tree.comments {
                lines.extend(comments.iter().map(|comment| format!("#{}", comment.text)));
            }
            lines.join("\n")
        });
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Tree {
        ToyParser::default()
            .parse_str(text, "test")
            .into_result()
            .unwrap_or_else(|e| panic!("parse failed: {e}"))
    }

    fn sexp(text: &str) -> String {
        parse(text).root.map(|n| n.to_string()).unwrap_or_default()
    }

    fn generate(tree: &Tree) -> String {
        ToyGenerator
            .generate(tree)
            .into_result()
            .unwrap_or_else(|e| panic!("generate failed: {e}"))
    }

    #[test]
    fn precedence_builds_left_associative_sends() {
        assert_eq!(
            sexp("1 - 2 - 3"),
            "(send (send (int 1) :- (int 2)) :- (int 3))"
        );
        assert_eq!(
            sexp("1 + 2 * 3"),
            "(send (int 1) :+ (send (int 2) :* (int 3)))"
        );
    }

    #[test]
    fn minus_before_literal_folds() {
        assert_eq!(sexp("-5"), "(int -5)");
        assert_eq!(sexp("-(5)"), "(send (int 5) :-@)");
        assert_eq!(sexp("1 - -2.5"), "(send (int 1) :- (float -2.5))");
    }

    #[test]
    fn assigned_names_become_locals() {
        assert_eq!(
            sexp("x = 1\nx"),
            "(begin (lvasgn :x (int 1)) (lvar :x))"
        );
        assert_eq!(sexp("y"), "(send nil :y)");
    }

    #[test]
    fn positional_literals_capture_context() {
        assert_eq!(sexp("\n\n__LINE__"), "(int 3)");
        assert_eq!(sexp("__FILE__"), "(str \"test\")");
    }

    #[test]
    fn generator_parenthesizes_by_precedence() {
        let tree = parse("(1 - 2) - (3 - 4) * 5");
        assert_eq!(generate(&tree), "1 - 2 - (3 - 4) * 5");
    }

    #[test]
    fn local_call_without_args_keeps_parens() {
        let tree = Tree::from(
            Node::parse_sexp("(begin (lvasgn :f (int 1)) (send nil :f))").unwrap(),
        );
        assert_eq!(generate(&tree), "f = 1\nf()");
        assert_eq!(parse(&generate(&tree)), tree);
    }

    #[test]
    fn comments_are_emitted_after_code() {
        let tree = parse("# head\nfoo(1, \"a\\tb\")");
        assert_eq!(generate(&tree), "foo(1, \"a\\tb\")\n# head");
        assert_eq!(parse(&generate(&tree)), tree);
    }

    #[test]
    fn invalid_byte_escape_is_an_escape_failure() {
        let tree = parse("\"\\xff\"");
        assert_eq!(tree.root.as_ref().unwrap().to_string(), "(str #xff)");
        let error = ToyGenerator.generate(&tree).left().unwrap();
        assert!(error.is_encoding_incompatibility());
        assert_eq!(
            error,
            GenerateError::InvalidEscape {
                sequence: "\\xff".to_string(),
                encoding: "UTF-8".to_string(),
            }
        );
    }

    #[test]
    fn byte_escapes_that_form_utf8_decode_to_text() {
        assert_eq!(sexp("\"caf\\xc3\\xa9\""), "(str \"caf\u{e9}\")");
    }

    #[test]
    fn literal_replacement_character_is_ordinary_text() {
        let tree = parse("puts(\"\u{fffd}\", \"\\u{fffd}\")");
        let text = generate(&tree);
        assert_eq!(text, "puts(\"\u{fffd}\", \"\u{fffd}\")");
        assert_eq!(parse(&text), tree);
    }

    #[test]
    fn binary_source_keeps_high_bytes() {
        let source = SourceText::new(b"\"\\xe9\"".to_vec(), Encoding::Binary);
        let tree = ToyParser::default()
            .parse(&source, "bin")
            .into_result()
            .unwrap();
        assert_eq!(tree.root.unwrap().to_string(), "(str \"\u{e9}\")");
    }

    #[test]
    fn syntax_errors_carry_position() {
        let error = ToyParser::default()
            .parse_str("x = 1\ny = )", "broken")
            .left()
            .unwrap();
        assert_eq!(error.identification, "broken");
        assert_eq!(error.line, 2);
    }

    fn on_large_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(64 << 20)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn nested_groups_within_the_limit_round_trip() {
        on_large_stack(|| {
            let depth = MAX_NESTING / 2;
            let text = format!("{}f(1){}", "(".repeat(depth), ")".repeat(depth));
            let tree = parse(&text);
            assert_eq!(generate(&tree), "f(1)");
            let calls = format!("{}1{}", "f(".repeat(depth), ")".repeat(depth));
            let tree = parse(&calls);
            assert_eq!(parse(&generate(&tree)), tree);
        });
    }

    #[test]
    fn nesting_past_the_limit_is_a_syntax_error() {
        on_large_stack(|| {
            let parser = ToyParser::default();
            let depth = MAX_NESTING + 10;
            let deep_groups = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
            let deep_minus = format!("{}x", "-".repeat(depth));
            let long_chain = format!("1{}", " + 1".repeat(depth));
            let assignments = format!("{}1", "a = ".repeat(depth));
            for text in [deep_groups, deep_minus, long_chain, assignments] {
                let error = parser.parse_str(&text, "deep").left().unwrap();
                assert!(
                    error.message.contains("nesting deeper than"),
                    "{}",
                    error.message
                );
            }
        });
    }

    #[test]
    fn unknown_node_is_unsupported() {
        let tree = Tree::from(Node::parse_sexp("(while (true) (nil))").unwrap());
        assert!(matches!(
            ToyGenerator.generate(&tree),
            Either::Left(GenerateError::Unsupported { .. })
        ));
    }
}
