//! Syntax trees and the tree-equality relation.
//!
//! ## Equality contract
//!
//! Two trees are equal when:
//!
//! - node `kind`s are equal,
//! - nodes have the same number of children and the children are pairwise equal,
//! - atoms are equal by value (floats compare by bit pattern, so `NaN == NaN`),
//! - comments are compared by text, and only when *both* trees carry them.
//!
//! Source positions ([`Span`]) never participate. `PartialEq` on [`Node`],
//! [`Child`], [`Comment`] and [`Tree`] implements exactly this relation.
//!
//! ## Notation
//!
//! Trees render as s-expressions: `(send nil :puts (str "hi"))`. The same
//! notation is accepted by [`Node::parse_sexp`] so fixtures can be written
//! by hand.

use serde::{Deserialize, Serialize};

/// Character range plus 1-based line of a node in its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
    pub line: usize,
}

/// Leaf value inside a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atom {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// String literal whose bytes are not valid UTF-8; renders as `#x` hex.
    Bytes(Vec<u8>),
    Sym(String),
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Sym(a), Self::Sym(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value:?}"),
            Self::Str(value) => write!(f, "{}", quote(value)),
            Self::Bytes(bytes) => {
                write!(f, "#x")?;
                bytes.iter().try_for_each(|b| write!(f, "{b:02x}"))
            }
            Self::Sym(value) => write!(f, ":{value}"),
        }
    }
}

/// Quote a string using the escape set understood by [`Node::parse_sexp`].
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Child {
    Node(Node),
    Atom(Atom),
}

impl PartialEq for Child {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Node(a), Self::Node(b)) => a == b,
            (Self::Atom(a), Self::Atom(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Atom> for Child {
    fn from(atom: Atom) -> Self {
        Self::Atom(atom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: String,
    #[serde(default)]
    pub children: Vec<Child>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.children == other.children
    }
}

impl Node {
    pub fn new(kind: impl Into<String>, children: Vec<Child>) -> Self {
        Self {
            kind: kind.into(),
            children,
            span: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Copy of this node with every span removed.
    pub fn without_spans(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            children: self
                .children
                .iter()
                .map(|child| match child {
                    Child::Node(node) => Child::Node(node.without_spans()),
                    Child::Atom(atom) => Child::Atom(atom.clone()),
                })
                .collect(),
            span: None,
        }
    }

    /// Child nodes, skipping atoms.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.children.iter().filter_map(|child| match child {
            Child::Node(node) => Some(node),
            Child::Atom(_) => None,
        })
    }

    /// Render as indented s-expression lines. Leaf-only nodes stay on one line.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.render_into(0, &mut lines);
        lines
    }

    fn render_into(&self, depth: usize, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        if self.nodes().next().is_none() {
            lines.push(format!("{indent}{}", self.inline()));
            return;
        }
        lines.push(format!("{indent}({}", self.kind));
        for child in &self.children {
            match child {
                Child::Node(node) => node.render_into(depth + 1, lines),
                Child::Atom(atom) => lines.push(format!("{indent}  {atom}")),
            }
        }
        if let Some(last) = lines.last_mut() {
            last.push(')');
        }
    }

    fn inline(&self) -> String {
        let mut out = format!("({}", self.kind);
        for child in &self.children {
            out.push(' ');
            match child {
                Child::Node(node) => out.push_str(&node.inline()),
                Child::Atom(atom) => out.push_str(&atom.to_string()),
            }
        }
        out.push(')');
        out
    }

    /// Parse the s-expression notation produced by [`std::fmt::Display`].
    pub fn parse_sexp(input: &str) -> Result<Self, String> {
        let mut reader = SexpReader {
            chars: input.chars().collect(),
            pos: 0,
            depth: 0,
        };
        reader.skip_ws();
        let node = reader.node()?;
        reader.skip_ws();
        if reader.pos != reader.chars.len() {
            return Err(format!("trailing input at offset {}", reader.pos));
        }
        Ok(node)
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inline())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl PartialEq for Comment {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

/// A parsed program: an optional root (empty programs have none) and,
/// when the parser keeps them, its comments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tree {
    pub root: Option<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<Comment>>,
}

impl PartialEq for Tree {
    fn eq(&self, other: &Self) -> bool {
        if self.root != other.root {
            return false;
        }
        match (&self.comments, &other.comments) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl Tree {
    pub fn new(root: Option<Node>) -> Self {
        Self {
            root,
            comments: None,
        }
    }

    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = Some(comments);
        self
    }

    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = match &self.root {
            Some(root) => root.render_lines(),
            None => vec!["nil".to_string()],
        };
        if let Some(comments) = &self.comments {
            lines.extend(comments.iter().map(|c| format!("; {}", c.text)));
        }
        lines
    }

    pub fn render(&self) -> String {
        self.render_lines().join("\n")
    }

    /// Every string, symbol and comment text in the tree.
    pub fn texts(&self) -> Vec<&str> {
        let mut texts = Vec::new();
        let mut stack: Vec<&Node> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            for child in &node.children {
                match child {
                    Child::Node(node) => stack.push(node),
                    Child::Atom(Atom::Str(text) | Atom::Sym(text)) => texts.push(text.as_str()),
                    Child::Atom(_) => {}
                }
            }
        }
        if let Some(comments) = &self.comments {
            texts.extend(comments.iter().map(|c| c.text.as_str()));
        }
        texts
    }
}

impl From<Node> for Tree {
    fn from(node: Node) -> Self {
        Self::new(Some(node))
    }
}

/// Deepest node nesting [`Node::parse_sexp`] accepts.
pub const MAX_SEXP_DEPTH: usize = 512;

struct SexpReader {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl SexpReader {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: char) -> Result<(), String> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected `{c}` at offset {}", self.pos))
        }
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && c != '(' && c != ')' && c != '"')
        {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn node(&mut self) -> Result<Node, String> {
        if self.depth == MAX_SEXP_DEPTH {
            return Err(format!("nesting deeper than {MAX_SEXP_DEPTH} at offset {}", self.pos));
        }
        self.depth += 1;
        let node = self.node_body();
        self.depth -= 1;
        node
    }

    fn node_body(&mut self) -> Result<Node, String> {
        self.expect('(')?;
        let kind = self.word();
        if kind.is_empty() {
            return Err(format!("missing node kind at offset {}", self.pos));
        }
        let mut children = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(')') => {
                    self.pos += 1;
                    return Ok(Node::new(kind, children));
                }
                Some('(') => children.push(Child::Node(self.node()?)),
                Some('"') => children.push(Child::Atom(Atom::Str(self.string()?))),
                Some(_) => children.push(Child::Atom(self.atom()?)),
                None => return Err(format!("unterminated node `{kind}`")),
            }
        }
    }

    fn string(&mut self) -> Result<String, String> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err("unterminated string".to_string());
            };
            self.pos += 1;
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let escaped = self.peek().ok_or("unterminated escape")?;
                    self.pos += 1;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        'u' => out.push(self.unicode_escape()?),
                        other => return Err(format!("unknown escape `\\{other}`")),
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, String> {
        self.expect('{')?;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '}') {
            self.pos += 1;
        }
        let hex: String = self.chars[start..self.pos].iter().collect();
        self.expect('}')?;
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| format!("invalid unicode escape `{hex}`"))
    }

    fn atom(&mut self) -> Result<Atom, String> {
        let word = self.word();
        match word.as_str() {
            "" => Err(format!("unexpected character at offset {}", self.pos)),
            "nil" => Ok(Atom::Nil),
            "true" => Ok(Atom::Bool(true)),
            "false" => Ok(Atom::Bool(false)),
            _ => {
                if let Some(sym) = word.strip_prefix(':') {
                    return Ok(Atom::Sym(sym.to_string()));
                }
                if let Some(hex) = word.strip_prefix("#x") {
                    return hex_bytes(hex)
                        .map(Atom::Bytes)
                        .ok_or_else(|| format!("invalid byte string `{word}`"));
                }
                if let Ok(value) = word.parse::<i64>() {
                    return Ok(Atom::Int(value));
                }
                if let Ok(value) = word.parse::<f64>() {
                    return Ok(Atom::Float(value));
                }
                Err(format!("unrecognized atom `{word}`"))
            }
        }
    }
}

fn hex_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Shorthand constructors for tests and fixtures.
pub mod build {
    use super::{Atom, Child, Node};

    pub fn n(kind: &str, children: Vec<Child>) -> Node {
        Node::new(kind, children)
    }

    pub fn node(node: Node) -> Child {
        Child::Node(node)
    }

    pub fn int(value: i64) -> Child {
        Child::Atom(Atom::Int(value))
    }

    pub fn str(value: &str) -> Child {
        Child::Atom(Atom::Str(value.to_string()))
    }

    pub fn sym(value: &str) -> Child {
        Child::Atom(Atom::Sym(value.to_string()))
    }

    pub fn nil() -> Child {
        Child::Atom(Atom::Nil)
    }
}

#[cfg(test)]
mod tests {
    use super::build::*;
    use super::*;

    #[test]
    fn equality_ignores_spans() {
        let span = Span {
            begin: 0,
            end: 1,
            line: 1,
        };
        let a = n("int", vec![int(1)]).with_span(span);
        let b = n("int", vec![int(1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn equality_compares_literal_values() {
        assert_ne!(n("int", vec![int(1)]), n("int", vec![int(2)]));
        assert_ne!(n("str", vec![str("a")]), n("sym", vec![str("a")]));
        assert_ne!(n("sym", vec![sym("a")]), n("sym", vec![str("a")]));
    }

    #[test]
    fn float_equality_is_bitwise() {
        assert_eq!(Atom::Float(f64::NAN), Atom::Float(f64::NAN));
        assert_ne!(Atom::Float(0.0), Atom::Float(-0.0));
    }

    #[test]
    fn comments_compared_only_when_both_present() {
        let comment = Comment {
            text: "note".to_string(),
            span: None,
        };
        let bare = Tree::from(n("nil", vec![]));
        let with = bare.clone().with_comments(vec![comment]);
        let empty = bare.clone().with_comments(vec![]);
        assert_eq!(bare, with);
        assert_ne!(with, empty);
    }

    #[test]
    fn sexp_notation_round_trips() {
        let text = r#"(send nil :puts (str "a\nb") (float 1.5) (int -3))"#;
        let node = Node::parse_sexp(text).unwrap();
        assert_eq!(node.to_string(), text);
    }

    #[test]
    fn byte_strings_render_as_hex() {
        let node = n("str", vec![Child::Atom(Atom::Bytes(vec![0x61, 0xff]))]);
        assert_eq!(node.to_string(), "(str #x61ff)");
        assert_eq!(Node::parse_sexp("(str #x61ff)").unwrap(), node);
        assert_ne!(node, n("str", vec![str("a\u{fffd}")]));
        assert!(Node::parse_sexp("(str #xf)").is_err());
    }

    #[test]
    fn texts_cover_strings_symbols_and_comments() {
        let root = Node::parse_sexp(r#"(send nil :puts (str "caf\u{e9}") (int 1))"#).unwrap();
        let tree = Tree::from(root).with_comments(vec![Comment {
            text: "note".to_string(),
            span: None,
        }]);
        let mut texts = tree.texts();
        texts.sort_unstable();
        assert_eq!(texts, vec!["caf\u{e9}", "note", "puts"]);
    }

    #[test]
    fn sexp_depth_is_bounded() {
        let deep = format!("{}(nil){}", "(begin ".repeat(MAX_SEXP_DEPTH), ")".repeat(MAX_SEXP_DEPTH));
        let error = Node::parse_sexp(&deep).unwrap_err();
        assert!(error.contains("nesting deeper than"), "{error}");
    }

    #[test]
    fn sexp_rejects_trailing_garbage() {
        assert!(Node::parse_sexp("(nil) x").is_err());
        assert!(Node::parse_sexp("(int 1").is_err());
    }

    #[test]
    fn render_lines_breaks_on_child_nodes() {
        let node = Node::parse_sexp("(send (int 1) :+ (int 2))").unwrap();
        assert_eq!(
            node.render_lines(),
            vec!["(send", "  (int 1)", "  :+", "  (int 2))"]
        );
    }
}
