//! # Roundtrip Kernel
//!
//! Verification that a source generator is faithful: render a tree to
//! text, parse the text again, and demand the same tree back.
//!
//! This crate is **language-agnostic**: the parser and the generator are
//! collaborators behind [`SourceParser`] and [`SourceGenerator`]. The
//! kernel only drives them and interprets their [`Either`] outcomes.
//!
//! ## Architecture
//!
//! ```text
//! SourceText            ← bytes + declared encoding
//!     │ SourceParser::parse
//! Tree                  ← Node / Atom, spans ignored by equality
//!     │ SourceGenerator::generate
//! String                ← re-encoded into the original encoding
//!     │ SourceParser::parse
//! Validation            ← verdict: equivalent / exempt / mismatch + report
//! ```
//!
//! The [`toy`] module ships a small expression language implementing both
//! collaborator traits; it backs the CLI and the test suites.

pub mod diff;
pub mod either;
pub mod error;
pub mod source;
pub mod toy;
pub mod tree;
pub mod validation;

pub use diff::{DiffLine, diff_lines, tree_diff};
pub use either::Either;
pub use error::{GenerateError, SyntaxError};
pub use source::{Encoding, SourceText, encode};
pub use toy::{TOY_EXTENSION, TOY_VERSION, ToyGenerator, ToyParser};
pub use tree::{Atom, Child, Comment, Node, Span, Tree};
pub use validation::{
    Exemption, FailureRecord, SourceGenerator, SourceParser, Validation, ValidationError, Verdict,
    check_idempotent,
};
