//! Error types for parse and generation outcomes.

use serde::{Deserialize, Serialize};

/// A parser rejected its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{identification}:{line}:{column}: {message}")]
pub struct SyntaxError {
    pub identification: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(
        identification: impl Into<String>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            identification: identification.into(),
            line,
            column,
            message: message.into(),
        }
    }
}

/// A generator could not render a tree back into source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum GenerateError {
    /// The tree contains a node kind the generator does not know.
    #[error("unsupported node: {kind}")]
    Unsupported { kind: String },

    /// A literal carries an escape sequence the target encoding cannot express.
    #[error("invalid escape sequence {sequence:?} for {encoding} source")]
    InvalidEscape { sequence: String, encoding: String },

    /// The generated text could not be re-encoded into the original encoding.
    #[error("generated source is not representable as {encoding}: {detail}")]
    Encoding { encoding: String, detail: String },

    /// Any other generation failure.
    #[error("generation failed: {message}")]
    Other { message: String },
}

impl GenerateError {
    /// Escape/encoding incompatibilities are a known representational gap,
    /// not a generator defect.
    pub fn is_encoding_incompatibility(&self) -> bool {
        matches!(self, Self::InvalidEscape { .. } | Self::Encoding { .. })
    }
}
