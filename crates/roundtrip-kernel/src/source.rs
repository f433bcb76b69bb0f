//! Source text with its declared byte encoding.

use crate::error::GenerateError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Declared encoding of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    #[default]
    Utf8,
    UsAscii,
    /// Raw bytes; every byte maps to the code point of the same value.
    Binary,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Utf8 => write!(f, "UTF-8"),
            Self::UsAscii => write!(f, "US-ASCII"),
            Self::Binary => write!(f, "ASCII-8BIT"),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "us-ascii" | "ascii" => Ok(Self::UsAscii),
            "ascii-8bit" | "binary" => Ok(Self::Binary),
            _ => Err(format!("unknown encoding: {s}")),
        }
    }
}

/// Encode `text` into `encoding`, failing when a character has no representation.
pub fn encode(text: &str, encoding: Encoding) -> Result<Vec<u8>, GenerateError> {
    match encoding {
        Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        Encoding::UsAscii => text
            .chars()
            .map(|c| {
                if c.is_ascii() {
                    Ok(c as u8)
                } else {
                    Err(unrepresentable(c, encoding))
                }
            })
            .collect(),
        Encoding::Binary => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).map_err(|_| unrepresentable(c, encoding)))
            .collect(),
    }
}

fn unrepresentable(c: char, encoding: Encoding) -> GenerateError {
    GenerateError::Encoding {
        encoding: encoding.to_string(),
        detail: format!("U+{:04X} has no mapping", u32::from(c)),
    }
}

/// Raw source bytes plus the encoding they are declared in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceText {
    pub bytes: Vec<u8>,
    pub encoding: Encoding,
}

impl SourceText {
    pub fn new(bytes: impl Into<Vec<u8>>, encoding: Encoding) -> Self {
        Self {
            bytes: bytes.into(),
            encoding,
        }
    }

    pub fn utf8(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes(), Encoding::Utf8)
    }

    /// Source read from disk. A `# encoding: NAME` comment on the first line
    /// declares the encoding; anything else is UTF-8.
    pub fn detect(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
        let encoding = std::str::from_utf8(first_line)
            .ok()
            .and_then(|line| line.trim().strip_prefix('#'))
            .and_then(|comment| comment.trim().strip_prefix("encoding:"))
            .and_then(|name| name.trim().parse().ok())
            .unwrap_or_default();
        Self::new(bytes, encoding)
    }

    /// Decode for display or parsing. Invalid UTF-8 is replaced, binary
    /// bytes map one-to-one onto code points.
    pub fn text(&self) -> String {
        match self.encoding {
            Encoding::Binary => self.bytes.iter().map(|&b| char::from(b)).collect(),
            Encoding::Utf8 | Encoding::UsAscii => String::from_utf8_lossy(&self.bytes).into_owned(),
        }
    }

    /// Re-encode generated text with this source's encoding.
    pub fn reencode(&self, generated: &str) -> Result<SourceText, GenerateError> {
        Ok(SourceText::new(encode(generated, self.encoding)?, self.encoding))
    }

    /// Hex SHA-256 of the raw bytes.
    pub fn digest(&self) -> String {
        let hash = Sha256::digest(&self.bytes);
        hash.iter().map(|b| format!("{b:02x}")).collect()
    }
}
