//! Round-trip validation protocol.
//!
//! A [`Validation`] holds the three Either-typed stages of a round trip:
//!
//! ```text
//! original          parse(source)            Either<SyntaxError, Tree>
//!     │
//! generated_source  generate(original)       Either<ValidationError, String>
//!     │
//! generated         parse(reencode(text))    Either<ValidationError, Tree>
//! ```
//!
//! A left at any stage propagates to the later stages unchanged; no stage
//! is attempted once an earlier one failed. Construction is pure, so
//! validations may be computed on any number of threads at once.

use crate::diff::tree_diff;
use crate::either::Either;
use crate::error::{GenerateError, SyntaxError};
use crate::source::{SourceText, encode};
use crate::tree::Tree;
use serde::{Deserialize, Serialize};

/// Parses source text into a tree.
pub trait SourceParser {
    /// Grammar version this parser implements (used for fixture version gates).
    fn version(&self) -> &str;

    fn parse(&self, source: &SourceText, identification: &str) -> Either<SyntaxError, Tree>;
}

/// Renders a tree back into source text.
pub trait SourceGenerator {
    fn generate(&self, tree: &Tree) -> Either<GenerateError, String>;
}

/// Why a later round-trip stage has no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("original source did not parse: {0}")]
    OriginalSyntax(SyntaxError),

    #[error("{0}")]
    Generate(GenerateError),

    #[error("generated source did not parse: {0}")]
    GeneratedSyntax(SyntaxError),
}

/// Divergences that are known representational gaps rather than defects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exemption {
    /// The input itself is not valid source; no round-trip claim is made.
    OriginalSyntaxError,
    /// Generation hit a literal with no valid spelling (an invalid byte
    /// escape), or re-encoding failed because the original tree already holds
    /// text its source encoding cannot represent.
    GeneratedEncoding,
}

impl std::fmt::Display for Exemption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OriginalSyntaxError => write!(f, "original syntax error"),
            Self::GeneratedEncoding => write!(f, "generated encoding incompatibility"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "exemption", rename_all = "snake_case")]
pub enum Verdict {
    Equivalent,
    Exempt(Exemption),
    Mismatch,
}

#[derive(Debug, Clone)]
pub struct Validation {
    pub identification: String,
    pub original_source: Option<SourceText>,
    pub original: Either<SyntaxError, Tree>,
    pub generated_source: Either<ValidationError, String>,
    pub generated: Either<ValidationError, Tree>,
}

impl Validation {
    /// Validate a source file: parse it, regenerate, reparse, compare.
    pub fn from_source<P, G>(
        identification: impl Into<String>,
        source: SourceText,
        parser: &P,
        generator: &G,
    ) -> Self
    where
        P: SourceParser + ?Sized,
        G: SourceGenerator + ?Sized,
    {
        let identification = identification.into();
        let original = parser.parse(&source, &identification);
        Self::complete(identification, Some(source), original, parser, generator)
    }

    /// Validate an already-parsed tree. `original_source` sets the encoding
    /// used to re-encode the generated text and appears in the report.
    pub fn from_tree<P, G>(
        identification: impl Into<String>,
        tree: Tree,
        original_source: Option<SourceText>,
        parser: &P,
        generator: &G,
    ) -> Self
    where
        P: SourceParser + ?Sized,
        G: SourceGenerator + ?Sized,
    {
        Self::complete(
            identification.into(),
            original_source,
            Either::Right(tree),
            parser,
            generator,
        )
    }

    fn complete<P, G>(
        identification: String,
        original_source: Option<SourceText>,
        original: Either<SyntaxError, Tree>,
        parser: &P,
        generator: &G,
    ) -> Self
    where
        P: SourceParser + ?Sized,
        G: SourceGenerator + ?Sized,
    {
        let generated_source = original
            .clone()
            .map_left(ValidationError::OriginalSyntax)
            .and_then(|tree| generator.generate(&tree).map_left(ValidationError::Generate));

        let template = original_source
            .clone()
            .unwrap_or_else(|| SourceText::utf8(String::new()));
        let generated = generated_source.clone().and_then(|text| {
            Either::from(template.reencode(&text))
                .map_left(ValidationError::Generate)
                .and_then(|encoded| {
                    parser
                        .parse(&encoded, &identification)
                        .map_left(ValidationError::GeneratedSyntax)
                })
        });

        Self {
            identification,
            original_source,
            original,
            generated_source,
            generated,
        }
    }

    /// Both sides parsed and the trees are equal.
    pub fn success(&self) -> bool {
        match (&self.original, &self.generated) {
            (Either::Right(original), Either::Right(generated)) => original == generated,
            _ => false,
        }
    }

    /// Exemption that applies to this validation, checked in fixed order.
    pub fn exemption(&self) -> Option<Exemption> {
        if self.original.is_left() {
            return Some(Exemption::OriginalSyntaxError);
        }
        let encoding_failure = self.encoding_failure().is_some();
        encoding_failure.then_some(Exemption::GeneratedEncoding)
    }

    fn encoding_failure(&self) -> Option<&GenerateError> {
        let error = match (&self.generated_source, &self.generated) {
            (Either::Left(ValidationError::Generate(error)), _) => error,
            (_, Either::Left(ValidationError::Generate(error))) => error,
            _ => return None,
        };
        let exempt = match error {
            GenerateError::InvalidEscape { .. } => true,
            // Text the generator introduced on its own is a generator defect.
            GenerateError::Encoding { .. } => self.original_exceeds_encoding(),
            _ => false,
        };
        exempt.then_some(error)
    }

    /// The parsed original holds a string, symbol or comment that its own
    /// source encoding cannot represent.
    fn original_exceeds_encoding(&self) -> bool {
        let (Either::Right(tree), Some(source)) = (&self.original, &self.original_source) else {
            return false;
        };
        tree.texts()
            .into_iter()
            .any(|text| encode(text, source.encoding).is_err())
    }

    pub fn verdict(&self) -> Verdict {
        if let Some(exemption) = self.exemption() {
            return Verdict::Exempt(exemption);
        }
        if self.success() {
            Verdict::Equivalent
        } else {
            Verdict::Mismatch
        }
    }

    /// Human-readable failure report; `None` on success.
    pub fn report(&self) -> Option<String> {
        if self.success() {
            return None;
        }
        let mut sections = vec![self.identification.clone()];
        sections.push(format!(
            "Original-Source:\n{}",
            self.original_source
                .as_ref()
                .map(SourceText::text)
                .unwrap_or_else(|| "(not available)".to_string())
        ));
        sections.push(format!(
            "Generated-Source:\n{}",
            self.generated_source
                .as_ref()
                .fold(ToString::to_string, Clone::clone)
        ));
        sections.push(format!(
            "Original-Node:\n{}",
            self.original.as_ref().fold(ToString::to_string, Tree::render)
        ));
        sections.push(format!(
            "Generated-Node:\n{}",
            self.generated.as_ref().fold(ToString::to_string, Tree::render)
        ));
        if let (Either::Right(original), Either::Right(generated)) =
            (&self.original, &self.generated)
        {
            sections.push(format!("Node-Diff:\n{}", tree_diff(original, generated)));
        }
        Some(sections.join("\n"))
    }

    /// Reportable failure, if this validation is a genuine mismatch.
    pub fn failure_record(&self) -> Option<FailureRecord> {
        if self.verdict() != Verdict::Mismatch {
            return None;
        }
        Some(FailureRecord {
            identification: self.identification.clone(),
            digest: self.original_source.as_ref().map(SourceText::digest),
            report: self.report().unwrap_or_default(),
        })
    }
}

/// A genuine round-trip defect, detached from the trees that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub identification: String,
    /// SHA-256 of the original source bytes, when a source was available.
    pub digest: Option<String>,
    pub report: String,
}

/// Check that generation is stable after one reparse:
/// `generate(parse(generate(tree)))` parses to the same tree as `generate(tree)`.
///
/// Returns the stable text on success.
pub fn check_idempotent<P, G>(tree: &Tree, parser: &P, generator: &G) -> Either<String, String>
where
    P: SourceParser + ?Sized,
    G: SourceGenerator + ?Sized,
{
    let first = match generator.generate(tree) {
        Either::Right(text) => text,
        Either::Left(error) => return Either::Left(format!("first generation: {error}")),
    };
    let first_tree = match parser.parse(&SourceText::utf8(first.clone()), "idempotence:first") {
        Either::Right(tree) => tree,
        Either::Left(error) => return Either::Left(format!("first reparse: {error}")),
    };
    let second = match generator.generate(&first_tree) {
        Either::Right(text) => text,
        Either::Left(error) => return Either::Left(format!("second generation: {error}")),
    };
    let second_tree = match parser.parse(&SourceText::utf8(second.clone()), "idempotence:second")
    {
        Either::Right(tree) => tree,
        Either::Left(error) => return Either::Left(format!("second reparse: {error}")),
    };
    if first_tree != second_tree {
        return Either::Left(format!(
            "generation is not stable:\n{}",
            tree_diff(&first_tree, &second_tree)
        ));
    }
    Either::Right(second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Encoding;
    use crate::toy::{ToyGenerator, ToyParser};

    /// Appends a non-ASCII comment to whatever the toy generator emits.
    struct TrailingAccent;

    impl SourceGenerator for TrailingAccent {
        fn generate(&self, tree: &Tree) -> Either<GenerateError, String> {
            ToyGenerator
                .generate(tree)
                .map(|text| format!("{text}\n# caf\u{e9}"))
        }
    }

    fn ascii(text: &str) -> SourceText {
        SourceText::new(text.as_bytes().to_vec(), Encoding::UsAscii)
    }

    #[test]
    fn generator_introduced_encoding_failure_is_a_mismatch() {
        let validation = Validation::from_source(
            "a.toy",
            ascii("answer(42)"),
            &ToyParser::default(),
            &TrailingAccent,
        );
        assert!(matches!(
            validation.generated,
            Either::Left(ValidationError::Generate(GenerateError::Encoding { .. }))
        ));
        assert_eq!(validation.verdict(), Verdict::Mismatch);
        assert!(validation.failure_record().is_some());
    }

    #[test]
    fn encoding_failure_from_original_content_is_exempt() {
        let tree = ToyParser::default()
            .parse_str("puts(\"caf\u{e9}\")", "a.toy")
            .into_result()
            .unwrap();
        let validation = Validation::from_tree(
            "a.toy",
            tree,
            Some(ascii("")),
            &ToyParser::default(),
            &ToyGenerator,
        );
        assert_eq!(
            validation.verdict(),
            Verdict::Exempt(Exemption::GeneratedEncoding)
        );
    }

    #[test]
    fn validation_errors_serialize_with_their_stage() {
        let error = ValidationError::GeneratedSyntax(SyntaxError::new("a.toy", 1, 2, "bad"));
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["stage"], "generated_syntax");
        assert_eq!(value["message"], "bad");
    }
}
