//! Skip and expected-failure triage for replayed test cases.

use crate::adapter::BuilderAttributes;
use crate::case::TestCase;
use roundtrip_kernel::{SourceParser, SourceText};
use serde::Serialize;
use std::collections::BTreeSet;

/// Why a case is not replayed. Variants are listed in priority order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Captured under non-default builder attributes.
    LegacyAttributes,
    /// Declares versions that exclude the running grammar.
    VersionExcluded { version: String },
    /// The fixture source does not parse.
    SyntaxError,
    /// Known not to round-trip.
    Denylisted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LegacyAttributes => write!(f, "legacy builder attributes"),
            Self::VersionExcluded { version } => write!(f, "excluded for version {version}"),
            Self::SyntaxError => write!(f, "syntax error"),
            Self::Denylisted => write!(f, "denylisted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Triage {
    Skip(SkipReason),
    ExpectedFailure,
    ExpectedSuccess,
}

/// Fixed lists that drive triage. Entries are either a test name, which
/// covers every group, or `name[group]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriagePolicy {
    pub default_builder_attributes: BuilderAttributes,
    pub denylist: BTreeSet<String>,
    pub expected_failures: BTreeSet<String>,
}

impl Default for TriagePolicy {
    fn default() -> Self {
        Self {
            default_builder_attributes: BuilderAttributes::from([
                ("fold_negative_literals".to_string(), true),
                ("emit_positional_literals".to_string(), true),
            ]),
            // Positional literals reparse to whatever line and file the
            // generated text lands on.
            denylist: ["test_line_literal", "test_file_literal"]
                .into_iter()
                .map(String::from)
                .collect(),
            // Float literals that overflow to infinity have no spelling.
            expected_failures: ["test_float_overflow"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl TriagePolicy {
    fn listed(list: &BTreeSet<String>, case: &TestCase) -> bool {
        list.contains(&case.name) || list.contains(&case.key())
    }

    pub fn is_denylisted(&self, case: &TestCase) -> bool {
        Self::listed(&self.denylist, case)
    }

    pub fn is_expected_failure(&self, case: &TestCase) -> bool {
        Self::listed(&self.expected_failures, case)
    }

    /// First matching skip reason, in fixed priority order.
    pub fn skip_reason<P>(&self, case: &TestCase, parser: &P) -> Option<SkipReason>
    where
        P: SourceParser + ?Sized,
    {
        if case.fixture.default_builder_attributes != self.default_builder_attributes {
            return Some(SkipReason::LegacyAttributes);
        }
        let version = parser.version();
        if !case.fixture.applies_to(version) {
            return Some(SkipReason::VersionExcluded {
                version: version.to_string(),
            });
        }
        let source = SourceText::utf8(case.fixture.parser_source.clone());
        if parser.parse(&source, &case.key()).is_left() {
            return Some(SkipReason::SyntaxError);
        }
        if self.is_denylisted(case) {
            return Some(SkipReason::Denylisted);
        }
        None
    }

    pub fn triage<P>(&self, case: &TestCase, parser: &P) -> Triage
    where
        P: SourceParser + ?Sized,
    {
        if let Some(reason) = self.skip_reason(case, parser) {
            Triage::Skip(reason)
        } else if self.is_expected_failure(case) {
            Triage::ExpectedFailure
        } else {
            Triage::ExpectedSuccess
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Capture;
    use roundtrip_kernel::{Node, ToyParser, Tree};

    fn case(name: &str, source: &str) -> TestCase {
        TestCase {
            name: name.to_string(),
            group_index: 0,
            fixture: Capture {
                node: Tree::from(Node::parse_sexp("(int 1)").unwrap()),
                parser_source: source.to_string(),
                default_builder_attributes: TriagePolicy::default().default_builder_attributes,
                versions: Default::default(),
            },
        }
    }

    #[test]
    fn legacy_attributes_win_over_every_other_reason() {
        let policy = TriagePolicy::default();
        let mut c = case("test_line_literal", "1 +");
        c.fixture.versions.insert("0.1".to_string());
        c.fixture
            .default_builder_attributes
            .insert("fold_negative_literals".to_string(), false);
        assert_eq!(
            policy.triage(&c, &ToyParser::default()),
            Triage::Skip(SkipReason::LegacyAttributes)
        );
    }

    #[test]
    fn version_gate_precedes_syntax_and_denylist() {
        let policy = TriagePolicy::default();
        let mut c = case("test_line_literal", "1 +");
        c.fixture.versions.insert("0.1".to_string());
        assert_eq!(
            policy.skip_reason(&c, &ToyParser::default()),
            Some(SkipReason::VersionExcluded {
                version: "1.0".to_string()
            })
        );
        c.fixture.versions.insert("1.0".to_string());
        assert_eq!(
            policy.skip_reason(&c, &ToyParser::default()),
            Some(SkipReason::SyntaxError)
        );
    }

    #[test]
    fn denylist_matches_name_or_group_key() {
        let mut policy = TriagePolicy::default();
        let parser = ToyParser::default();
        assert_eq!(
            policy.skip_reason(&case("test_file_literal", "__FILE__"), &parser),
            Some(SkipReason::Denylisted)
        );
        policy.denylist.insert("test_int[1]".to_string());
        let mut second = case("test_int", "1");
        assert_eq!(policy.skip_reason(&second, &parser), None);
        second.group_index = 1;
        assert_eq!(
            policy.skip_reason(&second, &parser),
            Some(SkipReason::Denylisted)
        );
    }

    #[test]
    fn expected_failure_only_when_not_skipped() {
        let policy = TriagePolicy::default();
        let parser = ToyParser::default();
        assert_eq!(
            policy.triage(&case("test_float_overflow", "1e400"), &parser),
            Triage::ExpectedFailure
        );
        assert_eq!(
            policy.triage(&case("test_float_overflow", "1e400 +"), &parser),
            Triage::Skip(SkipReason::SyntaxError)
        );
        assert_eq!(
            policy.triage(&case("test_int", "1"), &parser),
            Triage::ExpectedSuccess
        );
    }
}
