//! Sequential replay of test cases with a stable, greppable status line.

use crate::case::TestCase;
use crate::suite::SuiteError;
use crate::triage::{Triage, TriagePolicy};
use roundtrip_kernel::{SourceGenerator, SourceParser, SourceText, Validation, Verdict};
use serde::Serialize;
use std::io::Write;
use tracing::{debug, info};

pub const UNEXPECTED_SUCCESS: &str = "Expected Failure but got success";
pub const UNEXPECTED_FAILURE: &str = "Expected Success";

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Suite(#[from] SuiteError),

    #[error("cannot write replay output: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Skip,
    ExpectedFailure,
    Failure,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Skip => "Skip",
            Self::ExpectedFailure => "Expected Failure",
            Self::Failure => "Failure",
        }
    }
}

/// The case that ended the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayFailure {
    pub name: String,
    pub group_index: usize,
    pub message: String,
    pub report: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub total: usize,
    pub executed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub expected_failures: usize,
    pub failure: Option<ReplayFailure>,
}

impl ReplaySummary {
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }
}

/// `{index}/{total} {status}: {name}[{group}] - {message}`, with index and
/// total zero-padded to the width of `total`.
pub fn status_line(
    index: usize,
    total: usize,
    status: Status,
    case: &TestCase,
    message: Option<&str>,
) -> String {
    let width = total.to_string().len();
    let message = message.map(|m| format!(" - {m}")).unwrap_or_default();
    format!(
        "{index:0width$}/{total:0width$} {:>16}: {}[{}]{message}",
        status.label(),
        case.name,
        case.group_index,
    )
}

pub struct Replayer<'a> {
    parser: &'a dyn SourceParser,
    generator: &'a dyn SourceGenerator,
    policy: TriagePolicy,
}

impl<'a> Replayer<'a> {
    pub fn new(
        parser: &'a dyn SourceParser,
        generator: &'a dyn SourceGenerator,
        policy: TriagePolicy,
    ) -> Self {
        Self {
            parser,
            generator,
            policy,
        }
    }

    pub fn policy(&self) -> &TriagePolicy {
        &self.policy
    }

    fn validate(&self, case: &TestCase) -> Validation {
        Validation::from_tree(
            case.key(),
            case.fixture.node.clone(),
            Some(SourceText::utf8(case.fixture.parser_source.clone())),
            self.parser,
            self.generator,
        )
    }

    /// Replay `cases` in order, writing one status line per case. Stops at
    /// the first unexpected outcome, after writing its report.
    pub fn run<W: Write>(
        &self,
        cases: &[TestCase],
        out: &mut W,
    ) -> Result<ReplaySummary, ReplayError> {
        let total = cases.len();
        let mut summary = ReplaySummary {
            total,
            ..ReplaySummary::default()
        };
        info!(total, version = self.parser.version(), "replaying");

        for (offset, case) in cases.iter().enumerate() {
            let index = offset + 1;
            summary.executed += 1;
            let (status, message, report) = match self.policy.triage(case, self.parser) {
                Triage::Skip(reason) => {
                    debug!(case = %case.key(), %reason, "skipped");
                    summary.skipped += 1;
                    (Status::Skip, Some(reason.to_string()), None)
                }
                Triage::ExpectedFailure => {
                    let validation = self.validate(case);
                    if validation.verdict() == Verdict::Mismatch {
                        summary.expected_failures += 1;
                        (Status::ExpectedFailure, None, None)
                    } else {
                        (Status::Failure, Some(UNEXPECTED_SUCCESS.to_string()), None)
                    }
                }
                Triage::ExpectedSuccess => {
                    let validation = self.validate(case);
                    match validation.verdict() {
                        Verdict::Equivalent => {
                            summary.succeeded += 1;
                            (Status::Success, None, None)
                        }
                        Verdict::Exempt(exemption) => {
                            summary.succeeded += 1;
                            (Status::Success, Some(format!("exempt: {exemption}")), None)
                        }
                        Verdict::Mismatch => (
                            Status::Failure,
                            Some(UNEXPECTED_FAILURE.to_string()),
                            validation.report(),
                        ),
                    }
                }
            };

            writeln!(
                out,
                "{}",
                status_line(index, total, status, case, message.as_deref())
            )?;

            if status == Status::Failure {
                if let Some(report) = &report {
                    writeln!(out, "{report}")?;
                }
                summary.failure = Some(ReplayFailure {
                    name: case.name.clone(),
                    group_index: case.group_index,
                    message: message.unwrap_or_default(),
                    report,
                });
                break;
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Capture;
    use roundtrip_kernel::{Node, Tree};

    fn case(name: &str, group_index: usize) -> TestCase {
        TestCase {
            name: name.to_string(),
            group_index,
            fixture: Capture {
                node: Tree::from(Node::parse_sexp("(int 1)").unwrap()),
                parser_source: "1".to_string(),
                default_builder_attributes: Default::default(),
                versions: Default::default(),
            },
        }
    }

    #[test]
    fn status_line_pads_index_to_total_width() {
        assert_eq!(
            status_line(7, 120, Status::Skip, &case("test_x", 2), Some("syntax error")),
            "007/120             Skip: test_x[2] - syntax error"
        );
        assert_eq!(
            status_line(1, 9, Status::ExpectedFailure, &case("test_y", 0), None),
            "1/9 Expected Failure: test_y[0]"
        );
    }
}
