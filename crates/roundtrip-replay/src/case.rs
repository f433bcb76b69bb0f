//! Test cases: captures tagged with the suite test that produced them.

use crate::adapter::{BuilderAttributes, Capture, CaptureAdapter, CaptureBuffer};
use crate::suite::{ExternalSuite, SuiteError};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    pub name: String,
    /// Position of this capture among those of the same test, from zero.
    pub group_index: usize,
    pub fixture: Capture,
}

impl TestCase {
    /// `name[group_index]`, the form used by triage lists and status lines.
    pub fn key(&self) -> String {
        format!("{}[{}]", self.name, self.group_index)
    }
}

/// Run every suite test through a capturing adapter and collect the
/// captures, sorted by test name and then by capture order.
pub fn collect_test_cases(
    suite: &dyn ExternalSuite,
    defaults: &BuilderAttributes,
) -> Result<Vec<TestCase>, SuiteError> {
    let mut buffer = CaptureBuffer::new();
    let mut adapter = CaptureAdapter::new(&mut buffer, defaults.clone());
    let mut cases = Vec::new();
    for name in suite.test_names() {
        adapter.begin_test();
        suite.run_test(&name, &mut adapter)?;
        let captures = adapter.drain();
        debug!(test = %name, captures = captures.len(), "captured");
        cases.extend(
            captures
                .into_iter()
                .enumerate()
                .map(|(group_index, fixture)| TestCase {
                    name: name.clone(),
                    group_index,
                    fixture,
                }),
        );
    }
    cases.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.group_index.cmp(&b.group_index))
    });
    Ok(cases)
}

/// Keep only cases whose name contains `pattern`.
pub fn filter_cases(cases: Vec<TestCase>, pattern: &str) -> Vec<TestCase> {
    cases
        .into_iter()
        .filter(|case| case.name.contains(pattern))
        .collect()
}
