//! Differential replay harness.
//!
//! ```text
//! ExternalSuite ──run_test──▶ CaptureAdapter ──▶ CaptureBuffer
//!                                                   │ drain per test
//!                                                   ▼
//!                              collect_test_cases ─▶ Vec<TestCase> (sorted)
//!                                                   │
//!                              Replayer::run ── TriagePolicy ── Validation
//! ```
//!
//! Replay is strictly sequential so the status lines come out in the same
//! order on every run.

pub mod adapter;
pub mod case;
pub mod runner;
pub mod suite;
pub mod triage;

pub use adapter::{Assertions, BuilderAttributes, Capture, CaptureAdapter, CaptureBuffer, Versions};
pub use case::{TestCase, collect_test_cases, filter_cases};
pub use runner::{
    ReplayError, ReplayFailure, ReplaySummary, Replayer, Status, UNEXPECTED_FAILURE,
    UNEXPECTED_SUCCESS, status_line,
};
pub use suite::{
    Call, DocumentSuite, ExternalSuite, SuiteDocument, SuiteError, TestDocument,
    UPSTREAM_SUITE_URI, fetch_upstream,
};
pub use triage::{SkipReason, Triage, TriagePolicy};
