use crate::support::{exit_with, now_rfc3339, print_json, suite_path_or_exit, test_cases_or_exit};
use roundtrip_kernel::{SourceParser, ToyGenerator, ToyParser};
use roundtrip_replay::{Replayer, TriagePolicy, filter_cases};
use serde_json::json;
use std::path::PathBuf;
use tracing::warn;

pub fn run(suite: Option<String>, workdir: String, filter: Option<String>, json_output: bool) {
    let parser = ToyParser::default();
    let policy = TriagePolicy::default();
    let suite_path = suite_path_or_exit(suite, &PathBuf::from(&workdir), parser.version());
    let (document, mut cases) = test_cases_or_exit(&suite_path, &policy);
    if !document.versions().iter().any(|v| v == parser.version()) {
        warn!(
            suite = ?document.versions(),
            parser = parser.version(),
            "suite was not written for this grammar version"
        );
    }
    if let Some(pattern) = filter.as_deref() {
        cases = filter_cases(cases, pattern);
    }

    let started_at = now_rfc3339();
    let replayer = Replayer::new(&parser, &ToyGenerator, policy);
    let summary = if json_output {
        let mut buffer = Vec::new();
        let summary = replayer
            .run(&cases, &mut buffer)
            .unwrap_or_else(|e| exit_with(e));
        let output = String::from_utf8_lossy(&buffer);
        let lines: Vec<&str> = output.lines().collect();
        print_json(&json!({
            "suite": suite_path.display().to_string(),
            "parser_version": parser.version(),
            "filter": &filter,
            "started_at": started_at,
            "finished_at": now_rfc3339(),
            "summary": &summary,
            "lines": lines,
            "success": summary.success(),
        }));
        summary
    } else {
        let summary = replayer
            .run(&cases, &mut std::io::stdout().lock())
            .unwrap_or_else(|e| exit_with(e));
        println!(
            "roundtrip replay: {} run, {} succeeded, {} skipped, {} expected failures",
            summary.executed, summary.succeeded, summary.skipped, summary.expected_failures
        );
        summary
    };

    if !summary.success() {
        std::process::exit(1);
    }
}
