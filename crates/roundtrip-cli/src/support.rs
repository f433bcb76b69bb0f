use chrono::{SecondsFormat, Utc};
use roundtrip_corpus::{ProjectDescriptor, Registry};
use roundtrip_git::GitClient;
use roundtrip_replay::{DocumentSuite, TestCase, TriagePolicy, collect_test_cases};
use std::path::{Path, PathBuf};

pub fn exit_with(error: impl std::fmt::Display) -> ! {
    eprintln!("error: {error}");
    std::process::exit(1);
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn print_json(payload: &serde_json::Value) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(e) => exit_with(e),
    }
}

pub fn load_registry_or_exit(path: Option<&str>) -> Registry {
    let loaded = match path {
        Some(path) => Registry::load(path),
        None => Registry::embedded(),
    };
    loaded.unwrap_or_else(|e| exit_with(e))
}

pub fn select_or_exit<'r>(registry: &'r Registry, names: &[String]) -> Vec<&'r ProjectDescriptor> {
    registry.select(names).unwrap_or_else(|e| exit_with(e))
}

pub fn suite_path_or_exit(suite: Option<String>, workdir: &Path, version: &str) -> PathBuf {
    match suite {
        Some(path) => PathBuf::from(path),
        None => roundtrip_replay::fetch_upstream(
            &GitClient::default(),
            roundtrip_replay::UPSTREAM_SUITE_URI,
            workdir,
            version,
        )
        .unwrap_or_else(|e| exit_with(e)),
    }
}

pub fn test_cases_or_exit(path: &Path, policy: &TriagePolicy) -> (DocumentSuite, Vec<TestCase>) {
    let suite = DocumentSuite::load(path).unwrap_or_else(|e| exit_with(e));
    let cases = collect_test_cases(&suite, &policy.default_builder_attributes)
        .unwrap_or_else(|e| exit_with(e));
    (suite, cases)
}
