use crate::support::{exit_with, load_registry_or_exit, now_rfc3339, print_json, select_or_exit};
use roundtrip_corpus::{Driver, ProjectOutcome, VerifyOptions, verify_project};
use roundtrip_kernel::{SourceParser, ToyGenerator, ToyParser};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub struct Args {
    pub names: Vec<String>,
    pub list: bool,
    pub registry: Option<String>,
    pub workdir: String,
    pub jobs: Option<usize>,
    pub poll_interval_ms: u64,
    pub no_checkout: bool,
    pub json: bool,
}

pub fn run(args: Args) {
    let registry = load_registry_or_exit(args.registry.as_deref());

    if args.list {
        if args.json {
            let names: Vec<&str> = registry.names().collect();
            print_json(&json!({ "registry": registry.origin(), "projects": names }));
        } else {
            for name in registry.names() {
                println!("{name}");
            }
        }
        return;
    }

    let projects = select_or_exit(&registry, &args.names);
    let workdir = PathBuf::from(&args.workdir);
    let poll_interval = Duration::from_millis(args.poll_interval_ms.max(1));
    let workers = args.jobs.unwrap_or(Driver::default().workers);
    let mut driver = Driver::new(workers, poll_interval);
    if args.json {
        driver = driver.quiet();
    }
    let options = VerifyOptions {
        driver,
        checkout: !args.no_checkout,
        print_reports: !args.json,
        ..VerifyOptions::default()
    };

    let parser = ToyParser::default();
    let started_at = now_rfc3339();
    let mut outcomes: Vec<ProjectOutcome> = Vec::new();
    for project in &projects {
        let outcome = verify_project(project, &workdir, &options, &parser, &ToyGenerator)
            .unwrap_or_else(|e| exit_with(e));
        let passed = outcome.success();
        outcomes.push(outcome);
        if !passed {
            break;
        }
    }
    let success = outcomes.iter().all(ProjectOutcome::success);
    let skipped = projects.len() - outcomes.len();
    info!(verified = outcomes.len(), skipped, success, "corpus finished");

    if args.json {
        print_json(&json!({
            "registry": registry.origin(),
            "workdir": workdir.display().to_string(),
            "parser_version": parser.version(),
            "started_at": started_at,
            "finished_at": now_rfc3339(),
            "projects": &outcomes,
            "skipped_projects": skipped,
            "success": success,
        }));
    } else {
        println!("roundtrip corpus");
        println!("  Registry: {}", registry.origin());
        println!("  Workdir: {}", workdir.display());
        for outcome in &outcomes {
            println!(
                "  {}: {} files, {} failures{}",
                outcome.name,
                outcome.total,
                outcome.failures.len(),
                outcome
                    .head
                    .as_deref()
                    .map(|head| format!(" @ {head}"))
                    .unwrap_or_default()
            );
        }
        if skipped > 0 {
            println!("  Not verified: {skipped}");
        }
        println!("  Result: {}", if success { "pass" } else { "fail" });
    }

    if !success {
        std::process::exit(1);
    }
}
