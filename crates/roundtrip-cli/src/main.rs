//! Roundtrip CLI: the `roundtrip` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Corpus {
            names,
            list,
            registry,
            workdir,
            jobs,
            poll_interval_ms,
            no_checkout,
            json,
        } => commands::corpus::run(commands::corpus::Args {
            names,
            list,
            registry,
            workdir,
            jobs,
            poll_interval_ms,
            no_checkout,
            json,
        }),

        Commands::Replay {
            suite,
            workdir,
            filter,
            json,
        } => commands::replay::run(suite, workdir, filter, json),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("roundtrip={level}").into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
