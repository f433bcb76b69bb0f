use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "roundtrip",
    about = "Roundtrip: verify that generated source reparses to the tree it came from",
    version
)]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check out registered projects and round-trip every source file
    Corpus {
        /// Projects to verify (default: every registered project)
        names: Vec<String>,

        /// Print the registered project names and exit
        #[arg(long)]
        list: bool,

        /// Registry TOML replacing the built-in one
        #[arg(long)]
        registry: Option<String>,

        /// Directory projects are checked out into
        #[arg(long, default_value = "tmp/corpus")]
        workdir: String,

        /// Worker threads (default: available parallelism)
        #[arg(long)]
        jobs: Option<usize>,

        /// Milliseconds between progress lines
        #[arg(long, default_value_t = 1000)]
        poll_interval_ms: u64,

        /// Verify existing trees under the workdir without touching git
        #[arg(long)]
        no_checkout: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay an external grammar suite through the generator
    Replay {
        /// Suite document or directory of documents (default: fetch upstream)
        #[arg(long)]
        suite: Option<String>,

        /// Directory the upstream suite is fetched into
        #[arg(long, default_value = "tmp")]
        workdir: String,

        /// Only replay tests whose name contains this text
        #[arg(long)]
        filter: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
