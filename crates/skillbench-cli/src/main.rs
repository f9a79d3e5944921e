mod backend;
mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "skillbench",
    about = "Run agent skill experiments against eval fixtures and gate on the outcome",
    version,
    propagate_version = true
)]
struct Cli {
    /// Bench root (default: auto-detect from evals/ or .git/)
    #[arg(long, global = true, env = "SKILLBENCH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an experiment over the fixture suite and gate on the outcome
    Run {
        /// Experiment name (experiments/<name>.yaml)
        #[arg(long, short = 'e')]
        experiment: String,

        /// Override the experiment's runs-per-fixture
        #[arg(long)]
        runs: Option<u32>,

        /// Only run fixtures whose name contains this substring
        #[arg(long)]
        fixture: Option<String>,

        /// Trace agent activity (same as RUST_LOG=debug)
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// List discovered fixtures and configured experiments
    List,

    /// Check that the external tools skillbench drives are installed
    Doctor,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { verbose: true, .. } => tracing::Level::DEBUG,
        _ => tracing::Level::WARN,
    };

    // Reports own stdout; diagnostics go to stderr so `--json` stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Run {
            experiment,
            runs,
            fixture,
            ..
        } => cmd::run::run(&root, &experiment, runs, fixture.as_deref(), cli.json),
        Commands::List => cmd::list::run(&root, cli.json),
        Commands::Doctor => cmd::doctor::run(cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
