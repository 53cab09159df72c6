//! CLI frontend for the Terrashark evolution simulator.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::SessionArgs;

#[derive(Parser)]
#[command(
    name = "terrashark",
    about = "Terrashark: watch evolution happen on a grid",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and print a population report
    Run {
        #[command(flatten)]
        session: SessionArgs,

        /// Pace ticks to the configured tick rate
        #[arg(long)]
        realtime: bool,

        /// Show all events (not just a summary)
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run a simulation and write its event log as JSON lines
    Export {
        #[command(flatten)]
        session: SessionArgs,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the default configuration as JSON
    Config,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            session,
            realtime,
            verbose,
        } => commands::run::run(&session, realtime, verbose),
        Commands::Export { session, output } => commands::export::run(&session, output.as_deref()),
        Commands::Config => commands::config::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` overrides the
/// default `warn` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
