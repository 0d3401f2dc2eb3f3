//! lodestone — build provenance for docker-pinned builds.
//!
//! Resolve a source revision, run a pinned builder image, and emit the
//! provenance records a signing component turns into attestations.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

/// Generate verifiable build provenance for artifacts built by a pinned
/// command inside a digest-pinned docker image against a digest-pinned
/// source commit.
#[derive(Parser)]
#[command(name = "lodestone", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (repeat for more detail: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output logs as JSON (for machine consumption).
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Resolve the inputs and store the BuildDefinition JSON without
    /// running the container.
    DryRun(commands::dry_run::DryRunArgs),
    /// Run the full pinned build and store the subject digests JSON.
    Build(commands::build::BuildArgs),
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::DryRun(args) => commands::dry_run::execute(args),
        Commands::Build(args) => commands::build::execute(args),
    }
}
