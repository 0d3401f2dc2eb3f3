//! `lodestone dry-run` — resolve the inputs and emit the `BuildDefinition`
//! without running the container.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use color_eyre::eyre::Result;

use lodestone_builder::{Builder, ResolutionStrategy};

use super::common::{write_json, InputArgs};

/// Commit-mismatch strategies accepted by `dry-run`.
///
/// `ignore` is only meaningful here: a dry run may describe whatever is
/// checked out, while a real build may not proceed on an unresolved
/// mismatch silently.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum DryRunStrategy {
    /// Fail on a commit mismatch.
    Abort,
    /// Clone and check out the declared commit on a mismatch.
    Checkout,
    /// Proceed, recording the checked-out commit as the effective digest.
    Ignore,
}

impl From<DryRunStrategy> for ResolutionStrategy {
    fn from(strategy: DryRunStrategy) -> Self {
        match strategy {
            DryRunStrategy::Abort => Self::Abort,
            DryRunStrategy::Checkout => Self::Checkout,
            DryRunStrategy::Ignore => Self::Ignore,
        }
    }
}

/// Generate and store a JSON-formatted `BuildDefinition` from the inputs.
#[derive(Args)]
pub struct DryRunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Path to store the generated BuildDefinition JSON to.
    #[arg(short = 'o', long)]
    pub build_definition_path: PathBuf,

    /// Strategy for resolving an unexpectedly checked-out commit.
    #[arg(short = 'r', long, value_enum, default_value_t = DryRunStrategy::Abort)]
    pub resolution_strategy: DryRunStrategy,
}

/// Execute the `dry-run` command.
///
/// # Errors
///
/// Returns an error if validation, source resolution, or writing the
/// output fails.
pub fn execute(args: DryRunArgs) -> Result<()> {
    let config = args.input.into_config(args.resolution_strategy.into())?;
    let workdir = std::env::current_dir()?;

    let build = Builder::with_git_fetcher(config, workdir)?.setup()?;
    let result = write_json(&args.build_definition_path, &build.build_definition());
    build.release();
    result
}
