//! `lodestone build` — run the full pinned build and emit the subject
//! digests of the generated artifacts.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use color_eyre::eyre::Result;

use lodestone_builder::{Builder, ResolutionStrategy};

use super::common::{write_json, InputArgs};

/// Commit-mismatch strategies accepted by `build`. No `ignore` here: a
/// build cannot proceed on an unresolved mismatch silently.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum BuildStrategy {
    /// Fail on a commit mismatch.
    Abort,
    /// Clone and check out the declared commit on a mismatch.
    Checkout,
}

impl From<BuildStrategy> for ResolutionStrategy {
    fn from(strategy: BuildStrategy) -> Self {
        match strategy {
            BuildStrategy::Abort => Self::Abort,
            BuildStrategy::Checkout => Self::Checkout,
        }
    }
}

/// Build the artifacts using the build config, source repo, and builder
/// image.
#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Path to store a JSON-encoded array of subjects of the generated
    /// artifacts.
    #[arg(short = 'o', long)]
    pub subjects_path: PathBuf,

    /// Strategy for resolving an unexpectedly checked-out commit.
    #[arg(short = 'r', long, value_enum, default_value_t = BuildStrategy::Abort)]
    pub resolution_strategy: BuildStrategy,
}

/// Execute the `build` command.
///
/// # Errors
///
/// Returns an error if validation, source resolution, the container run,
/// artifact digesting, or writing the output fails.
pub fn execute(args: BuildArgs) -> Result<()> {
    let config = args.input.into_config(args.resolution_strategy.into())?;
    let workdir = std::env::current_dir()?;

    let mut build = Builder::with_git_fetcher(config, workdir)?.setup()?;
    let result = build
        .build_artifacts()
        .map_err(Into::into)
        .and_then(|subjects| write_json(&args.subjects_path, &subjects));
    build.release();
    result
}
