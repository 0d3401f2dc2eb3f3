//! Input flags and output handling shared by the subcommands.

use std::path::Path;

use clap::Args;
use color_eyre::eyre::Result;
use serde::Serialize;

use lodestone_builder::{BuildError, DockerBuildConfig, ResolutionStrategy};

/// Inputs identifying the pinned source, builder image, and build recipe.
#[derive(Args)]
pub struct InputArgs {
    /// URL of the source repo.
    #[arg(long)]
    pub source_repo: String,

    /// SHA1 git commit digest of the revision to build, as `sha1:HEX`.
    #[arg(long)]
    pub git_commit_digest: String,

    /// Builder image, fully pinned as `NAME@ALG:DIGEST`.
    #[arg(long)]
    pub builder_image: String,

    /// Path to a TOML build config file, relative to the source root.
    #[arg(long)]
    pub build_config_path: String,
}

impl InputArgs {
    /// Validate the raw flags into a typed config.
    pub fn into_config(self, strategy: ResolutionStrategy) -> Result<DockerBuildConfig, BuildError> {
        DockerBuildConfig::new(
            &self.source_repo,
            &self.git_commit_digest,
            &self.builder_image,
            &self.build_config_path,
            strategy,
        )
    }
}

/// Serialize `value` and write it to `path` in one shot, so a failed
/// pipeline never leaves a partial output file behind.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), "wrote output");
    Ok(())
}
