//! Build provenance for docker-pinned builds.
//!
//! `lodestone-builder` resolves a working tree against a declared git
//! commit under an explicit conflict-resolution policy, runs a user
//! command inside a digest-pinned builder image, content-addresses the
//! resulting artifacts, and assembles the [`provenance::BuildDefinition`]
//! and [`provenance::Subject`] list consumed by a downstream signing
//! component.
//!
//! The pipeline is strictly sequential: validate → resolve source → run
//! build → digest artifacts → assemble provenance.

pub mod build;
pub mod config;
pub mod error;
pub mod exec;
pub mod fetcher;
pub mod provenance;

// Re-export primary types for convenience.
pub use build::{Builder, DockerBuild};
pub use config::{BuildConfig, Digest, DockerBuildConfig, DockerImage, ResolutionStrategy};
pub use error::BuildError;
pub use fetcher::{Fetcher, GitFetcher, RepoCheckoutInfo};
