//! Typed, validated build configuration.
//!
//! [`DockerBuildConfig::new`] turns the four raw user-supplied strings into
//! pinned identifiers. Validation is purely syntactic — no network or
//! filesystem access happens here.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use url::Url;

use crate::error::BuildError;

/// A cryptographic digest tagged with its algorithm, e.g. `sha1:abc123`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    /// Digest algorithm, e.g. `sha1` or `sha256`.
    pub alg: String,
    /// Hex-encoded digest value.
    pub value: String,
}

impl Digest {
    /// The single-entry algorithm → value map used in provenance records.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.alg.clone(), self.value.clone())])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.alg, self.value)
    }
}

impl FromStr for Digest {
    type Err = BuildError;

    /// Parse an `ALG:VALUE` digest string with exactly one separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [alg, value] if !alg.is_empty() && !value.is_empty() => Ok(Self {
                alg: (*alg).to_owned(),
                value: (*value).to_owned(),
            }),
            _ => Err(BuildError::InvalidDigest(s.to_owned())),
        }
    }
}

/// A fully-pinned container image reference, `NAME@ALG:VALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImage {
    /// Image name, e.g. `ghcr.io/example/img`.
    pub name: String,
    /// The pinning digest.
    pub digest: Digest,
}

impl fmt::Display for DockerImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.digest)
    }
}

impl FromStr for DockerImage {
    type Err = BuildError;

    /// Parse a pinned image reference. A mutable-tag reference (no
    /// `@digest` part) is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('@').collect();
        match parts.as_slice() {
            [name, digest] if !name.is_empty() => Ok(Self {
                name: (*name).to_owned(),
                digest: digest
                    .parse()
                    .map_err(|_| BuildError::InvalidImage(s.to_owned()))?,
            }),
            _ => Err(BuildError::InvalidImage(s.to_owned())),
        }
    }
}

/// Policy for a working tree checked out at a commit other than the
/// declared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Terminate with a commit-mismatch error.
    Abort,
    /// Clone and check out the declared commit.
    Checkout,
    /// Proceed, recording the checked-out commit as the effective digest.
    Ignore,
}

/// A validated user invocation.
///
/// Immutable once constructed; source resolution derives an updated copy
/// via [`DockerBuildConfig::with_effective_digest`] rather than mutating
/// in place.
#[derive(Debug, Clone)]
pub struct DockerBuildConfig {
    /// Locator of the source repository.
    pub source_repo: String,
    /// The declared (or, in a derived copy, effective) commit digest.
    pub source_digest: Digest,
    /// The pinned builder image.
    pub builder_image: DockerImage,
    /// Path to the build config file, relative to the source root.
    pub build_config_path: PathBuf,
    /// How to resolve a commit mismatch.
    pub resolution_strategy: ResolutionStrategy,
}

impl DockerBuildConfig {
    /// Validate the raw user inputs into a typed config.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the repo locator is not a URI, the
    /// digest is not `ALG:VALUE`, the image is not `NAME@ALG:VALUE`, or
    /// the build config path is not relative.
    pub fn new(
        source_repo: &str,
        source_digest: &str,
        builder_image: &str,
        build_config_path: &str,
        resolution_strategy: ResolutionStrategy,
    ) -> Result<Self, BuildError> {
        Url::parse(source_repo).map_err(|source| BuildError::InvalidUri {
            uri: source_repo.to_owned(),
            source,
        })?;

        let path = Path::new(build_config_path);
        if path.is_absolute() {
            return Err(BuildError::NonRelativePath(path.to_path_buf()));
        }

        Ok(Self {
            source_repo: source_repo.to_owned(),
            source_digest: source_digest.parse()?,
            builder_image: builder_image.parse()?,
            build_config_path: path.to_path_buf(),
            resolution_strategy,
        })
    }

    /// Derived copy carrying the commit digest actually present on disk
    /// after resolution. The original config is left untouched.
    #[must_use]
    pub fn with_effective_digest(&self, digest: Digest) -> Self {
        Self {
            source_digest: digest,
            ..self.clone()
        }
    }
}

/// The user's build recipe, loaded once from a TOML file in the source tree.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// The command to run inside the builder image, as a literal argv.
    pub command: Vec<String>,
    /// Glob pattern matching built artifacts, relative to the source root.
    pub artifact_path: String,
}

impl BuildConfig {
    /// Load and parse the build recipe at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] if the file cannot be read, or
    /// [`BuildError::InvalidBuildConfig`] if it is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|source| BuildError::InvalidBuildConfig {
            path: path.to_path_buf(),
            source,
        })
    }
}
