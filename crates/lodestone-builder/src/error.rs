//! Error types for the build provenance pipeline.

use std::path::PathBuf;
use std::process::ExitStatus;

/// Errors from the lodestone build pipeline.
///
/// Every variant is terminal for the invocation: nothing is retried or
/// recovered internally. Variants carry enough structured context (observed
/// commit, persisted log file paths) for callers to branch on kind.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The source repository locator is not a parseable URI.
    #[error("invalid source repo URI `{uri}`: {source}")]
    InvalidUri {
        /// The locator as given by the caller.
        uri: String,
        /// The underlying parse error.
        source: url::ParseError,
    },

    /// The repo locator uses a scheme other than https or its git aliases.
    #[error("unsupported scheme `{0}` — want https, git+https, or https+git")]
    UnsupportedScheme(String),

    /// A digest string is not in `ALG:VALUE` form.
    #[error("invalid digest `{0}`: want ALG:VALUE with exactly one `:`")]
    InvalidDigest(String),

    /// Commit digests must use the sha1 commit-addressing scheme.
    #[error("git commit digest must be a sha1 digest, got `{0}`")]
    UnsupportedDigestAlg(String),

    /// A builder image reference is not fully pinned.
    #[error("invalid builder image `{0}`: want NAME@ALG:VALUE")]
    InvalidImage(String),

    /// The build config path could escape the checked-out source tree.
    #[error("build config path `{}` must be relative to the source root", .0.display())]
    NonRelativePath(PathBuf),

    /// The build config file failed to parse.
    #[error("invalid build config `{}`: {source}", .path.display())]
    InvalidBuildConfig {
        /// Path of the file that was read.
        path: PathBuf,
        /// The underlying TOML parse error.
        source: toml::de::Error,
    },

    /// The working tree is at a commit other than the declared one, and the
    /// resolution strategy is `Abort`.
    #[error("the repo is already checked out at a different commit (`{observed}`)")]
    CommitMismatch {
        /// The commit actually present on disk.
        observed: String,
    },

    /// `git clone` exited nonzero.
    #[error(
        "git clone failed ({status}); see {} for logs, and {} for errors",
        .log_file.display(), .err_file.display()
    )]
    CloneFailed {
        /// Exit status of the clone process.
        status: ExitStatus,
        /// Persisted stdout of the clone.
        log_file: PathBuf,
        /// Persisted stderr of the clone.
        err_file: PathBuf,
    },

    /// `git checkout` exited nonzero.
    #[error(
        "git checkout of `{commit}` failed ({status}); see {} for logs, and {} for errors",
        .log_file.display(), .err_file.display()
    )]
    CheckoutFailed {
        /// The commit that was being checked out.
        commit: String,
        /// Exit status of the checkout process.
        status: ExitStatus,
        /// Persisted stdout of the checkout.
        log_file: PathBuf,
        /// Persisted stderr of the checkout.
        err_file: PathBuf,
    },

    /// `docker run` exited nonzero.
    #[error(
        "docker run failed ({status}); see {} for logs, and {} for errors",
        .log_file.display(), .err_file.display()
    )]
    ContainerRunFailed {
        /// Exit status of the container run.
        status: ExitStatus,
        /// Persisted stdout of the container.
        log_file: PathBuf,
        /// Persisted stderr of the container.
        err_file: PathBuf,
    },

    /// The artifact path glob pattern is malformed.
    #[error("the pattern `{pattern}` is malformed: {source}")]
    BadPattern {
        /// The pattern as declared in the build config.
        pattern: String,
        /// The underlying glob error.
        source: glob::PatternError,
    },

    /// Files matching the artifact pattern exist before the build ran.
    #[error("the pattern `{pattern}` matches {count} existing files; expected no matches")]
    StaleArtifacts {
        /// The pattern as declared in the build config.
        pattern: String,
        /// How many pre-existing files matched.
        count: usize,
    },

    /// The build completed but produced nothing matching the pattern.
    #[error("no files matching the pattern `{0}`")]
    NoArtifacts(String),

    /// I/O error during the pipeline.
    #[error("build I/O error: {0}")]
    Io(#[from] std::io::Error),
}
