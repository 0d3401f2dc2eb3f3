//! Source resolution against a declared commit.
//!
//! Decides whether the working tree already satisfies the declared commit
//! and, if not, clones and checks out the exact commit under the caller's
//! resolution strategy. Repository state is observed with `gix`; mutations
//! (clone, checkout) shell out to the git CLI through
//! [`crate::exec::run_captured`], so the `Abort`-on-mismatch path performs
//! no subprocess calls at all.

use std::path::{Path, PathBuf};

use url::Url;

use crate::config::{Digest, DockerBuildConfig, ResolutionStrategy};
use crate::error::BuildError;
use crate::exec::{discard_log, run_captured};

/// Location of a locally materialized source tree.
#[derive(Debug, Default)]
pub struct RepoCheckoutInfo {
    /// Absolute path to the root of a temporary clone. `None` when the
    /// existing working tree already satisfied the declared commit.
    pub repo_root: Option<PathBuf>,
    /// The temp directory holding the clone, removed on [`cleanup`](Self::cleanup).
    scratch_dir: Option<PathBuf>,
    /// Log files of successful subprocess steps, removed on cleanup.
    /// A failing step's logs live in its error instead, and survive.
    step_logs: Vec<PathBuf>,
}

impl RepoCheckoutInfo {
    /// The existing working tree satisfies the commit; nothing to release.
    fn existing() -> Self {
        Self::default()
    }

    /// Best-effort removal of the temporary clone and step logs.
    ///
    /// Build toolchains may leave files that cannot be removed; failure is
    /// logged and non-fatal, never retried.
    pub fn cleanup(&self) {
        if let Some(dir) = &self.scratch_dir {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to remove temp clone");
            }
        }
        for log in &self.step_logs {
            discard_log(log);
        }
    }
}

/// How source is obtained: a single resolution behavior with one production
/// variant ([`GitFetcher`]) and stub variants in tests.
pub trait Fetcher {
    /// Materialize (or verify) the source tree for the declared commit.
    ///
    /// # Errors
    ///
    /// Returns a commit-mismatch error under the `Abort` strategy, or a
    /// clone/checkout failure when fetching is needed and fails.
    fn fetch(&mut self) -> Result<RepoCheckoutInfo, BuildError>;

    /// The commit digest actually present on disk after [`fetch`](Self::fetch).
    ///
    /// Never the caller-declared digest once resolution has observed a
    /// different HEAD under the `Ignore` strategy.
    fn effective_digest(&self) -> Digest;
}

/// Resolution verdict for the working tree at the fetcher's root.
#[derive(Debug, PartialEq, Eq)]
enum Resolution {
    /// The tree (or the `Ignore` strategy) satisfies the declared commit.
    Satisfied,
    /// A clone and checkout of the declared commit is required.
    NeedsFetch,
}

/// Production [`Fetcher`] backed by a git repository over https.
#[derive(Debug)]
pub struct GitFetcher {
    /// Normalized (https) repository locator.
    source_repo: String,
    source_digest: Digest,
    effective_digest: Digest,
    resolution_strategy: ResolutionStrategy,
    /// Clone depth; 0 means full history.
    depth: u32,
    /// Directory whose working tree is resolved against the declared commit.
    workdir: PathBuf,
}

impl GitFetcher {
    /// Create a fetcher for `config`, rooted at `workdir`.
    ///
    /// Normalizes the repository locator: `https` is accepted as-is, the
    /// compatibility aliases `git+https` and `https+git` are rewritten to
    /// `https`, and any other scheme is rejected here — before any
    /// subprocess runs. A `depth` of 0 clones the full history.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::InvalidUri`] or [`BuildError::UnsupportedScheme`].
    pub fn new(
        config: &DockerBuildConfig,
        workdir: PathBuf,
        depth: u32,
    ) -> Result<Self, BuildError> {
        let parsed = Url::parse(&config.source_repo).map_err(|source| BuildError::InvalidUri {
            uri: config.source_repo.clone(),
            source,
        })?;

        let source_repo = match parsed.scheme() {
            "https" => config.source_repo.clone(),
            "git+https" => config.source_repo.replacen("git+https", "https", 1),
            "https+git" => config.source_repo.replacen("https+git", "https", 1),
            other => return Err(BuildError::UnsupportedScheme(other.to_owned())),
        };

        Ok(Self {
            source_repo,
            source_digest: config.source_digest.clone(),
            effective_digest: config.source_digest.clone(),
            resolution_strategy: config.resolution_strategy,
            depth,
            workdir,
        })
    }

    /// Apply the resolution-strategy table to the observed on-disk state.
    ///
    /// | On-disk state    | Strategy   | Outcome                           |
    /// |------------------|------------|-----------------------------------|
    /// | no repo          | any        | `NeedsFetch`                      |
    /// | HEAD == declared | any        | `Satisfied`                       |
    /// | HEAD != declared | `Abort`    | commit-mismatch error             |
    /// | HEAD != declared | `Checkout` | `NeedsFetch`                      |
    /// | HEAD != declared | `Ignore`   | `Satisfied`, effective = observed |
    fn resolve(&mut self) -> Result<Resolution, BuildError> {
        let Some(observed) = observe_head(&self.workdir) else {
            return Ok(Resolution::NeedsFetch);
        };

        if observed == self.source_digest.value {
            return Ok(Resolution::Satisfied);
        }

        match self.resolution_strategy {
            ResolutionStrategy::Checkout => Ok(Resolution::NeedsFetch),
            ResolutionStrategy::Ignore => {
                tracing::info!(
                    declared = %self.source_digest.value,
                    observed = %observed,
                    "ignoring commit mismatch; recording the checked-out commit"
                );
                self.effective_digest = Digest {
                    alg: "sha1".to_owned(),
                    value: observed,
                };
                Ok(Resolution::Satisfied)
            }
            ResolutionStrategy::Abort => Err(BuildError::CommitMismatch { observed }),
        }
    }

    /// Clone the repo into a fresh temp directory and check out the
    /// declared commit. On any failure the partially-materialized state is
    /// released before returning.
    fn clone_and_checkout(&self) -> Result<RepoCheckoutInfo, BuildError> {
        let scratch = tempfile::Builder::new()
            .prefix("lodestone-")
            .tempdir()?
            .keep();
        tracing::info!(dir = %scratch.display(), "checking out the repo");

        let mut info = RepoCheckoutInfo {
            repo_root: None,
            scratch_dir: Some(scratch.clone()),
            step_logs: Vec::new(),
        };

        if let Err(e) = self.clone_and_checkout_into(&scratch, &mut info) {
            info.cleanup();
            return Err(e);
        }
        Ok(info)
    }

    fn clone_and_checkout_into(
        &self,
        scratch: &Path,
        info: &mut RepoCheckoutInfo,
    ) -> Result<(), BuildError> {
        let mut args = vec!["clone".to_owned()];
        if self.depth > 0 {
            args.push("--depth".to_owned());
            args.push(self.depth.to_string());
        }
        args.push(self.source_repo.clone());

        let clone = run_captured("git", &args, scratch)?;
        if !clone.status.success() {
            return Err(BuildError::CloneFailed {
                status: clone.status,
                log_file: clone.log_file,
                err_file: clone.err_file,
            });
        }
        info.step_logs.push(clone.log_file);
        info.step_logs.push(clone.err_file);

        let repo_root = cloned_root(scratch)?;

        let checkout_args = vec!["checkout".to_owned(), self.source_digest.value.clone()];
        let checkout = run_captured("git", &checkout_args, &repo_root)?;
        if !checkout.status.success() {
            return Err(BuildError::CheckoutFailed {
                commit: self.source_digest.value.clone(),
                status: checkout.status,
                log_file: checkout.log_file,
                err_file: checkout.err_file,
            });
        }
        info.step_logs.push(checkout.log_file);
        info.step_logs.push(checkout.err_file);

        tracing::info!(root = %repo_root.display(), "checked out the declared commit");
        info.repo_root = Some(repo_root);
        Ok(())
    }
}

impl Fetcher for GitFetcher {
    fn fetch(&mut self) -> Result<RepoCheckoutInfo, BuildError> {
        if self.source_digest.alg != "sha1" {
            return Err(BuildError::UnsupportedDigestAlg(
                self.source_digest.to_string(),
            ));
        }
        match self.resolve()? {
            Resolution::Satisfied => Ok(RepoCheckoutInfo::existing()),
            Resolution::NeedsFetch => self.clone_and_checkout(),
        }
    }

    fn effective_digest(&self) -> Digest {
        self.effective_digest.clone()
    }
}

/// Observed HEAD commit of the repository containing `dir`, if any.
///
/// `None` means there is no repository or HEAD is unreadable (e.g. an
/// unborn branch) — both are treated as "needs fetch".
fn observe_head(dir: &Path) -> Option<String> {
    let repo = gix::discover(dir).ok()?;
    let head = repo.head_commit().ok()?;
    Some(head.id.to_hex().to_string())
}

/// Root of the tree `git clone` just produced under `scratch`.
///
/// The clone is located by enumerating the scratch directory rather than
/// guessing the basename of the URI, which goes wrong for `.git`-suffixed
/// locators.
fn cloned_root(scratch: &Path) -> Result<PathBuf, BuildError> {
    let entry = std::fs::read_dir(scratch)?
        .next()
        .transpose()?
        .ok_or_else(|| {
            BuildError::Io(std::io::Error::other(format!(
                "git clone produced nothing under {}",
                scratch.display()
            )))
        })?;
    Ok(entry.path())
}
