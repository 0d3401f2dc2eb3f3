//! Build orchestration: stale-artifact guard, the pinned container run,
//! and artifact digesting.
//!
//! [`Builder::setup`] resolves the source tree and loads the build recipe,
//! producing a [`DockerBuild`] that can assemble the provenance
//! [`BuildDefinition`] or run the build and digest its outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256};

use crate::config::{BuildConfig, DockerBuildConfig};
use crate::error::BuildError;
use crate::exec::{discard_log, run_captured};
use crate::fetcher::{Fetcher, GitFetcher, RepoCheckoutInfo};
use crate::provenance::{
    ArtifactReference, BuildDefinition, ParameterCollection, Subject, ARTIFACT_PATH_KEY,
    BUILDER_IMAGE_KEY, COMMAND_KEY, CONFIG_FILE_KEY, SOURCE_KEY,
};

/// Orchestrates source resolution and build setup for a validated config.
pub struct Builder<F: Fetcher> {
    fetcher: F,
    config: DockerBuildConfig,
    workdir: PathBuf,
}

impl Builder<GitFetcher> {
    /// A builder that fetches sources with the production git resolver,
    /// rooted at `workdir` (full clone history).
    ///
    /// # Errors
    ///
    /// Returns a validation error if the repo locator cannot be normalized.
    pub fn with_git_fetcher(
        config: DockerBuildConfig,
        workdir: PathBuf,
    ) -> Result<Self, BuildError> {
        let fetcher = GitFetcher::new(&config, workdir.clone(), 0)?;
        Ok(Self {
            fetcher,
            config,
            workdir,
        })
    }
}

impl<F: Fetcher> Builder<F> {
    /// A builder over an arbitrary [`Fetcher`] implementation.
    pub fn new(fetcher: F, config: DockerBuildConfig, workdir: PathBuf) -> Self {
        Self {
            fetcher,
            config,
            workdir,
        }
    }

    /// Resolve the source tree, load the build recipe, and check that the
    /// artifact location is not pre-populated by stale files.
    ///
    /// The returned [`DockerBuild`] carries a derived config whose source
    /// digest is the one actually present on disk — never the declared
    /// digest once resolution has run.
    ///
    /// # Errors
    ///
    /// Returns resolution, recipe-loading, or stale-artifact errors. Any
    /// source tree materialized before the failure is released.
    pub fn setup(mut self) -> Result<DockerBuild, BuildError> {
        let repo_info = self.fetcher.fetch()?;
        let config = self
            .config
            .with_effective_digest(self.fetcher.effective_digest());

        let source_root = repo_info
            .repo_root
            .clone()
            .unwrap_or_else(|| self.workdir.clone());

        match Self::load_and_check(&config, &source_root) {
            Ok(build_config) => Ok(DockerBuild {
                config,
                build_config,
                repo_info,
                source_root,
                run_logs: Vec::new(),
            }),
            Err(e) => {
                repo_info.cleanup();
                Err(e)
            }
        }
    }

    fn load_and_check(
        config: &DockerBuildConfig,
        source_root: &Path,
    ) -> Result<BuildConfig, BuildError> {
        let build_config = BuildConfig::load(&source_root.join(&config.build_config_path))?;
        check_no_existing_artifacts(source_root, &build_config.artifact_path)?;
        Ok(build_config)
    }
}

/// A build whose source tree is resolved and whose recipe is loaded, ready
/// for the pinned container run.
pub struct DockerBuild {
    /// Derived config carrying the effective source digest.
    config: DockerBuildConfig,
    build_config: BuildConfig,
    repo_info: RepoCheckoutInfo,
    /// Root of the tree mounted into the container.
    source_root: PathBuf,
    /// Logs of successful container runs, removed on [`release`](Self::release).
    run_logs: Vec<PathBuf>,
}

impl DockerBuild {
    /// Assemble the provenance-bearing [`BuildDefinition`].
    ///
    /// Pure, deterministic transform of the post-resolution config and the
    /// loaded recipe.
    #[must_use]
    pub fn build_definition(&self) -> BuildDefinition {
        let mut artifacts = BTreeMap::new();
        artifacts.insert(
            SOURCE_KEY.to_owned(),
            ArtifactReference {
                uri: self.config.source_repo.clone(),
                digest: self.config.source_digest.to_map(),
            },
        );
        artifacts.insert(
            BUILDER_IMAGE_KEY.to_owned(),
            ArtifactReference {
                uri: self.config.builder_image.to_string(),
                digest: self.config.builder_image.digest.to_map(),
            },
        );

        // A string array always serializes; an empty string would only
        // appear if it somehow did not.
        let command = serde_json::to_string(&self.build_config.command).unwrap_or_default();

        let mut values = BTreeMap::new();
        values.insert(
            CONFIG_FILE_KEY.to_owned(),
            self.config.build_config_path.display().to_string(),
        );
        values.insert(
            ARTIFACT_PATH_KEY.to_owned(),
            self.build_config.artifact_path.clone(),
        );
        values.insert(COMMAND_KEY.to_owned(), command);

        BuildDefinition {
            build_type: BuildDefinition::BUILD_TYPE,
            external_parameters: ParameterCollection { artifacts, values },
        }
    }

    /// Run the pinned container with the declared command, then digest the
    /// artifacts it produced.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::ContainerRunFailed`] on a nonzero container
    /// exit, [`BuildError::NoArtifacts`] if nothing matched the artifact
    /// pattern afterwards, or an I/O error reading a matched file.
    pub fn build_artifacts(&mut self) -> Result<Vec<Subject>, BuildError> {
        self.run_docker()?;
        inspect_artifacts(&self.source_root, &self.build_config.artifact_path)
    }

    /// Invoke `docker run` with the fixed isolation flags: the source root
    /// mounted as the workspace, the working directory set to the mount
    /// point, and the container's writable layer discarded on exit. The
    /// user command is appended as a literal argument vector.
    fn run_docker(&mut self) -> Result<(), BuildError> {
        let mut args = vec![
            "run".to_owned(),
            format!("--volume={}:/workspace", self.source_root.display()),
            "--workdir=/workspace".to_owned(),
            "--rm".to_owned(),
            self.config.builder_image.to_string(),
        ];
        args.extend(self.build_config.command.iter().cloned());

        let run = run_captured("docker", &args, &self.source_root)?;
        if !run.status.success() {
            return Err(BuildError::ContainerRunFailed {
                status: run.status,
                log_file: run.log_file,
                err_file: run.err_file,
            });
        }
        self.run_logs.push(run.log_file);
        self.run_logs.push(run.err_file);
        Ok(())
    }

    /// Best-effort release of the temporary clone and captured log files.
    /// Called by the orchestration layer once the build completes or fails.
    pub fn release(&self) {
        self.repo_info.cleanup();
        for log in &self.run_logs {
            discard_log(log);
        }
    }

    /// Root of the resolved source tree.
    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }
}

/// Glob `pattern` under `root`, returning every match.
///
/// Only the user-declared pattern carries glob semantics; metacharacters
/// in the root path itself are escaped so a working directory named, say,
/// `build[1]` cannot change what matches.
fn glob_artifacts(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, BuildError> {
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let full = Path::new(&escaped_root)
        .join(pattern)
        .to_string_lossy()
        .into_owned();
    let paths = glob::glob(&full).map_err(|source| BuildError::BadPattern {
        pattern: pattern.to_owned(),
        source,
    })?;

    let mut matches = Vec::new();
    for entry in paths {
        matches.push(entry.map_err(|e| BuildError::Io(e.into()))?);
    }
    Ok(matches)
}

/// Fail if any file already matches the artifact pattern, so a stale file
/// is never attributed to this build. Runs before any container process.
fn check_no_existing_artifacts(root: &Path, pattern: &str) -> Result<(), BuildError> {
    let matches = glob_artifacts(root, pattern)?;
    if matches.is_empty() {
        return Ok(());
    }
    Err(BuildError::StaleArtifacts {
        pattern: pattern.to_owned(),
        count: matches.len(),
    })
}

/// Digest every file matching the artifact pattern into a [`Subject`].
///
/// Matches are visited in whatever order the glob walk yields them — not
/// guaranteed sorted. Any read failure is fatal for the whole batch.
fn inspect_artifacts(root: &Path, pattern: &str) -> Result<Vec<Subject>, BuildError> {
    let matches = glob_artifacts(root, pattern)?;
    if matches.is_empty() {
        return Err(BuildError::NoArtifacts(pattern.to_owned()));
    }
    matches.iter().map(|path| subject_for(path)).collect()
}

/// Read the file at `path` and wrap its name and SHA-256 digest in a
/// [`Subject`].
fn subject_for(path: &Path) -> Result<Subject, BuildError> {
    let data = std::fs::read(path)?;
    let digest = hex::encode(Sha256::digest(&data));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Subject {
        name,
        digest: BTreeMap::from([("sha256".to_owned(), digest)]),
    })
}
