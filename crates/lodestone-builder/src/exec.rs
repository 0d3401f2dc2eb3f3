//! Captured subprocess execution.
//!
//! A single "run and capture" primitive used uniformly by `git clone`,
//! `git checkout`, and `docker run`: argv in, exit status plus persisted
//! stdout/stderr files out. Keeping the capture and log-file handling here
//! keeps the error-wrapping logic of the callers in one place.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::BuildError;

/// Outcome of a captured subprocess run.
#[derive(Debug)]
pub struct CapturedRun {
    /// Exit status of the process.
    pub status: std::process::ExitStatus,
    /// Temp file holding the full stdout, kept for postmortem diagnostics.
    pub log_file: PathBuf,
    /// Temp file holding the full stderr, kept for postmortem diagnostics.
    pub err_file: PathBuf,
}

/// Run `program` with `args` in `dir`, capturing stdout and stderr in full.
///
/// Both streams are drained to completion before waiting on the child, so a
/// chatty process cannot deadlock on a full pipe buffer: stderr is read on a
/// helper thread while the calling thread reads stdout. The captured bytes
/// are persisted to kept temp files whose paths callers embed in errors.
///
/// The argv is passed literally — nothing is shell-interpreted.
///
/// # Errors
///
/// Returns [`BuildError::Io`] if the process cannot be spawned or the
/// streams cannot be read or persisted. A nonzero exit is *not* an error
/// here; callers inspect [`CapturedRun::status`].
pub fn run_captured(program: &str, args: &[String], dir: &Path) -> Result<CapturedRun, BuildError> {
    tracing::info!(command = %format!("{program} {}", args.join(" ")), "running command");

    let mut child = Command::new(program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let mut stderr_pipe = child.stderr.take().expect("stderr is piped");
    let stderr_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).map(|_| buf)
    });

    let mut stdout_buf = Vec::new();
    child
        .stdout
        .take()
        .expect("stdout is piped")
        .read_to_end(&mut stdout_buf)?;

    let stderr_buf = match stderr_reader.join() {
        Ok(read) => read?,
        Err(_) => Vec::new(),
    };

    let status = child.wait()?;

    let log_file = persist("log-", &stdout_buf)?;
    let err_file = persist("err-", &stderr_buf)?;

    Ok(CapturedRun {
        status,
        log_file,
        err_file,
    })
}

/// Write `bytes` to a kept temp file and return its path.
fn persist(prefix: &str, bytes: &[u8]) -> Result<PathBuf, BuildError> {
    let mut file = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".txt")
        .tempfile()?;
    file.write_all(bytes)?;
    let (_, path) = file.keep().map_err(|e| BuildError::Io(e.error))?;
    Ok(path)
}

/// Best-effort removal of a persisted log file. Failure is logged, never
/// retried.
pub(crate) fn discard_log(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!(file = %path.display(), error = %e, "failed to remove temp log file");
    }
}
