//! Integration tests for the lodestone CLI.
//!
//! Each test creates a git repository fixture in a temporary directory,
//! invokes the `lodestone` binary via `assert_cmd` with that directory as
//! the working tree, and checks outputs and exit codes. Scenarios needing
//! a docker daemon or network cloning are out of scope here.

#![allow(deprecated)] // cargo_bin deprecation — macro replacement not yet stable

use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;

/// Convenience: get a `Command` for the `lodestone` binary.
fn lodestone() -> Command {
    Command::cargo_bin("lodestone").expect("lodestone binary not found")
}

/// Create a git repo with an initial commit; returns the HEAD commit hash.
fn init_test_repo(dir: &Path) -> String {
    for args in [
        vec!["init"],
        vec!["config", "user.email", "test@test.com"],
        vec!["config", "user.name", "Test"],
    ] {
        StdCommand::new("git")
            .args(&args)
            .current_dir(dir)
            .output()
            .expect("git setup failed");
    }

    std::fs::write(dir.join("README.md"), "# test\n").expect("write failed");
    StdCommand::new("git")
        .args(["add", "."])
        .current_dir(dir)
        .output()
        .expect("git add failed");
    StdCommand::new("git")
        .args(["commit", "-m", "initial"])
        .current_dir(dir)
        .output()
        .expect("git commit failed");

    let head = StdCommand::new("git")
        .args(["rev-parse", "--verify", "HEAD"])
        .current_dir(dir)
        .output()
        .expect("git rev-parse failed");
    String::from_utf8(head.stdout)
        .expect("utf8")
        .trim()
        .to_owned()
}

/// Write a minimal build recipe into the fixture repo.
fn write_recipe(dir: &Path, artifact_path: &str) {
    std::fs::write(
        dir.join("build.toml"),
        format!("command = [\"cargo\", \"build\"]\nartifact_path = \"{artifact_path}\"\n"),
    )
    .expect("write recipe");
}

const MISMATCHED_COMMIT: &str = "0000000000000000000000000000000000000000";

fn common_args(head: &str, output_flag: &str, output: &Path) -> Vec<String> {
    vec![
        "--source-repo".to_owned(),
        "https://github.com/example/repo.git".to_owned(),
        "--git-commit-digest".to_owned(),
        format!("sha1:{head}"),
        "--builder-image".to_owned(),
        "ghcr.io/example/img@sha256:deadbeef".to_owned(),
        "--build-config-path".to_owned(),
        "build.toml".to_owned(),
        output_flag.to_owned(),
        output.to_string_lossy().into_owned(),
    ]
}

// ─── dry-run tests ──────────────────────────────────────────

#[test]
fn dry_run_with_matching_head_writes_build_definition() {
    let dir = tempfile::tempdir().unwrap();
    let head = init_test_repo(dir.path());
    write_recipe(dir.path(), "dist/*.tar");

    let output = dir.path().join("bd.json");
    lodestone()
        .arg("dry-run")
        .args(common_args(&head, "--build-definition-path", &output))
        .args(["--resolution-strategy", "abort"])
        .current_dir(dir.path())
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).expect("valid JSON");
    assert_eq!(json["buildType"], "https://slsa.dev/docker-build");
    assert_eq!(
        json["externalParameters"]["artifacts"]["source"]["digest"]["sha1"],
        head
    );
    assert_eq!(
        json["externalParameters"]["artifacts"]["builderImage"]["uri"],
        "ghcr.io/example/img@sha256:deadbeef"
    );
    assert_eq!(
        json["externalParameters"]["values"]["command"],
        "[\"cargo\",\"build\"]"
    );
    assert_eq!(
        json["externalParameters"]["values"]["artifactPath"],
        "dist/*.tar"
    );
}

#[test]
fn dry_run_mismatch_with_abort_fails_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    init_test_repo(dir.path());
    write_recipe(dir.path(), "dist/*.tar");

    let output = dir.path().join("bd.json");
    lodestone()
        .arg("dry-run")
        .args(common_args(
            MISMATCHED_COMMIT,
            "--build-definition-path",
            &output,
        ))
        .args(["--resolution-strategy", "abort"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("different commit"));

    assert!(!output.exists(), "no partial output file should be written");
}

#[test]
fn dry_run_mismatch_with_ignore_records_observed_head() {
    let dir = tempfile::tempdir().unwrap();
    let head = init_test_repo(dir.path());
    write_recipe(dir.path(), "dist/*.tar");

    let output = dir.path().join("bd.json");
    lodestone()
        .arg("dry-run")
        .args(common_args(
            MISMATCHED_COMMIT,
            "--build-definition-path",
            &output,
        ))
        .args(["--resolution-strategy", "ignore"])
        .current_dir(dir.path())
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).expect("valid JSON");
    // The effective digest is the observed HEAD, never the declared one.
    assert_eq!(
        json["externalParameters"]["artifacts"]["source"]["digest"]["sha1"],
        head
    );
}

#[test]
fn dry_run_rejects_unpinned_image() {
    let dir = tempfile::tempdir().unwrap();
    let head = init_test_repo(dir.path());
    write_recipe(dir.path(), "dist/*.tar");

    let output = dir.path().join("bd.json");
    lodestone()
        .args([
            "dry-run",
            "--source-repo",
            "https://github.com/example/repo.git",
            "--git-commit-digest",
            &format!("sha1:{head}"),
            "--builder-image",
            "ghcr.io/example/img:latest",
            "--build-config-path",
            "build.toml",
            "--build-definition-path",
            output.to_str().unwrap(),
        ])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid builder image"));
}

#[test]
fn dry_run_rejects_absolute_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let head = init_test_repo(dir.path());

    lodestone()
        .args([
            "dry-run",
            "--source-repo",
            "https://github.com/example/repo.git",
            "--git-commit-digest",
            &format!("sha1:{head}"),
            "--builder-image",
            "ghcr.io/example/img@sha256:deadbeef",
            "--build-config-path",
            "/etc/build.toml",
            "--build-definition-path",
            "bd.json",
        ])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be relative"));
}

#[test]
fn dry_run_rejects_malformed_digest() {
    let dir = tempfile::tempdir().unwrap();
    init_test_repo(dir.path());

    lodestone()
        .args([
            "dry-run",
            "--source-repo",
            "https://github.com/example/repo.git",
            "--git-commit-digest",
            "abc123",
            "--builder-image",
            "ghcr.io/example/img@sha256:deadbeef",
            "--build-config-path",
            "build.toml",
            "--build-definition-path",
            "bd.json",
        ])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid digest"));
}

// ─── build tests ────────────────────────────────────────────

#[test]
fn build_rejects_the_ignore_strategy() {
    let dir = tempfile::tempdir().unwrap();
    init_test_repo(dir.path());
    write_recipe(dir.path(), "dist/*.tar");

    lodestone()
        .arg("build")
        .args(common_args(
            MISMATCHED_COMMIT,
            "--subjects-path",
            &dir.path().join("subjects.json"),
        ))
        .args(["--resolution-strategy", "ignore"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn build_fails_before_docker_on_stale_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let head = init_test_repo(dir.path());
    write_recipe(dir.path(), "dist/*.tar");
    std::fs::create_dir(dir.path().join("dist")).unwrap();
    std::fs::write(dir.path().join("dist/stale.tar"), b"old").unwrap();

    let output = dir.path().join("subjects.json");
    lodestone()
        .arg("build")
        .args(common_args(&head, "--subjects-path", &output))
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("existing files"));

    assert!(!output.exists(), "no partial output file should be written");
}

#[test]
fn build_mismatch_with_abort_fails() {
    let dir = tempfile::tempdir().unwrap();
    init_test_repo(dir.path());
    write_recipe(dir.path(), "dist/*.tar");

    lodestone()
        .arg("build")
        .args(common_args(
            MISMATCHED_COMMIT,
            "--subjects-path",
            &dir.path().join("subjects.json"),
        ))
        .args(["--resolution-strategy", "abort"])
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("different commit"));
}
