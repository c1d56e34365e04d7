//! End-to-end runs of the imagerail binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

const CONFIG: &str = r"
version: 1
defaults:
  containerFile: Containerfile
  stagingRegistry: registry.gitlab.example.com
  releaseRegistry: registry.example.com
  stagingRegistryCredentials: gitlab
  baseImage: { registry: docker.io, repository: library/alpine, tag: '3.20' }
registryCredentials:
  gitlab:
    usernameVarName: CLI_TEST_GITLAB_USER
    passwordVarName: CLI_TEST_GITLAB_TOKEN
images:
  alpine-tools:
    updateCheckCommand: ['./.imagerail/imagerail', 'exec', 'package-check']
    releaseLocations:
      - repository: team/alpine-tools
";

fn imagerail(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_imagerail"));
    cmd.current_dir(dir)
        .env_remove("CI_PIPELINE_SOURCE")
        .env_remove("DOCKER_AUTH_CONFIG")
        .env_remove("IMAGERAIL_CONFIG_FILE")
        .env_remove("IMAGERAIL_PIPELINE_FILE")
        .env_remove("IMAGERAIL_TOOL_IMAGE")
        .env_remove("RUST_LOG")
        .env("CI_COMMIT_SHA", "0123456789abcdef0123456789abcdef01234567")
        .env("CI_DEFAULT_BRANCH", "main")
        .env("CLI_TEST_GITLAB_USER", "gitlab-ci-token")
        .env("CLI_TEST_GITLAB_TOKEN", "s3cr3t");
    cmd
}

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("imagerail.yml"), CONFIG).unwrap();
    dir
}

fn read_pipeline(path: &Path) -> serde_yaml::Value {
    serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn default_branch_pipeline_releases_images() {
    let dir = workspace();
    imagerail(dir.path())
        .env("CI_COMMIT_BRANCH", "main")
        .args(["generate-pipeline", "--pipeline-file", "child.yml"])
        .assert()
        .success();

    let pipeline = read_pipeline(&dir.path().join("child.yml"));
    assert!(pipeline.get("build alpine-tools").is_some());
    assert!(
        pipeline
            .get("release alpine-tools to registry.example.com/team/alpine-tools:latest")
            .is_some()
    );
    let auth = pipeline["variables"]["DOCKER_AUTH_CONFIG"].as_str().unwrap();
    assert!(auth.contains("registry.gitlab.example.com"));
}

#[test]
fn feature_branch_pipeline_only_builds() {
    let dir = workspace();
    imagerail(dir.path())
        .env("CI_COMMIT_BRANCH", "feature/new-image")
        .args(["image-build", "generate-pipeline", "--pipeline-file", "child.yml"])
        .assert()
        .success();

    let pipeline = read_pipeline(&dir.path().join("child.yml"));
    assert!(pipeline.get("build alpine-tools").is_some());
    let mapping = pipeline.as_mapping().unwrap();
    assert!(
        mapping
            .keys()
            .filter_map(serde_yaml::Value::as_str)
            .all(|key| !key.starts_with("release "))
    );
}

#[test]
fn scheduled_pipeline_runs_update_checks() {
    let dir = workspace();
    imagerail(dir.path())
        .env("CI_PIPELINE_SOURCE", "schedule")
        .env("CI_COMMIT_BRANCH", "main")
        .args([
            "generate-pipeline",
            "--tool-image",
            "registry.example.com/tools/imagerail:0.3.0",
        ])
        .assert()
        .success();

    let pipeline = read_pipeline(&dir.path().join(".imagerail-gitlab-ci.yml"));
    assert_eq!(
        pipeline["check layers"]["image"].as_str(),
        Some("registry.example.com/tools/imagerail:0.3.0")
    );
    assert!(pipeline.get("update check alpine-tools location 0").is_some());
    assert!(pipeline.get("rebuild images").is_some());
}

#[test]
fn generate_auth_writes_kaniko_auth_file() {
    let dir = workspace();
    let output = dir.path().join("docker").join("config.json");
    imagerail(dir.path())
        .args(["image-build", "generate-auth", "--image-id", "alpine-tools", "--output"])
        .arg(&output)
        .assert()
        .success();

    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert!(document["auths"]["registry.gitlab.example.com"]["auth"].is_string());
}

#[test]
fn missing_configuration_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    imagerail(dir.path())
        .args(["image-build", "generate-pipeline"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("imagerail.yml"));
}

#[test]
fn missing_credential_variable_is_reported() {
    let dir = workspace();
    imagerail(dir.path())
        .env_remove("CLI_TEST_GITLAB_TOKEN")
        .env("CI_COMMIT_BRANCH", "main")
        .args(["image-build", "generate-pipeline"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CLI_TEST_GITLAB_TOKEN"));
}
