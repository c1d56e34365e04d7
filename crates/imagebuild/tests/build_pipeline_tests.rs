//! Rendered image build pipelines.

use imagerail_core::{AuthDocument, Config};
use imagerail_imagebuild::{BuildPipelineOptions, ImageBuildGenerator, RebuildSelection};

const CONFIG: &str = r"
defaults:
  containerFile: Containerfile
  stagingRegistry: staging.example.com
  stagingRegistryCredentials: staging
  releaseRegistry: registry.example.com
  releaseRegistryCredentials: release
  baseImage: { registry: docker.io, repository: library/debian, tag: bookworm }
registryCredentials:
  staging: { usernameVarName: BP_STAGING_USER, passwordVarName: BP_STAGING_PASS }
  release: { usernameVarName: BP_RELEASE_USER, passwordVarName: BP_RELEASE_PASS }
images:
  debian-base:
    releaseLocations:
      - repository: base/debian
  debian-tools:
    releaseLocations:
      - repository: base/debian-tools
        credentials: nothing-here
";

fn with_credentials(test: impl FnOnce()) {
    temp_env::with_vars(
        [
            ("BP_STAGING_USER", Some("stager")),
            ("BP_STAGING_PASS", Some("it's $ecret")),
            ("BP_RELEASE_USER", Some("releaser")),
            ("BP_RELEASE_PASS", Some("plain")),
        ],
        test,
    );
}

#[test]
fn release_script_quotes_credentials() {
    with_credentials(|| {
        let config = Config::from_yaml(CONFIG, Some("feedc0ffee")).unwrap();
        let yaml = ImageBuildGenerator::new(&config, BuildPipelineOptions::default())
            .generate(&["debian-base"], None)
            .unwrap()
            .render()
            .unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        let job = &parsed["release debian-base to registry.example.com/base/debian:latest"];
        let line = job["script"][0].as_str().unwrap();
        let argv = shlex::split(line).unwrap();
        assert_eq!(
            argv,
            [
                "skopeo",
                "copy",
                "--src-username",
                "stager",
                "--src-password",
                "it's $ecret",
                "--dest-username",
                "releaser",
                "--dest-password",
                "plain",
                "docker://staging.example.com/feedc0ffee:debian-base",
                "docker://registry.example.com/base/debian:latest",
            ]
        );
    });
}

#[test]
fn docker_auth_config_extends_inherited_document() {
    with_credentials(|| {
        let config = Config::from_yaml(CONFIG, Some("feedc0ffee")).unwrap();
        let inherited =
            AuthDocument::parse(r#"{"auths":{"mirror.example.com":{"auth":"bTpu"}}}"#, "test")
                .unwrap();
        let validated = ImageBuildGenerator::new(&config, BuildPipelineOptions::default())
            .generate(&["debian-base"], Some(inherited))
            .unwrap();
        let raw = validated.pipeline().variables()["DOCKER_AUTH_CONFIG"]
            .as_str()
            .unwrap();
        let document = AuthDocument::parse(raw, "pipeline variable").unwrap();
        assert_eq!(document.auths["mirror.example.com"].auth, "bTpu");
        assert!(document.auths.contains_key("staging.example.com"));
    });
}

#[test]
fn unknown_release_credential_fails_generation() {
    with_credentials(|| {
        let config = Config::from_yaml(CONFIG, Some("feedc0ffee")).unwrap();
        let err = ImageBuildGenerator::new(&config, BuildPipelineOptions::default())
            .generate(&["debian-tools"], None)
            .unwrap_err();
        assert!(err.to_string().contains("nothing-here"));
    });
}

#[test]
fn selection_restricts_generated_images() {
    with_credentials(|| {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selection.json");
        std::fs::write(&path, r#"{"debian-base": true, "debian-tools": false}"#).unwrap();

        let config = Config::from_yaml(CONFIG, Some("feedc0ffee")).unwrap();
        let selection = RebuildSelection::read(&path).unwrap();
        let ids: Vec<&str> = selection.selected().collect();
        let validated = ImageBuildGenerator::new(&config, BuildPipelineOptions::default())
            .generate(&ids, None)
            .unwrap();
        let names: Vec<&str> = validated
            .pipeline()
            .jobs()
            .iter()
            .map(|job| job.name.as_str())
            .collect();
        assert!(names.contains(&"build debian-base"));
        assert!(!names.iter().any(|name| name.contains("debian-tools")));
    });
}

const DOCUMENT_CREDENTIALS: &str = r"
defaults:
  containerFile: Containerfile
  stagingRegistry: registry.example.com
  stagingRegistryCredentials: staging
  baseImage: { registry: docker.io, repository: library/alpine }
registryCredentials:
  staging: { usernameVarName: BP_STAGING_USER, passwordVarName: BP_STAGING_PASS }
  quay: { authEnvVar: BP_QUAY_AUTH }
  ghcr: { authFile: ghcr-auth.json }
images:
  app:
    releaseLocations:
      - { registry: quay.io, repository: team/app, credentials: quay }
  other:
    releaseLocations:
      - { registry: ghcr.io, repository: team/other, credentials: ghcr }
";

fn release_argv(config: &Config, image_id: &str, job: &str) -> Vec<String> {
    let yaml = ImageBuildGenerator::new(config, BuildPipelineOptions::default())
        .generate(&[image_id], None)
        .unwrap()
        .render()
        .unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    shlex::split(parsed[job]["script"][0].as_str().unwrap()).unwrap()
}

#[test]
fn release_uses_auth_document_entry_of_destination_registry() {
    // "cm9ib3Q6dG9rZW4=" is base64 of "robot:token"
    temp_env::with_vars(
        [
            ("BP_STAGING_USER", Some("pusher")),
            ("BP_STAGING_PASS", Some("rw")),
            (
                "BP_QUAY_AUTH",
                Some(r#"{"auths":{"quay.io":{"auth":"cm9ib3Q6dG9rZW4="}}}"#),
            ),
        ],
        || {
            let config = Config::from_yaml(DOCUMENT_CREDENTIALS, Some("0123456789abcdef")).unwrap();
            let argv = release_argv(&config, "app", "release app to quay.io/team/app:latest");
            assert_eq!(
                argv,
                [
                    "skopeo",
                    "copy",
                    "--src-username",
                    "pusher",
                    "--src-password",
                    "rw",
                    "--dest-username",
                    "robot",
                    "--dest-password",
                    "token",
                    "docker://registry.example.com/0123456789abcdef:app",
                    "docker://quay.io/team/app:latest",
                ]
            );
        },
    );
}

#[test]
fn release_rejects_auth_document_without_destination_entry() {
    let dir = tempfile::tempdir().unwrap();
    let auth_file = dir.path().join("ghcr-auth.json");
    std::fs::write(&auth_file, r#"{"auths":{"quay.io":{"auth":"cm9ib3Q6dG9rZW4="}}}"#).unwrap();
    let yaml = DOCUMENT_CREDENTIALS.replace("ghcr-auth.json", auth_file.to_str().unwrap());

    temp_env::with_vars(
        [
            ("BP_STAGING_USER", Some("pusher")),
            ("BP_STAGING_PASS", Some("rw")),
        ],
        || {
            let config = Config::from_yaml(&yaml, Some("0123456789abcdef")).unwrap();
            let err = ImageBuildGenerator::new(&config, BuildPipelineOptions::default())
                .generate(&["other"], None)
                .unwrap_err();
            assert!(matches!(
                err,
                imagerail_imagebuild::Error::Core(imagerail_core::Error::NoRegistryAuth {
                    ref credential,
                    ref registry,
                }) if credential == "ghcr" && registry == "ghcr.io"
            ));
        },
    );
}

#[test]
fn kaniko_auth_prefers_staging_push_credentials() {
    let yaml = r"
defaults:
  containerFile: Containerfile
  stagingRegistry: registry.example.com
  stagingRegistryCredentials: push
  baseImage:
    registry: registry.example.com
    repository: mirror/alpine
    credentials: pull
registryCredentials:
  push: { usernameVarName: BP_PUSH_USER, passwordVarName: BP_PUSH_PASS }
  pull: { usernameVarName: BP_PULL_USER, passwordVarName: BP_PULL_PASS }
images:
  app:
    releaseLocations:
      - { registry: quay.io, repository: team/app }
";
    temp_env::with_vars(
        [
            ("BP_PUSH_USER", Some("pusher")),
            ("BP_PUSH_PASS", Some("rw")),
            ("BP_PULL_USER", Some("reader")),
            ("BP_PULL_PASS", Some("ro")),
        ],
        || {
            let config = Config::from_yaml(yaml, Some("0123456789abcdef")).unwrap();
            let document = imagerail_imagebuild::generate_image_auth(&config, "app").unwrap();
            let credentials = document.credentials_for("registry.example.com").unwrap();
            assert_eq!(credentials.username, "pusher");
            assert_eq!(credentials.expose_password(), "rw");
            assert_eq!(document.auths.len(), 1);
        },
    );
}
