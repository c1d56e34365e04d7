//! Image release configuration.
//!
//! The file is parsed into a raw, all-optional shape and then resolved
//! against the `defaults` section into fully populated [`ImageConfig`]s, so
//! generators never deal with missing values.

use crate::coordinates::{DEFAULT_TAG, ImageCoordinates};
use crate::credentials::{CredentialResolver, RegistryCredential};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "imagerail.yml";

/// A build argument passed to the image builder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildArg {
    /// Argument name
    pub key: String,
    /// Argument value
    pub value: String,
}

/// Global workarounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quirks {
    /// Move `/var` out of the way before building (kaniko issue 1297)
    #[serde(default)]
    pub move_var_quirk: bool,
}

/// Where an image lives: staging, base, or one of its release locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLocation {
    /// Registry host
    pub registry: String,
    /// Repository path
    pub repository: String,
    /// Tag, `latest` when absent
    pub tag: Option<String>,
    /// Credential id resolved through [`CredentialResolver`]
    pub credentials: Option<String>,
}

impl ImageLocation {
    /// Full coordinates of this location.
    #[must_use]
    pub fn coordinates(&self) -> ImageCoordinates {
        ImageCoordinates::new(
            &self.registry,
            &self.repository,
            self.tag.as_deref().unwrap_or(DEFAULT_TAG),
        )
    }
}

/// A fully resolved image definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    /// Image id (key in the `images` section)
    pub id: String,
    /// Path of the container file relative to the project root
    pub container_file: String,
    /// Mutable pre-release location the image is built to
    pub staging_location: ImageLocation,
    /// Final publish locations
    pub release_locations: Vec<ImageLocation>,
    /// Parent image the container file builds from
    pub base_image: ImageLocation,
    /// Command run inside the published image; empty means no in-image check
    pub update_check_command: Vec<String>,
    /// Command testing the staging image; empty means no test job
    pub test_command: Vec<String>,
    /// Extra builder arguments
    pub build_args: Vec<BuildArg>,
    /// Whether the `/var` move workaround applies
    pub move_var_quirk: bool,
}

impl ImageConfig {
    /// Whether an in-image update check is configured.
    #[must_use]
    pub fn has_update_check(&self) -> bool {
        !self.update_check_command.is_empty()
    }

    /// Whether a staging test job is configured.
    #[must_use]
    pub fn has_test(&self) -> bool {
        !self.test_command.is_empty()
    }
}

/// The resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Schema version
    pub version: u32,
    /// Configured registry credentials by id
    pub registry_credentials: BTreeMap<String, RegistryCredential>,
    /// Images by id
    pub images: BTreeMap<String, ImageConfig>,
}

impl Config {
    /// Load and resolve a configuration file.
    ///
    /// `revision` is the current commit and seeds default staging locations.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, invalid YAML, or missing settings without
    /// defaults.
    pub fn load(path: impl AsRef<Path>, revision: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let file: ConfigFile = serde_yaml::from_str(&raw).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), images = file.images.len(), "Loaded configuration");
        file.resolve(revision)
    }

    /// Parse and resolve configuration text.
    ///
    /// # Errors
    ///
    /// Same as [`Config::load`].
    pub fn from_yaml(raw: &str, revision: Option<&str>) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(raw).map_err(|source| Error::ConfigParse {
            path: "<inline>".into(),
            source,
        })?;
        file.resolve(revision)
    }

    /// Look up an image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownImage`] if the id is not configured.
    pub fn image(&self, id: &str) -> Result<&ImageConfig> {
        self.images.get(id).ok_or_else(|| Error::UnknownImage {
            image: id.to_string(),
        })
    }

    /// Resolver over this configuration's credentials.
    #[must_use]
    pub const fn credential_resolver(&self) -> CredentialResolver<'_> {
        CredentialResolver::new(&self.registry_credentials)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    defaults: Defaults,
    #[serde(default)]
    registry_credentials: BTreeMap<String, RegistryCredential>,
    #[serde(default)]
    images: BTreeMap<String, Option<RawImage>>,
    #[serde(default)]
    quirks: Quirks,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Defaults {
    staging_registry: Option<String>,
    release_registry: Option<String>,
    container_file: Option<String>,
    staging_registry_credentials: Option<String>,
    base_image_registry_credentials: Option<String>,
    release_registry_credentials: Option<String>,
    update_check_command: Option<Vec<String>>,
    test_command: Option<Vec<String>>,
    base_image: Option<RawLocation>,
    build_args: Option<Vec<BuildArg>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    registry: Option<String>,
    repository: Option<String>,
    tag: Option<String>,
    credentials: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawImage {
    container_file: Option<String>,
    staging_location: Option<RawLocation>,
    #[serde(default)]
    release_locations: Vec<RawLocation>,
    base_image: Option<RawLocation>,
    update_check_command: Option<Vec<String>>,
    test_command: Option<Vec<String>>,
    build_args: Option<Vec<BuildArg>>,
    move_var_quirk: Option<bool>,
}

impl ConfigFile {
    fn resolve(self, revision: Option<&str>) -> Result<Config> {
        let mut images = BTreeMap::new();
        for (id, raw) in self.images {
            let image = resolve_image(&id, raw.unwrap_or_default(), &self.defaults, self.quirks, revision)?;
            images.insert(id, image);
        }
        Ok(Config {
            version: self.version,
            registry_credentials: self.registry_credentials,
            images,
        })
    }
}

fn resolve_image(
    id: &str,
    raw: RawImage,
    defaults: &Defaults,
    quirks: Quirks,
    revision: Option<&str>,
) -> Result<ImageConfig> {
    let container_file = raw
        .container_file
        .or_else(|| defaults.container_file.clone())
        .ok_or_else(|| Error::missing_setting(id, "containerFile"))?;

    let staging_location = resolve_staging(id, raw.staging_location, defaults, revision)?;

    if raw.release_locations.is_empty() {
        return Err(Error::NoReleaseLocations {
            image: id.to_string(),
        });
    }
    let release_locations = raw
        .release_locations
        .into_iter()
        .map(|location| {
            Ok(ImageLocation {
                registry: location
                    .registry
                    .or_else(|| defaults.release_registry.clone())
                    .ok_or_else(|| Error::missing_setting(id, "releaseLocations.registry"))?,
                repository: location
                    .repository
                    .ok_or_else(|| Error::missing_setting(id, "releaseLocations.repository"))?,
                tag: location.tag,
                credentials: location
                    .credentials
                    .or_else(|| defaults.release_registry_credentials.clone()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let base = raw.base_image.unwrap_or_default();
    let fallback = defaults.base_image.clone().unwrap_or_default();
    let base_image = ImageLocation {
        registry: base
            .registry
            .or(fallback.registry)
            .ok_or_else(|| Error::missing_setting(id, "baseImage.registry"))?,
        repository: base
            .repository
            .or(fallback.repository)
            .ok_or_else(|| Error::missing_setting(id, "baseImage.repository"))?,
        tag: base.tag.or(fallback.tag),
        credentials: base
            .credentials
            .or(fallback.credentials)
            .or_else(|| defaults.base_image_registry_credentials.clone()),
    };

    Ok(ImageConfig {
        id: id.to_string(),
        container_file,
        staging_location,
        release_locations,
        base_image,
        update_check_command: raw
            .update_check_command
            .or_else(|| defaults.update_check_command.clone())
            .unwrap_or_default(),
        test_command: raw
            .test_command
            .or_else(|| defaults.test_command.clone())
            .unwrap_or_default(),
        build_args: raw
            .build_args
            .or_else(|| defaults.build_args.clone())
            .unwrap_or_default(),
        move_var_quirk: raw.move_var_quirk.unwrap_or(quirks.move_var_quirk),
    })
}

fn resolve_staging(
    id: &str,
    raw: Option<RawLocation>,
    defaults: &Defaults,
    revision: Option<&str>,
) -> Result<ImageLocation> {
    let raw = raw.unwrap_or_default();

    if raw.repository.is_some() && raw.tag.is_some() {
        warn!(
            image_id = id,
            "Fixed repository and tag for the staging image. Ensure the runner uses 'always' as imagePullPolicy, otherwise tests may run against a stale staging image"
        );
    }

    let registry = raw
        .registry
        .or_else(|| defaults.staging_registry.clone())
        .ok_or_else(|| Error::missing_setting(id, "stagingLocation.registry"))?;

    let missing_revision = || Error::MissingRevision {
        image: id.to_string(),
    };

    let repository = match raw.repository {
        Some(repository) => repository,
        None => revision.ok_or_else(missing_revision)?.to_string(),
    };

    // Runners without imagePullPolicy 'always' may reuse a cached staging image;
    // an explicit repository gets the short revision in the tag to stay unique.
    let tag = match raw.tag {
        Some(tag) => tag,
        None => {
            let revision = revision.ok_or_else(missing_revision)?;
            if repository.contains(revision) {
                id.to_string()
            } else {
                let short = revision.get(..7).unwrap_or(revision);
                format!("{id}-{short}")
            }
        }
    };

    Ok(ImageLocation {
        registry,
        repository,
        tag: Some(tag),
        credentials: raw
            .credentials
            .or_else(|| defaults.staging_registry_credentials.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVISION: &str = "de77d37a1b2c3d4e5f60718293a4b5c6d7e8f901";

    const CONFIG: &str = r"
version: 1
defaults:
  stagingRegistry: staging.example.com
  releaseRegistry: registry.example.com
  containerFile: Containerfile
  stagingRegistryCredentials: staging
  releaseRegistryCredentials: release
  updateCheckCommand: ['./.imagerail/imagerail', 'exec', 'package-check']
  baseImage:
    registry: docker.io
    repository: library/alpine
    tag: '3.20'
registryCredentials:
  staging:
    usernameVarName: STAGING_USER
    passwordVarName: STAGING_PASSWORD
  release:
    authEnvVar: RELEASE_AUTH
images:
  minimal:
    releaseLocations:
      - repository: team/minimal
        tag: '1.0'
  pinned:
    containerFile: images/pinned/Containerfile
    stagingLocation:
      repository: team/pinned-staging
    releaseLocations:
      - registry: quay.io
        repository: team/pinned
        credentials: quay
    baseImage:
      registry: registry.access.redhat.com
      repository: ubi9/ubi-minimal
    testCommand: ['./test.sh']
    moveVarQuirk: true
";

    #[test]
    fn test_defaults_cascade() {
        let config = Config::from_yaml(CONFIG, Some(REVISION)).unwrap();
        assert_eq!(config.version, 1);

        let minimal = config.image("minimal").unwrap();
        assert_eq!(minimal.container_file, "Containerfile");
        assert_eq!(minimal.staging_location.registry, "staging.example.com");
        assert_eq!(minimal.staging_location.repository, REVISION);
        assert_eq!(minimal.staging_location.tag.as_deref(), Some("minimal"));
        assert_eq!(minimal.staging_location.credentials.as_deref(), Some("staging"));
        assert_eq!(minimal.release_locations[0].registry, "registry.example.com");
        assert_eq!(minimal.release_locations[0].credentials.as_deref(), Some("release"));
        assert_eq!(
            minimal.base_image.coordinates().to_string(),
            "docker.io/library/alpine:3.20"
        );
        assert!(minimal.has_update_check());
        assert!(!minimal.has_test());
        assert!(!minimal.move_var_quirk);
    }

    #[test]
    fn test_explicit_staging_repository_gets_short_revision_tag() {
        let config = Config::from_yaml(CONFIG, Some(REVISION)).unwrap();
        let pinned = config.image("pinned").unwrap();
        assert_eq!(pinned.staging_location.repository, "team/pinned-staging");
        assert_eq!(pinned.staging_location.tag.as_deref(), Some("pinned-de77d37"));
        assert_eq!(pinned.base_image.tag, None);
        assert_eq!(
            pinned.base_image.coordinates().to_string(),
            "registry.access.redhat.com/ubi9/ubi-minimal:latest"
        );
        assert!(pinned.move_var_quirk);
        assert!(pinned.has_test());
    }

    #[test]
    fn test_missing_revision() {
        let err = Config::from_yaml(CONFIG, None).unwrap_err();
        assert!(matches!(err, Error::MissingRevision { .. }));
    }

    #[test]
    fn test_missing_container_file_without_default() {
        let raw = r"
images:
  lonely:
    stagingLocation: { registry: s.example.com, repository: r, tag: t }
    releaseLocations: [ { registry: r.example.com, repository: lonely } ]
    baseImage: { registry: docker.io, repository: library/debian }
";
        let err = Config::from_yaml(raw, Some(REVISION)).unwrap_err();
        assert!(matches!(err, Error::MissingSetting { field: "containerFile", .. }));
    }

    #[test]
    fn test_release_locations_required() {
        let raw = r"
defaults:
  containerFile: Containerfile
  stagingRegistry: s.example.com
images:
  norelease:
    baseImage: { registry: docker.io, repository: library/debian }
";
        let err = Config::from_yaml(raw, Some(REVISION)).unwrap_err();
        assert!(matches!(err, Error::NoReleaseLocations { ref image } if image == "norelease"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, CONFIG).unwrap();
        let config = Config::load(&path, Some(REVISION)).unwrap();
        assert_eq!(config.images.len(), 2);
        assert!(config.image("missing").is_err());
    }
}
