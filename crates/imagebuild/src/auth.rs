//! Registry auth documents for generated jobs.

use crate::error::{Error, Result};
use imagerail_core::docker_auth::merge;
use imagerail_core::{AuthDocument, Config, CredentialResolver, ImageLocation, UsernamePassword};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Credentials of one location, in the order they were collected.
#[derive(Debug)]
enum AuthSource {
    Credentials {
        registry: String,
        credentials: UsernamePassword,
    },
    Document(AuthDocument),
}

/// Collects credentials of several locations before merging them.
///
/// The first source covering a registry wins.
#[derive(Debug, Default)]
struct AuthCollector {
    sources: Vec<AuthSource>,
}

impl AuthCollector {
    fn add(
        &mut self,
        resolver: &CredentialResolver<'_>,
        image_id: &str,
        role: &'static str,
        location: &ImageLocation,
    ) -> Result<()> {
        let Some(credential) = location.credentials.as_deref() else {
            info!(
                image_id,
                registry = %location.registry,
                role,
                "No credentials configured, location is accessed anonymously"
            );
            return Ok(());
        };

        if let Some(credentials) = resolver.resolve(credential)? {
            debug!(image_id, registry = %location.registry, role, "Adding registry auth");
            self.sources.push(AuthSource::Credentials {
                registry: location.registry.clone(),
                credentials,
            });
        } else if let Some(document) = resolver.resolve_auth_document(credential)? {
            debug!(image_id, credential, role, "Adding preformatted auth document");
            self.sources.push(AuthSource::Document(document));
        }
        Ok(())
    }

    fn finish(self, existing: Option<AuthDocument>) -> AuthDocument {
        let mut document = existing.unwrap_or_default();
        let mut pending = BTreeMap::new();
        for source in self.sources {
            match source {
                AuthSource::Credentials {
                    registry,
                    credentials,
                } => {
                    pending.entry(registry).or_insert(credentials);
                }
                AuthSource::Document(raw) => {
                    document = merge(Some(document), &std::mem::take(&mut pending));
                    document.merge_document(&raw);
                }
            }
        }
        merge(Some(document), &pending)
    }
}

/// Build the auth document kaniko needs for one image.
///
/// The staging location comes first so its push credentials win over base
/// image or release credentials for the same registry; the base image and
/// the release locations follow.
///
/// # Errors
///
/// Fails for unknown images or credentials and unset credential variables.
pub fn generate_image_auth(config: &Config, image_id: &str) -> Result<AuthDocument> {
    let image = config.image(image_id)?;
    let resolver = config.credential_resolver();
    let mut collector = AuthCollector::default();

    collector.add(&resolver, image_id, "staging location", &image.staging_location)?;
    collector.add(&resolver, image_id, "base image", &image.base_image)?;
    for location in &image.release_locations {
        collector.add(&resolver, image_id, "release location", location)?;
    }

    Ok(collector.finish(None))
}

/// Build the pipeline-wide `DOCKER_AUTH_CONFIG` value for the image build
/// pipeline.
///
/// Only the staging locations of the images being built are needed: the test
/// jobs are the only ones pulling through the runner.
///
/// # Errors
///
/// Fails for unknown images or credentials and unset credential variables.
pub fn pipeline_auth_config<'a>(
    config: &Config,
    image_ids: impl IntoIterator<Item = &'a str>,
    inherited: Option<AuthDocument>,
) -> Result<AuthDocument> {
    let mut locations = Vec::new();
    for image_id in image_ids {
        locations.push((image_id, &config.image(image_id)?.staging_location));
    }
    locations_auth_config(config, locations, inherited)
}

/// Extend the inherited `DOCKER_AUTH_CONFIG` with the credentials of the
/// given `(image id, location)` pairs; existing entries are never
/// overwritten.
///
/// # Errors
///
/// Fails for unknown credentials and unset credential variables.
pub fn locations_auth_config<'a>(
    config: &Config,
    locations: impl IntoIterator<Item = (&'a str, &'a ImageLocation)>,
    inherited: Option<AuthDocument>,
) -> Result<AuthDocument> {
    if inherited.is_some() {
        info!("Extending inherited DOCKER_AUTH_CONFIG with registry credentials");
    } else {
        info!("Creating DOCKER_AUTH_CONFIG for the generated pipeline");
    }

    let resolver = config.credential_resolver();
    let mut collector = AuthCollector::default();
    for (image_id, location) in locations {
        collector.add(&resolver, image_id, "pulled location", location)?;
    }
    Ok(collector.finish(inherited))
}

/// Write an auth document with owner-only permissions, creating parent
/// directories.
///
/// # Errors
///
/// Fails when the directory or file cannot be written.
pub fn write_auth_file(document: &AuthDocument, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    write_private(path, document.to_json().as_bytes()).map_err(|e| Error::io(path, e))?;
    info!(path = %path.display(), registries = document.auths.len(), "Wrote registry auth file");
    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content)
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}
