//! Layer divergence between base images and published images.
//!
//! A published image is up to date with its base image when the base image's
//! layers are an exact prefix of the published image's layers. Any other
//! relation means the base image moved on and the image should be rebuilt.
//!
//! Every image is checked in its own task; results are only ever observed
//! through [`JoinSet::join_next`], i.e. after the task finished.

use crate::error::{Error, Result};
use crate::inspector::RegistryInspector;
use crate::locations::CheckTarget;
use imagerail_core::{Config, CredentialResolver, ImageCoordinates, ImageLocation, UsernamePassword};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Whether the published layers still start with the base layers.
///
/// Returns `true` (diverged) on any mismatch or when the base image has more
/// layers than the published one.
#[must_use]
pub fn layers_diverge<S: AsRef<str>>(base: &[S], published: &[S]) -> bool {
    if base.len() > published.len() {
        return true;
    }
    base.iter()
        .zip(published)
        .any(|(b, p)| b.as_ref() != p.as_ref())
}

/// Per-image divergence, written as `{"image-id": bool}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DivergenceReport(BTreeMap<String, bool>);

impl DivergenceReport {
    /// Record whether an image diverged.
    pub fn set(&mut self, image_id: impl Into<String>, diverged: bool) {
        self.0.insert(image_id.into(), diverged);
    }

    /// Divergence of one image; `None` when it was not checked.
    #[must_use]
    pub fn get(&self, image_id: &str) -> Option<bool> {
        self.0.get(image_id).copied()
    }

    /// Number of checked images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no image was checked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a report file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not a JSON object of booleans.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&raw).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the report as JSON.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|e| Error::io(path, e))
    }
}

/// Settings for [`LayerChecker`].
#[derive(Debug, Clone, Default)]
pub struct LayerCheckOptions {
    /// Upper bound for checking one image; unbounded when `None`
    pub task_timeout: Option<Duration>,
    /// Maximum images checked at once; `0` means no limit
    pub max_parallel: usize,
    /// Which locations are compared against the base image
    pub target: CheckTarget,
}

impl LayerCheckOptions {
    /// Fail an image check that takes longer than `timeout`.
    #[must_use]
    pub const fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = Some(timeout);
        self
    }

    /// Limit the number of concurrently checked images.
    #[must_use]
    pub const fn with_max_parallel(mut self, max: usize) -> Self {
        self.max_parallel = max;
        self
    }
}

#[derive(Debug)]
struct InspectedImage {
    coordinates: ImageCoordinates,
    auth: Option<UsernamePassword>,
}

#[derive(Debug)]
struct ImageCheck {
    image_id: String,
    base: InspectedImage,
    published: Vec<InspectedImage>,
}

/// Checks every configured image for layer divergence.
pub struct LayerChecker {
    config: Arc<Config>,
    inspector: Arc<dyn RegistryInspector>,
    options: LayerCheckOptions,
}

impl LayerChecker {
    /// Create a checker.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        inspector: Arc<dyn RegistryInspector>,
        options: LayerCheckOptions,
    ) -> Self {
        Self {
            config,
            inspector,
            options,
        }
    }

    /// Check all images concurrently.
    ///
    /// # Errors
    ///
    /// Fails on the first credential, registry, timeout or task failure; no
    /// partial report is returned.
    pub async fn check(&self) -> Result<DivergenceReport> {
        let checks = self.prepare()?;
        let permits = match self.options.max_parallel {
            0 => Semaphore::MAX_PERMITS,
            n => n,
        };
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut join_set = JoinSet::new();

        info!(images = checks.len(), target = %self.options.target, "Starting layer check");

        for check in checks {
            let inspector = Arc::clone(&self.inspector);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.options.task_timeout;

            join_set.spawn(async move {
                let _permit = semaphore.acquire().await;
                let outcome = match timeout {
                    Some(limit) => tokio::time::timeout(limit, check_image(inspector.as_ref(), &check))
                        .await
                        .unwrap_or_else(|_| {
                            Err(Error::Timeout {
                                image: check.image_id.clone(),
                                timeout: limit,
                            })
                        }),
                    None => check_image(inspector.as_ref(), &check).await,
                };
                (check.image_id, outcome)
            });
        }

        let mut report = DivergenceReport::default();
        while let Some(joined) = join_set.join_next().await {
            let (image_id, outcome) = joined.map_err(|e| Error::TaskFailed {
                message: e.to_string(),
            })?;
            let diverged = outcome?;
            if diverged {
                info!(image_id = %image_id, "Base image layers diverged, rebuild needed");
            } else {
                debug!(image_id = %image_id, "Layers up to date");
            }
            report.set(image_id, diverged);
        }
        Ok(report)
    }

    /// Resolve coordinates and credentials before any task starts, so tasks
    /// never touch the process environment.
    fn prepare(&self) -> Result<Vec<ImageCheck>> {
        let resolver = self.config.credential_resolver();
        self.config
            .images
            .values()
            .map(|image| {
                let published = self
                    .options
                    .target
                    .locations(image)
                    .into_iter()
                    .map(|location| inspected(&resolver, location))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ImageCheck {
                    image_id: image.id.clone(),
                    base: inspected(&resolver, &image.base_image)?,
                    published,
                })
            })
            .collect()
    }
}

fn inspected(resolver: &CredentialResolver<'_>, location: &ImageLocation) -> Result<InspectedImage> {
    Ok(InspectedImage {
        coordinates: location.coordinates(),
        auth: location_auth(resolver, location)?,
    })
}

/// Username/password for pulling from `location`, taken from a
/// username/password credential or from the location's registry entry in a
/// preformatted auth document.
fn location_auth(
    resolver: &CredentialResolver<'_>,
    location: &ImageLocation,
) -> Result<Option<UsernamePassword>> {
    let Some(id) = location.credentials.as_deref() else {
        return Ok(None);
    };
    if let Some(credentials) = resolver.resolve(id)? {
        return Ok(Some(credentials));
    }
    let Some(document) = resolver.resolve_auth_document(id)? else {
        return Ok(None);
    };
    let decoded = document.credentials_for(&location.registry);
    if decoded.is_none() {
        warn!(
            registry = %location.registry,
            credential = id,
            "Auth document has no usable entry for registry, inspecting anonymously"
        );
    }
    Ok(decoded)
}

async fn check_image(inspector: &dyn RegistryInspector, check: &ImageCheck) -> Result<bool> {
    let base = inspector
        .layers(&check.base.coordinates, check.base.auth.as_ref())
        .await?;

    let mut diverged = false;
    for published in &check.published {
        let layers = inspector
            .layers(&published.coordinates, published.auth.as_ref())
            .await?;
        if layers_diverge(&base, &layers) {
            info!(
                image_id = %check.image_id,
                base = %check.base.coordinates,
                published = %published.coordinates,
                "Published image is not based on the current base image"
            );
            diverged = true;
        }
    }
    Ok(diverged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[test]
    fn test_prefix_rule() {
        let base = ["a", "b"];
        assert!(!layers_diverge(&base, &["a", "b", "c"]));
        assert!(!layers_diverge(&base, &["a", "b"]));
        assert!(layers_diverge(&base, &["a", "x", "c"]));
        assert!(layers_diverge(&["a", "b", "c"], &["a", "b"]));
        assert!(!layers_diverge::<&str>(&[], &["a"]));
        assert!(layers_diverge(&["x"], &[]));
    }

    #[test]
    fn test_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("divergence.json");
        let mut report = DivergenceReport::default();
        report.set("a", true);
        report.set("b", false);
        report.write(&path).unwrap();
        let back = DivergenceReport::read(&path).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.get("a"), Some(true));
        assert_eq!(back.get("c"), None);
    }

    struct Unreachable;

    #[async_trait]
    impl RegistryInspector for Unreachable {
        async fn layers(
            &self,
            image: &ImageCoordinates,
            _auth: Option<&UsernamePassword>,
        ) -> Result<Vec<String>> {
            Err(Error::registry(image, "connection refused"))
        }
    }

    #[tokio::test]
    async fn test_registry_error_fails_check() {
        let config = Config::from_yaml(
            r"
defaults:
  containerFile: Containerfile
  stagingRegistry: s.example.com
  baseImage: { registry: docker.io, repository: library/alpine }
images:
  one:
    releaseLocations: [ { registry: r.example.com, repository: one } ]
",
            Some("0123456789"),
        )
        .unwrap();
        let checker = LayerChecker::new(
            Arc::new(config),
            Arc::new(Unreachable),
            LayerCheckOptions::default(),
        );
        assert!(matches!(checker.check().await, Err(Error::Registry { .. })));
    }
}
