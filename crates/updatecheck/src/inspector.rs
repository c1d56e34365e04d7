//! Registry inspection.
//!
//! Uses `oci-distribution` to read image manifests.

use crate::error::{Error, Result};
use async_trait::async_trait;
use imagerail_core::{ImageCoordinates, UsernamePassword};
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::{Client, Reference};
use tracing::{debug, trace};

/// Reads the ordered layer digests of remote images.
#[async_trait]
pub trait RegistryInspector: Send + Sync {
    /// Layer digests of `image`, bottom layer first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] when the manifest cannot be fetched.
    async fn layers(
        &self,
        image: &ImageCoordinates,
        auth: Option<&UsernamePassword>,
    ) -> Result<Vec<String>>;
}

/// [`RegistryInspector`] talking to OCI distribution registries over HTTPS.
pub struct OciRegistryInspector {
    client: Client,
}

impl Default for OciRegistryInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl OciRegistryInspector {
    /// Create an inspector with default client settings.
    #[must_use]
    pub fn new() -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl RegistryInspector for OciRegistryInspector {
    async fn layers(
        &self,
        image: &ImageCoordinates,
        auth: Option<&UsernamePassword>,
    ) -> Result<Vec<String>> {
        let reference: Reference = image
            .to_string()
            .parse()
            .map_err(|e| Error::registry(image, e))?;

        let auth = auth.map_or(RegistryAuth::Anonymous, |credentials| {
            RegistryAuth::Basic(
                credentials.username.clone(),
                credentials.expose_password().to_string(),
            )
        });

        debug!(%image, "Fetching manifest");
        let (manifest, digest, _config) = self
            .client
            .pull_manifest_and_config(&reference, &auth)
            .await
            .map_err(|e| Error::registry(image, e))?;
        trace!(?manifest, "Got manifest");

        let layers: Vec<String> = manifest.layers.into_iter().map(|l| l.digest).collect();
        debug!(%image, %digest, layer_count = layers.len(), "Resolved image layers");
        Ok(layers)
    }
}
