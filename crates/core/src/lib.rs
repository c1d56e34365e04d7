//! Core building blocks for imagerail.
//!
//! - [`ImageCoordinates`]: `registry/repository:tag` references
//! - [`CredentialResolver`]: registry credentials from the process environment
//! - [`AuthDocument`] and [`docker_auth::merge`]: docker auth documents
//! - [`Config`]: the image release configuration with its defaults cascade
//! - [`EnvironmentContext`]: the CI variables captured at startup

#![warn(missing_docs)]

pub mod config;
pub mod coordinates;
pub mod credentials;
pub mod docker_auth;
pub mod environment;
pub mod error;

pub use config::{BuildArg, Config, DEFAULT_CONFIG_FILE, ImageConfig, ImageLocation, Quirks};
pub use coordinates::{DEFAULT_TAG, ImageCoordinates};
pub use credentials::{CredentialResolver, RegistryCredential, UsernamePassword};
pub use docker_auth::AuthDocument;
pub use environment::{EnvironmentContext, PipelineKind};
pub use error::{Error, Result};
