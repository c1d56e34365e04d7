//! Error types for coordinates, credentials, auth documents and configuration.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the core building blocks.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The coordinate string has no registry separator.
    #[error(
        "didn't find / in container coordinates '{input}' - cannot extract registry. Given coordinates must contain at least registry and repository"
    )]
    #[diagnostic(
        code(imagerail::coordinates::malformed),
        help("Use the form registry/repository[:tag], e.g. docker.io/library/alpine:3.20")
    )]
    MalformedCoordinate {
        /// The rejected input
        input: String,
    },

    /// A credential id is referenced but not configured.
    #[error("could not find registry credentials with id '{id}'")]
    #[diagnostic(
        code(imagerail::credentials::unknown),
        help("Add the credential to the registryCredentials section of the configuration")
    )]
    UnknownCredential {
        /// The credential id
        id: String,
    },

    /// A credential references an environment variable that is not set.
    #[error("environment variable '{variable}' (for {purpose} of credential '{credential}') is not set")]
    #[diagnostic(
        code(imagerail::credentials::missing_env),
        help("Define the variable as a CI/CD variable of the project")
    )]
    MissingEnvironmentVariable {
        /// The variable name
        variable: String,
        /// Which half of the credential the variable provides
        purpose: &'static str,
        /// The credential id
        credential: String,
    },

    /// A credential declares zero or several shapes.
    #[error("credential must define exactly one of usernameVarName+passwordVarName, authEnvVar or authFile ({reason})")]
    #[diagnostic(code(imagerail::credentials::ambiguous))]
    AmbiguousCredential {
        /// What was wrong with the declaration
        reason: String,
    },

    /// An auth document could not be parsed.
    #[error("invalid docker auth document from {origin}: {source}")]
    #[diagnostic(code(imagerail::auth::invalid_document))]
    InvalidAuthDocument {
        /// Where the document came from
        origin: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// An auth document credential has no usable entry for a registry that
    /// needs explicit username/password flags.
    #[error("auth document of credential '{credential}' has no usable entry for registry '{registry}'")]
    #[diagnostic(
        code(imagerail::auth::no_registry_entry),
        help("Add an \"auths\" entry for the registry holding base64 of username:password, or use usernameVarName/passwordVarName")
    )]
    NoRegistryAuth {
        /// Credential id
        credential: String,
        /// Registry the entry was looked up for
        registry: String,
    },

    /// A configuration value is missing and has no default.
    #[error("{field} not defined for image '{image}' and no default defined")]
    #[diagnostic(
        code(imagerail::config::missing_setting),
        help("Set the value on the image or in the defaults section")
    )]
    MissingSetting {
        /// Image id
        image: String,
        /// Name of the missing field
        field: &'static str,
    },

    /// A staging location needs the commit revision but none is known.
    #[error("staging location of image '{image}' defaults to the commit revision, but no revision is available")]
    #[diagnostic(
        code(imagerail::config::missing_revision),
        help("Run inside a CI job (CI_COMMIT_SHA) or set stagingLocation.repository and tag explicitly")
    )]
    MissingRevision {
        /// Image id
        image: String,
    },

    /// An image has no release locations.
    #[error("no release locations defined for image '{image}'")]
    #[diagnostic(code(imagerail::config::no_release_locations))]
    NoReleaseLocations {
        /// Image id
        image: String,
    },

    /// An image id is not present in the configuration.
    #[error("image '{image}' is not configured")]
    #[diagnostic(code(imagerail::config::unknown_image))]
    UnknownImage {
        /// Image id
        image: String,
    },

    /// The configuration file is not valid YAML for the schema.
    #[error("failed to parse configuration '{}': {source}", path.display())]
    #[diagnostic(code(imagerail::config::parse))]
    ConfigParse {
        /// Path of the file
        path: PathBuf,
        /// Underlying YAML error
        #[source]
        source: serde_yaml::Error,
    },

    /// File system error.
    #[error("I/O error on '{}': {source}", path.display())]
    #[diagnostic(code(imagerail::io))]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an I/O error bound to a path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a missing-setting error.
    #[must_use]
    pub fn missing_setting(image: impl Into<String>, field: &'static str) -> Self {
        Self::MissingSetting {
            image: image.into(),
            field,
        }
    }
}
