//! Update check errors.

use miette::Diagnostic;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by layer checks, in-image checks and aggregation.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// Configuration, credential or auth document problem.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] imagerail_core::Error),

    /// Generated pipeline problem.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] imagerail_gitlab::Error),

    /// Image build generation problem.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(#[from] imagerail_imagebuild::Error),

    /// The registry could not be queried.
    #[error("failed to inspect '{image}': {message}")]
    #[diagnostic(
        code(imagerail::updatecheck::registry),
        help("Check that the image exists and the configured credentials can pull it")
    )]
    Registry {
        /// Image coordinates
        image: String,
        /// Registry or client error
        message: String,
    },

    /// A per-image check task panicked or was cancelled.
    #[error("layer check task failed: {message}")]
    #[diagnostic(code(imagerail::updatecheck::task_failed))]
    TaskFailed {
        /// Join error description
        message: String,
    },

    /// A per-image check task ran out of time.
    #[error("layer check for image '{image}' did not finish within {timeout:?}")]
    #[diagnostic(code(imagerail::updatecheck::timeout))]
    Timeout {
        /// Image id
        image: String,
        /// Configured limit
        timeout: Duration,
    },

    /// A result file does not hold a known verdict.
    #[error("invalid update check result in '{}': {content:?}", path.display())]
    #[diagnostic(
        code(imagerail::updatecheck::invalid_result),
        help("The update check command must write exactly UPGRADE_NEEDED or NO_UPGRADE_NEEDED")
    )]
    InvalidUpdateCheckResult {
        /// Result file
        path: PathBuf,
        /// What the file contained
        content: String,
    },

    /// A location index outside the image's checked locations.
    #[error("image '{image}' has no checked location with index {index}")]
    #[diagnostic(code(imagerail::updatecheck::unknown_location))]
    UnknownLocation {
        /// Image id
        image: String,
        /// Requested index
        index: usize,
    },

    /// The image has no update check command.
    #[error("image '{image}' has no update check command")]
    #[diagnostic(code(imagerail::updatecheck::no_update_check_command))]
    NoUpdateCheckCommand {
        /// Image id
        image: String,
    },

    /// No supported package manager was found in the image.
    #[error("no supported package manager found: {reason}")]
    #[diagnostic(
        code(imagerail::updatecheck::no_package_manager),
        help("The built-in check supports apk (Alpine), yum/microdnf (RPM) and apt-get (Debian)")
    )]
    NoPackageManager {
        /// What was looked for
        reason: String,
    },

    /// A child process could not be started.
    #[error("failed to start '{program}': {source}")]
    #[diagnostic(code(imagerail::updatecheck::spawn))]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A child process exited unsuccessfully.
    #[error("'{command}' failed with exit code {code:?}")]
    #[diagnostic(code(imagerail::updatecheck::command_failed))]
    CommandFailed {
        /// Command line
        command: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
    },

    /// A JSON artifact could not be read or written.
    #[error("invalid JSON artifact '{}': {source}", path.display())]
    #[diagnostic(code(imagerail::updatecheck::json))]
    Json {
        /// Artifact path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// File system error.
    #[error("I/O error on '{}': {source}", path.display())]
    #[diagnostic(code(imagerail::updatecheck::io))]
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

    /// Create a registry error.
    #[must_use]
    pub fn registry(image: impl ToString, message: impl ToString) -> Self {
        Self::Registry {
            image: image.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for update check operations.
pub type Result<T> = std::result::Result<T, Error>;
