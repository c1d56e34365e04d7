//! Image build errors.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while generating or executing image build steps.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// Configuration, credential or auth document problem.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] imagerail_core::Error),

    /// The generated pipeline is invalid.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] imagerail_gitlab::Error),

    /// A script argument cannot be quoted for the shell.
    #[error("cannot quote script argument {argument:?} for the shell")]
    #[diagnostic(
        code(imagerail::imagebuild::unquotable_argument),
        help("Script arguments must not contain NUL bytes")
    )]
    UnquotableArgument {
        /// The offending argument
        argument: String,
    },

    /// The rebuild selection file is not a `{"id": bool}` JSON object.
    #[error("invalid rebuild selection '{}': {source}", path.display())]
    #[diagnostic(code(imagerail::imagebuild::invalid_selection))]
    InvalidSelection {
        /// Selection file
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The image has no test command.
    #[error("image '{image}' has no test command")]
    #[diagnostic(code(imagerail::imagebuild::no_test_command))]
    NoTestCommand {
        /// Image id
        image: String,
    },

    /// A child process could not be started.
    #[error("failed to start '{program}': {source}")]
    #[diagnostic(code(imagerail::imagebuild::spawn))]
    Spawn {
        /// Program name
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The staging image test exited unsuccessfully.
    #[error("staging image test for '{image}' failed with exit code {code:?}")]
    #[diagnostic(code(imagerail::imagebuild::test_failed))]
    TestFailed {
        /// Image id
        image: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
    },

    /// File system error.
    #[error("I/O error on '{}': {source}", path.display())]
    #[diagnostic(code(imagerail::imagebuild::io))]
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
}

/// Result type alias for image build operations.
pub type Result<T> = std::result::Result<T, Error>;
