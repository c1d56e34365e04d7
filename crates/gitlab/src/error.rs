//! Pipeline model errors.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Job names GitLab interprets as global keywords.
pub const RESERVED_JOB_NAMES: &[&str] = &["default", "include", "stages", "variables", "workflow"];

/// A single structural problem found while validating a pipeline.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ValidationError {
    /// A job is named after a top-level keyword.
    #[error("job name '{name}' is a reserved GitLab keyword")]
    #[diagnostic(
        code(imagerail::gitlab::reserved_job_name),
        help("Reserved names are: default, include, stages, variables, workflow")
    )]
    ReservedJobName {
        /// The offending job name
        name: String,
    },

    /// A stage has an empty name.
    #[error("stage #{index} has an empty name")]
    #[diagnostic(code(imagerail::gitlab::empty_stage_name))]
    EmptyStageName {
        /// Position in the stage list
        index: usize,
    },

    /// Two jobs share a name.
    #[error("job name '{name}' is used more than once")]
    #[diagnostic(code(imagerail::gitlab::duplicate_job_name))]
    DuplicateJobName {
        /// The duplicated job name
        name: String,
    },

    /// A job references a stage that is not part of the pipeline.
    #[error("job '{job}' is assigned to a stage that is not part of this pipeline")]
    #[diagnostic(code(imagerail::gitlab::unknown_stage))]
    UnknownStage {
        /// The job name
        job: String,
    },
}

/// Errors raised while building, validating or emitting a pipeline.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// Validation found one or more problems.
    #[error("pipeline is invalid: {}", summarize(errors))]
    #[diagnostic(code(imagerail::gitlab::invalid_pipeline))]
    Validation {
        /// Every problem found
        #[related]
        errors: Vec<ValidationError>,
    },

    /// A needs or trigger edge points to no job of this pipeline.
    #[error("{edge} of job '{job}' references a job that does not exist in this pipeline")]
    #[diagnostic(
        code(imagerail::gitlab::dangling_reference),
        help("Only use job handles returned by the same pipeline's add_job")
    )]
    DanglingReference {
        /// The job owning the edge
        job: String,
        /// `needs` or `trigger`
        edge: &'static str,
    },

    /// An allow-failure setting that cannot be expressed.
    #[error("allow_failure of job '{job}' is inconsistent: {reason}")]
    #[diagnostic(code(imagerail::gitlab::inconsistent_allow_failure))]
    InconsistentAllowFailure {
        /// The job name
        job: String,
        /// What is wrong
        reason: &'static str,
    },

    /// YAML encoding failed.
    #[error("failed to encode pipeline YAML: {0}")]
    #[diagnostic(code(imagerail::gitlab::encode))]
    Encode(#[from] serde_yaml::Error),

    /// Writing the pipeline file failed.
    #[error("failed to write pipeline file '{}': {source}", path.display())]
    #[diagnostic(code(imagerail::gitlab::io))]
    Io {
        /// Target path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

fn summarize(errors: &[ValidationError]) -> String {
    match errors {
        [] => "no details".to_string(),
        [single] => single.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

impl Error {
    /// Validation problems carried by this error, empty for other kinds.
    #[must_use]
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::Validation { errors } => errors,
            _ => &[],
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
