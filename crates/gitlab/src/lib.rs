//! GitLab CI pipeline model for imagerail.
//!
//! Pipelines are assembled with [`Pipeline`], checked with
//! [`Pipeline::validate`] and turned into `.gitlab-ci.yml` content through
//! [`ValidatedPipeline`]:
//!
//! ```
//! use imagerail_gitlab::{Job, Pipeline};
//!
//! let mut pipeline = Pipeline::new();
//! let build = pipeline.add_stage("build");
//! pipeline.add_job(Job::new("hello", build).with_script(["echo hello"]));
//!
//! let yaml = pipeline.validate()?.render()?;
//! assert!(yaml.contains("hello:"));
//! # Ok::<(), imagerail_gitlab::Error>(())
//! ```

#![warn(missing_docs)]

pub mod document;
pub mod emitter;
pub mod error;
pub mod pipeline;

pub use document::{Node, encode_yaml};
pub use emitter::ValidatedPipeline;
pub use error::{Error, RESERVED_JOB_NAMES, Result, ValidationError};
pub use pipeline::{
    AllowFailure, Artifacts, ArtifactsWhen, Job, JobRef, Needs, Pipeline, Stage, StageRef,
    Trigger, VariableValue, When,
};
