//! Pipeline graph model.
//!
//! A [`Pipeline`] owns its stages and jobs. Adding a stage or a job returns a
//! small handle ([`StageRef`], [`JobRef`]) that later jobs use to express
//! ordering (`needs`) and child pipeline triggers. Handles carry the random
//! identity of the pipeline that issued them, so an edge to a job of another
//! pipeline is detected when the document is emitted. Pipelines are not
//! `Clone`: a copy would accept the original's handles.

use crate::emitter::ValidatedPipeline;
use crate::error::{Error, RESERVED_JOB_NAMES, Result, ValidationError};
use imagerail_core::ImageCoordinates;
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Handle to a stage of a specific pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageRef {
    pipeline: Uuid,
    index: usize,
}

/// Handle to a job of a specific pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobRef {
    pipeline: Uuid,
    index: usize,
}

/// An execution phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Stage name
    pub name: String,
}

/// An ordering edge to another job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Needs {
    /// Target job; `None` is a dangling edge
    pub job: Option<JobRef>,
    /// Whether the target's artifacts are downloaded
    pub artifacts: bool,
}

impl Needs {
    /// Need a job and download its artifacts.
    #[must_use]
    pub const fn with_artifacts(job: JobRef) -> Self {
        Self {
            job: Some(job),
            artifacts: true,
        }
    }

    /// Need a job without its artifacts.
    #[must_use]
    pub const fn without_artifacts(job: JobRef) -> Self {
        Self {
            job: Some(job),
            artifacts: false,
        }
    }
}

/// When artifacts are uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactsWhen {
    /// Only for successful jobs
    OnSuccess,
    /// Only for failed jobs
    OnFailure,
    /// Always
    Always,
}

impl ArtifactsWhen {
    /// GitLab keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnSuccess => "on_success",
            Self::OnFailure => "on_failure",
            Self::Always => "always",
        }
    }
}

/// Files kept after a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    /// Paths to keep
    pub paths: Vec<String>,
    /// Paths excluded from `paths`
    pub exclude: Vec<String>,
    /// Upload condition
    pub when: Option<ArtifactsWhen>,
}

impl Artifacts {
    /// Artifacts consisting of the given paths.
    #[must_use]
    pub fn paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Child pipeline trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Artifact path of the child pipeline file
    pub include_artifact: String,
    /// Job producing the artifact
    pub include_job: Option<JobRef>,
    /// Trigger strategy
    pub strategy: String,
}

impl Trigger {
    /// Default strategy: the parent waits for the child and mirrors its status.
    pub const DEFAULT_STRATEGY: &'static str = "depend";

    /// Trigger the pipeline file `artifact` produced by `job`.
    #[must_use]
    pub fn artifact(artifact: impl Into<String>, job: JobRef) -> Self {
        Self {
            include_artifact: artifact.into(),
            include_job: Some(job),
            strategy: Self::DEFAULT_STRATEGY.to_string(),
        }
    }
}

/// Allow-failure setting; at least one part must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowFailure {
    /// Whether any failure is allowed
    pub allowed: Option<bool>,
    /// Exit codes that count as allowed failures
    pub exit_codes: Option<Vec<i32>>,
}

impl AllowFailure {
    /// Allow (or forbid) any failure.
    #[must_use]
    pub const fn allowed(allowed: bool) -> Self {
        Self {
            allowed: Some(allowed),
            exit_codes: None,
        }
    }

    /// Allow failures with these exit codes.
    #[must_use]
    pub fn exit_codes(codes: impl Into<Vec<i32>>) -> Self {
        Self {
            allowed: None,
            exit_codes: Some(codes.into()),
        }
    }
}

/// When a job is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    /// After all previous jobs succeeded
    OnSuccess,
    /// After a previous job failed
    OnFailure,
    /// Regardless of previous jobs
    Always,
    /// Only when started by hand
    Manual,
}

impl When {
    /// GitLab keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnSuccess => "on_success",
            Self::OnFailure => "on_failure",
            Self::Always => "always",
            Self::Manual => "manual",
        }
    }
}

/// Value of a pipeline or job variable.
///
/// GitLab accepts strings, numbers and booleans and hands every one of them
/// to the job as a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableValue {
    /// Text
    String(String),
    /// Integer
    Integer(i64),
    /// Boolean
    Bool(bool),
}

impl VariableValue {
    /// String content; `None` for numbers and booleans.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Pipeline-unique name
    pub name: String,
    /// Stage the job belongs to
    pub stage: StageRef,
    /// Shell lines
    pub script: Vec<String>,
    /// Container image the job runs in
    pub image: Option<ImageCoordinates>,
    /// Ordering edges
    pub needs: Vec<Needs>,
    /// Kept files
    pub artifacts: Option<Artifacts>,
    /// Job variables
    pub variables: IndexMap<String, VariableValue>,
    /// Child pipeline trigger
    pub trigger: Option<Trigger>,
    /// Allowed failure behaviour
    pub allow_failure: Option<AllowFailure>,
    /// Start condition
    pub when: Option<When>,
}

impl Job {
    /// Create an empty job in `stage`.
    #[must_use]
    pub fn new(name: impl Into<String>, stage: StageRef) -> Self {
        Self {
            name: name.into(),
            stage,
            script: Vec::new(),
            image: None,
            needs: Vec::new(),
            artifacts: None,
            variables: IndexMap::new(),
            trigger: None,
            allow_failure: None,
            when: None,
        }
    }

    /// Append script lines.
    #[must_use]
    pub fn with_script<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Run in `image`.
    #[must_use]
    pub fn with_image(mut self, image: ImageCoordinates) -> Self {
        self.image = Some(image);
        self
    }

    /// Add an ordering edge.
    #[must_use]
    pub fn with_need(mut self, needs: Needs) -> Self {
        self.needs.push(needs);
        self
    }

    /// Keep artifacts.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Artifacts) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Set a job variable.
    #[must_use]
    pub fn with_variable(
        mut self,
        key: impl Into<String>,
        value: impl Into<VariableValue>,
    ) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Trigger a child pipeline.
    #[must_use]
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Set the allow-failure behaviour.
    #[must_use]
    pub fn with_allow_failure(mut self, allow_failure: AllowFailure) -> Self {
        self.allow_failure = Some(allow_failure);
        self
    }

    /// Set the start condition.
    #[must_use]
    pub const fn with_when(mut self, when: When) -> Self {
        self.when = Some(when);
        self
    }
}

/// A pipeline under construction.
#[derive(Debug)]
pub struct Pipeline {
    id: Uuid,
    stages: Vec<Stage>,
    jobs: Vec<Job>,
    variables: IndexMap<String, VariableValue>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stages: Vec::new(),
            jobs: Vec::new(),
            variables: IndexMap::new(),
        }
    }

    /// Append a stage; stage order is execution order.
    pub fn add_stage(&mut self, name: impl Into<String>) -> StageRef {
        self.stages.push(Stage { name: name.into() });
        StageRef {
            pipeline: self.id,
            index: self.stages.len() - 1,
        }
    }

    /// Append a job.
    pub fn add_job(&mut self, job: Job) -> JobRef {
        debug!(job = %job.name, "Adding job");
        self.jobs.push(job);
        JobRef {
            pipeline: self.id,
            index: self.jobs.len() - 1,
        }
    }

    /// Set a pipeline-level variable.
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<VariableValue>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Stages in order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Jobs in insertion order.
    #[must_use]
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Mutable access to the jobs, e.g. to mark all of them manual.
    pub fn jobs_mut(&mut self) -> &mut [Job] {
        &mut self.jobs
    }

    /// Pipeline variables.
    #[must_use]
    pub const fn variables(&self) -> &IndexMap<String, VariableValue> {
        &self.variables
    }

    /// Resolve a job handle issued by this pipeline.
    #[must_use]
    pub fn job(&self, job: JobRef) -> Option<&Job> {
        if job.pipeline == self.id {
            self.jobs.get(job.index)
        } else {
            None
        }
    }

    /// Resolve a stage handle issued by this pipeline.
    #[must_use]
    pub fn stage(&self, stage: StageRef) -> Option<&Stage> {
        if stage.pipeline == self.id {
            self.stages.get(stage.index)
        } else {
            None
        }
    }

    /// Check job names and stage assignments.
    ///
    /// Reference edges are checked while emitting, see
    /// [`ValidatedPipeline::to_document`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every problem found.
    pub fn validate(self) -> Result<ValidatedPipeline> {
        let mut errors = Vec::new();

        for (index, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                errors.push(ValidationError::EmptyStageName { index });
            }
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if RESERVED_JOB_NAMES.contains(&job.name.as_str()) {
                errors.push(ValidationError::ReservedJobName {
                    name: job.name.clone(),
                });
            }
            if !seen.insert(job.name.as_str()) {
                errors.push(ValidationError::DuplicateJobName {
                    name: job.name.clone(),
                });
            }
            if self.stage(job.stage).is_none() {
                errors.push(ValidationError::UnknownStage {
                    job: job.name.clone(),
                });
            }
        }

        if errors.is_empty() {
            Ok(ValidatedPipeline::new(self))
        } else {
            Err(Error::Validation { errors })
        }
    }
}
