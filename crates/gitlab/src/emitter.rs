//! GitLab CI emitter.
//!
//! Transforms a [`ValidatedPipeline`] into a [`Node`] tree laid out the way
//! GitLab expects `.gitlab-ci.yml` files.
//!
//! | Model | GitLab YAML |
//! |-------|-------------|
//! | stage list | `stages` |
//! | pipeline variables | `variables` (omitted when empty) |
//! | `Job.script` | `<job>.script` |
//! | `Job.image` | `<job>.image` |
//! | `Needs` | `<job>.needs: [{job, artifacts}]` |
//! | `Trigger` | `<job>.trigger: {include: {artifact, job}, strategy}` |
//! | `AllowFailure` | `<job>.allow_failure` (bool or `{exit_codes}`) |

use crate::document::{Node, encode_yaml};
use crate::error::{Error, Result};
use crate::pipeline::{AllowFailure, Artifacts, Job, JobRef, Pipeline, Trigger};
use indexmap::IndexMap;
use std::path::Path;
use tracing::info;

/// A pipeline that passed [`Pipeline::validate`].
///
/// This is the only type that can be serialized.
#[derive(Debug)]
pub struct ValidatedPipeline {
    pipeline: Pipeline,
}

impl ValidatedPipeline {
    pub(crate) const fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// The validated pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Transform into a document tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DanglingReference`] for needs/trigger edges that do
    /// not resolve in this pipeline and [`Error::InconsistentAllowFailure`]
    /// for allow-failure settings that cannot be expressed.
    pub fn to_document(&self) -> Result<Node> {
        let mut root = IndexMap::new();

        let stages: Vec<Node> = self
            .pipeline
            .stages()
            .iter()
            .map(|stage| Node::from(stage.name.as_str()))
            .collect();
        root.insert("stages".to_string(), Node::Sequence(stages));

        if !self.pipeline.variables().is_empty() {
            root.insert(
                "variables".to_string(),
                Node::from(self.pipeline.variables().clone()),
            );
        }

        for job in self.pipeline.jobs() {
            root.insert(job.name.clone(), self.job_node(job)?);
        }

        Ok(Node::Mapping(root))
    }

    /// Transform and encode as YAML.
    ///
    /// # Errors
    ///
    /// Fails like [`ValidatedPipeline::to_document`] or when encoding fails.
    pub fn render(&self) -> Result<String> {
        encode_yaml(&self.to_document()?)
    }

    /// Render and write to `path`.
    ///
    /// # Errors
    ///
    /// Fails like [`ValidatedPipeline::render`] or when the file cannot be
    /// written.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = self.render()?;
        std::fs::write(path, yaml).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            jobs = self.pipeline.jobs().len(),
            "Wrote pipeline"
        );
        Ok(())
    }

    fn job_name(&self, owner: &Job, job: Option<JobRef>, edge: &'static str) -> Result<&str> {
        job.and_then(|job| self.pipeline.job(job))
            .map(|job| job.name.as_str())
            .ok_or_else(|| Error::DanglingReference {
                job: owner.name.clone(),
                edge,
            })
    }

    fn job_node(&self, job: &Job) -> Result<Node> {
        let mut node = IndexMap::new();

        if let Some(stage) = self.pipeline.stage(job.stage) {
            node.insert("stage".to_string(), Node::from(stage.name.as_str()));
        }

        if let Some(image) = &job.image {
            node.insert("image".to_string(), Node::from(image.to_string()));
        }

        if !job.needs.is_empty() {
            let needs = job
                .needs
                .iter()
                .map(|needs| -> Result<Node> {
                    let mut edge = IndexMap::new();
                    edge.insert(
                        "job".to_string(),
                        Node::from(self.job_name(job, needs.job, "needs")?),
                    );
                    edge.insert("artifacts".to_string(), Node::from(needs.artifacts));
                    Ok(Node::Mapping(edge))
                })
                .collect::<Result<Vec<_>>>()?;
            node.insert("needs".to_string(), Node::Sequence(needs));
        }

        if !job.variables.is_empty() {
            node.insert("variables".to_string(), Node::from(job.variables.clone()));
        }

        if !job.script.is_empty() {
            node.insert("script".to_string(), Node::from(job.script.clone()));
        }

        if let Some(artifacts) = &job.artifacts
            && let Some(artifacts) = artifacts_node(artifacts)
        {
            node.insert("artifacts".to_string(), artifacts);
        }

        if let Some(trigger) = &job.trigger {
            node.insert("trigger".to_string(), self.trigger_node(job, trigger)?);
        }

        if let Some(allow_failure) = &job.allow_failure {
            node.insert(
                "allow_failure".to_string(),
                allow_failure_node(&job.name, allow_failure)?,
            );
        }

        if let Some(when) = job.when {
            node.insert("when".to_string(), Node::from(when.as_str()));
        }

        Ok(Node::Mapping(node))
    }

    fn trigger_node(&self, job: &Job, trigger: &Trigger) -> Result<Node> {
        let mut include = IndexMap::new();
        include.insert(
            "artifact".to_string(),
            Node::from(trigger.include_artifact.as_str()),
        );
        include.insert(
            "job".to_string(),
            Node::from(self.job_name(job, trigger.include_job, "trigger")?),
        );

        let mut node = IndexMap::new();
        node.insert("include".to_string(), Node::Mapping(include));
        node.insert("strategy".to_string(), Node::from(trigger.strategy.as_str()));
        Ok(Node::Mapping(node))
    }
}

fn artifacts_node(artifacts: &Artifacts) -> Option<Node> {
    let mut node = IndexMap::new();
    if !artifacts.paths.is_empty() {
        node.insert("paths".to_string(), Node::from(artifacts.paths.clone()));
    }
    if !artifacts.exclude.is_empty() {
        node.insert("exclude".to_string(), Node::from(artifacts.exclude.clone()));
    }
    if let Some(when) = artifacts.when {
        node.insert("when".to_string(), Node::from(when.as_str()));
    }
    (!node.is_empty()).then_some(Node::Mapping(node))
}

fn allow_failure_node(job: &str, allow_failure: &AllowFailure) -> Result<Node> {
    let inconsistent = |reason| Error::InconsistentAllowFailure {
        job: job.to_string(),
        reason,
    };

    let exit_codes = |codes: &[i32]| {
        let mut node = IndexMap::new();
        node.insert("exit_codes".to_string(), Node::from(codes.to_vec()));
        Node::Mapping(node)
    };

    match (allow_failure.allowed, allow_failure.exit_codes.as_deref()) {
        (None, Some(codes)) | (Some(true), Some(codes)) => Ok(exit_codes(codes)),
        (Some(allowed), None) => Ok(Node::from(allowed)),
        (Some(false), Some(_)) => Err(inconsistent(
            "exit codes are set but failures are not allowed",
        )),
        (None, None) => Err(inconsistent("neither allowed nor exit codes are set")),
    }
}
