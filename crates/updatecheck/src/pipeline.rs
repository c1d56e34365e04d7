//! Update check pipeline generator.
//!
//! ```text
//! provide imagerail binary ─┬─► update check <id> location <n> ─┐
//!                           │              (one per location)    ├─► evaluate update checks ──► rebuild images
//! check layers ─────────────┴────────────────────────────────────┘
//! ```
//!
//! The evaluate job writes the rebuild selection and the child build pipeline
//! which the trigger job then runs.

use crate::error::Result;
use crate::locations::{CheckTarget, result_file_name};
use imagerail_core::{AuthDocument, Config, ImageConfig};
use imagerail_gitlab::{Artifacts, Job, JobRef, Needs, Pipeline, StageRef, Trigger, ValidatedPipeline};
use imagerail_imagebuild::generator::{CONFIG_FILE_VARIABLE, STAGE_NAME};
use imagerail_imagebuild::images::TOOL_BINARY;
use imagerail_imagebuild::{ScriptLine, WellKnownImages, locations_auth_config, tool_job};
use tracing::{debug, info};

/// Default name of the layer check artifact.
pub const DIVERGENCE_FILE: &str = "imagerail-divergence.json";
/// Default name of the rebuild selection artifact.
pub const SELECTION_FILE: &str = "imagerail-rebuild-selection.json";
/// Default name of the generated rebuild pipeline.
pub const CHILD_PIPELINE_FILE: &str = "imagerail-rebuild-pipeline.yml";

/// Name of the layer check job.
pub const LAYER_CHECK_JOB: &str = "check layers";
/// Name of the job deciding what to rebuild.
pub const EVALUATE_JOB: &str = "evaluate update checks";
/// Name of the job running the rebuild pipeline.
pub const REBUILD_JOB: &str = "rebuild images";

/// Settings for [`UpdateCheckGenerator`].
#[derive(Debug, Clone)]
pub struct UpdateCheckOptions {
    /// Images used by the generated jobs
    pub images: WellKnownImages,
    /// Configuration file name as seen from inside jobs
    pub config_file: String,
    /// Which locations are checked
    pub target: CheckTarget,
    /// Stop after evaluation instead of triggering the rebuild pipeline
    pub skip_rebuild: bool,
    /// Layer check artifact
    pub divergence_file: String,
    /// Rebuild selection artifact
    pub selection_file: String,
    /// Generated rebuild pipeline artifact
    pub child_pipeline_file: String,
}

impl Default for UpdateCheckOptions {
    fn default() -> Self {
        Self {
            images: WellKnownImages::default(),
            config_file: imagerail_core::DEFAULT_CONFIG_FILE.to_string(),
            target: CheckTarget::default(),
            skip_rebuild: false,
            divergence_file: DIVERGENCE_FILE.to_string(),
            selection_file: SELECTION_FILE.to_string(),
            child_pipeline_file: CHILD_PIPELINE_FILE.to_string(),
        }
    }
}

/// Generates the scheduled update check pipeline.
#[derive(Debug)]
pub struct UpdateCheckGenerator<'a> {
    config: &'a Config,
    options: UpdateCheckOptions,
}

impl<'a> UpdateCheckGenerator<'a> {
    /// Create a generator.
    #[must_use]
    pub const fn new(config: &'a Config, options: UpdateCheckOptions) -> Self {
        Self { config, options }
    }

    /// Generate the pipeline.
    ///
    /// `inherited_auth` is the runner's `DOCKER_AUTH_CONFIG`, extended with
    /// the credentials of every location an in-image check pulls.
    ///
    /// # Errors
    ///
    /// Fails for unknown credentials, unset credential variables, unquotable
    /// script arguments, or an invalid resulting pipeline.
    pub fn generate(&self, inherited_auth: Option<AuthDocument>) -> Result<ValidatedPipeline> {
        let mut pipeline = Pipeline::new();
        let stage = pipeline.add_stage(STAGE_NAME);
        let target = self.options.target;

        let tool = pipeline.add_job(tool_job(&self.options.images.tool, stage));
        let layer_check = pipeline.add_job(self.layer_check_job(stage)?);

        let mut checks = Vec::new();
        let mut pulled = Vec::new();
        for image in self.config.images.values() {
            if !image.has_update_check() {
                debug!(image_id = %image.id, "No update check command, layer check only");
                continue;
            }
            for (index, location) in target.locations(image).into_iter().enumerate() {
                checks.push(pipeline.add_job(self.in_image_job(stage, tool, image, index)?));
                pulled.push((image.id.as_str(), location));
            }
        }
        info!(
            images = self.config.images.len(),
            in_image_checks = checks.len(),
            %target,
            "Generated update check jobs"
        );

        let evaluate = pipeline.add_job(self.evaluate_job(stage, layer_check, &checks)?);

        if self.options.skip_rebuild {
            info!("Rebuild disabled, the pipeline stops after evaluation");
        } else {
            pipeline.add_job(
                Job::new(REBUILD_JOB, stage)
                    .with_need(Needs::with_artifacts(evaluate))
                    .with_trigger(Trigger::artifact(
                        self.options.child_pipeline_file.as_str(),
                        evaluate,
                    )),
            );
        }

        let auth = locations_auth_config(self.config, pulled, inherited_auth)?;
        pipeline.set_variable("DOCKER_AUTH_CONFIG", auth.to_json());

        Ok(pipeline.validate()?)
    }

    fn tool_command(&self, subcommand: &str) -> ScriptLine {
        ScriptLine::new("imagerail")
            .args(["update-check", subcommand, "--config-file"])
            .arg(self.options.config_file.as_str())
            .arg("--target")
            .arg(self.options.target.to_string())
    }

    fn layer_check_job(&self, stage: StageRef) -> Result<Job> {
        let line = self
            .tool_command("layer-check")
            .arg("--output")
            .arg(self.options.divergence_file.as_str());
        Ok(Job::new(LAYER_CHECK_JOB, stage)
            .with_image(self.options.images.tool.clone())
            .with_script([line.render()?])
            .with_artifacts(Artifacts::paths([self.options.divergence_file.as_str()])))
    }

    fn in_image_job(
        &self,
        stage: StageRef,
        tool: JobRef,
        image: &ImageConfig,
        index: usize,
    ) -> Result<Job> {
        let locations = self.options.target.locations(image);
        let line = ScriptLine::new(TOOL_BINARY)
            .args(["exec", "update-check", image.id.as_str()])
            .arg("--location-index")
            .arg(index.to_string())
            .arg("--target")
            .arg(self.options.target.to_string());
        let mut job = Job::new(format!("update check {} location {index}", image.id), stage)
            .with_script([line.render()?])
            .with_need(Needs::with_artifacts(tool))
            .with_variable(CONFIG_FILE_VARIABLE, self.options.config_file.as_str())
            .with_artifacts(Artifacts::paths([result_file_name(&image.id, index)]));
        if let Some(location) = locations.get(index) {
            job = job.with_image(location.coordinates());
        }
        Ok(job)
    }

    fn evaluate_job(&self, stage: StageRef, layer_check: JobRef, checks: &[JobRef]) -> Result<Job> {
        let line = self
            .tool_command("evaluate")
            .arg("--divergence-file")
            .arg(self.options.divergence_file.as_str())
            .arg("--selection-file")
            .arg(self.options.selection_file.as_str())
            .arg("--pipeline-file")
            .arg(self.options.child_pipeline_file.as_str());

        let mut job = Job::new(EVALUATE_JOB, stage)
            .with_image(self.options.images.tool.clone())
            .with_script([line.render()?])
            .with_need(Needs::with_artifacts(layer_check))
            .with_artifacts(Artifacts::paths([
                self.options.selection_file.as_str(),
                self.options.child_pipeline_file.as_str(),
            ]));
        for check in checks {
            job = job.with_need(Needs::with_artifacts(*check));
        }
        Ok(job)
    }
}
