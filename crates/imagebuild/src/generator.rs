//! Image build pipeline generator.
//!
//! For every image to build the generator emits a chain of jobs in a single
//! stage, ordered through `needs`:
//!
//! ```text
//! provide imagerail binary ──► build <id> ──► test <id> ──► release <id> to <location>
//!                                   └──────────(no test)──────────┘
//! ```

use crate::auth::pipeline_auth_config;
use crate::error::Result;
use crate::images::{KANIKO_AUTH_FILE, TOOL_BINARY, TOOL_DIR, WellKnownImages};
use crate::script::{ScriptLine, render_all};
use imagerail_core::{
    AuthDocument, Config, CredentialResolver, ImageConfig, ImageCoordinates, ImageLocation,
    UsernamePassword,
};
use imagerail_gitlab::{Artifacts, Job, JobRef, Needs, Pipeline, StageRef, ValidatedPipeline, When};
use tracing::{debug, info};

/// Name of the single stage of generated pipelines.
pub const STAGE_NAME: &str = "imagerail";

/// Name of the stub job added when jobs do not start automatically.
pub const KEEP_ALIVE_JOB: &str = "keep parent pipeline alive";

/// Name of the job publishing the imagerail binary.
pub const TOOL_JOB: &str = "provide imagerail binary";

/// Variable carrying the configuration file name into jobs.
pub const CONFIG_FILE_VARIABLE: &str = "IMAGERAIL_CONFIG_FILE";

/// Build arguments always passed to the image builder.
pub const BASE_IMAGE_BUILD_ARG: &str = "IMAGERAIL_BASE_IMAGE";
/// See [`BASE_IMAGE_BUILD_ARG`].
pub const IMAGE_ID_BUILD_ARG: &str = "IMAGERAIL_IMAGE_ID";

/// What the generated pipeline does after the staging image is tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Publish to every release location
    Release,
    /// Stop after build and test
    BuildOnly,
}

/// Settings for [`ImageBuildGenerator`].
#[derive(Debug, Clone)]
pub struct BuildPipelineOptions {
    /// Images used by the generated jobs
    pub images: WellKnownImages,
    /// Configuration file name as seen from inside jobs
    pub config_file: String,
    /// Whether release jobs are generated
    pub mode: GenerationMode,
    /// Whether jobs start without user interaction
    pub auto_start: bool,
}

impl Default for BuildPipelineOptions {
    fn default() -> Self {
        Self {
            images: WellKnownImages::default(),
            config_file: imagerail_core::DEFAULT_CONFIG_FILE.to_string(),
            mode: GenerationMode::Release,
            auto_start: true,
        }
    }
}

/// Generates the image build pipeline.
#[derive(Debug)]
pub struct ImageBuildGenerator<'a> {
    config: &'a Config,
    options: BuildPipelineOptions,
}

impl<'a> ImageBuildGenerator<'a> {
    /// Create a generator.
    #[must_use]
    pub const fn new(config: &'a Config, options: BuildPipelineOptions) -> Self {
        Self { config, options }
    }

    /// Generate the pipeline for `image_ids`.
    ///
    /// `inherited_auth` is the runner's `DOCKER_AUTH_CONFIG`, extended with
    /// the staging credentials of the built images.
    ///
    /// # Errors
    ///
    /// Fails for unknown images or credentials, unset credential variables,
    /// unquotable script arguments, or an invalid resulting pipeline.
    pub fn generate<S: AsRef<str>>(
        &self,
        image_ids: &[S],
        inherited_auth: Option<AuthDocument>,
    ) -> Result<ValidatedPipeline> {
        let mut pipeline = Pipeline::new();
        let stage = pipeline.add_stage(STAGE_NAME);

        if image_ids.is_empty() {
            info!("No images to build, generating a placeholder pipeline");
            pipeline.add_job(
                Job::new("nothing to build", stage)
                    .with_script(["echo \"No image needs to be built.\""]),
            );
            return Ok(pipeline.validate()?);
        }

        if !self.options.auto_start {
            pipeline.add_job(keep_alive_job(stage));
        }

        let tool = pipeline.add_job(tool_job(&self.options.images.tool, stage));

        for image_id in image_ids {
            let image = self.config.image(image_id.as_ref())?;
            info!(image_id = %image.id, mode = ?self.options.mode, "Generating image build jobs");
            self.add_image_jobs(&mut pipeline, stage, tool, image)?;
        }

        let auth = pipeline_auth_config(
            self.config,
            image_ids.iter().map(|id| id.as_ref()),
            inherited_auth,
        )?;
        pipeline.set_variable("DOCKER_AUTH_CONFIG", auth.to_json());

        if !self.options.auto_start {
            for job in pipeline.jobs_mut() {
                if job.name != KEEP_ALIVE_JOB {
                    job.when = Some(When::Manual);
                }
            }
        }

        Ok(pipeline.validate()?)
    }

    fn add_image_jobs(
        &self,
        pipeline: &mut Pipeline,
        stage: StageRef,
        tool: JobRef,
        image: &ImageConfig,
    ) -> Result<()> {
        let build = pipeline.add_job(
            Job::new(format!("build {}", image.id), stage)
                .with_image(self.options.images.kaniko.clone())
                .with_script(render_all(&self.build_script(image))?)
                .with_need(Needs::with_artifacts(tool)),
        );

        let mut last = build;
        if image.has_test() {
            let test = Job::new(format!("test {}", image.id), stage)
                .with_image(image.staging_location.coordinates())
                .with_script([ScriptLine::new(TOOL_BINARY)
                    .args(["exec", "staging-image-test", image.id.as_str()])
                    .render()?])
                .with_need(Needs::without_artifacts(build))
                .with_need(Needs::with_artifacts(tool))
                .with_variable(CONFIG_FILE_VARIABLE, self.options.config_file.as_str());
            last = pipeline.add_job(test);
        } else {
            info!(image_id = %image.id, "No test command configured, releasing untested");
        }

        if self.options.mode == GenerationMode::BuildOnly {
            info!(image_id = %image.id, "Build-only mode, skipping release jobs");
            return Ok(());
        }

        for location in &image.release_locations {
            let release = Job::new(
                format!("release {} to {}", image.id, location.coordinates()),
                stage,
            )
            .with_image(self.options.images.skopeo.clone())
            .with_script([self.release_line(image, location)?.render()?])
            .with_need(Needs::without_artifacts(last));
            pipeline.add_job(release);
        }
        Ok(())
    }

    fn build_script(&self, image: &ImageConfig) -> Vec<ScriptLine> {
        let mut script = Vec::new();
        if image.move_var_quirk {
            script.push(ScriptLine::new("mv").args(["/var", "/var-orig"]));
        }

        script.push(
            ScriptLine::new(TOOL_BINARY)
                .args(["image-build", "generate-auth", "--config-file"])
                .arg(self.options.config_file.as_str())
                .args(["--image-id", image.id.as_str(), "--output", KANIKO_AUTH_FILE]),
        );

        let mut executor = ScriptLine::new("/kaniko/executor");
        if image.move_var_quirk {
            executor = executor.arg("--ignore-path=/var-orig");
        }
        executor = executor
            .arg("--context")
            .expand("CI_PROJECT_DIR", "")
            .arg("--dockerfile")
            .expand("CI_PROJECT_DIR", format!("/{}", image.container_file))
            .arg(format!(
                "--build-arg={BASE_IMAGE_BUILD_ARG}={}",
                image.base_image.coordinates()
            ))
            .arg(format!("--build-arg={IMAGE_ID_BUILD_ARG}={}", image.id));
        for build_arg in &image.build_args {
            executor = executor.arg(format!("--build-arg={}={}", build_arg.key, build_arg.value));
        }
        script.push(
            executor
                .arg("--destination")
                .arg(image.staging_location.coordinates().to_string()),
        );
        script
    }

    fn release_line(&self, image: &ImageConfig, location: &ImageLocation) -> Result<ScriptLine> {
        let resolver = self.config.credential_resolver();
        let source = location_credentials(&resolver, image, "source", &image.staging_location)?;
        let destination = location_credentials(&resolver, image, "destination", location)?;

        let mut line = ScriptLine::new("skopeo").arg("copy");
        if let Some(source) = &source {
            line = line
                .flag("--src-username", source.username.as_str())
                .flag("--src-password", source.expose_password());
        }
        if let Some(destination) = &destination {
            line = line
                .flag("--dest-username", destination.username.as_str())
                .flag("--dest-password", destination.expose_password());
        }
        Ok(line
            .arg(format!("docker://{}", image.staging_location.coordinates()))
            .arg(format!("docker://{}", location.coordinates())))
    }
}

/// Username/password skopeo uses for one side of a copy.
///
/// Auth document credentials contribute their entry for the location's
/// registry; a document without one is an error.
fn location_credentials(
    resolver: &CredentialResolver<'_>,
    image: &ImageConfig,
    side: &'static str,
    location: &ImageLocation,
) -> Result<Option<UsernamePassword>> {
    let Some(id) = location.credentials.as_deref() else {
        info!(
            image_id = %image.id,
            registry = %location.registry,
            side,
            "No credentials configured, copying without authentication flags"
        );
        return Ok(None);
    };
    if let Some(credentials) = resolver.resolve(id)? {
        return Ok(Some(credentials));
    }

    let credentials = resolver
        .resolve_auth_document(id)?
        .and_then(|document| document.credentials_for(&location.registry))
        .ok_or_else(|| imagerail_core::Error::NoRegistryAuth {
            credential: id.to_string(),
            registry: location.registry.clone(),
        })?;
    debug!(
        image_id = %image.id,
        registry = %location.registry,
        side,
        credential = id,
        "Using auth document entry for copy"
    );
    Ok(Some(credentials))
}

/// Job copying the imagerail binary from the tool image into an artifact,
/// so jobs running in arbitrary images can call back into it.
#[must_use]
pub fn tool_job(tool_image: &ImageCoordinates, stage: StageRef) -> Job {
    Job::new(TOOL_JOB, stage)
        .with_image(tool_image.clone())
        .with_script([format!(
            "mkdir -p {TOOL_DIR} && cp \"$(command -v imagerail)\" {TOOL_BINARY}"
        )])
        .with_artifacts(Artifacts::paths([TOOL_DIR]))
}

fn keep_alive_job(stage: StageRef) -> Job {
    // A child pipeline made of manual jobs only leaves a `depend` trigger in
    // the parent either running forever or failing.
    Job::new(KEEP_ALIVE_JOB, stage).with_script([
        "echo \"All image jobs are manual. This job keeps the parent pipeline in a defined state.\"",
    ])
}
