pub mod exec;
pub mod image_build;
pub mod update_check;

use crate::cli::{Cli, Commands, ExecCommands, ImageBuildCommands, UpdateCheckCommands};
use imagerail_core::{Config, EnvironmentContext, ImageCoordinates, PipelineKind};
use imagerail_imagebuild::{GenerationMode, WellKnownImages};
use imagerail_updatecheck::{CheckTarget, EvaluateRequest};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// What every command needs: the configuration file and the CI environment.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config_file: PathBuf,
    pub env: EnvironmentContext,
}

impl CommandContext {
    pub fn new(config_file: PathBuf) -> Self {
        Self {
            config_file,
            env: EnvironmentContext::from_env(),
        }
    }

    /// Load the configuration; the commit revision seeds staging locations.
    pub fn load_config(&self) -> miette::Result<Config> {
        Ok(Config::load(
            &self.config_file,
            self.env.commit_sha.as_deref(),
        )?)
    }

    /// Configuration file name as written into generated jobs.
    pub fn config_file_name(&self) -> String {
        self.config_file.to_string_lossy().into_owned()
    }
}

pub fn well_known_images(tool_image: Option<ImageCoordinates>) -> WellKnownImages {
    let images = WellKnownImages::default();
    match tool_image {
        Some(tool) => images.with_tool(tool),
        None => images,
    }
}

pub async fn execute(cli: Cli) -> miette::Result<()> {
    let ctx = CommandContext::new(cli.config_file);

    match cli.command {
        Commands::GeneratePipeline(output) => match ctx.env.pipeline_kind() {
            PipelineKind::UpdateCheck => {
                info!("Scheduled pipeline, generating the update check pipeline");
                update_check::generate_pipeline(&ctx, &output, false, CheckTarget::default())
            }
            PipelineKind::ImageBuild => {
                info!("Generating the image build pipeline");
                image_build::generate_pipeline(&ctx, &output, None, false)
            }
        },
        Commands::ImageBuild { subcommand } => match subcommand {
            ImageBuildCommands::GeneratePipeline {
                output,
                selection_file,
                manual_start,
            } => image_build::generate_pipeline(
                &ctx,
                &output,
                selection_file.as_deref(),
                manual_start,
            ),
            ImageBuildCommands::GenerateAuth { image_id, output } => {
                image_build::generate_auth(&ctx, &image_id, &output)
            }
        },
        Commands::UpdateCheck { subcommand } => match subcommand {
            UpdateCheckCommands::GeneratePipeline {
                output,
                skip_rebuild,
                target,
            } => update_check::generate_pipeline(&ctx, &output, skip_rebuild, target),
            UpdateCheckCommands::LayerCheck {
                output,
                timeout_secs,
                max_parallel,
                target,
            } => {
                update_check::layer_check(
                    &ctx,
                    &output,
                    timeout_secs.map(Duration::from_secs),
                    max_parallel,
                    target,
                )
                .await
            }
            UpdateCheckCommands::Evaluate {
                divergence_file,
                results_dir,
                selection_file,
                pipeline_file,
                tool_image,
                target,
            } => update_check::evaluate(
                &ctx,
                EvaluateRequest {
                    divergence_file,
                    results_dir,
                    selection_file,
                    pipeline_file,
                    target,
                    build: image_build::build_options(
                        &ctx,
                        tool_image,
                        GenerationMode::Release,
                        true,
                    ),
                },
            ),
        },
        Commands::Exec { subcommand } => match subcommand {
            ExecCommands::StagingImageTest { image_id } => {
                exec::staging_image_test(&ctx, &image_id).await
            }
            ExecCommands::UpdateCheck {
                image_id,
                location_index,
                results_dir,
                target,
            } => exec::update_check(&ctx, &image_id, location_index, &results_dir, target).await,
            ExecCommands::PackageCheck {
                result_file,
                image_id,
            } => exec::package_check(&result_file, image_id.as_deref()).await,
        },
    }
}
