use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand};
use imagerail_core::{DEFAULT_CONFIG_FILE, ImageCoordinates};
use imagerail_imagebuild::images::KANIKO_AUTH_FILE;
use imagerail_updatecheck::CheckTarget;
use imagerail_updatecheck::pipeline::{CHILD_PIPELINE_FILE, DIVERGENCE_FILE, SELECTION_FILE};
use std::path::PathBuf;

/// Default name of the generated pipeline file.
pub const DEFAULT_PIPELINE_FILE: &str = ".imagerail-gitlab-ci.yml";

#[derive(Parser, Debug)]
#[command(name = "imagerail")]
#[command(about = "Build, test, release and update-check container images in GitLab CI")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        env = "IMAGERAIL_CONFIG_FILE",
        default_value = DEFAULT_CONFIG_FILE,
        help = "imagerail configuration file"
    )]
    pub config_file: PathBuf,

    #[arg(
        short = 'l',
        long,
        global = true,
        env = "IMAGERAIL_LOG_LEVEL",
        default_value = "info",
        value_enum,
        help = "Set logging level"
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        env = "IMAGERAIL_LOG_FORMAT",
        default_value = "compact",
        value_enum,
        help = "Log output format"
    )]
    pub log_format: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Generate the pipeline matching the CI context: update check for scheduled pipelines, image build otherwise"
    )]
    GeneratePipeline(PipelineOutput),
    #[command(about = "Image build pipeline operations")]
    ImageBuild {
        #[command(subcommand)]
        subcommand: ImageBuildCommands,
    },
    #[command(about = "Update check pipeline operations")]
    UpdateCheck {
        #[command(subcommand)]
        subcommand: UpdateCheckCommands,
    },
    #[command(about = "Commands executed by generated jobs")]
    Exec {
        #[command(subcommand)]
        subcommand: ExecCommands,
    },
}

/// Where a generated pipeline goes and which tool image its jobs use.
#[derive(Args, Debug, Clone)]
pub struct PipelineOutput {
    #[arg(
        long,
        env = "IMAGERAIL_PIPELINE_FILE",
        default_value = DEFAULT_PIPELINE_FILE,
        help = "File the generated pipeline is written to"
    )]
    pub pipeline_file: PathBuf,

    #[arg(
        long,
        env = "IMAGERAIL_TOOL_IMAGE",
        help = "Image providing the imagerail binary to generated jobs"
    )]
    pub tool_image: Option<ImageCoordinates>,
}

#[derive(Subcommand, Debug)]
pub enum ImageBuildCommands {
    #[command(about = "Generate the image build pipeline")]
    GeneratePipeline {
        #[command(flatten)]
        output: PipelineOutput,
        #[arg(long, help = "Only build the images marked true in this JSON file")]
        selection_file: Option<PathBuf>,
        #[arg(long, help = "Generated jobs wait for a manual start")]
        manual_start: bool,
    },
    #[command(about = "Write the registry auth file for building one image")]
    GenerateAuth {
        #[arg(long, help = "Image to build")]
        image_id: String,
        #[arg(long, default_value = KANIKO_AUTH_FILE, help = "Auth file to write")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum UpdateCheckCommands {
    #[command(about = "Generate the update check pipeline")]
    GeneratePipeline {
        #[command(flatten)]
        output: PipelineOutput,
        #[arg(long, help = "Stop after deciding what to rebuild")]
        skip_rebuild: bool,
        #[arg(long, default_value_t = CheckTarget::Release, help = "Locations to check (release, staging)")]
        target: CheckTarget,
    },
    #[command(about = "Compare published image layers with their base images")]
    LayerCheck {
        #[arg(long, default_value = DIVERGENCE_FILE, help = "Divergence report to write")]
        output: PathBuf,
        #[arg(long, help = "Fail an image check running longer than this many seconds")]
        timeout_secs: Option<u64>,
        #[arg(long, default_value_t = 8, help = "Images checked at once, 0 for no limit")]
        max_parallel: usize,
        #[arg(long, default_value_t = CheckTarget::Release, help = "Locations to check (release, staging)")]
        target: CheckTarget,
    },
    #[command(about = "Decide what to rebuild and write the rebuild pipeline")]
    Evaluate {
        #[arg(long, default_value = DIVERGENCE_FILE, help = "Divergence report to read")]
        divergence_file: PathBuf,
        #[arg(long, default_value = ".", help = "Directory holding in-image check results")]
        results_dir: PathBuf,
        #[arg(long, default_value = SELECTION_FILE, help = "Rebuild selection to write")]
        selection_file: PathBuf,
        #[arg(long, default_value = CHILD_PIPELINE_FILE, help = "Rebuild pipeline to write")]
        pipeline_file: PathBuf,
        #[arg(long, env = "IMAGERAIL_TOOL_IMAGE", help = "Image providing the imagerail binary")]
        tool_image: Option<ImageCoordinates>,
        #[arg(long, default_value_t = CheckTarget::Release, help = "Locations that were checked")]
        target: CheckTarget,
    },
}

#[derive(Subcommand, Debug)]
pub enum ExecCommands {
    #[command(about = "Run the test command of an image against its staging image")]
    StagingImageTest {
        #[arg(help = "Image to test")]
        image_id: String,
    },
    #[command(about = "Run the update check command of an image for one location")]
    UpdateCheck {
        #[arg(help = "Image to check")]
        image_id: String,
        #[arg(long, help = "Index of the checked location")]
        location_index: usize,
        #[arg(long, default_value = ".", help = "Directory the result file is written to")]
        results_dir: PathBuf,
        #[arg(long, default_value_t = CheckTarget::Release, help = "Locations being checked")]
        target: CheckTarget,
    },
    #[command(about = "Built-in update check using the image's package manager")]
    PackageCheck {
        #[arg(long, env = "IMAGERAIL_RESULT_FILE", help = "Result file to write")]
        result_file: PathBuf,
        #[arg(help = "Image being checked, appended by the update check runner")]
        image_id: Option<String>,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        temp_env::with_vars_unset(
            [
                "IMAGERAIL_CONFIG_FILE",
                "IMAGERAIL_PIPELINE_FILE",
                "IMAGERAIL_TOOL_IMAGE",
                "IMAGERAIL_LOG_LEVEL",
                "IMAGERAIL_LOG_FORMAT",
            ],
            || {
                let cli = Cli::try_parse_from(["imagerail", "generate-pipeline"]).unwrap();
                assert_eq!(cli.config_file, PathBuf::from("imagerail.yml"));
                assert_eq!(cli.level, LogLevel::Info);
                assert_eq!(cli.log_format, TracingFormat::Compact);
                let Commands::GeneratePipeline(output) = cli.command else {
                    panic!("expected generate-pipeline");
                };
                assert_eq!(output.pipeline_file, PathBuf::from(DEFAULT_PIPELINE_FILE));
                assert!(output.tool_image.is_none());
            },
        );
    }

    #[test]
    fn test_environment_fallbacks() {
        temp_env::with_vars(
            [
                ("IMAGERAIL_CONFIG_FILE", Some("ci/images.yml")),
                ("IMAGERAIL_TOOL_IMAGE", Some("registry.example.com/tools/imagerail:1.0")),
            ],
            || {
                let cli =
                    Cli::try_parse_from(["imagerail", "image-build", "generate-pipeline"]).unwrap();
                assert_eq!(cli.config_file, PathBuf::from("ci/images.yml"));
                let Commands::ImageBuild {
                    subcommand: ImageBuildCommands::GeneratePipeline { output, .. },
                } = cli.command
                else {
                    panic!("expected image-build generate-pipeline");
                };
                assert_eq!(
                    output.tool_image.map(|image| image.to_string()).as_deref(),
                    Some("registry.example.com/tools/imagerail:1.0")
                );
            },
        );
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "imagerail",
            "image-build",
            "generate-auth",
            "--config-file",
            "other.yml",
            "--image-id",
            "alpine",
        ])
        .unwrap();
        assert_eq!(cli.config_file, PathBuf::from("other.yml"));
        assert!(matches!(
            cli.command,
            Commands::ImageBuild {
                subcommand: ImageBuildCommands::GenerateAuth { ref image_id, .. }
            } if image_id == "alpine"
        ));
    }

    #[test]
    fn test_update_check_target() {
        let cli = Cli::try_parse_from([
            "imagerail",
            "exec",
            "update-check",
            "alpine",
            "--location-index",
            "2",
            "--target",
            "staging",
        ])
        .unwrap();
        let Commands::Exec {
            subcommand:
                ExecCommands::UpdateCheck {
                    location_index,
                    target,
                    ..
                },
        } = cli.command
        else {
            panic!("expected exec update-check");
        };
        assert_eq!(location_index, 2);
        assert_eq!(target, CheckTarget::Staging);

        assert!(
            Cli::try_parse_from([
                "imagerail",
                "update-check",
                "generate-pipeline",
                "--target",
                "production"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_package_check_accepts_trailing_image_id() {
        let cli = Cli::try_parse_from([
            "imagerail",
            "exec",
            "package-check",
            "--result-file",
            "/tmp/result",
            "alpine",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Exec {
                subcommand: ExecCommands::PackageCheck { image_id: Some(ref id), .. }
            } if id == "alpine"
        ));
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Cli::try_parse_from(["imagerail"]).is_err());
    }
}
