use super::{CommandContext, well_known_images};
use crate::cli::PipelineOutput;
use imagerail_core::ImageCoordinates;
use imagerail_imagebuild::{
    BuildPipelineOptions, GenerationMode, ImageBuildGenerator, RebuildSelection,
    generate_image_auth, write_auth_file,
};
use std::path::Path;
use tracing::info;

pub fn build_options(
    ctx: &CommandContext,
    tool_image: Option<ImageCoordinates>,
    mode: GenerationMode,
    auto_start: bool,
) -> BuildPipelineOptions {
    BuildPipelineOptions {
        images: well_known_images(tool_image),
        config_file: ctx.config_file_name(),
        mode,
        auto_start,
    }
}

pub fn generate_pipeline(
    ctx: &CommandContext,
    output: &PipelineOutput,
    selection_file: Option<&Path>,
    manual_start: bool,
) -> miette::Result<()> {
    let config = ctx.load_config()?;

    let images: Vec<String> = match selection_file {
        Some(path) => RebuildSelection::read(path)?
            .selected()
            .map(str::to_string)
            .collect(),
        None => config.images.keys().cloned().collect(),
    };

    let mode = if ctx.env.is_default_branch() {
        GenerationMode::Release
    } else {
        info!(
            branch = ?ctx.env.current_branch,
            "Not on the default branch, images are built and tested but not released"
        );
        GenerationMode::BuildOnly
    };

    let options = build_options(ctx, output.tool_image.clone(), mode, !manual_start);
    ImageBuildGenerator::new(&config, options)
        .generate(&images, ctx.env.inherited_auth_document()?)?
        .write_to_file(&output.pipeline_file)?;
    Ok(())
}

pub fn generate_auth(ctx: &CommandContext, image_id: &str, output: &Path) -> miette::Result<()> {
    let config = ctx.load_config()?;
    let document = generate_image_auth(&config, image_id)?;
    write_auth_file(&document, output)?;
    info!(
        image_id,
        registries = document.auths.len(),
        path = %output.display(),
        "Wrote registry auth file"
    );
    Ok(())
}
