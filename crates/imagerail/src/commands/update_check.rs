use super::{CommandContext, well_known_images};
use crate::cli::PipelineOutput;
use imagerail_updatecheck::{
    CheckTarget, EvaluateRequest, LayerCheckOptions, LayerChecker, OciRegistryInspector,
    UpdateCheckGenerator, UpdateCheckOptions,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub fn generate_pipeline(
    ctx: &CommandContext,
    output: &PipelineOutput,
    skip_rebuild: bool,
    target: CheckTarget,
) -> miette::Result<()> {
    let config = ctx.load_config()?;
    let options = UpdateCheckOptions {
        images: well_known_images(output.tool_image.clone()),
        config_file: ctx.config_file_name(),
        target,
        skip_rebuild,
        ..UpdateCheckOptions::default()
    };
    UpdateCheckGenerator::new(&config, options)
        .generate(ctx.env.inherited_auth_document()?)?
        .write_to_file(&output.pipeline_file)?;
    Ok(())
}

pub async fn layer_check(
    ctx: &CommandContext,
    output: &Path,
    timeout: Option<Duration>,
    max_parallel: usize,
    target: CheckTarget,
) -> miette::Result<()> {
    let config = Arc::new(ctx.load_config()?);
    let options = LayerCheckOptions {
        task_timeout: timeout,
        max_parallel,
        target,
    };
    let report = LayerChecker::new(config, Arc::new(OciRegistryInspector::new()), options)
        .check()
        .await?;
    report.write(output)?;
    info!(images = report.len(), path = %output.display(), "Wrote divergence report");
    Ok(())
}

pub fn evaluate(ctx: &CommandContext, request: EvaluateRequest) -> miette::Result<()> {
    let config = ctx.load_config()?;
    let selection =
        imagerail_updatecheck::evaluate(&config, &request, ctx.env.inherited_auth_document()?)?;
    info!(
        selected = selection.selected().count(),
        selection_file = %request.selection_file.display(),
        pipeline_file = %request.pipeline_file.display(),
        "Evaluated update checks"
    );
    Ok(())
}
