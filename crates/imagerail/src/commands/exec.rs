use super::CommandContext;
use imagerail_imagebuild::run_staging_image_test;
use imagerail_updatecheck::{CheckTarget, run_package_check, run_update_check};
use std::path::Path;
use tracing::info;

pub async fn staging_image_test(ctx: &CommandContext, image_id: &str) -> miette::Result<()> {
    let config = ctx.load_config()?;
    run_staging_image_test(&config, image_id).await?;
    Ok(())
}

pub async fn update_check(
    ctx: &CommandContext,
    image_id: &str,
    location_index: usize,
    results_dir: &Path,
    target: CheckTarget,
) -> miette::Result<()> {
    let config = ctx.load_config()?;
    run_update_check(&config, image_id, location_index, results_dir, target).await?;
    Ok(())
}

pub async fn package_check(result_file: &Path, image_id: Option<&str>) -> miette::Result<()> {
    info!(image_id = ?image_id, "Running built-in package check");
    run_package_check(result_file).await?;
    Ok(())
}
