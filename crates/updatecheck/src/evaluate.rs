//! Evaluate job: rebuild selection plus the child build pipeline.

use crate::aggregate::aggregate;
use crate::divergence::DivergenceReport;
use crate::error::Result;
use crate::locations::CheckTarget;
use imagerail_core::{AuthDocument, Config};
use imagerail_imagebuild::{BuildPipelineOptions, ImageBuildGenerator, RebuildSelection};
use std::path::PathBuf;
use tracing::info;

/// Inputs and outputs of the evaluate job.
#[derive(Debug, Clone)]
pub struct EvaluateRequest {
    /// Layer check artifact to read
    pub divergence_file: PathBuf,
    /// Directory holding the in-image check result files
    pub results_dir: PathBuf,
    /// Where the rebuild selection is written
    pub selection_file: PathBuf,
    /// Where the child build pipeline is written
    pub pipeline_file: PathBuf,
    /// Locations that were checked
    pub target: CheckTarget,
    /// Settings of the child build pipeline
    pub build: BuildPipelineOptions,
}

/// Aggregate the check results, write the selection and the build pipeline
/// for the selected images.
///
/// # Errors
///
/// Fails when an artifact is missing or invalid, or the build pipeline
/// cannot be generated or written.
pub fn evaluate(
    config: &Config,
    request: &EvaluateRequest,
    inherited_auth: Option<AuthDocument>,
) -> Result<RebuildSelection> {
    let divergence = DivergenceReport::read(&request.divergence_file)?;
    let selection = aggregate(config, &divergence, &request.results_dir, request.target)?;
    selection.write(&request.selection_file)?;

    let selected: Vec<&str> = selection.selected().collect();
    info!(selected = ?selected, "Images selected for rebuild");

    ImageBuildGenerator::new(config, request.build.clone())
        .generate(&selected, inherited_auth)?
        .write_to_file(&request.pipeline_file)?;
    Ok(selection)
}
