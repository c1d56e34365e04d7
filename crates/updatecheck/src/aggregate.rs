//! Rebuild decisions from layer divergence and in-image check results.

use crate::divergence::DivergenceReport;
use crate::error::Result;
use crate::locations::{CheckTarget, result_file_name};
use crate::result::UpdateCheckResult;
use imagerail_core::Config;
use imagerail_imagebuild::RebuildSelection;
use std::path::Path;
use tracing::{info, warn};

/// Decide which images need a rebuild.
///
/// An image is rebuilt when its base image layers diverged or when any of its
/// checked locations reported [`UpdateCheckResult::UpgradeNeeded`]. Result
/// files are read from `results_dir` and only exist for images with an
/// update check command.
///
/// # Errors
///
/// Fails when an expected result file is missing or invalid.
pub fn aggregate(
    config: &Config,
    divergence: &DivergenceReport,
    results_dir: &Path,
    target: CheckTarget,
) -> Result<RebuildSelection> {
    let mut selection = RebuildSelection::new();

    for image in config.images.values() {
        let diverged = divergence.get(&image.id).unwrap_or_else(|| {
            warn!(image_id = %image.id, "Image missing from layer check, assuming no divergence");
            false
        });

        let mut upgrade_needed = false;
        if image.has_update_check() {
            for index in 0..target.locations(image).len() {
                let path = results_dir.join(result_file_name(&image.id, index));
                let result = UpdateCheckResult::read(&path)?;
                info!(
                    image_id = %image.id,
                    location_index = index,
                    %result,
                    "In-image update check result"
                );
                upgrade_needed |= result.needs_upgrade();
            }
        }

        let rebuild = diverged || upgrade_needed;
        info!(image_id = %image.id, diverged, upgrade_needed, rebuild, "Rebuild decision");
        selection.set(image.id.clone(), rebuild);
    }

    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const CONFIG: &str = r"
defaults:
  containerFile: Containerfile
  stagingRegistry: staging.example.com
  releaseRegistry: registry.example.com
  baseImage: { registry: docker.io, repository: library/debian }
images:
  checked:
    updateCheckCommand: ['./check.sh']
    releaseLocations:
      - repository: team/checked
      - registry: quay.io
        repository: team/checked
  unchecked:
    releaseLocations:
      - repository: team/unchecked
";

    fn config() -> Config {
        Config::from_yaml(CONFIG, Some("0123456789")).unwrap()
    }

    fn write_result(dir: &Path, image: &str, index: usize, result: UpdateCheckResult) {
        result.write(dir.join(result_file_name(image, index))).unwrap();
    }

    #[test]
    fn test_nothing_to_do() {
        let dir = tempfile::tempdir().unwrap();
        write_result(dir.path(), "checked", 0, UpdateCheckResult::NoUpgradeNeeded);
        write_result(dir.path(), "checked", 1, UpdateCheckResult::NoUpgradeNeeded);
        let mut divergence = DivergenceReport::default();
        divergence.set("checked", false);
        divergence.set("unchecked", false);

        let selection =
            aggregate(&config(), &divergence, dir.path(), CheckTarget::Release).unwrap();
        assert_eq!(selection.get("checked"), Some(false));
        assert_eq!(selection.get("unchecked"), Some(false));
        assert!(!selection.any_selected());
    }

    #[test]
    fn test_single_location_upgrade_selects_image() {
        let dir = tempfile::tempdir().unwrap();
        write_result(dir.path(), "checked", 0, UpdateCheckResult::NoUpgradeNeeded);
        write_result(dir.path(), "checked", 1, UpdateCheckResult::UpgradeNeeded);

        let selection = aggregate(
            &config(),
            &DivergenceReport::default(),
            dir.path(),
            CheckTarget::Release,
        )
        .unwrap();
        assert_eq!(selection.selected().collect::<Vec<_>>(), ["checked"]);
    }

    #[test]
    fn test_divergence_selects_image_without_update_check() {
        let dir = tempfile::tempdir().unwrap();
        write_result(dir.path(), "checked", 0, UpdateCheckResult::NoUpgradeNeeded);
        write_result(dir.path(), "checked", 1, UpdateCheckResult::NoUpgradeNeeded);
        let mut divergence = DivergenceReport::default();
        divergence.set("unchecked", true);

        let selection =
            aggregate(&config(), &divergence, dir.path(), CheckTarget::Release).unwrap();
        assert_eq!(selection.selected().collect::<Vec<_>>(), ["unchecked"]);
    }

    #[test]
    fn test_staging_target_reads_one_location() {
        let dir = tempfile::tempdir().unwrap();
        write_result(dir.path(), "checked", 0, UpdateCheckResult::UpgradeNeeded);

        let selection = aggregate(
            &config(),
            &DivergenceReport::default(),
            dir.path(),
            CheckTarget::Staging,
        )
        .unwrap();
        assert_eq!(selection.get("checked"), Some(true));
    }

    #[test]
    fn test_missing_result_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_result(dir.path(), "checked", 0, UpdateCheckResult::NoUpgradeNeeded);

        let err = aggregate(
            &config(),
            &DivergenceReport::default(),
            dir.path(),
            CheckTarget::Release,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn test_invalid_result_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_result(dir.path(), "checked", 0, UpdateCheckResult::NoUpgradeNeeded);
        std::fs::write(dir.path().join(result_file_name("checked", 1)), "maybe\n").unwrap();

        let err = aggregate(
            &config(),
            &DivergenceReport::default(),
            dir.path(),
            CheckTarget::Release,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidUpdateCheckResult { .. }));
    }
}
