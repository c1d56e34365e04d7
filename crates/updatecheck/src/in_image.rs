//! Update check running inside a published image.

use crate::error::{Error, Result};
use crate::locations::{CheckTarget, result_file_name};
use crate::result::UpdateCheckResult;
use imagerail_core::Config;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Environment variable telling the update check command where to write its
/// verdict.
pub const RESULT_FILE_VARIABLE: &str = "IMAGERAIL_RESULT_FILE";

/// Run the update check command of `image_id` for one checked location.
///
/// The command receives the image id as last argument and the result file
/// path in [`RESULT_FILE_VARIABLE`]. It is executed directly, without a
/// shell. The returned verdict was read back from the result file.
///
/// # Errors
///
/// Fails for unknown images or location indices, images without update check
/// command, commands that cannot be started or exit unsuccessfully, and
/// result files without a valid verdict.
pub async fn run_update_check(
    config: &Config,
    image_id: &str,
    location_index: usize,
    results_dir: &Path,
    target: CheckTarget,
) -> Result<UpdateCheckResult> {
    let image = config.image(image_id)?;
    let locations = target.locations(image);
    let location = locations
        .get(location_index)
        .ok_or_else(|| Error::UnknownLocation {
            image: image_id.to_string(),
            index: location_index,
        })?;
    let Some((program, args)) = image.update_check_command.split_first() else {
        return Err(Error::NoUpdateCheckCommand {
            image: image_id.to_string(),
        });
    };

    let result_file: PathBuf = results_dir.join(result_file_name(image_id, location_index));
    info!(
        image_id,
        location = %location.coordinates(),
        result_file = %result_file.display(),
        "Running in-image update check"
    );
    debug!(program = %program, args = ?args, "Update check command");

    let status = Command::new(program)
        .args(args)
        .arg(image_id)
        .env(RESULT_FILE_VARIABLE, &result_file)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|source| Error::Spawn {
            program: program.clone(),
            source,
        })?;

    if !status.success() {
        return Err(Error::CommandFailed {
            command: image.update_check_command.join(" "),
            code: status.code(),
        });
    }

    let result = UpdateCheckResult::read(&result_file)?;
    info!(image_id, %result, "Update check finished");
    Ok(result)
}
