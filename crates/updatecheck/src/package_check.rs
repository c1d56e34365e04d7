//! Built-in update check based on the image's package manager.
//!
//! The installed package list is captured, all packages are upgraded, and the
//! list is captured again. Any difference means the image would change on a
//! rebuild.

use crate::error::{Error, Result};
use crate::result::UpdateCheckResult;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Package manager families the built-in check supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// Alpine `apk`
    Apk,
    /// RPM based distributions with `yum`
    Yum,
    /// RPM based distributions with `microdnf` only
    Microdnf,
    /// Debian based distributions with `apt-get`
    Apt,
}

impl PackageManager {
    /// Detect the package manager from release marker files below `root`.
    ///
    /// `has_program` reports whether an executable is available on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoPackageManager`] when no marker file matches or the
    /// matching package manager is not installed.
    pub fn detect(root: &Path, has_program: impl Fn(&str) -> bool) -> Result<Self> {
        let missing = |reason: &str| Error::NoPackageManager {
            reason: reason.to_string(),
        };

        if root.join("etc/alpine-release").exists() {
            debug!("Found /etc/alpine-release");
            return if has_program("apk") {
                Ok(Self::Apk)
            } else {
                Err(missing("/etc/alpine-release exists but apk is not installed"))
            };
        }
        if root.join("etc/redhat-release").exists() {
            debug!("Found /etc/redhat-release");
            return if has_program("yum") {
                Ok(Self::Yum)
            } else if has_program("microdnf") {
                Ok(Self::Microdnf)
            } else {
                Err(missing(
                    "/etc/redhat-release exists but neither yum nor microdnf is installed",
                ))
            };
        }
        if root.join("etc/debian_version").exists() {
            debug!("Found /etc/debian_version");
            return if has_program("apt-get") {
                Ok(Self::Apt)
            } else {
                Err(missing("/etc/debian_version exists but apt-get is not installed"))
            };
        }
        Err(missing(
            "none of /etc/alpine-release, /etc/redhat-release, /etc/debian_version exists",
        ))
    }

    /// Detect the package manager of the running system.
    ///
    /// # Errors
    ///
    /// See [`PackageManager::detect`].
    pub fn detect_host() -> Result<Self> {
        Self::detect(Path::new("/"), |program| which::which(program).is_ok())
    }

    /// Command printing the installed packages.
    #[must_use]
    pub const fn list_command(self) -> &'static [&'static str] {
        match self {
            Self::Apk => &["apk", "info", "-v"],
            Self::Yum | Self::Microdnf => &["rpm", "-qa"],
            Self::Apt => &["dpkg", "-l"],
        }
    }

    /// Commands upgrading all packages, run in order.
    #[must_use]
    pub const fn upgrade_commands(self) -> &'static [&'static [&'static str]] {
        match self {
            Self::Apk => &[&["apk", "upgrade"]],
            Self::Yum => &[&["yum", "-y", "upgrade"]],
            Self::Microdnf => &[&["microdnf", "-y", "upgrade"]],
            Self::Apt => &[&["apt-get", "update"], &["apt-get", "-y", "dist-upgrade"]],
        }
    }
}

/// Compare two package listings regardless of line order.
#[must_use]
pub fn package_lists_differ(before: &str, after: &str) -> bool {
    fn sorted(listing: &str) -> Vec<&str> {
        let mut lines: Vec<&str> = listing.lines().collect();
        lines.sort_unstable();
        lines
    }
    sorted(before) != sorted(after)
}

/// Run the built-in package check and write the verdict to `result_file`.
///
/// # Errors
///
/// Fails when no supported package manager is found or any package command
/// fails.
pub async fn run_package_check(result_file: &Path) -> Result<UpdateCheckResult> {
    let manager = PackageManager::detect_host()?;
    info!(?manager, "Detected package manager");

    let before = capture(manager.list_command()).await?;
    for command in manager.upgrade_commands() {
        run(command).await?;
    }
    let after = capture(manager.list_command()).await?;

    let result = if package_lists_differ(&before, &after) {
        UpdateCheckResult::UpgradeNeeded
    } else {
        UpdateCheckResult::NoUpgradeNeeded
    };
    info!(%result, result_file = %result_file.display(), "Package check finished");
    result.write(result_file)?;
    Ok(result)
}

fn command(argv: &[&str]) -> Result<Command> {
    let (program, args) = argv.split_first().ok_or_else(|| Error::NoPackageManager {
        reason: "empty package command".to_string(),
    })?;
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null()).stderr(Stdio::inherit());
    Ok(command)
}

fn spawn_error(argv: &[&str], source: std::io::Error) -> Error {
    Error::Spawn {
        program: argv.first().copied().unwrap_or_default().to_string(),
        source,
    }
}

async fn capture(argv: &[&str]) -> Result<String> {
    debug!(command = %argv.join(" "), "Listing packages");
    let output = command(argv)?
        .stdout(Stdio::piped())
        .output()
        .await
        .map_err(|e| spawn_error(argv, e))?;
    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: argv.join(" "),
            code: output.status.code(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

async fn run(argv: &[&str]) -> Result<()> {
    info!(command = %argv.join(" "), "Upgrading packages");
    let status = command(argv)?
        .stdout(Stdio::inherit())
        .status()
        .await
        .map_err(|e| spawn_error(argv, e))?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::CommandFailed {
            command: argv.join(" "),
            code: status.code(),
        })
    }
}
