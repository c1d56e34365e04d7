//! In-image update check verdicts.

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Verdict written by an in-image update check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateCheckResult {
    /// Packages would change, the image should be rebuilt
    UpgradeNeeded,
    /// Nothing to upgrade
    NoUpgradeNeeded,
}

impl UpdateCheckResult {
    const UPGRADE_NEEDED: &'static str = "UPGRADE_NEEDED";
    const NO_UPGRADE_NEEDED: &'static str = "NO_UPGRADE_NEEDED";

    /// Marker written to the result file.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpgradeNeeded => Self::UPGRADE_NEEDED,
            Self::NoUpgradeNeeded => Self::NO_UPGRADE_NEEDED,
        }
    }

    /// Whether this verdict asks for a rebuild.
    #[must_use]
    pub const fn needs_upgrade(self) -> bool {
        matches!(self, Self::UpgradeNeeded)
    }

    /// Parse result file content; trailing whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUpdateCheckResult`] for anything else.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        match content.trim_end() {
            Self::UPGRADE_NEEDED => Ok(Self::UpgradeNeeded),
            Self::NO_UPGRADE_NEEDED => Ok(Self::NoUpgradeNeeded),
            _ => Err(Error::InvalidUpdateCheckResult {
                path: path.to_path_buf(),
                content: content.to_string(),
            }),
        }
    }

    /// Read and parse a result file.
    ///
    /// # Errors
    ///
    /// Fails when the file is missing or holds no valid verdict.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let result = Self::parse(&content, path)?;
        debug!(path = %path.display(), result = %result, "Read update check result");
        Ok(result)
    }

    /// Write the verdict followed by a newline.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written.
    pub fn write(self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, format!("{}\n", self.as_str())).map_err(|e| Error::io(path, e))
    }
}

impl fmt::Display for UpdateCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
