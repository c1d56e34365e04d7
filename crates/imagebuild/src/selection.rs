//! Rebuild selection artifact (`{"image-id": true, ...}`).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Per-image rebuild decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RebuildSelection(BTreeMap<String, bool>);

impl RebuildSelection {
    /// Create an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the decision for one image.
    pub fn set(&mut self, image_id: impl Into<String>, rebuild: bool) {
        self.0.insert(image_id.into(), rebuild);
    }

    /// Decision for one image, `None` if it was not evaluated.
    #[must_use]
    pub fn get(&self, image_id: &str) -> Option<bool> {
        self.0.get(image_id).copied()
    }

    /// Ids marked for rebuild, sorted.
    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, rebuild)| **rebuild)
            .map(|(id, _)| id.as_str())
    }

    /// Whether any image needs a rebuild.
    #[must_use]
    pub fn any_selected(&self) -> bool {
        self.0.values().any(|rebuild| *rebuild)
    }

    /// All decisions.
    #[must_use]
    pub const fn decisions(&self) -> &BTreeMap<String, bool> {
        &self.0
    }

    /// Read a selection file.
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable or not a JSON object of booleans.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let selection: Self =
            serde_json::from_str(&raw).map_err(|source| Error::InvalidSelection {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            selected = selection.selected().count(),
            total = selection.0.len(),
            "Loaded rebuild selection"
        );
        Ok(selection)
    }

    /// Write the selection as JSON.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| Error::InvalidSelection {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|e| Error::io(path, e))?;
        debug!(path = %path.display(), "Wrote rebuild selection");
        Ok(())
    }
}

impl FromIterator<(String, bool)> for RebuildSelection {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
