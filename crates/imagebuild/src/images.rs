//! Images and paths the generated jobs rely on.

use imagerail_core::ImageCoordinates;

/// Directory the tool job publishes the binary in.
pub const TOOL_DIR: &str = ".imagerail";

/// Path of the published binary, relative to the project directory.
pub const TOOL_BINARY: &str = "./.imagerail/imagerail";

/// Where kaniko reads registry credentials from.
pub const KANIKO_AUTH_FILE: &str = "/kaniko/.docker/config.json";

/// Container images used by generated jobs.
///
/// Passed to the generators explicitly so every invocation can point them at
/// mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellKnownImages {
    /// Image shipping the imagerail binary
    pub tool: ImageCoordinates,
    /// Kaniko executor (debug variant, it needs a shell)
    pub kaniko: ImageCoordinates,
    /// Skopeo for copying images between registries
    pub skopeo: ImageCoordinates,
}

impl Default for WellKnownImages {
    fn default() -> Self {
        Self {
            tool: ImageCoordinates::new("docker.io", "imagerail/imagerail", "latest"),
            kaniko: ImageCoordinates::new("gcr.io", "kaniko-project/executor", "v1.23.2-debug"),
            skopeo: ImageCoordinates::new("quay.io", "skopeo/stable", "v1.16"),
        }
    }
}

impl WellKnownImages {
    /// Replace the tool image.
    #[must_use]
    pub fn with_tool(mut self, tool: ImageCoordinates) -> Self {
        self.tool = tool;
        self
    }
}
