//! CI environment captured once per invocation.

use crate::docker_auth::AuthDocument;
use crate::Result;
use tracing::debug;

/// Variable holding the runner's inherited registry auth document.
pub const DOCKER_AUTH_CONFIG: &str = "DOCKER_AUTH_CONFIG";

/// Which pipeline the current invocation should emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Build (and possibly release) images
    ImageBuild,
    /// Check published images for pending updates
    UpdateCheck,
}

/// Snapshot of the CI variables the generators depend on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentContext {
    /// `CI_PIPELINE_SOURCE` (`push`, `schedule`, `web`, ...)
    pub pipeline_source: Option<String>,
    /// `CI_DEFAULT_BRANCH`
    pub default_branch: Option<String>,
    /// `CI_COMMIT_BRANCH`, unset for tag and merge request pipelines
    pub current_branch: Option<String>,
    /// `CI_COMMIT_SHA`
    pub commit_sha: Option<String>,
    /// Raw `DOCKER_AUTH_CONFIG` value, inline JSON or a file path
    pub inherited_auth: Option<String>,
}

impl EnvironmentContext {
    /// Capture the context from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        let context = Self {
            pipeline_source: var("CI_PIPELINE_SOURCE"),
            default_branch: var("CI_DEFAULT_BRANCH"),
            current_branch: var("CI_COMMIT_BRANCH"),
            commit_sha: var("CI_COMMIT_SHA"),
            inherited_auth: var(DOCKER_AUTH_CONFIG),
        };
        debug!(
            pipeline_source = ?context.pipeline_source,
            branch = ?context.current_branch,
            "Captured CI environment"
        );
        context
    }

    /// Scheduled pipelines run update checks, everything else builds.
    #[must_use]
    pub fn pipeline_kind(&self) -> PipelineKind {
        if self.pipeline_source.as_deref() == Some("schedule") {
            PipelineKind::UpdateCheck
        } else {
            PipelineKind::ImageBuild
        }
    }

    /// Whether the pipeline runs for the default branch.
    #[must_use]
    pub fn is_default_branch(&self) -> bool {
        matches!(
            (&self.current_branch, &self.default_branch),
            (Some(current), Some(default)) if current == default
        )
    }

    /// Parse the inherited auth document, if any.
    ///
    /// # Errors
    ///
    /// Fails when the variable points to an unreadable file or holds invalid
    /// JSON.
    pub fn inherited_auth_document(&self) -> Result<Option<AuthDocument>> {
        self.inherited_auth
            .as_deref()
            .map(AuthDocument::from_env_value)
            .transpose()
    }
}
