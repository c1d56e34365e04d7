//! Image build pipelines for imagerail.
//!
//! [`ImageBuildGenerator`] turns the configured images into a GitLab child
//! pipeline that builds each image with kaniko into its staging location,
//! optionally tests the staging image and copies it to every release location
//! with skopeo. The helpers in [`auth`] and [`staging_test`] are what the
//! generated jobs call back into.

#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod generator;
pub mod images;
pub mod script;
pub mod selection;

pub use auth::{
    generate_image_auth, locations_auth_config, pipeline_auth_config, write_auth_file,
};
pub use error::{Error, Result};
pub use generator::{BuildPipelineOptions, GenerationMode, ImageBuildGenerator, tool_job};
pub use images::WellKnownImages;
pub use script::{ScriptArg, ScriptLine};
pub use selection::RebuildSelection;
pub use staging_test::run_staging_image_test;
