//! Update checks and rebuild decisions for imagerail.
//!
//! A scheduled pipeline generated by [`UpdateCheckGenerator`] decides which
//! images need a rebuild:
//!
//! - [`LayerChecker`] compares the layers of every published image against
//!   its base image through a [`RegistryInspector`]
//! - [`run_update_check`] runs an image's update check command inside the
//!   published image, [`run_package_check`] being the built-in one
//! - [`evaluate`] combines both into a [`RebuildSelection`] and the child
//!   build pipeline
//!
//! [`RebuildSelection`]: imagerail_imagebuild::RebuildSelection

#![warn(missing_docs)]

pub mod aggregate;
pub mod divergence;
pub mod error;
pub mod evaluate;
pub mod in_image;
pub mod inspector;
pub mod locations;
pub mod package_check;
pub mod pipeline;
pub mod result;

pub use aggregate::aggregate;
pub use divergence::{DivergenceReport, LayerCheckOptions, LayerChecker, layers_diverge};
pub use error::{Error, Result};
pub use evaluate::{EvaluateRequest, evaluate};
pub use in_image::{RESULT_FILE_VARIABLE, run_update_check};
pub use inspector::{OciRegistryInspector, RegistryInspector};
pub use locations::{CheckTarget, result_file_name};
pub use package_check::{PackageManager, run_package_check};
pub use pipeline::{UpdateCheckGenerator, UpdateCheckOptions};
pub use result::UpdateCheckResult;
