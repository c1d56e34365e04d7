//! Which locations of an image are checked.

use imagerail_core::{ImageConfig, ImageLocation};
use std::fmt;
use std::str::FromStr;

/// Locations an update check looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CheckTarget {
    /// Every release location
    #[default]
    Release,
    /// The staging location only
    Staging,
}

impl CheckTarget {
    /// The image's locations checked for this target, in configuration order.
    #[must_use]
    pub fn locations(self, image: &ImageConfig) -> Vec<&ImageLocation> {
        match self {
            Self::Release => image.release_locations.iter().collect(),
            Self::Staging => vec![&image.staging_location],
        }
    }
}

impl fmt::Display for CheckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Release => "release",
            Self::Staging => "staging",
        })
    }
}

impl FromStr for CheckTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(Self::Release),
            "staging" => Ok(Self::Staging),
            other => Err(format!("unknown check target '{other}', expected release or staging")),
        }
    }
}

/// Name of the result file for one checked location.
#[must_use]
pub fn result_file_name(image_id: &str, location_index: usize) -> String {
    format!("imagerail-update-check-{image_id}-location-{location_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_file_name() {
        assert_eq!(
            result_file_name("alpine-base", 2),
            "imagerail-update-check-alpine-base-location-2"
        );
    }

    #[test]
    fn test_parse_target() {
        assert_eq!("staging".parse::<CheckTarget>(), Ok(CheckTarget::Staging));
        assert_eq!(CheckTarget::Release.to_string(), "release");
        assert!("prod".parse::<CheckTarget>().is_err());
    }
}
