//! Container image coordinates (`registry/repository:tag`).

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Tag used when a coordinate string carries none.
pub const DEFAULT_TAG: &str = "latest";

/// A fully qualified container image reference.
///
/// The registry is everything before the first `/`, so ports stay part of the
/// registry (`docker.io:443/foobar:foobar` has registry `docker.io:443`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageCoordinates {
    /// Registry host (with optional port)
    pub registry: String,
    /// Repository path inside the registry
    pub repository: String,
    /// Image tag
    pub tag: String,
}

impl ImageCoordinates {
    /// Create coordinates from their parts.
    #[must_use]
    pub fn new(
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// Parse `registry/repository[:tag]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCoordinate`] when no `/` is present.
    pub fn parse(input: &str) -> Result<Self> {
        let Some((registry, remaining)) = input.split_once('/') else {
            return Err(Error::MalformedCoordinate {
                input: input.to_string(),
            });
        };

        let (repository, tag) = remaining
            .split_once(':')
            .unwrap_or((remaining, DEFAULT_TAG));

        Ok(Self::new(registry, repository, tag))
    }
}

impl fmt::Display for ImageCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

impl FromStr for ImageCoordinates {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ImageCoordinates {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImageCoordinates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_without_tag_defaults_to_latest() {
        let coords = ImageCoordinates::parse("docker.io/foo/bar").unwrap();
        assert_eq!(coords.registry, "docker.io");
        assert_eq!(coords.repository, "foo/bar");
        assert_eq!(coords.tag, "latest");
    }

    #[test]
    fn test_parse_with_tag() {
        let coords = ImageCoordinates::parse("docker.io/foo/bar:v2").unwrap();
        assert_eq!(coords.repository, "foo/bar");
        assert_eq!(coords.tag, "v2");
    }

    #[test]
    fn test_registry_keeps_port() {
        let coords = ImageCoordinates::parse("docker.io:443/foobar:foobar").unwrap();
        assert_eq!(coords.registry, "docker.io:443");
        assert_eq!(coords.repository, "foobar");
        assert_eq!(coords.tag, "foobar");

        let untagged = ImageCoordinates::parse("docker.io:443/foobar").unwrap();
        assert_eq!(untagged.registry, "docker.io:443");
        assert_eq!(untagged.tag, "latest");
    }

    #[test]
    fn test_missing_registry_separator() {
        let err = ImageCoordinates::parse("foobar").unwrap_err();
        assert!(matches!(err, Error::MalformedCoordinate { ref input } if input == "foobar"));
        assert_eq!(
            err.to_string(),
            "didn't find / in container coordinates 'foobar' - cannot extract registry. Given coordinates must contain at least registry and repository"
        );
    }

    #[test]
    fn test_format_round_trip_with_port_and_nested_repository() {
        let raw = "registry.example.com:5000/team/app-test:ubi-non-root-de77d37";
        let coords: ImageCoordinates = raw.parse().unwrap();
        assert_eq!(coords.registry, "registry.example.com:5000");
        assert_eq!(coords.repository, "team/app-test");
        assert_eq!(coords.tag, "ubi-non-root-de77d37");
        assert_eq!(coords.to_string(), raw);
    }

    #[test]
    fn test_default_tag_is_emitted_on_format() {
        let coords = ImageCoordinates::parse("quay.io/skopeo/stable").unwrap();
        assert_eq!(coords.to_string(), "quay.io/skopeo/stable:latest");
        assert_eq!(ImageCoordinates::parse(&coords.to_string()).unwrap(), coords);
    }

    #[test]
    fn test_serde_uses_string_form() {
        let coords = ImageCoordinates::new("gcr.io", "kaniko-project/executor", "debug");
        let json = serde_json::to_string(&coords).unwrap();
        assert_eq!(json, "\"gcr.io/kaniko-project/executor:debug\"");
        let back: ImageCoordinates = serde_json::from_str(&json).unwrap();
        assert_eq!(back, coords);
    }

    proptest! {
        #[test]
        fn test_parse_format_round_trip(
            registry in "[a-z0-9.-]{1,20}(:[0-9]{2,5})?",
            repository in "[a-z0-9_-]{1,12}(/[a-z0-9_.-]{1,12}){0,2}",
            tag in "[A-Za-z0-9_.-]{1,20}",
        ) {
            let raw = format!("{registry}/{repository}:{tag}");
            let coords = ImageCoordinates::parse(&raw).unwrap();
            prop_assert_eq!(&coords.registry, &registry);
            prop_assert_eq!(&coords.repository, &repository);
            prop_assert_eq!(&coords.tag, &tag);
            prop_assert_eq!(coords.to_string(), raw);
        }
    }
}
