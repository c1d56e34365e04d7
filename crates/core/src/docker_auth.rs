//! Docker-style registry auth documents (`{"auths": {...}}`).
//!
//! Merging never clobbers what the caller already provided: registries present
//! in the existing document are skipped, only new registries are added.

use crate::credentials::UsernamePassword;
use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Registry host aliases the image puller only recognizes under another key.
const REGISTRY_KEY_ALIASES: &[(&str, &str)] = &[("index.docker.io", "https://index.docker.io/v1/")];

/// One registry entry in an auth document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEntry {
    /// `base64(username:password)`
    pub auth: String,
}

impl AuthEntry {
    /// Encode a username/password pair.
    #[must_use]
    pub fn from_credentials(credentials: &UsernamePassword) -> Self {
        let plain = format!(
            "{}:{}",
            credentials.username,
            credentials.expose_password()
        );
        Self {
            auth: STANDARD.encode(plain),
        }
    }

    /// Decode the entry back into a username/password pair.
    ///
    /// Returns `None` unless the field is base64 of `username:password`.
    #[must_use]
    pub fn decode(&self) -> Option<UsernamePassword> {
        let raw = STANDARD.decode(&self.auth).ok()?;
        let plain = String::from_utf8(raw).ok()?;
        let (username, password) = plain.split_once(':')?;
        Some(UsernamePassword::new(username, password))
    }
}

/// A multi-registry auth document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthDocument {
    /// Entries keyed by registry
    #[serde(default)]
    pub auths: BTreeMap<String, AuthEntry>,
}

/// Map a registry host to the key the image puller expects.
#[must_use]
pub fn canonical_registry_key(registry: &str) -> &str {
    REGISTRY_KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == registry)
        .map_or(registry, |(_, canonical)| *canonical)
}

impl AuthDocument {
    /// Parse a JSON auth document; `origin` names the source in errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAuthDocument`] for invalid JSON.
    pub fn parse(raw: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|source| Error::InvalidAuthDocument {
            origin: origin.to_string(),
            source,
        })
    }

    /// Interpret an inherited auth variable value.
    ///
    /// CI engines hand the variable over either inline or as a path to a file
    /// holding the document; an existing file wins.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or the JSON is invalid.
    pub fn from_env_value(value: &str) -> Result<Self> {
        let path = Path::new(value);
        if path.is_file() {
            let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            return Self::parse(&raw, &format!("file '{value}'"));
        }
        Self::parse(value, "inline auth variable")
    }

    /// Add a registry entry unless the (canonical) key already exists.
    ///
    /// Returns `true` when the entry was inserted.
    pub fn insert_if_absent(&mut self, registry: &str, credentials: &UsernamePassword) -> bool {
        let key = canonical_registry_key(registry);
        if self.auths.contains_key(key) {
            info!(registry = key, "Auth already present, not overwriting");
            return false;
        }
        debug!(registry = key, "Adding registry auth");
        self.auths
            .insert(key.to_string(), AuthEntry::from_credentials(credentials));
        true
    }

    /// Username/password stored for `registry`, looked up under its
    /// canonical key.
    #[must_use]
    pub fn credentials_for(&self, registry: &str) -> Option<UsernamePassword> {
        self.auths
            .get(canonical_registry_key(registry))
            .and_then(AuthEntry::decode)
    }

    /// Merge the entries of another document without overwriting.
    pub fn merge_document(&mut self, other: &Self) {
        for (registry, entry) in &other.auths {
            if self.auths.contains_key(registry) {
                info!(%registry, "Auth already present, not overwriting");
                continue;
            }
            self.auths.insert(registry.clone(), entry.clone());
        }
    }

    /// Render the document as compact JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        // A map of plain strings always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Compose an auth document from resolved credentials on top of an
/// existing one.
///
/// Existing entries are never overwritten, so merging twice with the same
/// inputs yields the same document.
#[must_use]
pub fn merge(
    existing: Option<AuthDocument>,
    entries: &BTreeMap<String, UsernamePassword>,
) -> AuthDocument {
    let mut document = existing.unwrap_or_default();
    for (registry, credentials) in entries {
        document.insert_if_absent(registry, credentials);
    }
    document
}
