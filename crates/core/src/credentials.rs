//! Registry credentials and their resolution from the process environment.
//!
//! A credential is configured in one of three shapes:
//!
//! | Shape | Resolved by |
//! |-------|-------------|
//! | `usernameVarName` + `passwordVarName` | [`CredentialResolver::resolve`] |
//! | `authEnvVar` | [`CredentialResolver::resolve_auth_document`] |
//! | `authFile` | [`CredentialResolver::resolve_auth_document`] |
//!
//! Only the username/password shape ever yields a [`UsernamePassword`]; the
//! other two are preformatted auth documents and are merged at document level.

use crate::docker_auth::AuthDocument;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// A configured registry credential.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCredential")]
pub enum RegistryCredential {
    /// Username and password read from two environment variables
    EnvPair {
        /// Variable holding the username
        username_var: String,
        /// Variable holding the password
        password_var: String,
    },
    /// Variable holding a complete docker auth document
    AuthEnvVar(String),
    /// File holding a complete docker auth document
    AuthFile(PathBuf),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawCredential {
    username_var_name: Option<String>,
    password_var_name: Option<String>,
    auth_env_var: Option<String>,
    auth_file: Option<PathBuf>,
}

impl TryFrom<RawCredential> for RegistryCredential {
    type Error = Error;

    fn try_from(raw: RawCredential) -> Result<Self> {
        let ambiguous = |reason: &str| Error::AmbiguousCredential {
            reason: reason.to_string(),
        };

        match (
            raw.username_var_name,
            raw.password_var_name,
            raw.auth_env_var,
            raw.auth_file,
        ) {
            (Some(username_var), Some(password_var), None, None) => Ok(Self::EnvPair {
                username_var,
                password_var,
            }),
            (None, None, Some(var), None) => Ok(Self::AuthEnvVar(var)),
            (None, None, None, Some(path)) => Ok(Self::AuthFile(path)),
            (Some(_), None, None, None) => Err(ambiguous("passwordVarName is missing")),
            (None, Some(_), None, None) => Err(ambiguous("usernameVarName is missing")),
            (None, None, None, None) => Err(ambiguous("no shape defined")),
            _ => Err(ambiguous("several shapes defined")),
        }
    }
}

/// A resolved username/password pair.
#[derive(Clone)]
pub struct UsernamePassword {
    /// Registry user
    pub username: String,
    /// Registry password or token
    pub password: SecretString,
}

impl UsernamePassword {
    /// Create a pair from plain values.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Expose the password for writing it into an auth document or command.
    #[must_use]
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl fmt::Debug for UsernamePassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsernamePassword")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Resolves credential ids against a configured credential map.
#[derive(Debug, Clone, Copy)]
pub struct CredentialResolver<'a> {
    credentials: &'a BTreeMap<String, RegistryCredential>,
}

impl<'a> CredentialResolver<'a> {
    /// Create a resolver over the configured credentials.
    #[must_use]
    pub const fn new(credentials: &'a BTreeMap<String, RegistryCredential>) -> Self {
        Self { credentials }
    }

    fn lookup(&self, id: &str) -> Result<&'a RegistryCredential> {
        self.credentials
            .get(id)
            .ok_or_else(|| Error::UnknownCredential { id: id.to_string() })
    }

    /// Resolve a credential id to a username/password pair.
    ///
    /// Returns `Ok(None)` for credentials configured as raw auth documents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCredential`] for unconfigured ids and
    /// [`Error::MissingEnvironmentVariable`] when a referenced variable is unset.
    pub fn resolve(&self, id: &str) -> Result<Option<UsernamePassword>> {
        match self.lookup(id)? {
            RegistryCredential::EnvPair {
                username_var,
                password_var,
            } => {
                let username = read_var(username_var, "username", id)?;
                let password = read_var(password_var, "password", id)?;
                debug!(credential = id, "Resolved username/password credential");
                Ok(Some(UsernamePassword {
                    username,
                    password: SecretString::from(password),
                }))
            }
            RegistryCredential::AuthEnvVar(_) | RegistryCredential::AuthFile(_) => Ok(None),
        }
    }

    /// Resolve a credential id to a preformatted auth document.
    ///
    /// Returns `Ok(None)` for username/password credentials.
    ///
    /// # Errors
    ///
    /// Fails when the id is unknown, the variable is unset, the file cannot be
    /// read, or the content is not a valid auth document.
    pub fn resolve_auth_document(&self, id: &str) -> Result<Option<AuthDocument>> {
        match self.lookup(id)? {
            RegistryCredential::EnvPair { .. } => Ok(None),
            RegistryCredential::AuthEnvVar(var) => {
                let raw = read_var(var, "auth document", id)?;
                AuthDocument::parse(&raw, &format!("environment variable '{var}'")).map(Some)
            }
            RegistryCredential::AuthFile(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
                AuthDocument::parse(&raw, &format!("file '{}'", path.display())).map(Some)
            }
        }
    }
}

fn read_var(variable: &str, purpose: &'static str, credential: &str) -> Result<String> {
    std::env::var(variable).map_err(|_| Error::MissingEnvironmentVariable {
        variable: variable.to_string(),
        purpose,
        credential: credential.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> BTreeMap<String, RegistryCredential> {
        BTreeMap::from([
            (
                "staging".to_string(),
                RegistryCredential::EnvPair {
                    username_var: "TEST_CRED_STAGING_USER".to_string(),
                    password_var: "TEST_CRED_STAGING_PASS".to_string(),
                },
            ),
            (
                "raw".to_string(),
                RegistryCredential::AuthEnvVar("TEST_CRED_RAW_AUTH".to_string()),
            ),
        ])
    }

    #[test]
    fn test_resolve_env_pair() {
        temp_env::with_vars(
            [
                ("TEST_CRED_STAGING_USER", Some("builder")),
                ("TEST_CRED_STAGING_PASS", Some("s3cr3t")),
            ],
            || {
                let creds = credentials();
                let resolved = CredentialResolver::new(&creds)
                    .resolve("staging")
                    .unwrap()
                    .unwrap();
                assert_eq!(resolved.username, "builder");
                assert_eq!(resolved.expose_password(), "s3cr3t");
            },
        );
    }

    #[test]
    fn test_missing_password_variable() {
        temp_env::with_vars(
            [
                ("TEST_CRED_STAGING_USER", Some("builder")),
                ("TEST_CRED_STAGING_PASS", None::<&str>),
            ],
            || {
                let creds = credentials();
                let err = CredentialResolver::new(&creds)
                    .resolve("staging")
                    .unwrap_err();
                assert!(matches!(
                    err,
                    Error::MissingEnvironmentVariable { ref variable, purpose: "password", .. }
                        if variable == "TEST_CRED_STAGING_PASS"
                ));
            },
        );
    }

    #[test]
    fn test_unknown_credential() {
        let creds = credentials();
        let err = CredentialResolver::new(&creds).resolve("nope").unwrap_err();
        assert!(matches!(err, Error::UnknownCredential { ref id } if id == "nope"));
    }

    #[test]
    fn test_raw_document_credential_has_no_username_password() {
        let creds = credentials();
        let resolved = CredentialResolver::new(&creds).resolve("raw").unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn test_resolve_auth_document_from_env() {
        temp_env::with_var(
            "TEST_CRED_RAW_AUTH",
            Some(r#"{"auths":{"quay.io":{"auth":"dXNlcjpwYXNz"}}}"#),
            || {
                let creds = credentials();
                let doc = CredentialResolver::new(&creds)
                    .resolve_auth_document("raw")
                    .unwrap()
                    .unwrap();
                assert_eq!(doc.auths["quay.io"].auth, "dXNlcjpwYXNz");
            },
        );
    }

    #[test]
    fn test_resolve_auth_document_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.json");
        std::fs::write(&path, r#"{"auths":{"ghcr.io":{"auth":"Zm9vOmJhcg=="}}}"#).unwrap();
        let creds = BTreeMap::from([("file".to_string(), RegistryCredential::AuthFile(path))]);

        let doc = CredentialResolver::new(&creds)
            .resolve_auth_document("file")
            .unwrap()
            .unwrap();
        assert!(doc.auths.contains_key("ghcr.io"));
    }

    #[test]
    fn test_deserialize_shapes() {
        let pair: RegistryCredential =
            serde_yaml::from_str("usernameVarName: U\npasswordVarName: P\n").unwrap();
        assert_eq!(
            pair,
            RegistryCredential::EnvPair {
                username_var: "U".to_string(),
                password_var: "P".to_string()
            }
        );

        let file: RegistryCredential = serde_yaml::from_str("authFile: /tmp/auth.json\n").unwrap();
        assert_eq!(file, RegistryCredential::AuthFile(PathBuf::from("/tmp/auth.json")));

        let both = serde_yaml::from_str::<RegistryCredential>("authEnvVar: A\nauthFile: /x\n");
        assert!(both.is_err());

        let half = serde_yaml::from_str::<RegistryCredential>("usernameVarName: U\n");
        assert!(half.is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let up = UsernamePassword::new("user", "hunter2");
        let rendered = format!("{up:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
