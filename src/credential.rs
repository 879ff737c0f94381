//! API credential resolution.
//!
//! A [`CredentialResolver`] walks an ordered list of [`CredentialSource`]s and
//! returns the first non-empty value.  A source that fails (missing file, bad
//! TOML, unset variable with invalid unicode) is skipped rather than treated as
//! fatal; absence of a credential is a normal outcome the page knows how to
//! present.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the key looked up in every source.
pub const API_KEY_NAME: &str = "OPENAI_API_KEY";

/// Default location of the secrets file, relative to the working directory.
pub const DEFAULT_SECRETS_PATH: &str = ".matrix-chat/secrets.toml";

/// An opaque API key.
///
/// The value is never printed by `Debug` so that it stays out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw key.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw key, for placing in request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<redacted>)")
    }
}

/// A place an API key might be stored.
pub trait CredentialSource: Send + Sync {
    /// Short human-readable name used in logs.
    fn name(&self) -> &str;

    /// Look up `key`.
    ///
    /// `Ok(None)` means the source is reachable but has no value for the key.
    /// `Err` means the source itself could not be consulted.
    fn lookup(&self, key: &str) -> Result<Option<String>>;
}

/// A TOML secrets file with top-level string keys.
#[derive(Debug, Clone)]
pub struct SecretsFile {
    path: PathBuf,
}

impl SecretsFile {
    /// Read secrets from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this source reads.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialSource for SecretsFile {
    fn name(&self) -> &str {
        "secrets file"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>> {
        let contents = fs::read_to_string(&self.path).map_err(|err| {
            Error::credential(
                self.name(),
                format!("cannot read {}: {}", self.path.display(), err),
            )
        })?;
        let table: toml::Table = contents.parse().map_err(|err: toml::de::Error| {
            Error::credential(
                self.name(),
                format!("cannot parse {}: {}", self.path.display(), err.message()),
            )
        })?;
        match table.get(key) {
            None => Ok(None),
            Some(toml::Value::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(Error::credential(
                self.name(),
                format!("{key} is a {}, not a string", other.type_str()),
            )),
        }
    }
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Environment;

impl CredentialSource for Environment {
    fn name(&self) -> &str {
        "environment"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>> {
        match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => Err(Error::credential(
                self.name(),
                format!("{key} is not valid unicode"),
            )),
        }
    }
}

/// Resolves the API key from an ordered chain of sources.
pub struct CredentialResolver {
    key: String,
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialResolver {
    /// A resolver for `key` with no sources.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            sources: Vec::new(),
        }
    }

    /// The standard chain: the secrets file at `secrets_path`, then the
    /// environment, both for [`API_KEY_NAME`].
    pub fn standard(secrets_path: impl Into<PathBuf>) -> Self {
        Self::new(API_KEY_NAME)
            .with_source(SecretsFile::new(secrets_path))
            .with_source(Environment)
    }

    /// Append a source; earlier sources take precedence.
    pub fn with_source(mut self, source: impl CredentialSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// The key this resolver looks up.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Return the first non-empty credential, or `None` if no source has one.
    pub fn resolve(&self) -> Option<Credential> {
        for source in &self.sources {
            match source.lookup(&self.key) {
                Ok(Some(value)) if !value.trim().is_empty() => {
                    tracing::debug!(source = source.name(), "resolved API credential");
                    return Some(Credential::new(value.trim()));
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(source = source.name(), error = %err, "skipping credential source");
                }
            }
        }
        None
    }
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("CredentialResolver")
            .field("key", &self.key)
            .field("sources", &names)
            .finish()
    }
}
