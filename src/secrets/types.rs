//! Wire types for the secret extension protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Repository the secret is requested for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    /// `owner/name`
    #[serde(default)]
    pub slug: String,
}

/// Secret lookup sent by the CI server.
///
/// Only the fields the relay needs are modelled; the rest of the payload
/// (build metadata, the remaining repo fields) is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub repo: Repo,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("secret name is empty")]
    EmptyName,

    #[error("repository slug is empty")]
    EmptySlug,

    #[error("repository slug is not a safe path: {0}")]
    UnsafeSlug(String),
}

impl SecretRequest {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repo: Repo { slug: slug.into() },
        }
    }

    /// Check the request before its slug is substituted into a store path.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        validate_slug(&self.repo.slug)
    }
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() {
        return Err(ValidationError::EmptySlug);
    }
    if let Some(c) = slug
        .chars()
        .find(|&c| matches!(c, '?' | '#' | '%' | '\\') || c.is_whitespace() || c.is_control())
    {
        return Err(ValidationError::UnsafeSlug(format!("contains {:?}", c)));
    }
    if slug
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(ValidationError::UnsafeSlug(
            "empty or relative path segment".to_string(),
        ));
    }
    Ok(())
}

/// Secret returned to the CI server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub data: String,
    /// Expose to pull requests. Always false.
    pub pull: bool,
    /// Expose to forks. Always false.
    pub fork: bool,
}

impl Secret {
    pub fn new(name: impl Into<String>, value: &SecretValue) -> Self {
        Self {
            name: name.into(),
            data: value.encode(),
            pull: false,
            fork: false,
        }
    }
}

/// A value found under the requested key of a KV entry.
#[derive(Debug, Clone, PartialEq)]
pub enum SecretValue {
    /// Plain string, returned verbatim
    Scalar(String),
    /// Any other JSON, returned as compact JSON
    Structured(Value),
    /// The key does not exist, returned as `null`
    Absent,
}

impl SecretValue {
    pub fn from_entry(entry: Option<&Value>) -> Self {
        match entry {
            Some(Value::String(s)) => SecretValue::Scalar(s.clone()),
            Some(other) => SecretValue::Structured(other.clone()),
            None => SecretValue::Absent,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            SecretValue::Scalar(s) => s.clone(),
            SecretValue::Structured(v) => v.to_string(),
            SecretValue::Absent => Value::Null.to_string(),
        }
    }
}
