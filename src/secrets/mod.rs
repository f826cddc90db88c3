//! Secret broker.
//!
//! Resolves a [`SecretRequest`] against Vault:
//!
//! ```text
//! SecretRequest ──► PathTemplate::render(slug)
//!                        │
//!                        ▼
//!        TokenExchanger::exchange()   (AppRole login, fresh per request)
//!                        │
//!                        ▼
//!        SecretReader::read(path)     (KV v2 read)
//!                        │
//!                        ▼
//!        data.data[name] ──► SecretValue ──► Secret
//! ```
//!
//! Only the KV v2 layout (`{"data": {"data": {...}}}`) is understood.

mod path;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::StoreConfig;
use crate::vault::{SecretReader, TokenExchanger, VaultClient, VaultError};

pub use path::{PathTemplate, PathTemplateError, PLACEHOLDER};
pub use types::*;

/// Errors raised while building a broker. These are startup failures.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Template(#[from] PathTemplateError),

    #[error("no {0} specified")]
    MissingField(&'static str),

    #[error("unable to create vault client: {0}")]
    Client(#[source] VaultError),
}

/// Errors raised while resolving a single request.
#[derive(Debug, Error)]
pub enum FindError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] ValidationError),

    #[error("unable to fetch token: {0}")]
    UpstreamAuth(#[source] VaultError),

    #[error("unable to fetch secret: {0}")]
    UpstreamRead(#[source] VaultError),

    #[error("only the versioned KV shape is supported")]
    UnsupportedStoreShape,
}

/// Capability the HTTP handler depends on.
#[async_trait]
pub trait SecretFinder: Send + Sync {
    async fn find(&self, request: &SecretRequest) -> Result<Secret, FindError>;
}

/// Shared finder type.
pub type SharedFinder = Arc<dyn SecretFinder>;

pub struct SecretBroker {
    template: PathTemplate,
    exchanger: Arc<dyn TokenExchanger>,
    reader: Arc<dyn SecretReader>,
}

impl SecretBroker {
    pub fn new(
        template: &str,
        exchanger: Arc<dyn TokenExchanger>,
        reader: Arc<dyn SecretReader>,
    ) -> Result<Self, BrokerError> {
        Ok(Self {
            template: PathTemplate::parse(template)?,
            exchanger,
            reader,
        })
    }

    /// Build a broker backed by a real Vault client.
    pub fn from_store_config(store: &StoreConfig) -> Result<Self, BrokerError> {
        if store.secret_path_template.is_empty() {
            return Err(BrokerError::MissingField("secret path"));
        }
        if store.address.is_empty() {
            return Err(BrokerError::MissingField("vault address"));
        }
        if store.role_id.is_empty() {
            return Err(BrokerError::MissingField("role_id"));
        }
        if store.secret_id.is_empty() {
            return Err(BrokerError::MissingField("secret_id"));
        }

        let vault = Arc::new(VaultClient::new(store).map_err(BrokerError::Client)?);
        Self::new(&store.secret_path_template, vault.clone(), vault)
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }
}

#[async_trait]
impl SecretFinder for SecretBroker {
    async fn find(&self, request: &SecretRequest) -> Result<Secret, FindError> {
        request.validate()?;
        let path = self.template.render(&request.repo.slug);

        let token = self
            .exchanger
            .exchange()
            .await
            .map_err(FindError::UpstreamAuth)?;

        let entry = self
            .reader
            .read(&path, &token)
            .await
            .map_err(FindError::UpstreamRead)?;

        let value = select_kv2(&entry, &request.name)?;
        if value == SecretValue::Absent {
            tracing::debug!(name = %request.name, %path, "key absent from secret, returning null");
        }

        Ok(Secret::new(request.name.clone(), &value))
    }
}

/// Pick `name` out of a KV v2 read response.
fn select_kv2(entry: &Value, name: &str) -> Result<SecretValue, FindError> {
    let data = entry
        .get("data")
        .and_then(|d| d.get("data"))
        .and_then(Value::as_object)
        .ok_or(FindError::UnsupportedStoreShape)?;
    Ok(SecretValue::from_entry(data.get(name)))
}
