//! Vault client (minimal adapter).
//!
//! Provides the two calls the relay needs from Vault:
//! - `POST /v1/auth/approle/login` to trade the AppRole credentials for a token
//! - `GET /v1/{path}` to read a secret with that token
//!
//! Both calls sit behind narrow traits so the broker can be driven by test
//! doubles instead of a live Vault.

mod approle;
mod error;
mod kv;

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::StoreConfig;

pub use error::VaultError;

/// Short-lived Vault client token. Never logged, never reused across requests.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Exchanges role credentials for an access token.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self) -> Result<AccessToken, VaultError>;
}

/// Performs an authenticated read of a secret path.
#[async_trait]
pub trait SecretReader: Send + Sync {
    async fn read(&self, path: &str, token: &AccessToken) -> Result<Value, VaultError>;
}

/// HTTP client for a single Vault server using AppRole authentication.
#[derive(Clone)]
pub struct VaultClient {
    address: String,
    role_id: String,
    secret_id: String,
    client: reqwest::Client,
}

impl VaultClient {
    pub fn new(store: &StoreConfig) -> Result<Self, VaultError> {
        let mut address = store.address.clone();
        while address.ends_with('/') {
            address.pop();
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = store.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(VaultError::transport)?;

        Ok(Self {
            address,
            role_id: store.role_id.clone(),
            secret_id: store.secret_id.clone(),
            client,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.address)
            .field("role_id", &self.role_id)
            .finish_non_exhaustive()
    }
}
