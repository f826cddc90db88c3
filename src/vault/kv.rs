//! Logical reads.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use super::{AccessToken, SecretReader, VaultClient, VaultError};

const TOKEN_HEADER: &str = "X-Vault-Token";

#[async_trait]
impl SecretReader for VaultClient {
    async fn read(&self, path: &str, token: &AccessToken) -> Result<Value, VaultError> {
        let url = self.url(path);

        let resp = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, token.as_str())
            .send()
            .await
            .map_err(VaultError::transport)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(VaultError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), path, "vault read rejected");
            return Err(VaultError::Status(status.as_u16()));
        }

        let bytes = resp.bytes().await.map_err(VaultError::transport)?;
        let value: Value = serde_json::from_slice(&bytes).map_err(VaultError::parse)?;
        if value.is_null() {
            return Err(VaultError::NotFound(path.to_string()));
        }
        Ok(value)
    }
}
