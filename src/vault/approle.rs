//! AppRole login.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AccessToken, TokenExchanger, VaultClient, VaultError};

#[derive(Serialize)]
struct LoginRequest<'a> {
    role_id: &'a str,
    secret_id: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

#[derive(Deserialize)]
struct LoginAuth {
    client_token: String,
}

#[async_trait]
impl TokenExchanger for VaultClient {
    /// Log in once; no retry and no caching, every call hits Vault.
    async fn exchange(&self) -> Result<AccessToken, VaultError> {
        let url = self.url("auth/approle/login");
        let body = LoginRequest {
            role_id: &self.role_id,
            secret_id: &self.secret_id,
        };

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(VaultError::transport)?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "vault approle login rejected");
            return Err(VaultError::Status(status.as_u16()));
        }

        let bytes = resp.bytes().await.map_err(VaultError::transport)?;
        let parsed: LoginResponse = serde_json::from_slice(&bytes).map_err(VaultError::parse)?;

        if parsed.auth.client_token.is_empty() {
            return Err(VaultError::EmptyToken);
        }
        Ok(AccessToken::new(parsed.auth.client_token))
    }
}
