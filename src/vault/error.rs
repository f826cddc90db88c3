//! Vault error types.
//!
//! Messages never carry response bodies: a login response body holds the
//! client token, so only the status or parse position is reported.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Connection failure, timeout or client construction error
    #[error("request to vault failed: {0}")]
    Transport(String),

    /// Vault answered with a non-success status
    #[error("vault returned HTTP {0}")]
    Status(u16),

    /// The requested path does not exist
    #[error("secret value is nil at {0}")]
    NotFound(String),

    /// The response was not the JSON we expected
    #[error("unable to parse vault response: {0}")]
    Parse(String),

    /// Login succeeded but carried no usable token
    #[error("vault login returned an empty client token")]
    EmptyToken,
}

impl VaultError {
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            VaultError::Transport(format!("timeout: {}", err.without_url()))
        } else if err.is_connect() {
            VaultError::Transport(format!("connection failed: {}", err.without_url()))
        } else {
            VaultError::Transport(err.without_url().to_string())
        }
    }

    pub(crate) fn parse(err: serde_json::Error) -> Self {
        VaultError::Parse(format!("line {} column {}", err.line(), err.column()))
    }
}
