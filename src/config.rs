//! Configuration management for the secret extension.
//!
//! Configuration is read from environment variables:
//! - `PLUGIN_SECRET` - Required. Shared secret used to verify request signatures
//!   and to derive the response encryption key.
//! - `PLUGIN_LISTEN` - Optional. Listen address. Defaults to `:8080` (all interfaces).
//! - `PLUGIN_DEBUG` - Optional. Enables debug logging. Defaults to `false`.
//! - `VAULT_SECRET_PATH` - Required. Secret path template containing exactly one `%s`,
//!   which is replaced with the repository slug (e.g. `secret/data/drone/%s`).
//! - `VAULT_ADDR` - Required. Vault base URL.
//! - `VAULT_ROLE_ID` - Required. AppRole role id.
//! - `VAULT_SECRET_ID` - Required. AppRole secret id.
//! - `VAULT_TIMEOUT_SECS` - Optional. Timeout applied to every call made to Vault.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Connection settings for the Vault side of the relay.
#[derive(Clone)]
pub struct StoreConfig {
    /// Path template with a single `%s` placeholder for the repo slug
    pub secret_path_template: String,

    /// Vault base URL, without trailing slash
    pub address: String,

    /// AppRole role id
    pub role_id: String,

    /// AppRole secret id
    pub secret_id: String,

    /// Upper bound for each outbound call; `None` leaves calls unbounded
    pub request_timeout: Option<Duration>,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("secret_path_template", &self.secret_path_template)
            .field("address", &self.address)
            .field("role_id", &self.role_id)
            .field("secret_id", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Service configuration.
#[derive(Clone)]
pub struct Config {
    /// Shared secret for request signatures and response encryption
    pub secret: String,

    /// `host:port` the HTTP server binds to; the host may be a name
    pub listen: String,

    /// Debug logging
    pub debug: bool,

    /// Vault settings
    pub store: StoreConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("secret", &"<redacted>")
            .field("listen", &self.listen)
            .field("debug", &self.debug)
            .field("store", &self.store)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if a required variable is unset or empty,
    /// and `ConfigError::InvalidValue` if a value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| get(name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()));

        let secret = require("PLUGIN_SECRET")?;

        let listen = get("PLUGIN_LISTEN").unwrap_or_else(|| ":8080".to_string());
        let listen = parse_listen(&listen)
            .map_err(|e| ConfigError::InvalidValue("PLUGIN_LISTEN".to_string(), e))?;

        let debug = get("PLUGIN_DEBUG").map(|v| parse_bool(&v)).unwrap_or(false);

        let secret_path_template = require("VAULT_SECRET_PATH")?;

        let mut address = require("VAULT_ADDR")?;
        while address.ends_with('/') {
            address.pop();
        }

        let role_id = require("VAULT_ROLE_ID")?;
        let secret_id = require("VAULT_SECRET_ID")?;

        let request_timeout = match get("VAULT_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|e| {
                    ConfigError::InvalidValue("VAULT_TIMEOUT_SECS".to_string(), format!("{}", e))
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue(
                        "VAULT_TIMEOUT_SECS".to_string(),
                        "must be greater than zero".to_string(),
                    ));
                }
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            secret,
            listen,
            debug,
            store: StoreConfig {
                secret_path_template,
                address,
                role_id,
                secret_id,
                request_timeout,
            },
        })
    }
}

/// Normalise a listen address, expanding the `:port` shorthand to all interfaces.
///
/// Host names are kept as given and resolved when the listener binds.
fn parse_listen(value: &str) -> Result<String, String> {
    let value = value.trim();
    let full = if value.starts_with(':') {
        format!("0.0.0.0{}", value)
    } else {
        value.to_string()
    };

    let (host, port) = full
        .rsplit_once(':')
        .ok_or_else(|| format!("expected host:port, got {:?}", value))?;
    if host.is_empty() {
        return Err(format!("missing host in {:?}", value));
    }
    port.parse::<u16>()
        .map_err(|e| format!("invalid port {:?}: {}", port, e))?;

    Ok(full)
}

/// Recognises `1`, `true`, `yes`, `y`, `on` (case-insensitive) as `true`.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}
