//! # vault-reposecrets
//!
//! Drone secret extension that relays per-repository secrets out of Vault.
//!
//! The CI server asks for a secret by name and repository; the extension logs
//! in to Vault with an AppRole on every request, reads the repository's KV v2
//! entry and hands back the requested value.
//!
//! ## Request Flow
//!
//! ```text
//!   CI server ──POST (signed)──► api::signature ── reject ──► 400
//!                                      │
//!                                      ▼
//!                              SecretRequest (JSON)
//!                                      │
//!                                      ▼
//!                   secrets::SecretBroker ──► vault::VaultClient
//!                    (path template)          (AppRole login, KV read)
//!                                      │
//!                                      ▼
//!                     api::response (aesgcm when negotiated) ──► 200
//! ```
//!
//! ## Modules
//! - `api`: HTTP surface, signature verification, response encoding
//! - `secrets`: secret broker and protocol types
//! - `vault`: Vault AppRole and KV client
//! - `crypto`: AES-GCM response encryption
//! - `config`: environment configuration

pub mod api;
pub mod config;
pub mod crypto;
pub mod secrets;
pub mod vault;

pub use config::Config;
pub use secrets::{Secret, SecretBroker, SecretFinder, SecretRequest};
