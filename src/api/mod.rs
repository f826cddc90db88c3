//! HTTP API for the secret extension.
//!
//! ## Endpoints
//!
//! - `POST /{any}` - Resolve a secret for a repository. Requires an HTTP
//!   signature made with the shared secret; answers with the secret as JSON,
//!   or as an AES-GCM blob when `Accept-Encoding: aesgcm` is sent. Bodies
//!   over [`MAX_REQUEST_BODY`] bytes are refused with 400 `Invalid Input`.

mod error;
pub mod response;
mod routes;
pub mod signature;

pub use error::{ApiError, NOT_FOUND_MESSAGE};
pub use routes::{router, serve, AppState, MAX_REQUEST_BODY};
