//! Mapping of request failures to HTTP responses.
//!
//! | failure                               | status |
//! |---------------------------------------|--------|
//! | missing or invalid signature          | 400    |
//! | unreadable body, invalid request      | 400    |
//! | vault login/read failure, bad shape   | 404    |
//! | encryption failure                    | 500    |
//!
//! Every 404 carries the same body, so a failed AppRole login cannot be told
//! apart from a missing secret.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::signature::SignatureError;
use crate::crypto::CryptoError;
use crate::secrets::FindError;

pub const NOT_FOUND_MESSAGE: &str = "Secret Not Found";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Find(#[from] FindError),

    #[error(transparent)]
    Encryption(#[from] CryptoError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Signature(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Find(FindError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            ApiError::Find(_) => StatusCode::NOT_FOUND,
            ApiError::Encryption(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text returned to the caller.
    fn public_message(&self) -> String {
        match self {
            ApiError::Signature(e) if e.is_missing_or_malformed() => {
                "Invalid or Missing Signature".to_string()
            }
            ApiError::Signature(_) => "Invalid Signature".to_string(),
            ApiError::InvalidInput(_) | ApiError::Find(FindError::InvalidRequest(_)) => {
                "Invalid Input".to_string()
            }
            ApiError::Find(_) => NOT_FOUND_MESSAGE.to_string(),
            ApiError::Encryption(e) => e.to_string(),
            ApiError::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::ValidationError;
    use crate::vault::VaultError;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::from(SignatureError::Missing).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidInput("eof".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(FindError::InvalidRequest(ValidationError::EmptySlug)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(FindError::UpstreamAuth(VaultError::Status(403))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(FindError::UnsupportedStoreShape).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CryptoError::KeyTooShort(3)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn upstream_failures_share_one_message() {
        let auth = ApiError::from(FindError::UpstreamAuth(VaultError::Status(400)));
        let read = ApiError::from(FindError::UpstreamRead(VaultError::NotFound("p".to_string())));
        let shape = ApiError::from(FindError::UnsupportedStoreShape);
        assert_eq!(auth.public_message(), NOT_FOUND_MESSAGE);
        assert_eq!(read.public_message(), NOT_FOUND_MESSAGE);
        assert_eq!(shape.public_message(), NOT_FOUND_MESSAGE);
    }

    #[test]
    fn signature_messages() {
        assert_eq!(
            ApiError::from(SignatureError::Missing).public_message(),
            "Invalid or Missing Signature"
        );
        assert_eq!(
            ApiError::from(SignatureError::Mismatch).public_message(),
            "Invalid Signature"
        );
    }

    #[test]
    fn encryption_error_text_is_exposed() {
        let err = ApiError::from(CryptoError::KeyTooShort(3));
        assert_eq!(err.public_message(), CryptoError::KeyTooShort(3).to_string());
    }
}
