//! Response encoding, with optional `aesgcm` encryption.

use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::crypto::{self, CryptoError};

/// `Accept-Encoding` value that requests an encrypted body.
pub const AESGCM: &str = "aesgcm";

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// True only if `Accept-Encoding` is exactly `aesgcm`.
pub fn wants_encryption(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT_ENCODING)
        .map(|v| v.as_bytes() == AESGCM.as_bytes())
        .unwrap_or(false)
}

/// Response body plus the headers that describe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub content_encoding: Option<&'static str>,
}

/// Encrypt the JSON payload when requested, otherwise pass it through.
pub fn maybe_encrypt(
    payload: Vec<u8>,
    secret: &str,
    requested: bool,
) -> Result<EncodedBody, CryptoError> {
    if !requested {
        return Ok(EncodedBody {
            bytes: payload,
            content_type: CONTENT_TYPE_JSON,
            content_encoding: None,
        });
    }

    let key = crypto::derive_key(secret)?;
    let bytes = crypto::encrypt(&key, &payload)?;
    Ok(EncodedBody {
        bytes,
        content_type: CONTENT_TYPE_OCTET_STREAM,
        content_encoding: Some(AESGCM),
    })
}

impl IntoResponse for EncodedBody {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::OK, self.bytes).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.content_type),
        );
        if let Some(encoding) = self.content_encoding {
            headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn negotiation_requires_exact_value() {
        let mut headers = HeaderMap::new();
        assert!(!wants_encryption(&headers));

        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("aesgcm"));
        assert!(wants_encryption(&headers));

        for other in ["gzip", "AESGCM", "aesgcm, gzip", " aesgcm"] {
            headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_str(other).unwrap());
            assert!(!wants_encryption(&headers), "{:?}", other);
        }
    }

    #[test]
    fn plain_payload_passes_through() {
        let body = maybe_encrypt(b"{}".to_vec(), SECRET, false).unwrap();
        assert_eq!(body.bytes, b"{}".to_vec());
        assert_eq!(body.content_type, CONTENT_TYPE_JSON);
        assert_eq!(body.content_encoding, None);
    }

    #[test]
    fn plain_payload_ignores_short_secret() {
        assert!(maybe_encrypt(b"{}".to_vec(), "short", false).is_ok());
    }

    #[test]
    fn encrypted_payload_decrypts_to_original() {
        let payload = br#"{"name":"A","data":"b","pull":false,"fork":false}"#.to_vec();
        let body = maybe_encrypt(payload.clone(), SECRET, true).unwrap();

        assert_eq!(body.content_type, CONTENT_TYPE_OCTET_STREAM);
        assert_eq!(body.content_encoding, Some(AESGCM));
        let key = crypto::derive_key(SECRET).unwrap();
        assert_eq!(crypto::decrypt(&key, &body.bytes).unwrap(), payload);
    }

    #[test]
    fn short_secret_fails_encryption() {
        assert_eq!(
            maybe_encrypt(b"{}".to_vec(), "short", true),
            Err(CryptoError::KeyTooShort(5))
        );
    }

    #[test]
    fn into_response_sets_headers() {
        let response = maybe_encrypt(b"{}".to_vec(), SECRET, true)
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            CONTENT_TYPE_OCTET_STREAM
        );
        assert_eq!(response.headers().get(header::CONTENT_ENCODING).unwrap(), AESGCM);
    }
}
