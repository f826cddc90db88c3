//! HTTP message signatures (HMAC variant).
//!
//! The CI server signs every extension request with the shared secret:
//!
//! ```text
//! Date: Tue, 07 Jun 2022 20:51:35 GMT
//! Digest: SHA-256=X48E9qOokqqrvdts8nOJRJN3OWDUoyWxBf7kbu9DBPE=
//! Signature: keyId="hmac-key",algorithm="hmac-sha256",
//!            headers="(request-target) date digest",signature="<base64>"
//! ```
//!
//! The signing string is one `name: value` line per listed header. The
//! `Digest` header is checked against the body actually received, so a
//! valid signature also pins the body.
//!
//! Both `hmac-sha256` and the legacy `hmac-sha1` are accepted.
//!
//! There is no replay window: a captured request stays valid.

use axum::http::{header, HeaderMap, Method};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;
type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "signature";
pub const DIGEST_HEADER: &str = "digest";
pub const DATE_HEADER: &str = "date";
pub const REQUEST_TARGET: &str = "(request-target)";
pub const ALGORITHM_HMAC_SHA256: &str = "hmac-sha256";
pub const ALGORITHM_HMAC_SHA1: &str = "hmac-sha1";

const AUTH_SCHEME: &str = "Signature ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("no signature header found")]
    Missing,

    #[error("malformed signature: {0}")]
    Malformed(String),

    #[error("unsupported signature algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("signature does not cover the date header")]
    DateNotSigned,

    #[error("signed header {0:?} is missing from the request")]
    MissingHeader(String),

    #[error("digest header does not match the request body")]
    DigestMismatch,

    #[error("signature mismatch")]
    Mismatch,
}

impl SignatureError {
    /// True when no usable signature was supplied at all, as opposed to one
    /// that failed verification.
    pub fn is_missing_or_malformed(&self) -> bool {
        matches!(
            self,
            SignatureError::Missing
                | SignatureError::Malformed(_)
                | SignatureError::UnsupportedAlgorithm(_)
        )
    }
}

/// Keyed hash named by the `algorithm` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    HmacSha256,
    HmacSha1,
}

impl Algorithm {
    pub fn from_name(name: &str) -> Result<Self, SignatureError> {
        match name {
            ALGORITHM_HMAC_SHA256 => Ok(Algorithm::HmacSha256),
            ALGORITHM_HMAC_SHA1 => Ok(Algorithm::HmacSha1),
            other => Err(SignatureError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::HmacSha256 => ALGORITHM_HMAC_SHA256,
            Algorithm::HmacSha1 => ALGORITHM_HMAC_SHA1,
        }
    }

    fn compute(self, secret: &str, message: &str) -> Result<Vec<u8>, SignatureError> {
        let key = secret.as_bytes();
        let tag = match self {
            Algorithm::HmacSha256 => {
                let mut mac =
                    HmacSha256::new_from_slice(key).map_err(|_| SignatureError::Mismatch)?;
                mac.update(message.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
            Algorithm::HmacSha1 => {
                let mut mac =
                    HmacSha1::new_from_slice(key).map_err(|_| SignatureError::Mismatch)?;
                mac.update(message.as_bytes());
                mac.finalize().into_bytes().to_vec()
            }
        };
        Ok(tag)
    }

    /// Constant-time check of `expected` against the keyed hash of `message`.
    fn verify(self, secret: &str, message: &str, expected: &[u8]) -> Result<(), SignatureError> {
        let key = secret.as_bytes();
        let outcome = match self {
            Algorithm::HmacSha256 => {
                let mut mac =
                    HmacSha256::new_from_slice(key).map_err(|_| SignatureError::Mismatch)?;
                mac.update(message.as_bytes());
                mac.verify_slice(expected)
            }
            Algorithm::HmacSha1 => {
                let mut mac =
                    HmacSha1::new_from_slice(key).map_err(|_| SignatureError::Mismatch)?;
                mac.update(message.as_bytes());
                mac.verify_slice(expected)
            }
        };
        outcome.map_err(|_| SignatureError::Mismatch)
    }
}

/// A parsed `Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSignature {
    pub key_id: String,
    pub algorithm: Algorithm,
    pub headers: Vec<String>,
    signature: Vec<u8>,
}

impl HttpSignature {
    /// Read the signature from `Signature`, falling back to `Authorization: Signature ...`.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, SignatureError> {
        if let Some(value) = headers.get(SIGNATURE_HEADER) {
            let value = value
                .to_str()
                .map_err(|_| SignatureError::Malformed("non-ascii header".to_string()))?;
            return Self::parse(value);
        }
        if let Some(value) = headers.get(header::AUTHORIZATION) {
            let value = value
                .to_str()
                .map_err(|_| SignatureError::Malformed("non-ascii header".to_string()))?;
            if let Some(params) = value.strip_prefix(AUTH_SCHEME) {
                return Self::parse(params);
            }
        }
        Err(SignatureError::Missing)
    }

    /// Parse `keyId="..",algorithm="..",headers="..",signature=".."`.
    pub fn parse(value: &str) -> Result<Self, SignatureError> {
        let mut key_id = None;
        let mut algorithm = None;
        let mut headers = None;
        let mut signature = None;

        for param in value.split(',') {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (name, raw) = param
                .split_once('=')
                .ok_or_else(|| SignatureError::Malformed(format!("bad parameter {:?}", param)))?;
            let raw = raw.trim();
            let unquoted = raw
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .ok_or_else(|| SignatureError::Malformed(format!("unquoted value for {}", name)))?;

            match name.trim() {
                "keyId" => key_id = Some(unquoted.to_string()),
                "algorithm" => algorithm = Some(unquoted.to_string()),
                "headers" => headers = Some(unquoted.to_string()),
                "signature" => signature = Some(unquoted.to_string()),
                _ => {}
            }
        }

        let key_id = key_id
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SignatureError::Malformed("missing keyId".to_string()))?;

        let algorithm = Algorithm::from_name(&algorithm.unwrap_or_default())?;

        let headers: Vec<String> = headers
            .unwrap_or_else(|| DATE_HEADER.to_string())
            .split_whitespace()
            .map(|h| h.to_lowercase())
            .collect();
        if headers.is_empty() {
            return Err(SignatureError::Malformed("empty header list".to_string()));
        }

        let signature = signature
            .filter(|s| !s.is_empty())
            .ok_or_else(|| SignatureError::Malformed("missing signature".to_string()))?;
        let signature = BASE64
            .decode(signature)
            .map_err(|_| SignatureError::Malformed("signature is not base64".to_string()))?;

        Ok(Self {
            key_id,
            algorithm,
            headers,
            signature,
        })
    }

    /// Check the signature against the request.
    pub fn verify(
        &self,
        secret: &str,
        method: &Method,
        target: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        if !self.headers.iter().any(|h| h == DATE_HEADER) {
            return Err(SignatureError::DateNotSigned);
        }

        if self.headers.iter().any(|h| h == DIGEST_HEADER) {
            let provided = header_value(headers, DIGEST_HEADER)?;
            if provided != body_digest(body) {
                return Err(SignatureError::DigestMismatch);
            }
        }

        let signing_string = signing_string(&self.headers, method, target, headers)?;
        self.algorithm
            .verify(secret, &signing_string, &self.signature)
    }
}

/// Verify an inbound request. Rejects before anything reads the body as JSON.
pub fn verify_request(
    secret: &str,
    method: &Method,
    target: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), SignatureError> {
    HttpSignature::from_headers(headers)?.verify(secret, method, target, headers, body)
}

/// Produce a `Signature` header value for a request, the way the CI server does.
pub fn sign(
    secret: &str,
    key_id: &str,
    signed_headers: &[&str],
    method: &Method,
    target: &str,
    headers: &HeaderMap,
) -> Result<String, SignatureError> {
    sign_with(
        Algorithm::HmacSha256,
        secret,
        key_id,
        signed_headers,
        method,
        target,
        headers,
    )
}

/// [`sign`] with an explicit algorithm.
pub fn sign_with(
    algorithm: Algorithm,
    secret: &str,
    key_id: &str,
    signed_headers: &[&str],
    method: &Method,
    target: &str,
    headers: &HeaderMap,
) -> Result<String, SignatureError> {
    let signed_headers: Vec<String> = signed_headers.iter().map(|h| h.to_lowercase()).collect();
    let signing_string = signing_string(&signed_headers, method, target, headers)?;
    let signature = BASE64.encode(algorithm.compute(secret, &signing_string)?);

    Ok(format!(
        "keyId=\"{}\",algorithm=\"{}\",headers=\"{}\",signature=\"{}\"",
        key_id,
        algorithm.name(),
        signed_headers.join(" "),
        signature
    ))
}

/// `SHA-256=<base64>` digest of a body.
pub fn body_digest(body: &[u8]) -> String {
    format!("SHA-256={}", BASE64.encode(Sha256::digest(body)))
}

fn signing_string(
    signed_headers: &[String],
    method: &Method,
    target: &str,
    headers: &HeaderMap,
) -> Result<String, SignatureError> {
    let mut lines = Vec::with_capacity(signed_headers.len());
    for name in signed_headers {
        if name == REQUEST_TARGET {
            lines.push(format!(
                "{}: {} {}",
                REQUEST_TARGET,
                method.as_str().to_lowercase(),
                target
            ));
        } else {
            lines.push(format!("{}: {}", name, header_value(headers, name)?));
        }
    }
    Ok(lines.join("\n"))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| SignatureError::MissingHeader(name.to_string()))
}
