//! HMAC signing used across formgate.
//!
//! Two schemes live here.
//!
//! * **Parameter signing** (signed redirect URLs, callback verification):
//!   the parameter map is canonicalized and signed with the integration's
//!   authorization salt. The signature travels as the `hmac` query
//!   parameter.
//!
//!   ```text
//!   canonical = json(sorted { key: urlencode(value) })   // lists/maps as-is
//!   hmac      = base64url(HMAC-SHA256(canonical, salt))   // unpadded
//!   ```
//!
//!   The URL-safe alphabet lets the signature be appended to a query
//!   string verbatim.
//!
//! * **Body signing** (outbound gateway calls):
//!
//!   ```text
//!   Formgate-Signature: {unix_timestamp}.{base64(HMAC-SHA256("{timestamp}.{body}", secret))}
//!   ```
//!
//!   formgate only signs bodies itself. [`verify_body`] and
//!   [`check_timestamp`] are for the receiving end: a gateway adapter or
//!   integrator service that shares the secret uses them to authenticate
//!   formgate's calls and refuse ones older than [`MAX_SIGNATURE_AGE`].

use crate::params::{ParamValue, Params};

/// Query parameter carrying a parameter signature.
pub const SIGNATURE_PARAM: &str = "hmac";

/// Header name for body signatures on gateway calls.
pub const SIGNATURE_HEADER: &str = "Formgate-Signature";

/// Maximum allowed age of a body signature (in seconds).
pub const MAX_SIGNATURE_AGE: i64 = 5 * 60;

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("invalid header format")]
    InvalidFormat,
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid signature")]
    SignatureMismatch,
    #[error("signature expired")]
    Expired,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

// ---------------------------------------------------------------------------
// AuthorizationSalt
// ---------------------------------------------------------------------------

/// Secret key scoped to one integration.
///
/// An empty salt means "no authorization configured". Its `Debug` output
/// never contains the key material.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthorizationSalt(Box<[u8]>);

impl AuthorizationSalt {
    pub fn new(secret: impl Into<Box<[u8]>>) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for AuthorizationSalt {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl From<String> for AuthorizationSalt {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl std::fmt::Debug for AuthorizationSalt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            f.write_str("AuthorizationSalt(<empty>)")
        } else {
            f.write_str("AuthorizationSalt(<redacted>)")
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter signing
// ---------------------------------------------------------------------------

/// URL-encode every scalar string value. Lists and maps pass through
/// unchanged.
pub fn encode_params(params: &Params) -> Params {
    params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                ParamValue::Text(s) => ParamValue::Text(urlencoding::encode(s).into_owned()),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Canonical byte form of an already encoded parameter set: compact JSON
/// with keys in sorted order.
pub fn canonicalize(encoded: &Params) -> Result<String, SignatureError> {
    Ok(serde_json::to_string(encoded)?)
}

/// Sign a raw (not yet encoded) parameter set with `salt`.
///
/// Returns the unpadded base64url signature.
pub fn generate_hash(params: &Params, salt: &[u8]) -> Result<String, SignatureError> {
    let canonical = canonicalize(&encode_params(params))?;
    let tag = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, salt),
        canonical.as_bytes(),
    );
    Ok(fast32::base64::RFC4648_URL_NOPAD.encode(tag.as_ref()))
}

/// Check `signature` against a raw parameter set.
///
/// Uses the same canonicalization as [`generate_hash`] and a constant-time
/// comparison. Any malformed input yields `false`.
pub fn verify_hash(signature: &str, params: &Params, salt: &[u8]) -> bool {
    let Ok(expected) = fast32::base64::RFC4648_URL_NOPAD.decode_str(signature) else {
        return false;
    };
    let Ok(canonical) = canonicalize(&encode_params(params)) else {
        return false;
    };
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, salt),
        canonical.as_bytes(),
        &expected,
    )
    .is_ok()
}

// ---------------------------------------------------------------------------
// Body signing
// ---------------------------------------------------------------------------

/// Sign a request body: `HMAC-SHA256("{timestamp}.{body}", key)`.
///
/// Returns the formatted `Formgate-Signature` header value.
pub fn sign_body(body: &str, key: &[u8]) -> String {
    let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
    sign_body_at(body, key, timestamp)
}

fn sign_body_at(body: &str, key: &[u8], timestamp: i64) -> String {
    let data = format!("{timestamp}.{body}");
    let sig = ring::hmac::sign(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        data.as_bytes(),
    );
    format_signature_header(timestamp, sig.as_ref())
}

/// Verify a `Formgate-Signature` header against a body, including
/// timestamp freshness.
pub fn verify_body(header_value: &str, body: &str, key: &[u8]) -> Result<(), SignatureError> {
    let (timestamp, signature) = parse_signature_header(header_value)?;
    let data = format!("{timestamp}.{body}");
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        data.as_bytes(),
        &signature,
    )?;
    check_timestamp(timestamp)
}

/// Parse a `{timestamp}.{base64}` header value into
/// `(timestamp, raw_signature_bytes)`.
pub fn parse_signature_header(value: &str) -> Result<(i64, Box<[u8]>), SignatureError> {
    let (timestamp, signature) = value.split_once('.').ok_or(SignatureError::InvalidFormat)?;
    let timestamp: i64 = timestamp
        .parse()
        .map_err(|_| SignatureError::InvalidFormat)?;
    let signature_bytes = fast32::base64::RFC4648_NOPAD
        .decode_str(signature)
        .map_err(|_| SignatureError::InvalidBase64)?
        .into_boxed_slice();
    Ok((timestamp, signature_bytes))
}

/// Format a `{timestamp}.{base64}` header value from its parts.
pub fn format_signature_header(timestamp: i64, signature: &[u8]) -> String {
    format!(
        "{}.{}",
        timestamp,
        fast32::base64::RFC4648_NOPAD.encode(signature)
    )
}

/// Check that a signature timestamp is within [`MAX_SIGNATURE_AGE`].
pub fn check_timestamp(timestamp: i64) -> Result<(), SignatureError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    if now - timestamp > MAX_SIGNATURE_AGE {
        return Err(SignatureError::Expired);
    }
    Ok(())
}
