//! Short-lived form nonces.
//!
//! A nonce binds a form instance to a time window:
//!
//! ```text
//! tick  = unix_time / (lifetime / 2)
//! nonce = base64(HMAC-SHA256("{tick}|{form_id}", secret))
//! ```
//!
//! Tokens from the current and the previous tick are accepted, so a nonce
//! stays valid for at least half and at most the full lifetime.

/// Request parameter carrying the nonce.
pub const NONCE_PARAM: &str = "nonce";

/// Request parameter carrying the form-instance identifier.
pub const FORM_ID_PARAM: &str = "form_id";

/// Nonce verification collaborator used by the request verifier.
pub trait NonceVerifier: Send + Sync {
    fn verify_nonce(&self, token: &str, form_id: &str) -> bool;
}

/// Default HMAC-based nonce issuer and verifier.
#[derive(Clone)]
pub struct NonceService {
    secret: Box<[u8]>,
    lifetime_secs: u64,
}

impl NonceService {
    pub fn new(secret: impl Into<Box<[u8]>>, lifetime_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            lifetime_secs: lifetime_secs.max(2),
        }
    }

    pub fn lifetime_secs(&self) -> u64 {
        self.lifetime_secs
    }

    /// Issue a nonce for `form_id`, valid from now.
    pub fn issue(&self, form_id: &str) -> String {
        self.issue_at(form_id, now())
    }

    fn issue_at(&self, form_id: &str, unix_time: i64) -> String {
        let tag = self.sign(self.tick(unix_time), form_id);
        fast32::base64::RFC4648_URL_NOPAD.encode(tag.as_ref())
    }

    fn verify_at(&self, token: &str, form_id: &str, unix_time: i64) -> bool {
        if token.is_empty() || form_id.is_empty() {
            return false;
        }
        let Ok(expected) = fast32::base64::RFC4648_URL_NOPAD.decode_str(token) else {
            return false;
        };
        let tick = self.tick(unix_time);
        let key = ring::hmac::Key::new(ring::hmac::HMAC_SHA256, &self.secret);
        [tick, tick.saturating_sub(1)].into_iter().any(|t| {
            ring::hmac::verify(&key, message(t, form_id).as_bytes(), &expected).is_ok()
        })
    }

    fn tick(&self, unix_time: i64) -> u64 {
        let half = (self.lifetime_secs / 2).max(1);
        u64::try_from(unix_time).unwrap_or(0) / half
    }

    fn sign(&self, tick: u64, form_id: &str) -> ring::hmac::Tag {
        ring::hmac::sign(
            &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, &self.secret),
            message(tick, form_id).as_bytes(),
        )
    }
}

impl NonceVerifier for NonceService {
    fn verify_nonce(&self, token: &str, form_id: &str) -> bool {
        self.verify_at(token, form_id, now())
    }
}

impl std::fmt::Debug for NonceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceService")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

fn message(tick: u64, form_id: &str) -> String {
    format!("{tick}|{form_id}")
}

fn now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
