//! Configuration types for formgate.
//!
//! These types represent the validated runtime configuration. Loading and
//! parsing the TOML file is handled by the server crate.

mod form;
mod payment;
mod server;

pub use form::FormConfig;
pub use payment::{CALLBACK_ROUTE, INITIATE_ROUTE, PAYMENT_INTEGRATION, PaymentConfig};
pub use server::ServerConfig;

use url::Url;

/// Secret and lifetime of issued nonces.
#[derive(Clone)]
pub struct NonceConfig {
    pub secret: Box<[u8]>,
    pub lifetime_secs: u64,
}

impl std::fmt::Debug for NonceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceConfig")
            .field("secret", &"<redacted>")
            .field("lifetime_secs", &self.lifetime_secs)
            .finish()
    }
}

/// reCAPTCHA-compatible verification endpoint.
#[derive(Clone)]
pub struct CaptchaConfig {
    pub verify_url: Url,
    pub secret: String,
}

impl std::fmt::Debug for CaptchaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptchaConfig")
            .field("verify_url", &self.verify_url.as_str())
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// Upper bound on cached responses.
    pub capacity: usize,
}

/// The complete validated configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub server: ServerConfig,
    pub nonce: NonceConfig,
    pub captcha: Option<CaptchaConfig>,
    pub payment: Option<PaymentConfig>,
    pub cache: CacheConfig,
    pub forms: Vec<FormConfig>,
    /// Names of third-party integrations that are configured and usable.
    pub integrations: Vec<String>,
}

impl RuntimeConfig {
    pub fn form(&self, slug: &str) -> Option<&FormConfig> {
        self.forms.iter().find(|form| form.slug == slug)
    }

    /// Every integration name that should be registered as configured.
    /// A `[payment]` section implies the payment integration.
    pub fn configured_integrations(&self) -> Vec<String> {
        let mut names = self.integrations.clone();
        if self.payment.is_some() && !names.iter().any(|n| n == PAYMENT_INTEGRATION) {
            names.push(PAYMENT_INTEGRATION.to_owned());
        }
        names
    }
}
