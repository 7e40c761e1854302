//! TOML file configuration structures.
//!
//! These structs directly map to the `formgate-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub nonce: NonceConfig,
    pub captcha: Option<CaptchaConfig>,
    pub payment: Option<PaymentConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
    #[serde(default)]
    pub forms: Vec<FormConfig>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// The site's home page; the fallback for every payment redirect.
    pub home_url: String,
    /// Origins besides the home URL's that payment redirects may target.
    #[serde(default)]
    pub allowed_redirect_origins: Vec<String>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_namespace() -> String {
    "formgate".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceConfig {
    /// HMAC key for nonces. Left empty, a random key is generated on every
    /// load.
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_nonce_lifetime")]
    pub lifetime_secs: u64,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            lifetime_secs: default_nonce_lifetime(),
        }
    }
}

fn default_nonce_lifetime() -> u64 {
    24 * 60 * 60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    pub secret: String,
    /// reCAPTCHA-compatible `siteverify` endpoint.
    #[serde(default = "default_verify_url")]
    pub verify_url: String,
}

fn default_verify_url() -> String {
    "https://www.google.com/recaptcha/api/siteverify".to_owned()
}

/// Payment gateway section. Its presence enables the payment integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub gateway_url: Url,
    pub gateway_secret: String,
    /// Authorization salt for signed callback URLs.
    #[serde(default)]
    pub salt: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_true")]
    pub require_authorization: bool,
    #[serde(default)]
    pub nonce: bool,
    #[serde(default)]
    pub captcha: bool,
}

fn default_currency() -> String {
    "EUR".to_owned()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    5 * 60
}

fn default_cache_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    /// Names of integrations whose credentials are in place.
    #[serde(default)]
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfig {
    pub slug: String,
    pub forward_url: Url,
    pub integration: Option<String>,
    #[serde(default = "default_true")]
    pub nonce: bool,
    #[serde(default)]
    pub captcha: bool,
    #[serde(default)]
    pub required_params: Vec<String>,
    #[serde(default)]
    pub required_post_params: Vec<String>,
}
