//! Configuration module for formgate-server.
//!
//! Handles loading configuration from TOML files and CLI arguments, then
//! validates it into a [`RuntimeConfig`].

pub mod file;

use crate::config::file::FileConfig;
use formgate_core::config::{
    CacheConfig, CaptchaConfig, FormConfig, NonceConfig, PaymentConfig, RuntimeConfig,
    ServerConfig,
};
use rand::Rng;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid url in {field}: {source}")]
    UrlError {
        field: &'static str,
        source: url::ParseError,
    },

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read, override, validate and convert the configuration file.
    pub fn load(&self) -> Result<RuntimeConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.parse(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<RuntimeConfig, ConfigError> {
        self.load()
    }

    fn parse(&self, content: &str) -> Result<RuntimeConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        self.validate(&file_config)?;
        build_runtime_config(file_config)
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let namespace = &config.server.namespace;
        if namespace.is_empty() || namespace.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "namespace {namespace:?} must be a single non-empty path segment"
            )));
        }

        let mut slugs = HashSet::new();
        for form in &config.forms {
            if form.slug.is_empty() || form.slug.contains('/') {
                return Err(ConfigError::ValidationError(format!(
                    "form slug {:?} must be a single non-empty path segment",
                    form.slug
                )));
            }
            if !slugs.insert(form.slug.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate form slug {:?}",
                    form.slug
                )));
            }
        }

        if let Some(payment) = &config.payment {
            if payment.currency.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "payment currency must not be empty".to_owned(),
                ));
            }
            if payment.salt.is_empty() {
                if payment.require_authorization {
                    tracing::warn!("Payment salt is empty: every payment callback will be refused");
                } else {
                    tracing::warn!("Payment salt is empty: payment callbacks are not authenticated");
                }
            }
        }
        Ok(())
    }
}

fn build_runtime_config(file_config: FileConfig) -> Result<RuntimeConfig, ConfigError> {
    let home_url = parse_url("server.home_url", &file_config.server.home_url)?;
    if home_url.cannot_be_a_base() || !matches!(home_url.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "server.home_url {home_url} must be an absolute http(s) URL"
        )));
    }

    let allowed_redirect_origins = file_config
        .server
        .allowed_redirect_origins
        .iter()
        .map(|origin| {
            parse_url("server.allowed_redirect_origins", origin)
                .map(|url| url.origin().unicode_serialization())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let captcha = file_config
        .captcha
        .map(|captcha| {
            Ok::<_, ConfigError>(CaptchaConfig {
                verify_url: parse_url("captcha.verify_url", &captcha.verify_url)?,
                secret: captcha.secret,
            })
        })
        .transpose()?;

    Ok(RuntimeConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
            namespace: file_config.server.namespace,
            home_url,
            allowed_redirect_origins,
        },
        nonce: NonceConfig {
            secret: nonce_secret(file_config.nonce.secret),
            lifetime_secs: file_config.nonce.lifetime_secs,
        },
        captcha,
        payment: file_config.payment.map(|p| PaymentConfig {
            gateway_url: p.gateway_url,
            gateway_secret: p.gateway_secret.into_bytes().into_boxed_slice(),
            salt: p.salt.into(),
            currency: p.currency,
            require_authorization: p.require_authorization,
            nonce: p.nonce,
            captcha: p.captcha,
        }),
        cache: CacheConfig {
            ttl_secs: file_config.cache.ttl_secs,
            capacity: file_config.cache.capacity,
        },
        forms: file_config
            .forms
            .into_iter()
            .map(|f| FormConfig {
                slug: f.slug,
                forward_url: f.forward_url,
                integration: f.integration,
                nonce: f.nonce,
                captcha: f.captcha,
                required_params: f.required_params,
                required_post_params: f.required_post_params,
            })
            .collect(),
        integrations: file_config.integrations.enabled,
    })
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::UrlError { field, source })
}

fn nonce_secret(configured: String) -> Box<[u8]> {
    if !configured.is_empty() {
        return configured.into_bytes().into_boxed_slice();
    }
    tracing::warn!("No nonce secret configured, generated a random one; issued nonces will not survive a reload");
    let mut secret = [0u8; 32];
    rand::rng().fill(&mut secret);
    Box::new(secret)
}
