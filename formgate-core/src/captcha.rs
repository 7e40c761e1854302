//! Captcha collaborator.

use async_trait::async_trait;
use formgate_sdk::params::Params;
use serde::Deserialize;
use url::Url;

/// Request parameter carrying the captcha widget's response token.
pub const CAPTCHA_RESPONSE_PARAM: &str = "g-recaptcha-response";

#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// `true` if the submitted parameters carry a valid captcha solution.
    async fn check_captcha_from_params(&self, params: &Params) -> bool;
}

/// Verifies captcha tokens against a reCAPTCHA-compatible `siteverify`
/// endpoint.
pub struct SiteVerifyCaptcha {
    http: reqwest::Client,
    verify_url: Url,
    secret: String,
}

#[derive(Deserialize)]
struct SiteVerifyResponse {
    success: bool,
}

impl SiteVerifyCaptcha {
    pub fn new(verify_url: Url, secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            verify_url,
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl CaptchaVerifier for SiteVerifyCaptcha {
    async fn check_captcha_from_params(&self, params: &Params) -> bool {
        let Some(token) = params
            .get(CAPTCHA_RESPONSE_PARAM)
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
        else {
            return false;
        };

        let form = [("secret", self.secret.as_str()), ("response", token)];
        let response = match self
            .http
            .post(self.verify_url.clone())
            .form(&form)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Captcha verification request failed");
                return false;
            }
        };

        match response.json::<SiteVerifyResponse>().await {
            Ok(body) => body.success,
            Err(e) => {
                tracing::warn!(error = %e, "Captcha verification returned an unreadable body");
                false
            }
        }
    }
}

impl std::fmt::Debug for SiteVerifyCaptcha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteVerifyCaptcha")
            .field("verify_url", &self.verify_url.as_str())
            .finish_non_exhaustive()
    }
}
