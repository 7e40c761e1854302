//! Form endpoint configuration.

use crate::captcha::CaptchaVerifier;
use crate::verifier::RoutePolicy;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone)]
pub struct FormConfig {
    /// Path segment under `/forms/`.
    pub slug: String,
    /// Where verified submissions are posted.
    pub forward_url: Url,
    /// Integration that must be configured before the form accepts input.
    pub integration: Option<String>,
    pub nonce: bool,
    pub captcha: bool,
    pub required_params: Vec<String>,
    pub required_post_params: Vec<String>,
}

impl FormConfig {
    /// Route name handed to the required-params extension point.
    pub fn route(&self) -> String {
        format!("forms/{}", self.slug)
    }

    /// Verification policy for submissions to this form. `captcha` is
    /// attached only when the form asks for it.
    pub fn policy(&self, captcha: Option<Arc<dyn CaptchaVerifier>>) -> RoutePolicy {
        let mut policy = RoutePolicy::new(self.route())
            .required_params(self.required_params.iter().cloned())
            .required_post_params(self.required_post_params.iter().cloned());
        if let Some(name) = &self.integration {
            policy = policy.integration(name.clone());
        }
        if self.nonce {
            policy = policy.require_nonce();
        }
        match captcha {
            Some(captcha) if self.captcha => policy.captcha(captcha),
            _ => policy,
        }
    }
}
