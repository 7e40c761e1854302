//! Payment integration configuration.

use crate::captcha::CaptchaVerifier;
use crate::redirect::STATUS_PARAM;
use crate::verifier::RoutePolicy;
use formgate_sdk::signature::AuthorizationSalt;
use std::sync::Arc;
use url::Url;

/// Integration name every payment route depends on.
pub const PAYMENT_INTEGRATION: &str = "payment";
pub const INITIATE_ROUTE: &str = "payment";
pub const CALLBACK_ROUTE: &str = "payment/response";

#[derive(Clone)]
pub struct PaymentConfig {
    /// Gateway API root.
    pub gateway_url: Url,
    /// Key for signing request bodies sent to the gateway.
    pub gateway_secret: Box<[u8]>,
    /// Key for the `hmac` on callback URLs.
    pub salt: AuthorizationSalt,
    pub currency: String,
    /// Refuse callbacks outright while `salt` is empty.
    pub require_authorization: bool,
    pub nonce: bool,
    pub captcha: bool,
}

impl PaymentConfig {
    pub fn initiate_policy(&self, captcha: Option<Arc<dyn CaptchaVerifier>>) -> RoutePolicy {
        let mut policy = RoutePolicy::new(INITIATE_ROUTE)
            .integration(PAYMENT_INTEGRATION)
            .required_post_params(["amount"]);
        if self.nonce {
            policy = policy.require_nonce();
        }
        match captcha {
            Some(captcha) if self.captcha => policy.captcha(captcha),
            _ => policy,
        }
    }

    /// Policy for the gateway callback. Redirect parameters are optional;
    /// a missing one falls back to the default destination.
    pub fn callback_policy(&self) -> RoutePolicy {
        let mut policy = RoutePolicy::new(CALLBACK_ROUTE)
            .integration(PAYMENT_INTEGRATION)
            .salt(self.salt.clone())
            .required_params([STATUS_PARAM]);
        if self.require_authorization {
            policy = policy.require_authorization();
        }
        policy
    }
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("gateway_url", &self.gateway_url.as_str())
            .field("salt", &self.salt)
            .field("currency", &self.currency)
            .field("require_authorization", &self.require_authorization)
            .field("nonce", &self.nonce)
            .field("captcha", &self.captcha)
            .finish_non_exhaustive()
    }
}
