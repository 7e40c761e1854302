//! Request verification pipeline.
//!
//! Every inbound call runs through the same fail-fast sequence:
//!
//! 1. sanitize all params (always)
//! 2. integration presence (if the route names one)
//! 3. authorization hash (if the route's salt is non-empty, or required)
//! 4. nonce (if required)
//! 5. captcha (if attached)
//! 6. required query / body params
//!
//! The first failing stage decides the [`Rejection`]; later stages never
//! run.

use crate::captcha::CaptchaVerifier;
use crate::extensions::{ExtensionRegistry, ParamKind};
use crate::nonce::{FORM_ID_PARAM, NONCE_PARAM, NonceVerifier};
use crate::sanitize::sanitize_params;
use formgate_sdk::params::{ParamValue, Params};
use formgate_sdk::signature::{self, AuthorizationSalt, SIGNATURE_PARAM};
use serde_json::json;
use std::sync::Arc;

/// Query and body parameters of one inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pub query: Params,
    pub body: Params,
}

impl RequestParams {
    pub fn new(query: Params, body: Params) -> Self {
        Self { query, body }
    }

    /// Query and body in one map; body values win on key collisions.
    pub fn merged(&self) -> Params {
        let mut all = self.query.clone();
        all.extend(self.body.iter().map(|(k, v)| (k.clone(), v.clone())));
        all
    }

    fn sanitized(self) -> Self {
        Self {
            query: sanitize_params(self.query),
            body: sanitize_params(self.body),
        }
    }
}

/// Parameters of a request that passed verification, already sanitized and
/// stripped of the authorization hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedParams {
    /// Query and body merged.
    pub params: Params,
    pub query: Params,
    pub body: Params,
}

impl VerifiedParams {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(ParamValue::as_str)
    }
}

/// Stable machine-readable rejection reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    IntegrationNotConfigured,
    AuthorizationInvalid,
    InvalidNonce,
    WrongCaptcha,
    MissingParams,
    MissingPostParams,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::IntegrationNotConfigured => "integration_not_configured",
            RejectionReason::AuthorizationInvalid => "authorization_invalid",
            RejectionReason::InvalidNonce => "invalid_nonce",
            RejectionReason::WrongCaptcha => "wrong_captcha",
            RejectionReason::MissingParams => "missing_params",
            RejectionReason::MissingPostParams => "missing_post_params",
        }
    }
}

/// Coarse grouping of rejections, used to decide how much to reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionCategory {
    Configuration,
    Integrity,
    Validation,
}

/// Why a request failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("integration `{integration}` is not configured")]
    IntegrationNotConfigured { integration: String },
    #[error("authorization hash is missing or invalid")]
    AuthorizationInvalid,
    #[error("nonce is missing or invalid")]
    InvalidNonce,
    #[error("captcha check failed")]
    WrongCaptcha,
    #[error("missing required parameters: {}", missing.join(", "))]
    MissingParams { missing: Vec<String> },
    #[error("missing required body parameters: {}", missing.join(", "))]
    MissingPostParams { missing: Vec<String> },
}

impl Rejection {
    pub fn reason(&self) -> RejectionReason {
        match self {
            Rejection::IntegrationNotConfigured { .. } => RejectionReason::IntegrationNotConfigured,
            Rejection::AuthorizationInvalid => RejectionReason::AuthorizationInvalid,
            Rejection::InvalidNonce => RejectionReason::InvalidNonce,
            Rejection::WrongCaptcha => RejectionReason::WrongCaptcha,
            Rejection::MissingParams { .. } => RejectionReason::MissingParams,
            Rejection::MissingPostParams { .. } => RejectionReason::MissingPostParams,
        }
    }

    pub fn category(&self) -> RejectionCategory {
        match self {
            Rejection::IntegrationNotConfigured { .. } => RejectionCategory::Configuration,
            Rejection::AuthorizationInvalid | Rejection::InvalidNonce | Rejection::WrongCaptcha => {
                RejectionCategory::Integrity
            }
            Rejection::MissingParams { .. } | Rejection::MissingPostParams { .. } => {
                RejectionCategory::Validation
            }
        }
    }

    /// Detail payload, e.g. `{"missing-keys": ["first_name"]}`.
    pub fn details(&self) -> serde_json::Value {
        match self {
            Rejection::IntegrationNotConfigured { integration } => {
                json!({ "integration": integration })
            }
            Rejection::MissingParams { missing } | Rejection::MissingPostParams { missing } => {
                json!({ "missing-keys": missing })
            }
            Rejection::AuthorizationInvalid | Rejection::InvalidNonce | Rejection::WrongCaptcha => {
                json!({})
            }
        }
    }
}

/// Verification requirements of one route.
#[derive(Clone, Default)]
pub struct RoutePolicy {
    /// Route name, passed to the required-params extension point.
    pub route: String,
    pub required_integration: Option<String>,
    pub salt: AuthorizationSalt,
    /// Refuse every request when `salt` is empty.
    pub require_authorization: bool,
    pub require_nonce: bool,
    pub captcha: Option<Arc<dyn CaptchaVerifier>>,
    pub required_params: Vec<String>,
    pub required_post_params: Vec<String>,
}

impl RoutePolicy {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            ..Self::default()
        }
    }

    pub fn integration(mut self, name: impl Into<String>) -> Self {
        self.required_integration = Some(name.into());
        self
    }

    pub fn salt(mut self, salt: AuthorizationSalt) -> Self {
        self.salt = salt;
        self
    }

    pub fn require_authorization(mut self) -> Self {
        self.require_authorization = true;
        self
    }

    pub fn require_nonce(mut self) -> Self {
        self.require_nonce = true;
        self
    }

    pub fn captcha(mut self, captcha: Arc<dyn CaptchaVerifier>) -> Self {
        self.captcha = Some(captcha);
        self
    }

    pub fn required_params<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_params = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn required_post_params<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_post_params = keys.into_iter().map(Into::into).collect();
        self
    }
}

impl std::fmt::Debug for RoutePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutePolicy")
            .field("route", &self.route)
            .field("required_integration", &self.required_integration)
            .field("salt", &self.salt)
            .field("require_authorization", &self.require_authorization)
            .field("require_nonce", &self.require_nonce)
            .field("captcha", &self.captcha.is_some())
            .field("required_params", &self.required_params)
            .field("required_post_params", &self.required_post_params)
            .finish()
    }
}

/// Runs the verification pipeline.
#[derive(Clone)]
pub struct RequestVerifier {
    extensions: Arc<ExtensionRegistry>,
    nonces: Arc<dyn NonceVerifier>,
}

impl RequestVerifier {
    pub fn new(extensions: Arc<ExtensionRegistry>, nonces: Arc<dyn NonceVerifier>) -> Self {
        Self { extensions, nonces }
    }

    pub fn extensions(&self) -> &Arc<ExtensionRegistry> {
        &self.extensions
    }

    pub async fn verify(
        &self,
        policy: &RoutePolicy,
        request: RequestParams,
    ) -> Result<VerifiedParams, Rejection> {
        let result = self.run(policy, request).await;
        if let Err(rejection) = &result {
            tracing::debug!(
                route = %policy.route,
                reason = rejection.reason().as_str(),
                "Request rejected"
            );
        }
        result
    }

    async fn run(
        &self,
        policy: &RoutePolicy,
        request: RequestParams,
    ) -> Result<VerifiedParams, Rejection> {
        let request = request.sanitized();

        self.check_integration(policy)?;
        let query = check_authorization(policy, request.query)?;
        let request = RequestParams::new(query, request.body);
        let params = request.merged();

        self.check_nonce(policy, &params)?;
        check_captcha(policy, &params).await?;
        self.check_required(policy, &request)?;

        Ok(VerifiedParams {
            params,
            query: request.query,
            body: request.body,
        })
    }

    fn check_integration(&self, policy: &RoutePolicy) -> Result<(), Rejection> {
        let Some(name) = &policy.required_integration else {
            return Ok(());
        };
        match self.extensions.integration(name) {
            Some(handler) if handler.is_ready() => Ok(()),
            _ => Err(Rejection::IntegrationNotConfigured {
                integration: name.clone(),
            }),
        }
    }

    fn check_nonce(&self, policy: &RoutePolicy, params: &Params) -> Result<(), Rejection> {
        if !policy.require_nonce {
            return Ok(());
        }
        let token = params.get(NONCE_PARAM).and_then(ParamValue::as_str);
        let form_id = params.get(FORM_ID_PARAM).and_then(ParamValue::as_str);
        match (token, form_id) {
            (Some(token), Some(form_id)) if self.nonces.verify_nonce(token, form_id) => Ok(()),
            _ => Err(Rejection::InvalidNonce),
        }
    }

    fn check_required(&self, policy: &RoutePolicy, request: &RequestParams) -> Result<(), Rejection> {
        let required = self.extensions.required_params(
            &policy.route,
            ParamKind::Query,
            policy.required_params.clone(),
        );
        let missing = missing_keys(&required, &request.query);
        if !missing.is_empty() {
            return Err(Rejection::MissingParams { missing });
        }

        let required = self.extensions.required_params(
            &policy.route,
            ParamKind::Body,
            policy.required_post_params.clone(),
        );
        let missing = missing_keys(&required, &request.body);
        if !missing.is_empty() {
            return Err(Rejection::MissingPostParams { missing });
        }
        Ok(())
    }
}

impl std::fmt::Debug for RequestVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestVerifier")
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

/// Pull the hash out of the query and check it. Returns the query without
/// the hash.
fn check_authorization(policy: &RoutePolicy, mut query: Params) -> Result<Params, Rejection> {
    let signature = query.remove(SIGNATURE_PARAM);
    if policy.salt.is_empty() {
        return if policy.require_authorization {
            tracing::warn!(route = %policy.route, "Route requires authorization but has no salt");
            Err(Rejection::AuthorizationInvalid)
        } else {
            Ok(query)
        };
    }

    let Some(ParamValue::Text(signature)) = signature else {
        return Err(Rejection::AuthorizationInvalid);
    };
    if signature::verify_hash(&signature, &query, policy.salt.as_bytes()) {
        Ok(query)
    } else {
        Err(Rejection::AuthorizationInvalid)
    }
}

async fn check_captcha(policy: &RoutePolicy, params: &Params) -> Result<(), Rejection> {
    match &policy.captcha {
        Some(captcha) if !captcha.check_captcha_from_params(params).await => {
            Err(Rejection::WrongCaptcha)
        }
        _ => Ok(()),
    }
}

fn missing_keys(required: &[String], params: &Params) -> Vec<String> {
    required
        .iter()
        .filter(|key| params.get(key.as_str()).is_none_or(ParamValue::is_blank))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::IntegrationHandler;
    use crate::nonce::NonceService;
    use async_trait::async_trait;
    use formgate_sdk::params::parse_query;

    struct FixedCaptcha(bool);

    #[async_trait]
    impl CaptchaVerifier for FixedCaptcha {
        async fn check_captcha_from_params(&self, _params: &Params) -> bool {
            self.0
        }
    }

    fn nonces() -> NonceService {
        NonceService::new(b"nonce-secret".to_vec(), 3600)
    }

    fn verifier(extensions: ExtensionRegistry) -> RequestVerifier {
        RequestVerifier::new(Arc::new(extensions), Arc::new(nonces()))
    }

    fn query(input: &str) -> RequestParams {
        RequestParams::new(parse_query(input), Params::new())
    }

    fn signed_query(params: &str, salt: &str) -> String {
        let hash = signature::generate_hash(&parse_query(params), salt.as_bytes()).unwrap();
        format!("{params}&hmac={hash}")
    }

    #[tokio::test]
    async fn test_signed_request_is_verified() {
        let policy = RoutePolicy::new("payment").salt("s3cret".into());
        let verified = verifier(ExtensionRegistry::new())
            .verify(&policy, query(&signed_query("amount=10.00", "s3cret")))
            .await
            .unwrap();
        assert_eq!(
            verified.params,
            Params::from([("amount".to_owned(), "10.00".into())])
        );
    }

    #[tokio::test]
    async fn test_hash_appended_verbatim_is_verified() {
        let hash = signature::generate_hash(&parse_query("amount=10.01"), b"s3cret").unwrap();
        assert!(hash.contains(['-', '_']), "{hash}");

        let policy = RoutePolicy::new("payment").salt("s3cret".into());
        let verified = verifier(ExtensionRegistry::new())
            .verify(&policy, query(&format!("amount=10.01&hmac={hash}")))
            .await
            .unwrap();
        assert_eq!(verified.get_str("amount"), Some("10.01"));
    }

    #[tokio::test]
    async fn test_wrong_hash_is_rejected() {
        let policy = RoutePolicy::new("payment").salt("s3cret".into());
        let result = verifier(ExtensionRegistry::new())
            .verify(&policy, query("amount=10.00&hmac=WRONG"))
            .await;
        assert_eq!(result, Err(Rejection::AuthorizationInvalid));

        let result = verifier(ExtensionRegistry::new())
            .verify(&policy, query("amount=10.00"))
            .await;
        assert_eq!(result, Err(Rejection::AuthorizationInvalid));
    }

    #[tokio::test]
    async fn test_signature_covers_query_only() {
        let policy = RoutePolicy::new("payment/response").salt("s3cret".into());
        let request = RequestParams::new(
            parse_query(&signed_query("amount=10.00&status=success", "s3cret")),
            parse_query("BRQ_STATUSCODE=190"),
        );
        let verified = verifier(ExtensionRegistry::new())
            .verify(&policy, request)
            .await
            .unwrap();
        assert_eq!(verified.get_str("BRQ_STATUSCODE"), Some("190"));
        assert!(!verified.params.contains_key(SIGNATURE_PARAM));
    }

    #[tokio::test]
    async fn test_required_authorization_without_salt_refuses() {
        let policy = RoutePolicy::new("payment/response").require_authorization();
        let result = verifier(ExtensionRegistry::new())
            .verify(&policy, query(&signed_query("a=1", "")))
            .await;
        assert_eq!(result, Err(Rejection::AuthorizationInvalid));
    }

    #[tokio::test]
    async fn test_empty_salt_skips_authorization() {
        let policy = RoutePolicy::new("forms/contact");
        let verified = verifier(ExtensionRegistry::new())
            .verify(&policy, query("a=1&hmac=anything"))
            .await
            .unwrap();
        assert!(!verified.params.contains_key(SIGNATURE_PARAM));
    }

    #[tokio::test]
    async fn test_missing_post_params_are_listed() {
        let policy = RoutePolicy::new("forms/contact").required_post_params(["email", "first_name"]);
        let request = RequestParams::new(Params::new(), parse_query("email=a%40b.com"));
        let rejection = verifier(ExtensionRegistry::new())
            .verify(&policy, request)
            .await
            .unwrap_err();
        assert_eq!(
            rejection,
            Rejection::MissingPostParams {
                missing: vec!["first_name".into()]
            }
        );
        assert_eq!(rejection.details(), json!({ "missing-keys": ["first_name"] }));
    }

    #[tokio::test]
    async fn test_query_params_are_checked_first() {
        let policy = RoutePolicy::new("r")
            .required_params(["status"])
            .required_post_params(["email"]);
        let rejection = verifier(ExtensionRegistry::new())
            .verify(&policy, RequestParams::default())
            .await
            .unwrap_err();
        assert_eq!(rejection.reason(), RejectionReason::MissingParams);
    }

    #[tokio::test]
    async fn test_blank_values_count_as_missing() {
        let policy = RoutePolicy::new("r").required_params(["status"]);
        let rejection = verifier(ExtensionRegistry::new())
            .verify(&policy, query("status=%20<b></b>"))
            .await
            .unwrap_err();
        assert_eq!(
            rejection,
            Rejection::MissingParams {
                missing: vec!["status".into()]
            }
        );
    }

    #[tokio::test]
    async fn test_authorization_fails_before_required_params() {
        let policy = RoutePolicy::new("payment")
            .salt("s3cret".into())
            .required_params(["status"]);
        let result = verifier(ExtensionRegistry::new())
            .verify(&policy, query("hmac=WRONG"))
            .await;
        assert_eq!(result, Err(Rejection::AuthorizationInvalid));
    }

    #[tokio::test]
    async fn test_integration_gate_runs_first() {
        let policy = RoutePolicy::new("payment")
            .integration("payment")
            .salt("s3cret".into());
        let result = verifier(ExtensionRegistry::new())
            .verify(&policy, query("hmac=WRONG"))
            .await;
        assert_eq!(
            result,
            Err(Rejection::IntegrationNotConfigured {
                integration: "payment".into()
            })
        );

        let registry = ExtensionRegistry::new().with_integration(IntegrationHandler::new("payment"));
        let result = verifier(registry)
            .verify(&policy, query(&signed_query("a=1", "s3cret")))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unready_integration_is_not_configured() {
        let policy = RoutePolicy::new("forms/jobs").integration("greenhouse");
        let registry = ExtensionRegistry::new()
            .with_integration(IntegrationHandler::with_readiness("greenhouse", || false));
        let result = verifier(registry).verify(&policy, RequestParams::default()).await;
        assert_eq!(result.unwrap_err().reason(), RejectionReason::IntegrationNotConfigured);
    }

    #[tokio::test]
    async fn test_nonce_stage() {
        let policy = RoutePolicy::new("forms/contact").require_nonce();
        let token = nonces().issue("contact-1");
        let v = verifier(ExtensionRegistry::new());

        let body = Params::from([
            (NONCE_PARAM.to_owned(), token.clone().into()),
            (FORM_ID_PARAM.to_owned(), "contact-1".into()),
        ]);
        assert!(v.verify(&policy, RequestParams::new(Params::new(), body)).await.is_ok());

        let wrong_form = Params::from([
            (NONCE_PARAM.to_owned(), token.into()),
            (FORM_ID_PARAM.to_owned(), "contact-2".into()),
        ]);
        assert_eq!(
            v.verify(&policy, RequestParams::new(Params::new(), wrong_form)).await,
            Err(Rejection::InvalidNonce)
        );
        assert_eq!(
            v.verify(&policy, RequestParams::default()).await,
            Err(Rejection::InvalidNonce)
        );
    }

    #[tokio::test]
    async fn test_authorization_stage_precedes_nonce() {
        let policy = RoutePolicy::new("payment")
            .salt("s3cret".into())
            .require_nonce();
        let result = verifier(ExtensionRegistry::new())
            .verify(&policy, query("amount=10.00&hmac=WRONG"))
            .await;
        assert_eq!(result, Err(Rejection::AuthorizationInvalid));

        // With a valid signature the same request stops at the nonce.
        let result = verifier(ExtensionRegistry::new())
            .verify(&policy, query(&signed_query("amount=10.00", "s3cret")))
            .await;
        assert_eq!(result, Err(Rejection::InvalidNonce));
    }

    #[tokio::test]
    async fn test_nonce_stage_precedes_captcha() {
        let v = verifier(ExtensionRegistry::new());
        let policy = RoutePolicy::new("forms/contact")
            .require_nonce()
            .captcha(Arc::new(FixedCaptcha(false)));
        let body = Params::from([
            (NONCE_PARAM.to_owned(), "forged".into()),
            (FORM_ID_PARAM.to_owned(), "contact-1".into()),
        ]);
        assert_eq!(
            v.verify(&policy, RequestParams::new(Params::new(), body)).await,
            Err(Rejection::InvalidNonce)
        );

        let body = Params::from([
            (NONCE_PARAM.to_owned(), nonces().issue("contact-1").into()),
            (FORM_ID_PARAM.to_owned(), "contact-1".into()),
        ]);
        assert_eq!(
            v.verify(&policy, RequestParams::new(Params::new(), body)).await,
            Err(Rejection::WrongCaptcha)
        );
    }

    #[tokio::test]
    async fn test_captcha_stage_precedes_required_params() {
        let v = verifier(ExtensionRegistry::new());
        let failing = RoutePolicy::new("forms/contact")
            .captcha(Arc::new(FixedCaptcha(false)))
            .required_post_params(["email"]);
        assert_eq!(
            v.verify(&failing, RequestParams::default()).await,
            Err(Rejection::WrongCaptcha)
        );

        let passing = RoutePolicy::new("forms/contact").captcha(Arc::new(FixedCaptcha(true)));
        assert!(v.verify(&passing, RequestParams::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_required_params_override() {
        let registry = ExtensionRegistry::new().with_required_params_override(|route, kind, mut list| {
            if route == "forms/contact" && kind == ParamKind::Body {
                list.push("phone".into());
            }
            list
        });
        let policy = RoutePolicy::new("forms/contact").required_post_params(["email"]);
        let request = RequestParams::new(Params::new(), parse_query("email=a%40b.com"));
        assert_eq!(
            verifier(registry).verify(&policy, request).await,
            Err(Rejection::MissingPostParams {
                missing: vec!["phone".into()]
            })
        );
    }

    #[tokio::test]
    async fn test_markup_is_stripped_from_verified_params() {
        let request = RequestParams::new(
            parse_query("name=<b>Jo</b>"),
            parse_query("note=hi<script>alert(1)</script>"),
        );
        let verified = verifier(ExtensionRegistry::new())
            .verify(&RoutePolicy::new("forms/contact"), request)
            .await
            .unwrap();
        assert_eq!(verified.get_str("name"), Some("Jo"));
        assert_eq!(verified.get_str("note"), Some("hi"));
    }

    #[test]
    fn test_integrity_rejections_share_a_category() {
        for rejection in [
            Rejection::AuthorizationInvalid,
            Rejection::InvalidNonce,
            Rejection::WrongCaptcha,
        ] {
            assert_eq!(rejection.category(), RejectionCategory::Integrity);
            assert_eq!(rejection.details(), json!({}));
        }
    }
}
