//! Application state shared across all request handlers.

use formgate_core::cache::ResponseCache;
use formgate_core::captcha::{CaptchaVerifier, SiteVerifyCaptcha};
use formgate_core::config::{
    CALLBACK_ROUTE, INITIATE_ROUTE, PAYMENT_INTEGRATION, RuntimeConfig,
};
use formgate_core::dispatcher::ResponseDispatcher;
use formgate_core::extensions::{ExtensionRegistry, IntegrationHandler, PaymentCallback};
use formgate_core::forwarder::FormForwarder;
use formgate_core::gateway::{HttpPaymentGateway, PaymentGateway};
use formgate_core::nonce::NonceService;
use formgate_core::payment::{INVOICE_PARAM, PaymentFlow};
use formgate_core::redirect::SignedRedirectBuilder;
use formgate_core::verifier::{RequestVerifier, RoutePolicy};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Application state that is shared across all request handlers.
///
/// Cloning is cheap. The services are swapped as a whole on SIGHUP; a
/// request that already took a snapshot finishes with the old one.
#[derive(Clone)]
pub struct AppState {
    services: Arc<RwLock<Arc<Services>>>,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(RwLock::new(Arc::new(services))),
        }
    }

    /// The services for one request.
    pub async fn services(&self) -> Arc<Services> {
        self.services.read().await.clone()
    }

    /// Replace all services (used during SIGHUP reload).
    pub async fn replace(&self, services: Services) {
        *self.services.write().await = Arc::new(services);
    }
}

/// Everything built from one [`RuntimeConfig`].
pub struct Services {
    pub config: RuntimeConfig,
    pub verifier: RequestVerifier,
    pub dispatcher: ResponseDispatcher,
    pub nonces: Arc<NonceService>,
    pub captcha: Option<Arc<dyn CaptchaVerifier>>,
    pub payment: Option<PaymentFlow>,
    pub forwarder: FormForwarder,
    pub cache: ResponseCache,
}

impl Services {
    pub fn from_config(config: RuntimeConfig) -> Result<Self, url::ParseError> {
        let gateway = config.payment.as_ref().map(|payment| {
            Arc::new(HttpPaymentGateway::new(
                payment.gateway_url.clone(),
                payment.gateway_secret.clone(),
            )) as Arc<dyn PaymentGateway>
        });
        Self::with_gateway(config, gateway)
    }

    /// Build the services around an explicit gateway client.
    pub fn with_gateway(
        config: RuntimeConfig,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Result<Self, url::ParseError> {
        let extensions = Arc::new(build_extensions(&config));
        let nonces = Arc::new(NonceService::new(
            config.nonce.secret.clone(),
            config.nonce.lifetime_secs,
        ));
        let verifier = RequestVerifier::new(extensions, nonces.clone());
        let dispatcher = ResponseDispatcher::new(
            verifier.clone(),
            config.server.home_url.clone(),
            config.server.allowed_redirect_origins.clone(),
        );
        let captcha = config.captcha.as_ref().map(|captcha| {
            Arc::new(SiteVerifyCaptcha::new(
                captcha.verify_url.clone(),
                captcha.secret.clone(),
            )) as Arc<dyn CaptchaVerifier>
        });

        let payment = match (&config.payment, gateway) {
            (Some(payment), Some(gateway)) => {
                let callback = config.server.home_url.join(&format!(
                    "/{}/v1/{CALLBACK_ROUTE}",
                    config.server.namespace
                ))?;
                Some(PaymentFlow::new(
                    gateway,
                    SignedRedirectBuilder::new(callback, payment.salt.clone()),
                    payment.currency.clone(),
                ))
            }
            _ => None,
        };

        let cache = ResponseCache::new(
            time::Duration::seconds(i64::try_from(config.cache.ttl_secs).unwrap_or(i64::MAX)),
            config.cache.capacity,
        );

        Ok(Self {
            config,
            verifier,
            dispatcher,
            nonces,
            captcha,
            payment,
            forwarder: FormForwarder::new(),
            cache,
        })
    }

    pub fn initiate_policy(&self) -> RoutePolicy {
        match &self.config.payment {
            Some(payment) => payment.initiate_policy(self.captcha.clone()),
            None => RoutePolicy::new(INITIATE_ROUTE).integration(PAYMENT_INTEGRATION),
        }
    }

    pub fn callback_policy(&self) -> RoutePolicy {
        match &self.config.payment {
            Some(payment) => payment.callback_policy(),
            None => RoutePolicy::new(CALLBACK_ROUTE).integration(PAYMENT_INTEGRATION),
        }
    }
}

fn build_extensions(config: &RuntimeConfig) -> ExtensionRegistry {
    config
        .configured_integrations()
        .into_iter()
        .fold(ExtensionRegistry::new(), |registry, name| {
            registry.with_integration(IntegrationHandler::new(name))
        })
        .with_payment_callback(log_payment_callback)
}

fn log_payment_callback(callback: &PaymentCallback) {
    let invoice = callback
        .params
        .get(INVOICE_PARAM)
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    tracing::info!(
        invoice = %invoice,
        status = %callback.status,
        outcome_tag = ?callback.outcome_tag,
        "Payment outcome received"
    );
}
