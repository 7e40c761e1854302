//! Extension points.
//!
//! An [`ExtensionRegistry`] is built once at startup and handed to the
//! components that consult it. Each extension point has a typed signature
//! and a no-op default:
//!
//! | point                     | default                          |
//! |---------------------------|----------------------------------|
//! | integration handler       | absent (integration unavailable) |
//! | required-params override  | returns the route's own list     |
//! | payment callback hooks    | none                             |
//! | default redirect resolver | returns the home URL             |

use formgate_sdk::objects::{OutcomeTag, PaymentStatus};
use formgate_sdk::params::Params;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use url::Url;

/// Which required-parameter list an override applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Query,
    Body,
}

/// A registered third-party integration.
#[derive(Clone)]
pub struct IntegrationHandler {
    name: String,
    ready: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl IntegrationHandler {
    /// An integration that is always ready once registered.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ready: Arc::new(|| true),
        }
    }

    /// An integration whose readiness is checked on every request, e.g.
    /// "credentials present".
    pub fn with_readiness(
        name: impl Into<String>,
        ready: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            ready: Arc::new(ready),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        (self.ready)()
    }
}

impl std::fmt::Debug for IntegrationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationHandler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Payload handed to payment callback hooks after a verified gateway
/// callback.
#[derive(Debug, Clone)]
pub struct PaymentCallback {
    pub status: PaymentStatus,
    /// The `status` tag of the signed URL the gateway called back, if it
    /// parsed.
    pub outcome_tag: Option<OutcomeTag>,
    pub params: Params,
    pub raw_body: String,
}

type RequiredParamsOverride = Arc<dyn Fn(&str, ParamKind, Vec<String>) -> Vec<String> + Send + Sync>;
type PaymentCallbackHook = Arc<dyn Fn(&PaymentCallback) + Send + Sync>;
type DefaultRedirectResolver = Arc<dyn Fn(Url) -> Url + Send + Sync>;

/// Typed registry of extension points.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    integrations: HashMap<String, IntegrationHandler>,
    required_params: Option<RequiredParamsOverride>,
    payment_callbacks: Vec<PaymentCallbackHook>,
    default_redirect: Option<DefaultRedirectResolver>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_integration(mut self, handler: IntegrationHandler) -> Self {
        self.integrations.insert(handler.name.clone(), handler);
        self
    }

    /// Replace the required-parameter lists of routes. The closure receives
    /// the route name, the list kind and the route's default list.
    pub fn with_required_params_override(
        mut self,
        f: impl Fn(&str, ParamKind, Vec<String>) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.required_params = Some(Arc::new(f));
        self
    }

    pub fn with_payment_callback(
        mut self,
        hook: impl Fn(&PaymentCallback) + Send + Sync + 'static,
    ) -> Self {
        self.payment_callbacks.push(Arc::new(hook));
        self
    }

    pub fn with_default_redirect(
        mut self,
        f: impl Fn(Url) -> Url + Send + Sync + 'static,
    ) -> Self {
        self.default_redirect = Some(Arc::new(f));
        self
    }

    /// The handler for `name`, or `None` if the integration was never
    /// registered.
    pub fn integration(&self, name: &str) -> Option<&IntegrationHandler> {
        self.integrations.get(name)
    }

    pub fn required_params(&self, route: &str, kind: ParamKind, default: Vec<String>) -> Vec<String> {
        match &self.required_params {
            Some(f) => f(route, kind, default),
            None => default,
        }
    }

    /// Run every payment callback hook. A panicking hook is logged and
    /// skipped; the remaining hooks still run.
    pub fn dispatch_payment_callback(&self, callback: &PaymentCallback) {
        for (index, hook) in self.payment_callbacks.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| hook(callback))).is_err() {
                tracing::error!(hook = index, status = %callback.status, "Payment callback hook panicked");
            }
        }
    }

    pub fn resolve_default_redirect(&self, default: Url) -> Url {
        match &self.default_redirect {
            Some(f) => f(default),
            None => default,
        }
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("integrations", &self.integrations.keys().collect::<Vec<_>>())
            .field("required_params", &self.required_params.is_some())
            .field("payment_callbacks", &self.payment_callbacks.len())
            .field("default_redirect", &self.default_redirect.is_some())
            .finish()
    }
}
