//! Payment callback dispatcher.
//!
//! The gateway calls one of the signed URLs built by
//! [`SignedRedirectBuilder`](crate::redirect::SignedRedirectBuilder) and
//! reports its own status code in the POST body. The dispatcher verifies
//! the callback, reads the status, runs the payment hooks and decides
//! where the browser goes next.
//!
//! | gateway code       | status      | embedded destination   |
//! |--------------------|-------------|------------------------|
//! | 190                | success     | `redirect-url`         |
//! | 490, 491, 492      | error       | `redirect-url-error`   |
//! | 690                | reject      | `redirect-url-reject`  |
//! | 890, 891           | cancelled   | `redirect-url-cancel`  |

use crate::extensions::PaymentCallback;
use crate::redirect::STATUS_PARAM;
use crate::verifier::{Rejection, RequestParams, RequestVerifier, RoutePolicy};
use formgate_sdk::objects::{OutcomeTag, PaymentStatus};
use formgate_sdk::params::{ParamValue, Params};
use url::Url;

/// Body field carrying the gateway's status code.
pub const GATEWAY_STATUS_FIELD: &str = "BRQ_STATUSCODE";

/// Query parameter appended to the home URL when the gateway response
/// could not be understood.
pub const ERROR_MARKER_PARAM: &str = "formgate-error";

const INVALID_RESPONSE_MARKER: &str = "invalid-gateway-response";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayResponseError {
    #[error("gateway response carries no status code")]
    MissingStatusCode,
    #[error("unrecognized gateway status code `{0}`")]
    UnrecognizedStatus(String),
}

/// Turns a gateway callback body into a [`PaymentStatus`].
pub struct ResponseFactory;

impl ResponseFactory {
    pub fn parse(body: &Params) -> Result<PaymentStatus, GatewayResponseError> {
        let code = body
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(GATEWAY_STATUS_FIELD))
            .and_then(|(_, value)| value.as_str())
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .ok_or(GatewayResponseError::MissingStatusCode)?;

        match code {
            "190" => Ok(PaymentStatus::Success),
            "490" | "491" | "492" => Ok(PaymentStatus::Error),
            "690" => Ok(PaymentStatus::Reject),
            "890" | "891" => Ok(PaymentStatus::Cancelled),
            other => Err(GatewayResponseError::UnrecognizedStatus(other.to_owned())),
        }
    }
}

/// Where a verified callback sends the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub location: Url,
    /// `None` when the gateway response was not understood.
    pub status: Option<PaymentStatus>,
}

pub struct ResponseDispatcher {
    verifier: RequestVerifier,
    home: Url,
    allowed_origins: Vec<String>,
}

impl ResponseDispatcher {
    /// `allowed_origins` lists extra origins (`https://shop.example.com`)
    /// besides the home URL's own that redirects may point at.
    pub fn new(verifier: RequestVerifier, home: Url, allowed_origins: Vec<String>) -> Self {
        Self {
            verifier,
            home,
            allowed_origins,
        }
    }

    pub async fn dispatch(
        &self,
        policy: &RoutePolicy,
        request: RequestParams,
        raw_body: &str,
    ) -> Result<Dispatched, Rejection> {
        let verified = self.verifier.verify(policy, request).await?;

        let status = match ResponseFactory::parse(&verified.body) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, route = %policy.route, "Invalid gateway response");
                return Ok(Dispatched {
                    location: self.diagnostic_redirect(),
                    status: None,
                });
            }
        };

        let location = self.resolve_location(status, &verified.query);

        self.verifier
            .extensions()
            .dispatch_payment_callback(&PaymentCallback {
                status,
                outcome_tag: outcome_tag(&verified.query),
                params: verified.params,
                raw_body: raw_body.to_owned(),
            });

        tracing::info!(status = %status, location = %location, "Payment callback dispatched");
        Ok(Dispatched {
            location,
            status: Some(status),
        })
    }

    /// Redirect parameters are read from the signed query only. Query
    /// parsing has already percent-decoded them once; escapes left in the
    /// value belong to the target URL itself.
    fn resolve_location(&self, status: PaymentStatus, query: &Params) -> Url {
        let param = status.redirect_param();
        let candidate = query
            .get(param)
            .and_then(ParamValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let Some(candidate) = candidate else {
            return self.default_destination();
        };

        match self.home.join(candidate) {
            Ok(url) if self.is_allowed(&url) => url,
            Ok(url) => {
                tracing::warn!(param, target = %url, "Refusing cross-origin redirect");
                self.default_destination()
            }
            Err(e) => {
                tracing::warn!(param, error = %e, "Unparseable redirect target");
                self.default_destination()
            }
        }
    }

    fn is_allowed(&self, url: &Url) -> bool {
        let origin = url.origin();
        if origin == self.home.origin() {
            return true;
        }
        let serialized = origin.unicode_serialization();
        self.allowed_origins.iter().any(|allowed| allowed == &serialized)
    }

    fn default_destination(&self) -> Url {
        self.verifier
            .extensions()
            .resolve_default_redirect(self.home.clone())
    }

    fn diagnostic_redirect(&self) -> Url {
        let mut url = self.home.clone();
        url.query_pairs_mut()
            .append_pair(ERROR_MARKER_PARAM, INVALID_RESPONSE_MARKER);
        url
    }
}

fn outcome_tag(query: &Params) -> Option<OutcomeTag> {
    let tag = query.get(STATUS_PARAM).and_then(ParamValue::as_str)?;
    OutcomeTag::ALL.into_iter().find(|t| t.as_str() == tag)
}
