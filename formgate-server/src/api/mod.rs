//! HTTP API mounted under `/{namespace}/v1`.
//!
//! # Endpoints
//!
//! - `GET  /nonce?form_id=`      issue a form nonce
//! - `POST /forms/{slug}`        verify and forward a form submission
//! - `POST /payment`             start a payment, returns the gateway redirect
//! - `GET  /payment/methods`     payment methods offered by the gateway (cached)
//! - `POST /payment/response`    gateway callback, answers with a redirect

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use formgate_core::forwarder::ForwardError;
use formgate_core::gateway::GatewayError;
use formgate_core::payment::PaymentError;
use formgate_core::redirect::RedirectError;
use formgate_core::verifier::{Rejection, RejectionCategory};
use formgate_sdk::objects::ErrorBody;
use serde_json::{Value, json};

use crate::state::AppState;

mod forms;
mod nonce;
mod payment;
mod request;

pub use request::InboundRequest;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/nonce", get(nonce::issue_nonce))
        .route("/forms/{slug}", post(forms::submit_form))
        .route("/payment", post(payment::initiate::initiate_payment))
        .route("/payment/methods", get(payment::methods::list_payment_methods))
        .route("/payment/response", post(payment::response::payment_response))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

const BAD_REQUEST_CODE: &str = "rest_bad_request";
const UNAUTHORIZED_MESSAGE: &str = "The request could not be authorized.";

/// Errors returned by API handlers, rendered as an [`ErrorBody`].
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl From<PaymentError> for RouteError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::InvalidAmount(_) | PaymentError::Redirect(RedirectError::Params(_)) => {
                Self::InvalidRequest(err.to_string())
            }
            other => Self::Unexpected(other.into()),
        }
    }
}

impl From<ForwardError> for RouteError {
    fn from(err: ForwardError) -> Self {
        Self::Unexpected(err.into())
    }
}

impl From<GatewayError> for RouteError {
    fn from(err: GatewayError) -> Self {
        Self::Unexpected(err.into())
    }
}

impl RouteError {
    fn status(&self) -> StatusCode {
        match self {
            RouteError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> ErrorBody {
        let status = self.status();
        let (code, message, reason, mut data) = match self {
            RouteError::Rejected(rejection) => {
                let (message, reason) = match rejection.category() {
                    RejectionCategory::Integrity => {
                        (UNAUTHORIZED_MESSAGE.to_owned(), "unauthorized")
                    }
                    _ => (rejection.to_string(), rejection.reason().as_str()),
                };
                (BAD_REQUEST_CODE, message, reason, rejection.details())
            }
            RouteError::InvalidRequest(message) => {
                (BAD_REQUEST_CODE, message.clone(), "invalid_request", json!({}))
            }
            RouteError::NotFound(what) => (
                "rest_not_found",
                format!("{what} not found"),
                "not_found",
                json!({}),
            ),
            RouteError::Unexpected(err) => (
                BAD_REQUEST_CODE,
                "The request could not be processed.".to_owned(),
                "unexpected",
                json!({ "debug": format!("{err:#}") }),
            ),
        };
        if let Value::Object(map) = &mut data {
            map.insert("status".to_owned(), json!(status.as_u16()));
            map.insert("reason".to_owned(), json!(reason));
        }
        ErrorBody {
            code: code.to_owned(),
            message,
            data,
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        match &self {
            RouteError::Rejected(rejection) => {
                tracing::debug!(reason = rejection.reason().as_str(), error = %rejection, "Request rejected");
            }
            RouteError::Unexpected(err) => {
                tracing::error!(error = %err, "API request failed");
            }
            _ => {}
        }
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_rejection_body() {
        let body = RouteError::from(Rejection::MissingPostParams {
            missing: vec!["email".into()],
        })
        .body();
        assert_eq!(body.code, "rest_bad_request");
        assert_eq!(
            body.data,
            json!({"status": 400, "reason": "missing_post_params", "missing-keys": ["email"]})
        );
    }

    #[test]
    fn test_integrity_rejections_share_one_message() {
        let bodies: Vec<_> = [
            Rejection::AuthorizationInvalid,
            Rejection::InvalidNonce,
            Rejection::WrongCaptcha,
        ]
        .into_iter()
        .map(|r| RouteError::from(r).body())
        .collect();
        for body in &bodies {
            assert_eq!(body.message, UNAUTHORIZED_MESSAGE);
            assert_eq!(body.data, json!({"status": 400, "reason": "unauthorized"}));
        }
    }

    #[test]
    fn test_unexpected_error_carries_debug() {
        let err = RouteError::from(anyhow::anyhow!("gateway unreachable"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.body().data["debug"], json!("gateway unreachable"));
    }

    #[test]
    fn test_invalid_amount_is_a_client_error() {
        let err = RouteError::from(PaymentError::InvalidAmount("abc".into()));
        assert!(matches!(err, RouteError::InvalidRequest(_)));
        assert_eq!(err.body().data["reason"], json!("invalid_request"));

        let nested = formgate_sdk::params::ParamsError::TooDeep("redirect-url".into());
        let err = RouteError::from(PaymentError::Redirect(RedirectError::Params(nested)));
        assert!(matches!(err, RouteError::InvalidRequest(_)));
    }
}
