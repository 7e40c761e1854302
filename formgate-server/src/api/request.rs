//! Extractor for the raw parameters of an inbound request.
//!
//! Query strings and `application/x-www-form-urlencoded` bodies are decoded
//! with [`params::parse_query`], JSON bodies with [`params::parse_json`].
//! Verification happens in the handlers, against the route's policy.

use axum::{
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use formgate_core::verifier::RequestParams;
use formgate_sdk::params::{self, Params};

use super::RouteError;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Query and body parameters of a request, plus the body as received.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub params: RequestParams,
    pub raw_body: String,
}

impl<S: Send + Sync> FromRequest<S> for InboundRequest {
    type Rejection = RouteError;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let query = req.uri().query().map(params::parse_query).unwrap_or_default();
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());

        let body_bytes = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_| RouteError::InvalidRequest("failed to read request body".to_owned()))?;
        let raw_body = String::from_utf8(body_bytes.to_vec())
            .map_err(|_| RouteError::InvalidRequest("request body is not valid UTF-8".to_owned()))?;

        let body = parse_body(content_type.as_deref(), &raw_body)?;
        Ok(Self {
            params: RequestParams::new(query, body),
            raw_body,
        })
    }
}

fn parse_body(content_type: Option<&str>, raw_body: &str) -> Result<Params, RouteError> {
    match content_type {
        Some("application/json") => params::parse_json(raw_body)
            .map_err(|e| RouteError::InvalidRequest(format!("invalid JSON body: {e}"))),
        Some("application/x-www-form-urlencoded") => Ok(params::parse_query(raw_body)),
        _ if raw_body.trim().is_empty() => Ok(Params::new()),
        Some(other) => Err(RouteError::InvalidRequest(format!(
            "unsupported content type {other:?}"
        ))),
        None => Ok(params::parse_query(raw_body)),
    }
}
