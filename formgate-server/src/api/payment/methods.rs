use axum::{
    Json,
    extract::{OriginalUri, State},
};
use formgate_core::cache::cache_key;
use formgate_core::config::PAYMENT_INTEGRATION;
use formgate_core::verifier::{Rejection, RoutePolicy};
use formgate_sdk::params::Params;

use crate::api::{InboundRequest, RouteError};
use crate::state::AppState;

const ENDPOINT: &str = "payment-methods";

/// `GET /payment/methods`: payment methods offered by the gateway.
///
/// The gateway's method list takes no input, so answers are cached per
/// route for the configured TTL whatever the query string holds.
pub async fn list_payment_methods(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    request: InboundRequest,
) -> Result<Json<serde_json::Value>, RouteError> {
    let services = state.services().await;
    let policy = RoutePolicy::new("payment/methods").integration(PAYMENT_INTEGRATION);
    services.verifier.verify(&policy, request.params).await?;

    let flow = services
        .payment
        .as_ref()
        .ok_or_else(|| Rejection::IntegrationNotConfigured {
            integration: PAYMENT_INTEGRATION.to_owned(),
        })?;

    let key = cache_key(ENDPOINT, uri.path(), &Params::new());
    let methods = services
        .cache
        .get_or_try_insert_with(key, || async {
            let methods = flow.gateway().list_payment_methods().await?;
            Ok::<_, RouteError>(serde_json::to_value(methods).map_err(anyhow::Error::from)?)
        })
        .await?;
    Ok(Json(methods))
}
