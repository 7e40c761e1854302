use axum::{Json, extract::State};
use formgate_core::config::PAYMENT_INTEGRATION;
use formgate_core::verifier::Rejection;
use formgate_sdk::objects::PaymentInitiated;

use crate::api::{InboundRequest, RouteError};
use crate::state::AppState;

/// `POST /payment`: start a gateway transaction.
///
/// The response carries the gateway URL the browser must visit next.
pub async fn initiate_payment(
    State(state): State<AppState>,
    request: InboundRequest,
) -> Result<Json<PaymentInitiated>, RouteError> {
    let services = state.services().await;
    let verified = services
        .verifier
        .verify(&services.initiate_policy(), request.params)
        .await?;

    let flow = services
        .payment
        .as_ref()
        .ok_or_else(|| Rejection::IntegrationNotConfigured {
            integration: PAYMENT_INTEGRATION.to_owned(),
        })?;
    Ok(Json(flow.initiate(&verified).await?))
}
