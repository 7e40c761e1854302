use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
};

use crate::api::{InboundRequest, RouteError};
use crate::state::AppState;

/// `POST /payment/response`: the gateway's callback.
///
/// A verified callback always ends in a `303 See Other`; only a request
/// that fails verification gets a JSON error.
pub async fn payment_response(
    State(state): State<AppState>,
    request: InboundRequest,
) -> Result<impl IntoResponse, RouteError> {
    let services = state.services().await;
    let dispatched = services
        .dispatcher
        .dispatch(&services.callback_policy(), request.params, &request.raw_body)
        .await?;
    Ok(Redirect::to(dispatched.location.as_str()))
}
