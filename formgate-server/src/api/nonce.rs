use axum::{
    Json,
    extract::{Query, State},
};
use formgate_sdk::objects::NonceResponse;
use serde::Deserialize;

use super::RouteError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NonceQuery {
    #[serde(default)]
    form_id: String,
}

/// `GET /nonce?form_id=`: issue a nonce bound to one form instance.
pub async fn issue_nonce(
    State(state): State<AppState>,
    Query(query): Query<NonceQuery>,
) -> Result<Json<NonceResponse>, RouteError> {
    let form_id = query.form_id.trim();
    if form_id.is_empty() {
        return Err(RouteError::InvalidRequest("form_id is required".to_owned()));
    }

    let services = state.services().await;
    Ok(Json(NonceResponse {
        nonce: services.nonces.issue(form_id),
        form_id: form_id.to_owned(),
        expires_in: services.nonces.lifetime_secs(),
    }))
}
