use axum::{
    Json,
    extract::{Path, State},
};
use formgate_sdk::objects::FormAccepted;

use super::{InboundRequest, RouteError};
use crate::state::AppState;

/// `POST /forms/{slug}`: verify a submission and forward it.
///
/// Forwarding happens once; a refusing endpoint surfaces as an error
/// response and nothing is retried.
pub async fn submit_form(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    request: InboundRequest,
) -> Result<Json<FormAccepted>, RouteError> {
    let services = state.services().await;
    let form = services.config.form(&slug).ok_or(RouteError::NotFound("form"))?;

    let policy = form.policy(services.captcha.clone());
    let verified = services.verifier.verify(&policy, request.params).await?;

    services
        .forwarder
        .forward(&form.forward_url, &form.slug, &verified.params)
        .await?;

    Ok(Json(FormAccepted {
        form: form.slug.clone(),
        forwarded: true,
    }))
}
