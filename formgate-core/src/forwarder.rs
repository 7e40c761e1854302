//! Delivery of verified form submissions to their configured endpoint.

use formgate_sdk::params::Params;
use serde::Serialize;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("form delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },
}

/// Payload posted to a form's `forward_url`.
#[derive(Debug, Serialize)]
pub struct ForwardedSubmission<'a> {
    pub form: &'a str,
    pub fields: &'a Params,
}

#[derive(Debug, Clone)]
pub struct FormForwarder {
    http: reqwest::Client,
}

impl Default for FormForwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl FormForwarder {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Post `fields` once; non-2xx answers are reported, never retried.
    pub async fn forward(&self, url: &Url, form: &str, fields: &Params) -> Result<(), ForwardError> {
        let response = self
            .http
            .post(url.clone())
            .json(&ForwardedSubmission { form, fields })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(form = %form, status = status.as_u16(), "Form submission forwarded");
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(form = %form, status = status.as_u16(), "Form endpoint refused submission");
        Err(ForwardError::DeliveryFailed {
            status: status.as_u16(),
            body,
        })
    }
}
