//! Payment gateway client.
//!
//! Every request body is signed with
//! `HMAC-SHA256("{timestamp}.{json}", gateway_secret)` and the result is
//! sent in the `Formgate-Signature` header.

use async_trait::async_trait;
use formgate_sdk::objects::{PaymentMethod, TransactionRequest, TransactionResponse};
use formgate_sdk::signature::{self, SIGNATURE_HEADER};
use reqwest::StatusCode;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway returned a non-2xx status code.
    #[error("gateway error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Start a transaction; the response tells where to send the browser.
    async fn start_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionResponse, GatewayError>;

    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, GatewayError>;
}

/// HTTP implementation of [`PaymentGateway`].
#[derive(Clone)]
pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: Url,
    secret: Box<[u8]>,
}

impl HttpPaymentGateway {
    /// `base_url` is the gateway API root; endpoint paths are resolved
    /// relative to it.
    pub fn new(mut base_url: Url, secret: impl Into<Box<[u8]>>) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url,
            secret: secret.into(),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn start_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionResponse, GatewayError> {
        let json = serde_json::to_string(request)?;
        let url = self.endpoint("transactions")?;
        tracing::debug!(invoice = %request.invoice, url = %url, "Starting gateway transaction");

        let resp = self
            .http
            .post(url)
            .header(SIGNATURE_HEADER, signature::sign_body(&json, &self.secret))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(json)
            .send()
            .await?;

        parse_response(resp).await
    }

    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, GatewayError> {
        let url = self.endpoint("payment-methods")?;
        let resp = self
            .http
            .get(url)
            .header(SIGNATURE_HEADER, signature::sign_body("", &self.secret))
            .send()
            .await?;

        parse_response(resp).await
    }
}

impl std::fmt::Debug for HttpPaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPaymentGateway")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(GatewayError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
