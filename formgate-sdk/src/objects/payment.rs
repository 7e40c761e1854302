use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use url::Url;

/// Browser return destinations handed to the gateway, one per outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnUrls {
    pub success: Url,
    pub cancel: Url,
    pub error: Url,
    pub reject: Url,
}

/// Request body of the gateway's "start transaction" call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub invoice: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub return_urls: ReturnUrls,
}

/// Gateway answer to a started transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_key: String,
    /// Where the browser must go to complete the payment.
    pub redirect_url: Url,
}

/// A payment method offered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
}

/// Response of `POST /{namespace}/v1/payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiated {
    pub invoice: String,
    pub transaction_key: String,
    pub redirect_url: Url,
}

/// Response of `POST /{namespace}/v1/forms/{slug}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormAccepted {
    pub form: String,
    pub forwarded: bool,
}
