//! Payment initiation.
//!
//! Builds the signed callback URLs for a verified payment request, then asks
//! the gateway to start the transaction with them as return URLs.

use crate::gateway::{GatewayError, PaymentGateway};
use crate::redirect::{RedirectError, SignedRedirectBuilder};
use crate::verifier::VerifiedParams;
use formgate_sdk::objects::{PaymentInitiated, PaymentStatus, TransactionRequest};
use formgate_sdk::params::{ParamValue, Params};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

pub const AMOUNT_PARAM: &str = "amount";
pub const INVOICE_PARAM: &str = "invoice";
pub const DESCRIPTION_PARAM: &str = "description";
pub const METHOD_PARAM: &str = "payment_method";

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),
    #[error("failed to build redirect urls: {0}")]
    Redirect(#[from] RedirectError),
    #[error("redirect set is incomplete")]
    IncompleteRedirectSet,
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

pub struct PaymentFlow {
    gateway: Arc<dyn PaymentGateway>,
    redirects: SignedRedirectBuilder,
    currency: String,
}

impl PaymentFlow {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        redirects: SignedRedirectBuilder,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            redirects,
            currency: currency.into(),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.gateway
    }

    pub async fn initiate(&self, verified: &VerifiedParams) -> Result<PaymentInitiated, PaymentError> {
        let raw_amount = verified.get_str(AMOUNT_PARAM).unwrap_or_default();
        let amount = raw_amount
            .trim()
            .parse::<Decimal>()
            .ok()
            .filter(|a| a.is_sign_positive() && !a.is_zero())
            .ok_or_else(|| PaymentError::InvalidAmount(raw_amount.to_owned()))?;

        let invoice = verified
            .get_str(INVOICE_PARAM)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::now_v7().to_string());

        let embedded = embedded_params(verified, &invoice, amount);
        let targets = self.redirects.build(&embedded)?;
        let return_urls = targets
            .to_return_urls()
            .ok_or(PaymentError::IncompleteRedirectSet)?;

        let request = TransactionRequest {
            invoice: invoice.clone(),
            amount,
            currency: self.currency.clone(),
            description: non_empty(verified.get_str(DESCRIPTION_PARAM)),
            payment_method: non_empty(verified.get_str(METHOD_PARAM)),
            return_urls,
        };
        let response = self.gateway.start_transaction(&request).await?;
        tracing::info!(
            invoice = %invoice,
            transaction_key = %response.transaction_key,
            "Payment transaction started"
        );

        Ok(PaymentInitiated {
            invoice,
            transaction_key: response.transaction_key,
            redirect_url: response.redirect_url,
        })
    }
}

impl std::fmt::Debug for PaymentFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentFlow")
            .field("redirects", &self.redirects)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

/// Parameters carried through the gateway round trip inside the signed
/// callback URLs.
fn embedded_params(verified: &VerifiedParams, invoice: &str, amount: Decimal) -> Params {
    let mut embedded = Params::new();
    embedded.insert(INVOICE_PARAM.to_owned(), ParamValue::from(invoice));
    embedded.insert(AMOUNT_PARAM.to_owned(), ParamValue::from(amount.to_string()));
    for key in PaymentStatus::REDIRECT_PARAMS {
        if let Some(value) = verified.params.get(key).filter(|v| !v.is_blank()) {
            embedded.insert(key.to_owned(), value.clone());
        }
    }
    embedded
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_owned)
}
