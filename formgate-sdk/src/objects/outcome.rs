//! Payment outcomes.
//!
//! Two closely related vocabularies exist. [`OutcomeTag`] is what formgate
//! embeds as `status` in each signed callback URL. [`PaymentStatus`] is
//! what the gateway reports in its callback body.

use serde::{Deserialize, Serialize};

/// Terminal state a signed callback URL stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeTag {
    Success,
    Canceled,
    Error,
    Reject,
}

impl OutcomeTag {
    /// All tags, in the order redirect sets are built.
    pub const ALL: [OutcomeTag; 4] = [
        OutcomeTag::Success,
        OutcomeTag::Canceled,
        OutcomeTag::Error,
        OutcomeTag::Reject,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeTag::Success => "success",
            OutcomeTag::Canceled => "canceled",
            OutcomeTag::Error => "error",
            OutcomeTag::Reject => "reject",
        }
    }
}

impl std::fmt::Display for OutcomeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome reported by the payment gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Error,
    Cancelled,
    Reject,
}

impl PaymentStatus {
    /// Name of the embedded callback parameter holding the browser's
    /// destination for this outcome.
    pub fn redirect_param(self) -> &'static str {
        match self {
            PaymentStatus::Success => "redirect-url",
            PaymentStatus::Error => "redirect-url-error",
            PaymentStatus::Cancelled => "redirect-url-cancel",
            PaymentStatus::Reject => "redirect-url-reject",
        }
    }

    /// All embedded redirect parameter names.
    pub const REDIRECT_PARAMS: [&'static str; 4] = [
        "redirect-url",
        "redirect-url-error",
        "redirect-url-cancel",
        "redirect-url-reject",
    ];
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Success => write!(f, "success"),
            PaymentStatus::Error => write!(f, "error"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
            PaymentStatus::Reject => write!(f, "reject"),
        }
    }
}
