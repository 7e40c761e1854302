use serde::{Deserialize, Serialize};

/// Response of `GET /{namespace}/v1/nonce`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
    pub form_id: String,
    /// Upper bound on the token lifetime, in seconds.
    pub expires_in: u64,
}
