use serde::{Deserialize, Serialize};

/// Error body returned by every formgate route.
///
/// ```json
/// {"code": "rest_bad_request", "message": "...", "data": {"status": 400, ...}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub data: serde_json::Value,
}
