//! Shared API request/response types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Login response
///
/// ```
/// use ivp_common::api::types::TokenResponse;
///
/// let response = TokenResponse::bearer("abc.def.ghi".to_string());
/// assert_eq!(response.token_type, "bearer");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Error response envelope: `{"error": {...}}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Error details
///
/// `stage` and `recording_id` are present for ingestion failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable code (e.g. "NOT_FOUND")
    pub code: String,

    /// Human-readable message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<Uuid>,
}
