//! API response types.

use serde::{Deserialize, Serialize};

/// Response for a counted visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitResponse {
    /// Store-assigned session id.
    pub session_id: String,
    /// Visits counted in this session, including this one.
    pub visits: u64,
    /// Whether this request started the session.
    pub new_session: bool,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "INTERNAL_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}
