//! Response types shared by every HTTP module.

use serde::{Deserialize, Serialize};

/// Error response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_without_details_when_none() {
        let json = serde_json::to_string(&ErrorResponse::new("INVALID_SIGNATURE", "Invalid signature")).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains("\"error_code\":\"INVALID_SIGNATURE\""));
    }

    #[test]
    fn serializes_details_when_present() {
        let response = ErrorResponse::with_details(
            "MISSING_PARAMETER",
            "Missing parameter: site_id",
            serde_json::json!({"parameter": "site_id"}),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["details"]["parameter"], "site_id");
    }
}
