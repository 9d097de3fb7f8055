//! Error types for signed-request authentication.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors raised while authenticating a platform-signed request.
///
/// Every variant rejects the request; none of them lets it through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No `hmac` parameter on the request.
    #[error("Missing signature")]
    MissingSignature,

    /// Signature present but does not match the parameters.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed `timestamp` is older than the configured window.
    #[error("Signed request expired")]
    Expired,

    /// Signed `timestamp` missing, unparseable or too far in the future.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// A parameter appears more than once, so its value is ambiguous.
    #[error("Repeated parameter: {0}")]
    RepeatedParameter(String),

    /// A signed identity parameter could not be parsed.
    #[error("Malformed parameter: {0}")]
    MalformedParameter(&'static str),

    /// A parameter the endpoint needs was not part of the signed set.
    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),
}

impl SignatureError {
    /// Maps the error to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SignatureError::MissingSignature
            | SignatureError::InvalidSignature
            | SignatureError::Expired
            | SignatureError::InvalidTimestamp
            | SignatureError::RepeatedParameter(_) => StatusCode::UNAUTHORIZED,
            SignatureError::MalformedParameter(_) | SignatureError::MissingParameter(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            SignatureError::MissingSignature => "MISSING_SIGNATURE",
            SignatureError::InvalidSignature => "INVALID_SIGNATURE",
            SignatureError::Expired => "SIGNATURE_EXPIRED",
            SignatureError::InvalidTimestamp => "INVALID_TIMESTAMP",
            SignatureError::RepeatedParameter(_) => "REPEATED_PARAMETER",
            SignatureError::MalformedParameter(_) => "MALFORMED_PARAMETER",
            SignatureError::MissingParameter(_) => "MISSING_PARAMETER",
        }
    }
}
