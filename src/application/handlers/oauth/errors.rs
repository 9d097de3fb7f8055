//! Errors raised by the install flow.

use thiserror::Error;

use crate::domain::foundation::DomainError;
use crate::domain::weebly::SignatureError;
use crate::ports::WeeblyApiError;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The completion did not carry a state sealed by the start step.
    #[error("Install state rejected: {0}")]
    InvalidState(SignatureError),

    /// The platform-supplied URL is not HTTPS on the platform's domain.
    #[error("Callback URL is not a platform URL")]
    InvalidCallbackUrl,

    /// Network failure, non-success status or malformed body from the exchange.
    /// Nothing is persisted.
    #[error("Token exchange failed: {0}")]
    TokenExchange(WeeblyApiError),

    /// The configured redirect URI cannot carry the install state.
    #[error("Install flow misconfigured: {0}")]
    Misconfigured(&'static str),

    #[error("Failed to store credential: {0}")]
    Storage(#[from] DomainError),
}

impl OAuthError {
    pub fn code(&self) -> &'static str {
        match self {
            OAuthError::MissingParameter(_) => "MISSING_PARAMETER",
            OAuthError::InvalidParameter(_) => "INVALID_PARAMETER",
            OAuthError::InvalidState(_) => "INVALID_STATE",
            OAuthError::InvalidCallbackUrl => "INVALID_CALLBACK_URL",
            OAuthError::TokenExchange(_) => "TOKEN_EXCHANGE_FAILED",
            OAuthError::Misconfigured(_) | OAuthError::Storage(_) => "INTERNAL_ERROR",
        }
    }
}
