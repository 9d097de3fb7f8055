//! Errors raised while recording and delivering payment notifications.

use std::fmt;

use thiserror::Error;

use crate::domain::foundation::{CredentialId, DomainError, NotificationId, ValidationError};
use crate::ports::WeeblyApiError;

/// Which credential a delivery attempt used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// The paying site's own credential.
    Site,
    /// The configured fallback credential.
    Default,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Site => f.write_str("site"),
            TokenSource::Default => f.write_str("default"),
        }
    }
}

/// One failed call to the notification endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub credential_id: CredentialId,
    pub source: TokenSource,
    pub error: WeeblyApiError,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Payment notification not found: {0}")]
    NotFound(NotificationId),

    #[error("Payment notification {0} was already delivered")]
    AlreadyNotified(NotificationId),

    #[error("Invalid payment notification: {0}")]
    Invalid(#[from] ValidationError),

    /// The fallback credential was needed but is not configured, missing or
    /// invalid. This is a configuration problem, not a delivery failure.
    #[error("Default credential unavailable: {reason}")]
    DefaultCredentialUnavailable {
        reason: String,
        attempts: Vec<DeliveryAttempt>,
    },

    /// Every attempted credential failed. Attempts are in call order.
    #[error("Payment notification delivery failed after {} attempt(s)", .attempts.len())]
    Delivery { attempts: Vec<DeliveryAttempt> },

    #[error("Storage error: {0}")]
    Storage(#[from] DomainError),
}

impl NotificationError {
    pub fn code(&self) -> &'static str {
        match self {
            NotificationError::NotFound(_) => "NOTIFICATION_NOT_FOUND",
            NotificationError::AlreadyNotified(_) => "ALREADY_NOTIFIED",
            NotificationError::Invalid(_) => "VALIDATION_FAILED",
            NotificationError::DefaultCredentialUnavailable { .. } => {
                "DEFAULT_CREDENTIAL_UNAVAILABLE"
            }
            NotificationError::Delivery { .. } => "DELIVERY_FAILED",
            NotificationError::Storage(_) => "INTERNAL_ERROR",
        }
    }

    /// Calls made before the error was raised.
    pub fn attempts(&self) -> &[DeliveryAttempt] {
        match self {
            NotificationError::DefaultCredentialUnavailable { attempts, .. }
            | NotificationError::Delivery { attempts } => attempts,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_error_counts_attempts() {
        let err = NotificationError::Delivery {
            attempts: vec![
                DeliveryAttempt {
                    credential_id: CredentialId::new(),
                    source: TokenSource::Site,
                    error: WeeblyApiError::token_rejected("Unknown api key"),
                },
                DeliveryAttempt {
                    credential_id: CredentialId::new(),
                    source: TokenSource::Default,
                    error: WeeblyApiError::network("timed out"),
                },
            ],
        };

        assert_eq!(err.to_string(), "Payment notification delivery failed after 2 attempt(s)");
        assert_eq!(err.attempts().len(), 2);
        assert_eq!(err.code(), "DELIVERY_FAILED");
    }

    #[test]
    fn other_errors_have_no_attempts() {
        let err = NotificationError::AlreadyNotified(NotificationId::new());
        assert!(err.attempts().is_empty());
    }
}
