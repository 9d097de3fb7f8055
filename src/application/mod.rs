//! Application layer - Commands and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{
    // Install
    CompleteOAuthCommand, CompleteOAuthHandler, CompleteOAuthResult, OAuthError, OAuthSettings,
    StartOAuthCommand, StartOAuthHandler, StartOAuthResult,
    // Payment notifications
    DeliveryAttempt, NotificationError, NotificationSettings, NotifyPaymentCommand,
    NotifyPaymentHandler, NotifyPaymentResult, NotifySummary, NotifyUnnotifiedHandler,
    RecordPaymentHandler, SelectedCredential, TokenSource,
    // Site API
    DeauthorizeResult, ProfileRefresh, SiteApiError, SiteApiHandler,
};
