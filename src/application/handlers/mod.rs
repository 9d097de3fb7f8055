//! Application handlers.
//!
//! Command handlers that orchestrate domain operations over the ports.

pub mod oauth;
pub mod payment;
pub mod site;

pub use oauth::{
    CompleteOAuthCommand, CompleteOAuthHandler, CompleteOAuthResult, OAuthError, OAuthSettings,
    StartOAuthCommand, StartOAuthHandler, StartOAuthResult,
};
pub use payment::{
    DeliveryAttempt, NotificationError, NotificationSettings, NotifyPaymentCommand,
    NotifyPaymentHandler, NotifyPaymentResult, NotifySummary, NotifyUnnotifiedHandler,
    RecordPaymentHandler, SelectedCredential, TokenSource,
};
pub use site::{DeauthorizeResult, ProfileRefresh, SiteApiError, SiteApiHandler};
