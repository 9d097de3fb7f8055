//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `CredentialRepository` - per-site access tokens
//! - `PaymentNotificationRepository` - recorded purchases and refunds
//! - `ProfileRepository` - cached owner and site metadata
//! - `WeeblyApi` - OAuth exchange and REST calls to the platform

mod credential_repository;
mod payment_notification_repository;
mod profile_repository;
mod weebly_api;

pub use credential_repository::{CredentialRepository, UpsertResult};
pub use payment_notification_repository::PaymentNotificationRepository;
pub use profile_repository::ProfileRepository;
pub use weebly_api::{
    CardUpdate, PaymentNotificationRequest, SiteDetails, TokenExchangeRequest, TokenGrant,
    UserDetails, WeeblyApi, WeeblyApiError, WeeblyApiErrorCode,
};
