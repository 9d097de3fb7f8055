//! In-memory repositories.
//!
//! Used by tests and by the server when no database is configured. Data does
//! not survive a restart.

mod credential_repository;
mod payment_notification_repository;
mod profile_repository;

pub use credential_repository::InMemoryCredentialRepository;
pub use payment_notification_repository::InMemoryPaymentNotificationRepository;
pub use profile_repository::InMemoryProfileRepository;
