//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `weebly` - Weebly OAuth and REST API client (plus a mock)
//! - `postgres` - PostgreSQL repositories
//! - `memory` - In-memory repositories
//! - `http` - axum routes and extractors

pub mod http;
pub mod memory;
pub mod postgres;
pub mod weebly;

pub use memory::{
    InMemoryCredentialRepository, InMemoryPaymentNotificationRepository, InMemoryProfileRepository,
};
pub use postgres::{
    PostgresCredentialRepository, PostgresPaymentNotificationRepository, PostgresProfileRepository,
};
pub use weebly::{MockWeeblyApi, WeeblyApiClient, WeeblyClientConfig};
