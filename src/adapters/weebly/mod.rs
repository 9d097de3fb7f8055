//! Weebly platform adapters.
//!
//! - `WeeblyApiClient` - HTTPS client for the OAuth exchange and REST API
//! - `MockWeeblyApi` - in-process double for tests and local runs

mod api_client;
mod mock_api;

pub use api_client::{WeeblyApiClient, WeeblyClientConfig};
pub use mock_api::{ApiCall, MockWeeblyApi};
