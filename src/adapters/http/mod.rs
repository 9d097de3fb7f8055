//! HTTP adapters - axum routes, extractors and response types.

pub mod dto;
pub mod middleware;
pub mod weebly;

pub use dto::ErrorResponse;
pub use middleware::{SignatureRejection, SignedRequest};
pub use weebly::{weebly_router, WeeblyAppState};
