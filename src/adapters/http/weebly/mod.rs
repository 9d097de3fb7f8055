//! HTTP adapter for the Weebly app endpoints.
//!
//! - `GET /weebly/oauth/start` - Signed install request, redirects to the grant page
//! - `GET /weebly/oauth/complete` - Authorization code exchange
//! - `GET /weebly/site-token` - Signed, returns a token for the editor element
//! - `GET /health` - Liveness

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{WeeblyAppState, WeeblyHttpError};
pub use routes::{weebly_router, weebly_routes};
