//! Axum router configuration for the Weebly app endpoints.

use axum::{routing::get, Router};

use super::handlers::{complete_oauth, health, site_token, start_oauth, WeeblyAppState};

/// Create the Weebly app router.
///
/// # Routes
///
/// ## Signed (platform-initiated)
/// - `GET /oauth/start` - Redirect to the platform's grant page
/// - `GET /site-token` - Token for the editor element
///
/// ## Unsigned
/// - `GET /oauth/complete` - Authorization code redirect target
pub fn weebly_routes() -> Router<WeeblyAppState> {
    Router::new()
        .route("/oauth/start", get(start_oauth))
        .route("/oauth/complete", get(complete_oauth))
        .route("/site-token", get(site_token))
}

/// Create the complete router, mounted at `/weebly`, plus `/health`.
pub fn weebly_router() -> Router<WeeblyAppState> {
    Router::new()
        .nest("/weebly", weebly_routes())
        .route("/health", get(health))
}
