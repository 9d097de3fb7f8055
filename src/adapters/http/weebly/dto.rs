//! Request and response types for the Weebly app endpoints.

use serde::{Deserialize, Serialize};

/// Lifetime of tokens handed to the editor element.
pub const SITE_TOKEN_EXPIRES_IN_MINUTES: i64 = 60;

/// Query parameters of the OAuth redirect back to the app.
///
/// Everything is optional here so a missing value gets a specific error
/// instead of a generic query rejection. Unknown parameters, including any
/// unsigned `site_id`/`user_id` the platform appends, are dropped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteOAuthParams {
    pub authorization_code: Option<String>,
    pub state: Option<String>,
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteTokenResponse {
    pub token: String,
    pub expires_in_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
