//! Weebly App Center configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use super::error::ValidationError;
use super::server::Environment;
use crate::domain::foundation::CredentialId;

/// Weebly app registration and API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WeeblyConfig {
    /// App name, sent as the User-Agent on API calls
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// OAuth client ID issued by the App Center
    pub client_id: String,

    /// App secret. Signs inbound requests and site tokens, and authenticates
    /// the authorization code exchange.
    pub client_secret: SecretString,

    /// Name shown to the merchant on the post-install page
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Credential used when a site's own credential is missing or rejected
    pub default_credential_id: Option<Uuid>,

    /// Base URL for the REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Authorization code exchange endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Scopes requested during installation (comma-separated)
    #[serde(default = "default_authorize_scope")]
    pub authorize_scope: String,

    /// Domain the OAuth `callback_url` must belong to
    #[serde(default = "default_platform_domain")]
    pub platform_domain: String,

    /// Outbound request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Reject signed requests whose `timestamp` is older than this
    pub signature_max_age_secs: Option<i64>,

    /// Force test payment notifications on or off. Defaults to on outside production.
    pub notification_test_mode: Option<bool>,
}

impl WeeblyConfig {
    /// Get outbound request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn default_credential_id(&self) -> Option<CredentialId> {
        self.default_credential_id.map(CredentialId::from_uuid)
    }

    /// Whether payment notifications are sent as `testpurchase`/`testrefund`.
    pub fn notification_test_mode(&self, environment: Environment) -> bool {
        self.notification_test_mode
            .unwrap_or(environment != Environment::Production)
    }

    /// Validate Weebly configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.client_id.is_empty() {
            return Err(ValidationError::MissingRequired("WEEBLY__CLIENT_ID"));
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("WEEBLY__CLIENT_SECRET"));
        }
        if self.platform_domain.is_empty() {
            return Err(ValidationError::MissingRequired("WEEBLY__PLATFORM_DOMAIN"));
        }
        check_url("WEEBLY__API_BASE_URL", &self.api_base_url, environment)?;
        check_url("WEEBLY__TOKEN_URL", &self.token_url, environment)?;

        if self.request_timeout_secs == 0 || self.request_timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        if matches!(self.signature_max_age_secs, Some(age) if age <= 0) {
            return Err(ValidationError::InvalidSignatureMaxAge);
        }
        Ok(())
    }
}

fn check_url(
    name: &'static str,
    url: &str,
    environment: &Environment,
) -> Result<(), ValidationError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ValidationError::InvalidUrl(name));
    }
    if *environment == Environment::Production && !url.starts_with("https://") {
        return Err(ValidationError::UrlMustBeHttps(name));
    }
    Ok(())
}

fn default_app_name() -> String {
    "weebly-connect".to_string()
}

fn default_display_name() -> String {
    "Weebly App".to_string()
}

fn default_api_base_url() -> String {
    "https://api.weebly.com".to_string()
}

fn default_token_url() -> String {
    "https://www.weebly.com/app-center/oauth/access_token".to_string()
}

fn default_authorize_scope() -> String {
    "read:site,write:site".to_string()
}

fn default_platform_domain() -> String {
    "weebly.com".to_string()
}

fn default_request_timeout() -> u64 {
    60
}
