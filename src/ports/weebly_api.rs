//! Weebly API port for calls out to the platform.
//!
//! Covers the authorization code exchange, the handful of REST calls the
//! app makes on behalf of an installed site, and the owner and site lookups
//! used to refresh cached profiles. Every call except the exchange
//! is authenticated with a site's access token.
//!
//! # Design
//!
//! - **Token passed per call**: the caller picks which credential to use,
//!   so fallback policy stays in the application layer
//! - **Rejection is distinguishable**: `TokenRejected` tells the caller the
//!   credential itself is bad, as opposed to the platform being unavailable
//! - **Missing is distinguishable**: `NotFound` marks a site the platform no
//!   longer knows

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, SiteId, WeeblyUserId};
use crate::domain::weebly::{Amount, PaymentKind, PaymentMethod, PaymentTerm, SiteSnapshot};

/// Port for the platform's OAuth and REST API.
#[async_trait]
pub trait WeeblyApi: Send + Sync {
    /// Exchanges an authorization code for a site access token.
    async fn exchange_token(
        &self,
        request: TokenExchangeRequest,
    ) -> Result<TokenGrant, WeeblyApiError>;

    /// Reports a purchase or refund.
    async fn notify_payment(
        &self,
        access_token: &SecretString,
        request: &PaymentNotificationRequest,
    ) -> Result<(), WeeblyApiError>;

    /// Disconnects the app from a site.
    ///
    /// Returns the status the platform reported (`disconnected` on success).
    async fn deauthorize(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
    ) -> Result<String, WeeblyApiError>;

    /// Publishes the site.
    async fn publish_site(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
    ) -> Result<(), WeeblyApiError>;

    /// Replaces the app's header snippet on the site.
    async fn publish_snippet(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
        snippet: &str,
    ) -> Result<(), WeeblyApiError>;

    /// Updates one of the app's dashboard cards.
    async fn update_card(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
        update: &CardUpdate,
    ) -> Result<(), WeeblyApiError>;

    /// Fetches the owner's name and email.
    async fn get_user(
        &self,
        access_token: &SecretString,
        user_id: WeeblyUserId,
    ) -> Result<UserDetails, WeeblyApiError>;

    /// Fetches one site. A site the platform does not know is `NotFound`.
    async fn get_site(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
    ) -> Result<SiteDetails, WeeblyApiError>;

    /// Lists every site visible to the token, across all pages.
    async fn list_sites(&self, access_token: &SecretString) -> Result<Vec<SiteDetails>, WeeblyApiError>;
}

/// Authorization code exchange input.
#[derive(Debug, Clone)]
pub struct TokenExchangeRequest {
    pub authorization_code: String,

    /// Exchange endpoint handed over by the platform. The configured token
    /// URL is used when absent.
    pub callback_url: Option<String>,
}

/// Successful exchange result.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: SecretString,

    /// Where to send the merchant once the app is connected.
    pub callback_url: Option<String>,
}

/// Body of a payment notification call.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentNotificationRequest {
    pub name: String,
    pub method: PaymentMethod,
    pub gross_amount: Amount,
    pub payable_amount: Amount,
    pub detail: Option<String>,
    pub kind: Option<PaymentKind>,
    pub term: Option<PaymentTerm>,
    pub currency: Option<String>,
}

/// Dashboard card update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardUpdate {
    pub card_name: String,
    pub hidden: bool,
    pub card_data: serde_json::Value,
}

/// Owner details returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserDetails {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Site details returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDetails {
    pub site_id: SiteId,
    pub snapshot: SiteSnapshot,
}

/// Errors from platform API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeblyApiError {
    pub code: WeeblyApiErrorCode,
    pub message: String,

    /// HTTP status returned by the platform, if a response arrived.
    pub status: Option<u16>,
}

impl WeeblyApiError {
    pub fn new(code: WeeblyApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Transport failure: connect, timeout, TLS.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(WeeblyApiErrorCode::Network, message)
    }

    /// The access token (or client credentials) were refused.
    pub fn token_rejected(message: impl Into<String>) -> Self {
        Self::new(WeeblyApiErrorCode::TokenRejected, message)
    }

    /// The platform answered with an error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::new(WeeblyApiErrorCode::Api, message)
    }

    /// The response could not be understood.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(WeeblyApiErrorCode::InvalidResponse, message)
    }

    /// The requested resource does not exist on the platform.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(WeeblyApiErrorCode::NotFound, message)
    }

    pub fn is_token_rejected(&self) -> bool {
        self.code == WeeblyApiErrorCode::TokenRejected
    }

    pub fn is_not_found(&self) -> bool {
        self.code == WeeblyApiErrorCode::NotFound
    }
}

impl std::fmt::Display for WeeblyApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({}): {}", self.code, status, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for WeeblyApiError {}

impl From<WeeblyApiError> for DomainError {
    fn from(err: WeeblyApiError) -> Self {
        DomainError::new(ErrorCode::InternalError, err.to_string())
    }
}

/// Platform API error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeeblyApiErrorCode {
    Network,
    TokenRejected,
    NotFound,
    Api,
    InvalidResponse,
}

impl std::fmt::Display for WeeblyApiErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WeeblyApiErrorCode::Network => "network_error",
            WeeblyApiErrorCode::TokenRejected => "token_rejected",
            WeeblyApiErrorCode::NotFound => "not_found",
            WeeblyApiErrorCode::Api => "api_error",
            WeeblyApiErrorCode::InvalidResponse => "invalid_response",
        };
        write!(f, "{}", s)
    }
}
