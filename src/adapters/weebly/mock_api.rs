//! Mock Weebly API for testing.
//!
//! Provides a configurable implementation of `WeeblyApi` for unit and
//! integration tests. Supports:
//! - Authorization codes mapped to tokens
//! - Per-token failures (rejected or unreachable)
//! - Per-method error injection
//! - Owner and site details served by lookups
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{SiteId, WeeblyUserId};
use crate::domain::weebly::SiteSnapshot;
use crate::ports::{
    CardUpdate, PaymentNotificationRequest, SiteDetails, TokenExchangeRequest, TokenGrant,
    UserDetails, WeeblyApi, WeeblyApiError,
};

/// Mock Weebly API.
///
/// # Example
///
/// ```ignore
/// let api = MockWeeblyApi::new();
/// api.grant_code("code-1", "token-1");
/// api.reject_token("stale-token");
/// ```
#[derive(Clone, Default)]
pub struct MockWeeblyApi {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Authorization code -> access token.
    codes: HashMap<String, String>,

    /// Callback URL returned alongside every grant.
    grant_callback_url: Option<String>,

    /// Access token -> error returned for any call made with it.
    token_errors: HashMap<String, WeeblyApiError>,

    /// Method name -> error returned for every call.
    method_errors: HashMap<String, WeeblyApiError>,

    /// Status returned by `deauthorize`.
    deauthorize_status: Option<String>,

    users: HashMap<WeeblyUserId, UserDetails>,

    /// Sites in listing order.
    sites: Vec<SiteDetails>,

    /// Delivered payment notifications with the token used.
    notifications: Vec<(String, PaymentNotificationRequest)>,

    call_log: Vec<ApiCall>,
}

/// Recorded call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCall {
    pub method: String,
    /// Access token (or authorization code for `exchange_token`).
    pub credential: String,
    pub site_id: Option<SiteId>,
}

impl MockWeeblyApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Makes `code` exchange for `token`.
    pub fn grant_code(&self, code: &str, token: &str) {
        self.state()
            .codes
            .insert(code.to_string(), token.to_string());
    }

    /// Sets the callback URL returned with grants.
    pub fn set_grant_callback_url(&self, url: &str) {
        self.state().grant_callback_url = Some(url.to_string());
    }

    /// Makes every call with `token` fail as "Unknown api key".
    pub fn reject_token(&self, token: &str) {
        self.fail_token(
            token,
            WeeblyApiError::token_rejected("Unknown api key").with_status(401),
        );
    }

    /// Makes every call with `token` fail with `error`.
    pub fn fail_token(&self, token: &str, error: WeeblyApiError) {
        self.state().token_errors.insert(token.to_string(), error);
    }

    /// Makes every call to `method` fail with `error`.
    pub fn set_method_error(&self, method: &str, error: WeeblyApiError) {
        self.state()
            .method_errors
            .insert(method.to_string(), error);
    }

    pub fn set_deauthorize_status(&self, status: &str) {
        self.state().deauthorize_status = Some(status.to_string());
    }

    /// Serves `details` for the owner lookup of `user_id`.
    pub fn set_user(&self, user_id: WeeblyUserId, details: UserDetails) {
        self.state().users.insert(user_id, details);
    }

    /// Adds or replaces a site served by the site lookups.
    pub fn set_site(&self, site_id: SiteId, snapshot: SiteSnapshot) {
        let mut state = self.state();
        state.sites.retain(|s| s.site_id != site_id);
        state.sites.push(SiteDetails { site_id, snapshot });
    }

    /// Makes the site unknown to the platform.
    pub fn remove_site(&self, site_id: SiteId) {
        self.state().sites.retain(|s| s.site_id != site_id);
    }

    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.token_errors.clear();
        state.method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().call_log.clone()
    }

    /// Number of calls made to `method`.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Tokens used for `method`, in call order.
    pub fn tokens_used(&self, method: &str) -> Vec<String> {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.credential.clone())
            .collect()
    }

    /// Successfully delivered notifications with the token that delivered them.
    pub fn delivered_notifications(&self) -> Vec<(String, PaymentNotificationRequest)> {
        self.state().notifications.clone()
    }

    /// Records the call and returns the error it should fail with, if any.
    fn record(
        &self,
        method: &str,
        credential: &str,
        site_id: Option<SiteId>,
    ) -> Result<(), WeeblyApiError> {
        let mut state = self.state();
        state.call_log.push(ApiCall {
            method: method.to_string(),
            credential: credential.to_string(),
            site_id,
        });

        if let Some(err) = state.method_errors.get(method) {
            return Err(err.clone());
        }
        if let Some(err) = state.token_errors.get(credential) {
            return Err(err.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl WeeblyApi for MockWeeblyApi {
    async fn exchange_token(
        &self,
        request: TokenExchangeRequest,
    ) -> Result<TokenGrant, WeeblyApiError> {
        self.record("exchange_token", &request.authorization_code, None)?;

        let state = self.state();
        let token = state
            .codes
            .get(&request.authorization_code)
            .cloned()
            .ok_or_else(|| {
                WeeblyApiError::token_rejected("Invalid authorization code").with_status(400)
            })?;

        Ok(TokenGrant {
            access_token: SecretString::new(token),
            callback_url: state.grant_callback_url.clone(),
        })
    }

    async fn notify_payment(
        &self,
        access_token: &SecretString,
        request: &PaymentNotificationRequest,
    ) -> Result<(), WeeblyApiError> {
        let token = access_token.expose_secret();
        self.record("notify_payment", token, None)?;
        self.state()
            .notifications
            .push((token.to_string(), request.clone()));
        Ok(())
    }

    async fn deauthorize(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
    ) -> Result<String, WeeblyApiError> {
        self.record("deauthorize", access_token.expose_secret(), Some(site_id))?;
        Ok(self
            .state()
            .deauthorize_status
            .clone()
            .unwrap_or_else(|| "disconnected".to_string()))
    }

    async fn publish_site(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
    ) -> Result<(), WeeblyApiError> {
        self.record("publish_site", access_token.expose_secret(), Some(site_id))
    }

    async fn publish_snippet(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
        _snippet: &str,
    ) -> Result<(), WeeblyApiError> {
        self.record("publish_snippet", access_token.expose_secret(), Some(site_id))
    }

    async fn update_card(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
        _update: &CardUpdate,
    ) -> Result<(), WeeblyApiError> {
        self.record("update_card", access_token.expose_secret(), Some(site_id))
    }

    async fn get_user(
        &self,
        access_token: &SecretString,
        user_id: WeeblyUserId,
    ) -> Result<UserDetails, WeeblyApiError> {
        self.record("get_user", access_token.expose_secret(), None)?;
        self.state()
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| WeeblyApiError::not_found("User not found").with_status(404))
    }

    async fn get_site(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
    ) -> Result<SiteDetails, WeeblyApiError> {
        self.record("get_site", access_token.expose_secret(), Some(site_id))?;
        self.state()
            .sites
            .iter()
            .find(|s| s.site_id == site_id)
            .cloned()
            .ok_or_else(|| WeeblyApiError::not_found("Site not found").with_status(404))
    }

    async fn list_sites(&self, access_token: &SecretString) -> Result<Vec<SiteDetails>, WeeblyApiError> {
        self.record("list_sites", access_token.expose_secret(), None)?;
        Ok(self.state().sites.clone())
    }
}
