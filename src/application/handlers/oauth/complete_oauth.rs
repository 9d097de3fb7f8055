//! CompleteOAuthHandler - exchanges the authorization code and stores the token.

use std::sync::Arc;

use crate::domain::foundation::{CredentialId, SiteId};
use crate::domain::weebly::{check_version, CredentialGrant, InstallState, RequestAuthenticator};
use crate::ports::{CredentialRepository, TokenExchangeRequest, WeeblyApi, WeeblyApiError};

use super::{platform_url, OAuthError, OAuthSettings};

/// Command to finish an install.
///
/// The redirect is not signed by the platform, so the site and owner are
/// never read from it directly; they come from the sealed `state`.
#[derive(Debug, Clone)]
pub struct CompleteOAuthCommand {
    pub authorization_code: String,

    /// State sealed by the start step.
    pub state: Option<String>,

    /// Exchange endpoint supplied by the platform.
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteOAuthResult {
    pub credential_id: CredentialId,
    pub site_id: SiteId,

    /// False when an existing installation was refreshed.
    pub inserted: bool,

    /// Where the platform wants the merchant sent next, if anywhere.
    pub redirect_url: Option<String>,
}

/// Handler for the second install step.
///
/// The credential is written only after the state verifies and the exchange
/// succeeds.
pub struct CompleteOAuthHandler {
    credentials: Arc<dyn CredentialRepository>,
    api: Arc<dyn WeeblyApi>,
    authenticator: Arc<RequestAuthenticator>,
    settings: OAuthSettings,
}

impl CompleteOAuthHandler {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        api: Arc<dyn WeeblyApi>,
        authenticator: Arc<RequestAuthenticator>,
        settings: OAuthSettings,
    ) -> Self {
        Self {
            credentials,
            api,
            authenticator,
            settings,
        }
    }

    pub async fn handle(&self, cmd: CompleteOAuthCommand) -> Result<CompleteOAuthResult, OAuthError> {
        // 1. Bind the completion to a start we signed
        let install = InstallState::open(cmd.state.as_deref().unwrap_or_default(), &self.authenticator)
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected install completion");
                OAuthError::InvalidState(e)
            })?;

        let code = cmd.authorization_code.trim();
        if code.is_empty() {
            return Err(OAuthError::MissingParameter("authorization_code"));
        }
        if let Some(version) = &install.version {
            check_version(version).map_err(|_| OAuthError::InvalidParameter("version"))?;
        }

        let callback_url = match cmd.callback_url.as_deref().filter(|u| !u.is_empty()) {
            Some(raw) => Some(
                platform_url(raw, &self.settings.platform_domain)
                    .ok_or(OAuthError::InvalidCallbackUrl)?
                    .to_string(),
            ),
            None => None,
        };

        // 2. Exchange the code
        let grant = self
            .api
            .exchange_token(TokenExchangeRequest {
                authorization_code: code.to_string(),
                callback_url,
            })
            .await
            .map_err(|e| {
                tracing::warn!(site_id = %install.site_id, error = %e, "Authorization code exchange failed");
                OAuthError::TokenExchange(e)
            })?;

        let credential_grant = CredentialGrant::new(
            install.site_id,
            install.user_id,
            grant.access_token,
            install.version,
        )
        .map_err(|e| OAuthError::TokenExchange(WeeblyApiError::invalid_response(e.to_string())))?;

        // 3. Persist, keyed by site
        let stored = self.credentials.upsert(credential_grant).await?;

        tracing::info!(
            site_id = %install.site_id,
            credential_id = %stored.credential.id,
            reinstall = !stored.inserted,
            "App installed"
        );

        let redirect_url = grant.callback_url.and_then(|raw| {
            let url = platform_url(&raw, &self.settings.platform_domain);
            if url.is_none() {
                tracing::warn!(callback_url = %raw, "Ignoring non-platform post-install redirect");
            }
            url.map(String::from)
        });

        Ok(CompleteOAuthResult {
            credential_id: stored.credential.id,
            site_id: install.site_id,
            inserted: stored.inserted,
            redirect_url,
        })
    }
}
