//! StartOAuthHandler - builds the grant redirect for a signed install request.

use std::sync::Arc;

use chrono::Utc;
use reqwest::Url;

use crate::domain::weebly::{
    check_version, InstallState, RequestAuthenticator, SignedIdentity, STATE_PARAM,
};

use super::{platform_url, OAuthError, OAuthSettings};

/// Command to start an install.
#[derive(Debug, Clone)]
pub struct StartOAuthCommand {
    /// Identity from the verified install request.
    pub identity: SignedIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOAuthResult {
    /// Platform URL the merchant is redirected to.
    pub authorize_url: String,
}

/// Handler for the first install step.
///
/// The verified site and owner are sealed into `redirect_uri` so the
/// unsigned completion can be tied back to this request.
pub struct StartOAuthHandler {
    settings: OAuthSettings,
    authenticator: Arc<RequestAuthenticator>,
}

impl StartOAuthHandler {
    pub fn new(settings: OAuthSettings, authenticator: Arc<RequestAuthenticator>) -> Self {
        Self {
            settings,
            authenticator,
        }
    }

    pub fn handle(&self, cmd: StartOAuthCommand) -> Result<StartOAuthResult, OAuthError> {
        let identity = cmd.identity;
        let site_id = identity
            .require_site()
            .map_err(|_| OAuthError::MissingParameter("site_id"))?;
        let user_id = identity
            .require_user()
            .map_err(|_| OAuthError::MissingParameter("user_id"))?;
        let callback_url = identity
            .require_param("callback_url")
            .map_err(|_| OAuthError::MissingParameter("callback_url"))?;
        if let Some(version) = &identity.version {
            check_version(version).map_err(|_| OAuthError::InvalidParameter("version"))?;
        }

        let mut url = platform_url(callback_url, &self.settings.platform_domain).ok_or_else(|| {
            tracing::warn!(
                site_id = %site_id,
                callback_url = %callback_url,
                "Refusing install redirect to non-platform URL"
            );
            OAuthError::InvalidCallbackUrl
        })?;

        let state = InstallState {
            site_id,
            user_id,
            version: identity.version.clone(),
        }
        .seal(&self.authenticator, Utc::now().timestamp());
        let mut redirect_uri = Url::parse(&self.settings.redirect_uri)
            .map_err(|_| OAuthError::Misconfigured("redirect_uri"))?;
        redirect_uri.query_pairs_mut().append_pair(STATE_PARAM, &state);

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.settings.client_id)
                .append_pair("user_id", &user_id.to_string())
                .append_pair("site_id", &site_id.to_string())
                .append_pair("redirect_uri", redirect_uri.as_str())
                .append_pair("scope", &self.settings.scope);
            if let Some(version) = &identity.version {
                query.append_pair("version", version);
            }
        }

        tracing::info!(site_id = %site_id, user_id = %user_id, "Starting app install");

        Ok(StartOAuthResult {
            authorize_url: url.into(),
        })
    }
}
