//! HTTP handlers for the Weebly app endpoints.
//!
//! These handlers connect axum routes to the install handlers and the site
//! token issuer.

use std::sync::Arc;

use axum::extract::{FromRef, Json, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::adapters::http::dto::ErrorResponse;
use crate::adapters::http::middleware::SignedRequest;
use crate::application::handlers::oauth::{
    CompleteOAuthCommand, CompleteOAuthHandler, OAuthError, OAuthSettings, StartOAuthCommand,
    StartOAuthHandler,
};
use crate::domain::weebly::{RequestAuthenticator, SignatureError, SiteTokenError, SiteTokenIssuer};
use crate::ports::{CredentialRepository, WeeblyApi};

use super::dto::{
    CompleteOAuthParams, HealthResponse, SiteTokenResponse, SITE_TOKEN_EXPIRES_IN_MINUTES,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the Weebly endpoints.
#[derive(Clone)]
pub struct WeeblyAppState {
    pub authenticator: Arc<RequestAuthenticator>,
    pub credentials: Arc<dyn CredentialRepository>,
    pub api: Arc<dyn WeeblyApi>,
    pub site_tokens: Arc<SiteTokenIssuer>,
    pub oauth: OAuthSettings,
    /// Shown on the post-install page.
    pub display_name: String,
}

impl WeeblyAppState {
    pub fn start_oauth_handler(&self) -> StartOAuthHandler {
        StartOAuthHandler::new(self.oauth.clone(), self.authenticator.clone())
    }

    pub fn complete_oauth_handler(&self) -> CompleteOAuthHandler {
        CompleteOAuthHandler::new(
            self.credentials.clone(),
            self.api.clone(),
            self.authenticator.clone(),
            self.oauth.clone(),
        )
    }
}

impl FromRef<WeeblyAppState> for Arc<RequestAuthenticator> {
    fn from_ref(state: &WeeblyAppState) -> Self {
        state.authenticator.clone()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /weebly/oauth/start - send the merchant to the platform to grant access
pub async fn start_oauth(
    State(state): State<WeeblyAppState>,
    SignedRequest(identity): SignedRequest,
) -> Result<Redirect, WeeblyHttpError> {
    let result = state
        .start_oauth_handler()
        .handle(StartOAuthCommand { identity })?;
    Ok(Redirect::to(&result.authorize_url))
}

/// GET /weebly/oauth/complete - exchange the authorization code and store the token
///
/// Site and owner come from the `state` sealed by `/weebly/oauth/start`;
/// any `site_id`/`user_id` on this unsigned request is ignored.
pub async fn complete_oauth(
    State(state): State<WeeblyAppState>,
    Query(params): Query<CompleteOAuthParams>,
) -> Result<Response, WeeblyHttpError> {
    let result = state
        .complete_oauth_handler()
        .handle(CompleteOAuthCommand {
            authorization_code: params.authorization_code.unwrap_or_default(),
            state: params.state,
            callback_url: params.callback_url,
        })
        .await?;

    match result.redirect_url {
        Some(url) => Ok(Redirect::to(&url).into_response()),
        None => Ok(Html(installed_page(&state.display_name)).into_response()),
    }
}

/// GET /weebly/site-token - token identifying the site to the editor element
pub async fn site_token(
    State(state): State<WeeblyAppState>,
    SignedRequest(identity): SignedRequest,
) -> Result<Json<SiteTokenResponse>, WeeblyHttpError> {
    let site_id = identity.require_site()?;
    let user_id = identity.require_user()?;

    let token = state
        .site_tokens
        .issue(user_id, site_id, Some(SITE_TOKEN_EXPIRES_IN_MINUTES))?;

    Ok(Json(SiteTokenResponse {
        token,
        expires_in_minutes: SITE_TOKEN_EXPIRES_IN_MINUTES,
    }))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

fn installed_page(display_name: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><title>{name}</title></head>\
         <body><h1>{name} is connected</h1>\
         <p>You can close this window and return to your site.</p></body></html>",
        name = escape_html(display_name)
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Errors surfaced by the Weebly endpoints.
#[derive(Debug)]
pub enum WeeblyHttpError {
    OAuth(OAuthError),
    Signature(SignatureError),
    SiteToken(SiteTokenError),
}

impl From<OAuthError> for WeeblyHttpError {
    fn from(err: OAuthError) -> Self {
        Self::OAuth(err)
    }
}

impl From<SignatureError> for WeeblyHttpError {
    fn from(err: SignatureError) -> Self {
        Self::Signature(err)
    }
}

impl From<SiteTokenError> for WeeblyHttpError {
    fn from(err: SiteTokenError) -> Self {
        Self::SiteToken(err)
    }
}

fn oauth_status(err: &OAuthError) -> StatusCode {
    match err {
        OAuthError::MissingParameter(_)
        | OAuthError::InvalidParameter(_)
        | OAuthError::InvalidCallbackUrl => StatusCode::BAD_REQUEST,
        OAuthError::InvalidState(_) | OAuthError::TokenExchange(_) => StatusCode::UNAUTHORIZED,
        OAuthError::Misconfigured(_) | OAuthError::Storage(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for WeeblyHttpError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            WeeblyHttpError::OAuth(e) => {
                match e {
                    OAuthError::Storage(inner) => {
                        tracing::error!(error = %inner, "Failed to store credential")
                    }
                    OAuthError::Misconfigured(setting) => {
                        tracing::error!(setting = %setting, "Install flow misconfigured")
                    }
                    _ => {}
                }
                (oauth_status(e), ErrorResponse::new(e.code(), e.to_string()))
            }
            WeeblyHttpError::Signature(e) => {
                (e.status_code(), ErrorResponse::new(e.code(), e.to_string()))
            }
            WeeblyHttpError::SiteToken(e) => {
                tracing::error!(error = %e, "Failed to issue site token");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INTERNAL_ERROR", "Failed to issue site token"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
