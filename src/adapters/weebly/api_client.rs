//! Weebly REST API adapter.
//!
//! Implements the `WeeblyApi` trait over HTTPS with `reqwest`.
//!
//! Every REST call carries the versioned `Accept` header, the app name as
//! `User-Agent` and the site token in `X-Weebly-Access-Token`. Error bodies
//! look like `{"error": {"message": "..."}}`; an "Unknown api key" message or
//! a 401/403 status means the token is no longer usable, and a 404 or a
//! "Site not found" message means the resource is gone.
//!
//! URLs are built segment by segment so ids and card names are escaped.
//! Listings are fetched page by page (`limit`/`page`, first page is 1) until
//! a page comes back shorter than the page size.
//!
//! # Configuration
//!
//! ```ignore
//! let config = WeeblyClientConfig::new("my-app", client_id, client_secret);
//! let client = WeeblyApiClient::new(config);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::WeeblyConfig;
use crate::domain::foundation::{SiteId, WeeblyUserId};
use crate::domain::weebly::SiteSnapshot;
use crate::ports::{
    CardUpdate, PaymentNotificationRequest, SiteDetails, TokenExchangeRequest, TokenGrant,
    UserDetails, WeeblyApi, WeeblyApiError,
};

const WEEBLY_ACCEPT: &str = "application/vnd.weebly.v1+json";
const ACCESS_TOKEN_HEADER: &str = "X-Weebly-Access-Token";

/// Platform message for a revoked or unknown token.
const UNKNOWN_API_KEY: &str = "Unknown api key";

/// Platform message for a deleted or foreign site.
const SITE_NOT_FOUND: &str = "Site not found";

const DEFAULT_PAGE_SIZE: usize = 200;

/// Weebly API client configuration.
#[derive(Clone)]
pub struct WeeblyClientConfig {
    app_name: String,
    client_id: String,
    client_secret: SecretString,

    /// Base URL for REST calls (default: https://api.weebly.com).
    api_base_url: String,

    /// Exchange endpoint used when the platform supplies none.
    token_url: String,

    timeout: Duration,

    /// Items requested per page of a listing.
    page_size: usize,
}

impl WeeblyClientConfig {
    pub fn new(
        app_name: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            client_id: client_id.into(),
            client_secret,
            api_base_url: "https://api.weebly.com".to_string(),
            token_url: "https://www.weebly.com/app-center/oauth/access_token".to_string(),
            timeout: Duration::from_secs(60),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl From<&WeeblyConfig> for WeeblyClientConfig {
    fn from(config: &WeeblyConfig) -> Self {
        WeeblyClientConfig::new(
            config.app_name.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        )
        .with_base_url(config.api_base_url.clone())
        .with_token_url(config.token_url.clone())
        .with_timeout(config.request_timeout())
    }
}

/// Weebly API adapter.
pub struct WeeblyApiClient {
    config: WeeblyClientConfig,
    http_client: reqwest::Client,
}

impl WeeblyApiClient {
    pub fn new(config: WeeblyClientConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// REST URL for `segments` under the base URL, each segment escaped.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, WeeblyApiError> {
        let mut url = Url::parse(&self.config.api_base_url)
            .map_err(|e| WeeblyApiError::network(format!("invalid API base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| WeeblyApiError::network("API base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call(
        &self,
        method: Method,
        url: Url,
        access_token: &SecretString,
        body: Option<Value>,
        action: &str,
    ) -> Result<Value, WeeblyApiError> {
        tracing::info!(action, method = %method, url = %url, "Calling Weebly API");

        let mut request = self
            .http_client
            .request(method, url)
            .header(ACCEPT, WEEBLY_ACCEPT)
            .header(USER_AGENT, self.config.app_name.as_str())
            .header(ACCESS_TOKEN_HEADER, access_token.expose_secret().as_str())
            .timeout(self.config.timeout);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(action, error = %e, "Weebly API request failed");
            WeeblyApiError::network(format!("{} - {}", action, e))
        })?;

        read_response(response, action).await
    }

    /// GETs every page of a listing and concatenates the items.
    async fn get_paginated(
        &self,
        segments: &[&str],
        access_token: &SecretString,
        action: &str,
    ) -> Result<Vec<Value>, WeeblyApiError> {
        let limit = self.config.page_size;
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut url = self.endpoint(segments)?;
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string())
                .append_pair("page", &page.to_string());

            let batch = match self.call(Method::GET, url, access_token, None, action).await? {
                Value::Array(batch) => batch,
                other => {
                    return Err(WeeblyApiError::invalid_response(format!(
                        "{} - expected a list, got {}",
                        action, other
                    )))
                }
            };

            let count = batch.len();
            items.extend(batch);
            if count < limit {
                return Ok(items);
            }
            page += 1;
            tracing::info!(action, page, "Paginated request to Weebly, fetching next page");
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    callback_url: Option<String>,
}

#[derive(Deserialize)]
struct UserBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Ids arrive as numbers or numeric strings; the language is not always a string.
#[derive(Deserialize)]
struct SiteBody {
    site_id: Value,
    #[serde(default)]
    user_id: Value,
    #[serde(default)]
    site_title: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    is_published: Option<bool>,
    #[serde(default)]
    language: Value,
}

fn platform_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn site_details(value: Value, action: &str) -> Result<SiteDetails, WeeblyApiError> {
    let body: SiteBody = serde_json::from_value(value)
        .map_err(|e| WeeblyApiError::invalid_response(format!("{} - {}", action, e)))?;
    let site_id = platform_id(&body.site_id)
        .and_then(|id| SiteId::new(id).ok())
        .ok_or_else(|| WeeblyApiError::invalid_response(format!("{} - missing site_id", action)))?;

    let language = match body.language {
        Value::String(language) => Some(language),
        Value::Null => None,
        other => {
            tracing::error!(site_id = %site_id, language = %other, "Weebly returned a non-string language");
            None
        }
    };

    Ok(SiteDetails {
        site_id,
        snapshot: SiteSnapshot {
            user_id: platform_id(&body.user_id).and_then(|id| WeeblyUserId::new(id).ok()),
            title: body.site_title,
            domain: body.domain,
            is_published: body.is_published.unwrap_or(false),
            language,
        },
    })
}

async fn read_response(response: reqwest::Response, action: &str) -> Result<Value, WeeblyApiError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| WeeblyApiError::network(format!("{} - {}", action, e)))?;

    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        return serde_json::from_str(&text).map_err(|e| {
            tracing::warn!(action, body = %text, "No JSON in Weebly response");
            WeeblyApiError::invalid_response(format!("{} - invalid JSON response: {}", action, e))
                .with_status(status.as_u16())
        });
    }

    Err(error_from_status(status, &text, action))
}

fn error_from_status(status: StatusCode, body: &str, action: &str) -> WeeblyApiError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
    let message = format!("{} - {}", action, detail);

    let rejected = status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || detail.contains(UNKNOWN_API_KEY);

    if rejected {
        tracing::warn!(action, status = status.as_u16(), error = %detail, "Weebly rejected access token");
        WeeblyApiError::token_rejected(message).with_status(status.as_u16())
    } else if status == StatusCode::NOT_FOUND || detail.contains(SITE_NOT_FOUND) {
        tracing::info!(action, status = status.as_u16(), error = %detail, "Weebly resource not found");
        WeeblyApiError::not_found(message).with_status(status.as_u16())
    } else {
        tracing::error!(action, status = status.as_u16(), error = %detail, "Weebly API error");
        WeeblyApiError::api(message).with_status(status.as_u16())
    }
}

fn notification_body(request: &PaymentNotificationRequest) -> Value {
    let mut body = Map::new();
    body.insert("name".into(), json!(request.name));
    body.insert("method".into(), json!(request.method.as_str()));
    body.insert("gross_amount".into(), json!(request.gross_amount.as_major_units()));
    body.insert(
        "payable_amount".into(),
        json!(request.payable_amount.as_major_units()),
    );
    if let Some(detail) = &request.detail {
        body.insert("detail".into(), json!(detail));
    }
    if let Some(kind) = request.kind {
        body.insert("kind".into(), json!(kind.as_str()));
    }
    if let Some(term) = request.term {
        body.insert("term".into(), json!(term.as_str()));
    }
    if let Some(currency) = &request.currency {
        body.insert("currency".into(), json!(currency));
    }
    Value::Object(body)
}

#[async_trait]
impl WeeblyApi for WeeblyApiClient {
    async fn exchange_token(
        &self,
        request: TokenExchangeRequest,
    ) -> Result<TokenGrant, WeeblyApiError> {
        let url = request
            .callback_url
            .as_deref()
            .unwrap_or(&self.config.token_url);
        tracing::info!(url = %url, "Exchanging authorization code");

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret().as_str()),
            ("authorization_code", request.authorization_code.as_str()),
        ];

        let response = self
            .http_client
            .post(url)
            .header(ACCEPT, WEEBLY_ACCEPT)
            .header(USER_AGENT, self.config.app_name.as_str())
            .timeout(self.config.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| WeeblyApiError::network(format!("exchanging token - {}", e)))?;

        let value = read_response(response, "exchanging token").await?;
        let token: TokenResponse = serde_json::from_value(value).map_err(|e| {
            WeeblyApiError::invalid_response(format!("exchanging token - {}", e))
        })?;

        let access_token = token
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                WeeblyApiError::invalid_response("exchanging token - no access_token in response")
            })?;

        Ok(TokenGrant {
            access_token: SecretString::new(access_token),
            callback_url: token.callback_url.filter(|u| !u.is_empty()),
        })
    }

    async fn notify_payment(
        &self,
        access_token: &SecretString,
        request: &PaymentNotificationRequest,
    ) -> Result<(), WeeblyApiError> {
        let url = self.endpoint(&["v1", "admin", "app", "payment_notifications"])?;
        self.call(
            Method::POST,
            url,
            access_token,
            Some(notification_body(request)),
            "reporting payment",
        )
        .await
        .map(|_| ())
    }

    async fn deauthorize(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
    ) -> Result<String, WeeblyApiError> {
        let url = self.endpoint(&[
            "v1",
            "user",
            "sites",
            &site_id.to_string(),
            "apps",
            &self.config.client_id,
            "deauthorize",
        ])?;
        let value = self
            .call(Method::POST, url, access_token, None, "deauthorizing")
            .await?;

        let status = value
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        if status != "disconnected" {
            tracing::error!(
                site_id = %site_id,
                status = %status,
                "Attempted to disconnect but site is not disconnected"
            );
        }
        Ok(status)
    }

    async fn publish_site(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
    ) -> Result<(), WeeblyApiError> {
        let url = self.endpoint(&["v1", "user", "sites", &site_id.to_string(), "publish"])?;
        self.call(Method::POST, url, access_token, None, "publishing site")
            .await
            .map(|_| ())
    }

    async fn publish_snippet(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
        snippet: &str,
    ) -> Result<(), WeeblyApiError> {
        let url = self.endpoint(&["v1", "user", "sites", &site_id.to_string(), "snippet"])?;
        self.call(
            Method::POST,
            url,
            access_token,
            Some(json!({ "snippet": snippet })),
            "publishing snippet",
        )
        .await
        .map(|_| ())
    }

    async fn update_card(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
        update: &CardUpdate,
    ) -> Result<(), WeeblyApiError> {
        let url = self.endpoint(&[
            "v1",
            "user",
            "sites",
            &site_id.to_string(),
            "cards",
            &update.card_name,
        ])?;
        self.call(
            Method::PATCH,
            url,
            access_token,
            Some(json!({ "hidden": update.hidden, "card_data": update.card_data })),
            "updating card",
        )
        .await
        .map(|_| ())
    }

    async fn get_user(
        &self,
        access_token: &SecretString,
        user_id: WeeblyUserId,
    ) -> Result<UserDetails, WeeblyApiError> {
        let action = "getting user details";
        let mut url = self.endpoint(&["v1", "user"])?;
        url.query_pairs_mut()
            .append_pair("user_id", &user_id.to_string());

        let value = self.call(Method::GET, url, access_token, None, action).await?;
        let body: UserBody = serde_json::from_value(value)
            .map_err(|e| WeeblyApiError::invalid_response(format!("{} - {}", action, e)))?;

        Ok(UserDetails {
            name: body.name,
            email: body.email,
        })
    }

    async fn get_site(
        &self,
        access_token: &SecretString,
        site_id: SiteId,
    ) -> Result<SiteDetails, WeeblyApiError> {
        let action = "getting site details";
        let url = self.endpoint(&["v1", "user", "sites", &site_id.to_string()])?;
        let value = self.call(Method::GET, url, access_token, None, action).await?;
        site_details(value, action)
    }

    async fn list_sites(&self, access_token: &SecretString) -> Result<Vec<SiteDetails>, WeeblyApiError> {
        let action = "listing sites";
        self.get_paginated(&["v1", "user", "sites"], access_token, action)
            .await?
            .into_iter()
            .map(|item| site_details(item, action))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::weebly::{Amount, PaymentKind, PaymentMethod, PaymentTerm};
    use crate::ports::WeeblyApiErrorCode;
    use axum::extract::{Form, Path, Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::{get, patch, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured {
        bodies: Arc<Mutex<Vec<Value>>>,
        headers: Arc<Mutex<Vec<HeaderMap>>>,
        /// `(limit, page)` of each listing request.
        pages: Arc<Mutex<Vec<(usize, usize)>>>,
    }

    fn token(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    fn site() -> SiteId {
        SiteId::new(456).unwrap()
    }

    fn is_good(headers: &HeaderMap) -> bool {
        headers
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            == Some("good-token")
    }

    fn unknown_key() -> axum::response::Response {
        (
            AxumStatus::UNAUTHORIZED,
            Json(json!({"error": {"message": "Unknown api key"}})),
        )
            .into_response()
    }

    async fn payment_notifications(
        State(captured): State<Captured>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> axum::response::Response {
        if !is_good(&headers) {
            return unknown_key();
        }
        captured.bodies.lock().unwrap().push(body);
        captured.headers.lock().unwrap().push(headers);
        Json(json!({"success": true})).into_response()
    }

    async fn deauthorize(
        Path((site_id, client_id)): Path<(i64, String)>,
        headers: HeaderMap,
    ) -> axum::response::Response {
        if !is_good(&headers) {
            return unknown_key();
        }
        assert_eq!(site_id, 456);
        assert_eq!(client_id, "client-1");
        Json(json!({"status": "disconnected"})).into_response()
    }

    async fn access_token(Form(form): Form<HashMap<String, String>>) -> axum::response::Response {
        let ok = form.get("client_id").map(String::as_str) == Some("client-1")
            && form.get("client_secret").map(String::as_str) == Some("app-secret")
            && form.get("authorization_code").map(String::as_str) == Some("good-code");
        if ok {
            Json(json!({
                "access_token": "fresh-token",
                "callback_url": "https://www.weebly.com/app-center/done"
            }))
            .into_response()
        } else {
            (
                AxumStatus::BAD_REQUEST,
                Json(json!({"error": {"message": "Invalid authorization code"}})),
            )
                .into_response()
        }
    }

    async fn empty_token() -> Json<Value> {
        Json(json!({"callback_url": "https://www.weebly.com/x"}))
    }

    async fn publish_fails() -> axum::response::Response {
        (AxumStatus::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
    }

    async fn snippet_not_json() -> &'static str {
        "<html>ok</html>"
    }

    async fn card(
        Path((_site_id, name)): Path<(i64, String)>,
        State(captured): State<Captured>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        captured
            .bodies
            .lock()
            .unwrap()
            .push(json!({"card": name, "body": body}));
        Json(json!({"ok": true}))
    }

    async fn user(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> axum::response::Response {
        if !is_good(&headers) {
            return unknown_key();
        }
        if params.get("user_id").map(String::as_str) != Some("123") {
            return (
                AxumStatus::NOT_FOUND,
                Json(json!({"error": {"message": "User not found"}})),
            )
                .into_response();
        }
        Json(json!({"user_id": "123", "name": "Ada", "email": "ada@example.com"})).into_response()
    }

    async fn site_detail(Path(site_id): Path<i64>) -> axum::response::Response {
        match site_id {
            456 => Json(json!({
                "site_id": "456",
                "user_id": "123",
                "site_title": "Ada's Shop",
                "domain": "shop.example.com",
                "is_published": true,
                "language": "en"
            }))
            .into_response(),
            457 => Json(json!({"site_id": 457, "language": {"code": "en"}})).into_response(),
            _ => (
                AxumStatus::BAD_REQUEST,
                Json(json!({"error": {"message": "Site not found"}})),
            )
                .into_response(),
        }
    }

    /// Three sites, served in pages.
    async fn site_list(
        State(captured): State<Captured>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        let limit: usize = params["limit"].parse().unwrap();
        let page: usize = params["page"].parse().unwrap();
        captured.pages.lock().unwrap().push((limit, page));

        let all: Vec<Value> = (1..=3)
            .map(|id| json!({"site_id": id.to_string(), "site_title": format!("Site {}", id)}))
            .collect();
        let start = (page - 1) * limit;
        Json(Value::Array(all.into_iter().skip(start).take(limit).collect()))
    }

    async fn not_a_list() -> Json<Value> {
        Json(json!({"sites": []}))
    }

    async fn spawn_stub() -> (String, Captured) {
        let captured = Captured::default();
        let app = Router::new()
            .route("/v1/admin/app/payment_notifications", post(payment_notifications))
            .route(
                "/v1/user/sites/:site_id/apps/:client_id/deauthorize",
                post(deauthorize),
            )
            .route("/v1/user/sites/:site_id/publish", post(publish_fails))
            .route("/v1/user/sites/:site_id/snippet", post(snippet_not_json))
            .route("/v1/user/sites/:site_id/cards/:name", patch(card))
            .route("/v1/user", get(user))
            .route("/v1/user/sites", get(site_list))
            .route("/v1/user/sites/:site_id", get(site_detail))
            .route("/broken/v1/user/sites", get(not_a_list))
            .route("/oauth/access_token", post(access_token))
            .route("/oauth/empty", post(empty_token))
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    fn client(base: &str) -> WeeblyApiClient {
        WeeblyApiClient::new(
            WeeblyClientConfig::new("weebly-connect-tests", "client-1", token("app-secret"))
                .with_base_url(base)
                .with_token_url(format!("{}/oauth/access_token", base))
                .with_timeout(Duration::from_secs(5)),
        )
    }

    fn notification() -> PaymentNotificationRequest {
        PaymentNotificationRequest {
            name: "Pro plan".to_string(),
            method: PaymentMethod::TestPurchase,
            gross_amount: Amount::from_cents(2000),
            payable_amount: Amount::from_cents(600),
            detail: None,
            kind: Some(PaymentKind::Single),
            term: Some(PaymentTerm::Month),
            currency: Some("USD".to_string()),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Token Exchange Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn exchange_token_posts_client_credentials() {
        let (base, _) = spawn_stub().await;

        let grant = client(&base)
            .exchange_token(TokenExchangeRequest {
                authorization_code: "good-code".to_string(),
                callback_url: None,
            })
            .await
            .unwrap();

        assert_eq!(grant.access_token.expose_secret(), "fresh-token");
        assert_eq!(
            grant.callback_url.as_deref(),
            Some("https://www.weebly.com/app-center/done")
        );
    }

    #[tokio::test]
    async fn exchange_token_uses_supplied_callback_url() {
        let (base, _) = spawn_stub().await;
        let api = WeeblyApiClient::new(
            WeeblyClientConfig::new("t", "client-1", token("app-secret"))
                .with_token_url("http://127.0.0.1:1/never"),
        );

        let grant = api
            .exchange_token(TokenExchangeRequest {
                authorization_code: "good-code".to_string(),
                callback_url: Some(format!("{}/oauth/access_token", base)),
            })
            .await
            .unwrap();

        assert_eq!(grant.access_token.expose_secret(), "fresh-token");
    }

    #[tokio::test]
    async fn exchange_token_bad_code_is_api_error() {
        let (base, _) = spawn_stub().await;

        let err = client(&base)
            .exchange_token(TokenExchangeRequest {
                authorization_code: "bad-code".to_string(),
                callback_url: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, WeeblyApiErrorCode::Api);
        assert_eq!(err.status, Some(400));
        assert!(err.message.contains("Invalid authorization code"));
    }

    #[tokio::test]
    async fn exchange_token_without_token_is_invalid_response() {
        let (base, _) = spawn_stub().await;

        let err = client(&base)
            .exchange_token(TokenExchangeRequest {
                authorization_code: "good-code".to_string(),
                callback_url: Some(format!("{}/oauth/empty", base)),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, WeeblyApiErrorCode::InvalidResponse);
    }

    // ══════════════════════════════════════════════════════════════
    // REST Call Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn notify_payment_sends_headers_and_amounts() {
        let (base, captured) = spawn_stub().await;

        client(&base)
            .notify_payment(&token("good-token"), &notification())
            .await
            .unwrap();

        let body = captured.bodies.lock().unwrap()[0].clone();
        assert_eq!(body["method"], "testpurchase");
        assert_eq!(body["gross_amount"], 20.0);
        assert_eq!(body["payable_amount"], 6.0);
        assert_eq!(body["term"], "month");
        assert_eq!(body["kind"], "single");
        assert!(body.get("detail").is_none());

        let headers = captured.headers.lock().unwrap()[0].clone();
        assert_eq!(headers.get("accept").unwrap(), WEEBLY_ACCEPT);
        assert_eq!(headers.get("user-agent").unwrap(), "weebly-connect-tests");
    }

    #[tokio::test]
    async fn unknown_api_key_is_token_rejected() {
        let (base, _) = spawn_stub().await;

        let err = client(&base)
            .notify_payment(&token("revoked"), &notification())
            .await
            .unwrap_err();

        assert!(err.is_token_rejected());
        assert_eq!(err.status, Some(401));
        assert!(err.message.contains("Unknown api key"));
    }

    #[tokio::test]
    async fn deauthorize_returns_status() {
        let (base, _) = spawn_stub().await;

        let status = client(&base)
            .deauthorize(&token("good-token"), site())
            .await
            .unwrap();

        assert_eq!(status, "disconnected");
    }

    #[tokio::test]
    async fn server_error_without_json_is_api_error() {
        let (base, _) = spawn_stub().await;

        let err = client(&base)
            .publish_site(&token("good-token"), site())
            .await
            .unwrap_err();

        assert_eq!(err.code, WeeblyApiErrorCode::Api);
        assert_eq!(err.status, Some(500));
    }

    #[tokio::test]
    async fn success_without_json_is_invalid_response() {
        let (base, _) = spawn_stub().await;

        let err = client(&base)
            .publish_snippet(&token("good-token"), site(), "<script></script>")
            .await
            .unwrap_err();

        assert_eq!(err.code, WeeblyApiErrorCode::InvalidResponse);
    }

    #[tokio::test]
    async fn update_card_patches_named_card() {
        let (base, captured) = spawn_stub().await;
        let update = CardUpdate {
            card_name: "stats".to_string(),
            hidden: false,
            card_data: json!([{"type": "text", "value": "hello"}]),
        };

        client(&base)
            .update_card(&token("good-token"), site(), &update)
            .await
            .unwrap();

        let body = captured.bodies.lock().unwrap()[0].clone();
        assert_eq!(body["card"], "stats");
        assert_eq!(body["body"]["hidden"], false);
    }

    #[tokio::test]
    async fn card_name_is_sent_as_one_escaped_segment() {
        let (base, captured) = spawn_stub().await;
        let update = CardUpdate {
            card_name: "sales/weekly?x=1 #2".to_string(),
            hidden: true,
            card_data: json!([]),
        };

        client(&base)
            .update_card(&token("good-token"), site(), &update)
            .await
            .unwrap();

        let body = captured.bodies.lock().unwrap()[0].clone();
        assert_eq!(body["card"], "sales/weekly?x=1 #2");
    }

    #[test]
    fn endpoint_escapes_each_segment() {
        let url = client("https://api.weebly.com")
            .endpoint(&["v1", "user", "sites", "456", "cards", "a/b?c"])
            .unwrap();
        assert_eq!(url.as_str(), "https://api.weebly.com/v1/user/sites/456/cards/a%2Fb%3Fc");
    }

    // ══════════════════════════════════════════════════════════════
    // Lookup Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn get_user_passes_user_id() {
        let (base, _) = spawn_stub().await;

        let details = client(&base)
            .get_user(&token("good-token"), WeeblyUserId::new(123).unwrap())
            .await
            .unwrap();

        assert_eq!(details.name.as_deref(), Some("Ada"));
        assert_eq!(details.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn get_site_parses_string_ids() {
        let (base, _) = spawn_stub().await;

        let details = client(&base)
            .get_site(&token("good-token"), site())
            .await
            .unwrap();

        assert_eq!(details.site_id, site());
        assert_eq!(details.snapshot.user_id, Some(WeeblyUserId::new(123).unwrap()));
        assert_eq!(details.snapshot.title.as_deref(), Some("Ada's Shop"));
        assert!(details.snapshot.is_published);
        assert_eq!(details.snapshot.language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn non_string_language_is_dropped() {
        let (base, _) = spawn_stub().await;

        let details = client(&base)
            .get_site(&token("good-token"), SiteId::new(457).unwrap())
            .await
            .unwrap();

        assert!(details.snapshot.language.is_none());
        assert!(!details.snapshot.is_published);
    }

    #[tokio::test]
    async fn site_not_found_message_is_not_found() {
        let (base, _) = spawn_stub().await;

        let err = client(&base)
            .get_site(&token("good-token"), SiteId::new(999).unwrap())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(err.status, Some(400));
    }

    #[tokio::test]
    async fn list_sites_follows_pages_until_short_page() {
        let (base, captured) = spawn_stub().await;
        let api = WeeblyApiClient::new(
            WeeblyClientConfig::new("t", "client-1", token("app-secret"))
                .with_base_url(&base)
                .with_page_size(2),
        );

        let sites = api.list_sites(&token("good-token")).await.unwrap();

        let ids: Vec<i64> = sites.iter().map(|s| s.site_id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(sites[2].snapshot.title.as_deref(), Some("Site 3"));
        assert_eq!(*captured.pages.lock().unwrap(), vec![(2, 1), (2, 2)]);
    }

    #[tokio::test]
    async fn list_sites_with_default_page_size_is_one_request() {
        let (base, captured) = spawn_stub().await;

        let sites = client(&base).list_sites(&token("good-token")).await.unwrap();

        assert_eq!(sites.len(), 3);
        assert_eq!(*captured.pages.lock().unwrap(), vec![(DEFAULT_PAGE_SIZE, 1)]);
    }

    #[tokio::test]
    async fn listing_that_is_not_a_list_is_invalid_response() {
        let (base, _) = spawn_stub().await;

        let err = client(&format!("{}/broken", base))
            .list_sites(&token("good-token"))
            .await
            .unwrap_err();

        assert_eq!(err.code, WeeblyApiErrorCode::InvalidResponse);
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let err = client("http://127.0.0.1:1")
            .publish_site(&token("good-token"), site())
            .await
            .unwrap_err();

        assert_eq!(err.code, WeeblyApiErrorCode::Network);
    }

    #[test]
    fn missing_status_is_not_found() {
        let err = error_from_status(StatusCode::NOT_FOUND, "", "getting site details");
        assert!(err.is_not_found());
    }

    #[test]
    fn forbidden_is_token_rejected() {
        let err = error_from_status(StatusCode::FORBIDDEN, "", "x");
        assert!(err.is_token_rejected());
    }

    #[test]
    fn error_message_taken_from_envelope() {
        let err = error_from_status(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"This site cannot be published"}}"#,
            "publishing site",
        );
        assert_eq!(err.message, "publishing site - This site cannot be published");
        assert_eq!(err.code, WeeblyApiErrorCode::Api);
    }
}
