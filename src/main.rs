//! Weebly Connect HTTP entrypoint.
//!
//! Endpoints:
//! - `GET /weebly/oauth/start` - Signed install request
//! - `GET /weebly/oauth/complete` - Authorization code exchange
//! - `GET /weebly/site-token` - Signed, token for the editor element
//! - `GET /health` - Liveness
//!
//! Subcommands for the host's job scheduler, each runs once and exits:
//! - `notify-pending` - one payment notification pass
//! - `refresh-site <site_id>` - refresh the owner and site profiles
//! - `refresh-owner-sites <site_id>` - refresh every site the owner can see

use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use weebly_connect::adapters::http::{weebly_router, WeeblyAppState};
use weebly_connect::adapters::{
    InMemoryCredentialRepository, InMemoryPaymentNotificationRepository, InMemoryProfileRepository,
    PostgresCredentialRepository, PostgresPaymentNotificationRepository, PostgresProfileRepository,
    WeeblyApiClient, WeeblyClientConfig,
};
use weebly_connect::application::{
    NotificationSettings, NotifyPaymentHandler, NotifyUnnotifiedHandler, OAuthSettings,
    SiteApiHandler,
};
use weebly_connect::config::AppConfig;
use weebly_connect::domain::foundation::SiteId;
use weebly_connect::domain::weebly::{RequestAuthenticator, SiteTokenIssuer};
use weebly_connect::ports::{
    CredentialRepository, PaymentNotificationRepository, ProfileRepository, WeeblyApi,
};

struct Repositories {
    credentials: Arc<dyn CredentialRepository>,
    notifications: Arc<dyn PaymentNotificationRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let repos = repositories(&config).await?;
    let api: Arc<dyn WeeblyApi> =
        Arc::new(WeeblyApiClient::new(WeeblyClientConfig::from(&config.weebly)));

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("notify-pending") => {
            return notify_pending(&config, repos.credentials, repos.notifications, api).await
        }
        Some(command @ ("refresh-site" | "refresh-owner-sites")) => {
            let site_id: SiteId = args
                .get(1)
                .ok_or_else(|| format!("usage: weebly-connect {} <site_id>", command))?
                .parse()?;
            let handler = SiteApiHandler::new(repos.credentials, repos.profiles, api);
            if command == "refresh-site" {
                let result = handler.refresh_profile(site_id).await?;
                tracing::info!(
                    site_id = %site_id,
                    user_changed = result.user_changed,
                    site_changed = result.site_changed,
                    site_found = result.site_found,
                    "Profile refresh finished"
                );
            } else {
                handler.refresh_owner_sites(site_id).await?;
            }
            return Ok(());
        }
        _ => {}
    }
    let credentials = repos.credentials;

    let secret = config.weebly.client_secret.clone();
    let state = WeeblyAppState {
        authenticator: Arc::new(
            RequestAuthenticator::new(secret.clone())
                .with_max_age_secs(config.weebly.signature_max_age_secs),
        ),
        credentials,
        api,
        site_tokens: Arc::new(SiteTokenIssuer::new(secret)),
        oauth: OAuthSettings {
            client_id: config.weebly.client_id.clone(),
            scope: config.weebly.authorize_scope.clone(),
            redirect_uri: config.server.oauth_redirect_uri(),
            platform_domain: config.weebly.platform_domain.clone(),
        },
        display_name: config.weebly.display_name.clone(),
    };

    let app = weebly_router()
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(config.server.request_timeout())),
        );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "Starting server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.is_production() {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

async fn repositories(config: &AppConfig) -> Result<Repositories, Box<dyn std::error::Error>> {
    match &config.database {
        Some(database) => {
            let pool = weebly_connect::adapters::postgres::connect(database).await?;
            tracing::info!("Connected to PostgreSQL");
            Ok(Repositories {
                credentials: Arc::new(PostgresCredentialRepository::new(pool.clone())),
                notifications: Arc::new(PostgresPaymentNotificationRepository::new(pool.clone())),
                profiles: Arc::new(PostgresProfileRepository::new(pool)),
            })
        }
        None => {
            tracing::warn!("No database configured, credentials are kept in memory only");
            Ok(Repositories {
                credentials: Arc::new(InMemoryCredentialRepository::new()),
                notifications: Arc::new(InMemoryPaymentNotificationRepository::new()),
                profiles: Arc::new(InMemoryProfileRepository::new()),
            })
        }
    }
}

async fn notify_pending(
    config: &AppConfig,
    credentials: Arc<dyn CredentialRepository>,
    notifications: Arc<dyn PaymentNotificationRepository>,
    api: Arc<dyn WeeblyApi>,
) -> Result<(), Box<dyn std::error::Error>> {
    let notifier = Arc::new(NotifyPaymentHandler::new(
        credentials,
        notifications.clone(),
        api,
        NotificationSettings {
            default_credential_id: config.weebly.default_credential_id(),
            test_mode: config
                .weebly
                .notification_test_mode(config.server.environment),
        },
    ));

    let summary = NotifyUnnotifiedHandler::new(notifications, notifier)
        .run()
        .await?;

    if !summary.is_clean() {
        return Err(format!(
            "{} payment notification(s) could not be delivered",
            summary.failed.len()
        )
        .into());
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
