//! PostgreSQL adapters.
//!
//! Implementations of the repository ports backed by `sqlx`, plus pool
//! construction with embedded migrations.

mod credential_repository;
mod payment_notification_repository;
mod profile_repository;

pub use credential_repository::PostgresCredentialRepository;
pub use payment_notification_repository::PostgresPaymentNotificationRepository;
pub use profile_repository::PostgresProfileRepository;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::domain::foundation::DomainError;

/// Opens a connection pool and, when configured, applies pending migrations.
///
/// Migrations run before the pool is handed out so callers can assume the
/// schema exists.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DomainError> {
    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.url)
        .await
        .map_err(|e| DomainError::database(format!("Failed to connect to database: {}", e)))?;

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to run migrations: {}", e)))?;
        tracing::info!("Database migrations applied");
    }

    Ok(pool)
}
