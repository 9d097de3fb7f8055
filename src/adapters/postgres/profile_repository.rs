//! PostgreSQL implementation of ProfileRepository.
//!
//! Both tables are keyed by the platform id, so saves are plain
//! `ON CONFLICT ... DO UPDATE` upserts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, SiteId, Timestamp, WeeblyUserId};
use crate::domain::weebly::{SiteProfile, UserProfile};
use crate::ports::ProfileRepository;

pub struct PostgresProfileRepository {
    pool: PgPool,
}

impl PostgresProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    user_id: i64,
    name: Option<String>,
    email: Option<String>,
    refreshed_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SiteRow {
    site_id: i64,
    user_id: Option<i64>,
    site_title: Option<String>,
    domain: Option<String>,
    is_published: bool,
    language: Option<String>,
    is_found: bool,
    refreshed_at: DateTime<Utc>,
}

fn bad_row(field: &str, e: impl std::fmt::Display) -> DomainError {
    DomainError::new(ErrorCode::DatabaseError, format!("Invalid {}: {}", field, e))
}

impl TryFrom<UserRow> for UserProfile {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            user_id: WeeblyUserId::new(row.user_id).map_err(|e| bad_row("user_id", e))?,
            name: row.name,
            email: row.email,
            refreshed_at: Timestamp::from_datetime(row.refreshed_at),
        })
    }
}

impl TryFrom<SiteRow> for SiteProfile {
    type Error = DomainError;

    fn try_from(row: SiteRow) -> Result<Self, Self::Error> {
        let user_id = row
            .user_id
            .map(WeeblyUserId::new)
            .transpose()
            .map_err(|e| bad_row("user_id", e))?;

        Ok(SiteProfile {
            site_id: SiteId::new(row.site_id).map_err(|e| bad_row("site_id", e))?,
            user_id,
            title: row.site_title,
            domain: row.domain,
            is_published: row.is_published,
            language: row.language,
            is_found: row.is_found,
            refreshed_at: Timestamp::from_datetime(row.refreshed_at),
        })
    }
}

#[async_trait]
impl ProfileRepository for PostgresProfileRepository {
    async fn find_user(&self, user_id: WeeblyUserId) -> Result<Option<UserProfile>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT user_id, name, email, refreshed_at FROM weebly_users WHERE user_id = $1",
        )
        .bind(user_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find user profile: {}", e)))?;

        row.map(UserProfile::try_from).transpose()
    }

    async fn save_user(&self, profile: &UserProfile) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO weebly_users (user_id, name, email, refreshed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                refreshed_at = EXCLUDED.refreshed_at
            "#,
        )
        .bind(profile.user_id.value())
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(profile.refreshed_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to save user profile: {}", e))
                .with_detail("user_id", profile.user_id.to_string())
        })?;
        Ok(())
    }

    async fn find_site(&self, site_id: SiteId) -> Result<Option<SiteProfile>, DomainError> {
        let row: Option<SiteRow> = sqlx::query_as(
            r#"
            SELECT site_id, user_id, site_title, domain, is_published, language, is_found, refreshed_at
            FROM weebly_sites WHERE site_id = $1
            "#,
        )
        .bind(site_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find site profile: {}", e)))?;

        row.map(SiteProfile::try_from).transpose()
    }

    async fn save_site(&self, profile: &SiteProfile) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO weebly_sites (
                site_id, user_id, site_title, domain, is_published, language, is_found, refreshed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (site_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                site_title = EXCLUDED.site_title,
                domain = EXCLUDED.domain,
                is_published = EXCLUDED.is_published,
                language = EXCLUDED.language,
                is_found = EXCLUDED.is_found,
                refreshed_at = EXCLUDED.refreshed_at
            "#,
        )
        .bind(profile.site_id.value())
        .bind(profile.user_id.map(|id| id.value()))
        .bind(&profile.title)
        .bind(&profile.domain)
        .bind(profile.is_published)
        .bind(&profile.language)
        .bind(profile.is_found)
        .bind(profile.refreshed_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::database(format!("Failed to save site profile: {}", e))
                .with_detail("site_id", profile.site_id.to_string())
        })?;
        Ok(())
    }
}
