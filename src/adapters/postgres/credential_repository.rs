//! PostgreSQL implementation of CredentialRepository.
//!
//! The unique constraint on `site_id` enforces one credential per site; the
//! upsert relies on it through `ON CONFLICT (site_id)`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    CredentialId, DomainError, ErrorCode, SiteId, Timestamp, WeeblyUserId,
};
use crate::domain::weebly::{Credential, CredentialGrant};
use crate::ports::{CredentialRepository, UpsertResult};

pub struct PostgresCredentialRepository {
    pool: PgPool,
}

impl PostgresCredentialRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a credential.
#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    site_id: i64,
    user_id: i64,
    access_token: String,
    is_valid: bool,
    version: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct UpsertedRow {
    #[sqlx(flatten)]
    credential: CredentialRow,
    inserted: bool,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = DomainError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        let site_id = SiteId::new(row.site_id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid site_id: {}", e))
        })?;
        let user_id = WeeblyUserId::new(row.user_id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e))
        })?;

        Ok(Credential {
            id: CredentialId::from_uuid(row.id),
            site_id,
            user_id,
            access_token: SecretString::new(row.access_token),
            is_valid: row.is_valid,
            version: row.version,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

const SELECT_COLUMNS: &str =
    "id, site_id, user_id, access_token, is_valid, version, created_at, updated_at";

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn find_by_id(&self, id: &CredentialId) -> Result<Option<Credential>, DomainError> {
        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            "SELECT {} FROM weebly_credentials WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to find credential: {}", e))
        })?;

        row.map(Credential::try_from).transpose()
    }

    async fn find_by_site(&self, site_id: SiteId) -> Result<Option<Credential>, DomainError> {
        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            "SELECT {} FROM weebly_credentials WHERE site_id = $1",
            SELECT_COLUMNS
        ))
        .bind(site_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to find credential: {}", e))
        })?;

        row.map(Credential::try_from).transpose()
    }

    async fn upsert(&self, grant: CredentialGrant) -> Result<UpsertResult, DomainError> {
        let now = Timestamp::now();

        // xmax is zero only for a freshly inserted tuple.
        let row: UpsertedRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO weebly_credentials (
                id, site_id, user_id, access_token, is_valid, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, TRUE, $5, $6, $6)
            ON CONFLICT (site_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                access_token = EXCLUDED.access_token,
                is_valid = TRUE,
                version = COALESCE(EXCLUDED.version, weebly_credentials.version),
                updated_at = EXCLUDED.updated_at
            RETURNING {}, (xmax = 0) AS inserted
            "#,
            SELECT_COLUMNS
        ))
        .bind(CredentialId::new().as_uuid())
        .bind(grant.site_id.value())
        .bind(grant.user_id.value())
        .bind(grant.access_token.expose_secret())
        .bind(&grant.version)
        .bind(now.as_datetime())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to upsert credential: {}", e),
            )
            .with_detail("site_id", grant.site_id.to_string())
        })?;

        Ok(UpsertResult {
            inserted: row.inserted,
            credential: Credential::try_from(row.credential)?,
        })
    }

    async fn set_validity(&self, id: &CredentialId, is_valid: bool) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE weebly_credentials SET
                is_valid = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(is_valid)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update credential: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::CredentialNotFound,
                "Credential not found",
            )
            .with_detail("credential_id", id.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(site_id: i64) -> CredentialRow {
        CredentialRow {
            id: Uuid::new_v4(),
            site_id,
            user_id: 7,
            access_token: "tok".to_string(),
            is_valid: true,
            version: Some("1.0.0".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_to_credential() {
        let credential = Credential::try_from(row(456)).unwrap();
        assert_eq!(credential.site_id.value(), 456);
        assert_eq!(credential.access_token.expose_secret(), "tok");
    }

    #[test]
    fn row_with_bad_site_id_is_database_error() {
        let err = Credential::try_from(row(0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }
}
