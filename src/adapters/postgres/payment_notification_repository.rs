//! PostgreSQL implementation of PaymentNotificationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, NotificationId, SiteId, Timestamp};
use crate::domain::weebly::{Amount, PaymentKind, PaymentNotification, PaymentTerm};
use crate::ports::PaymentNotificationRepository;

pub struct PostgresPaymentNotificationRepository {
    pool: PgPool,
}

impl PostgresPaymentNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    site_id: i64,
    name: String,
    detail: Option<String>,
    is_purchase: bool,
    kind: Option<String>,
    term: Option<String>,
    gross_amount_cents: i64,
    payable_amount_cents: i64,
    currency: String,
    notified: bool,
    notified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for PaymentNotification {
    type Error = DomainError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let invalid = |field: &str, e: &dyn std::fmt::Display| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid {}: {}", field, e))
        };

        let site_id = SiteId::new(row.site_id).map_err(|e| invalid("site_id", &e))?;
        let kind = row
            .kind
            .as_deref()
            .map(str::parse::<PaymentKind>)
            .transpose()
            .map_err(|e| invalid("kind", &e))?;
        let term = row
            .term
            .as_deref()
            .map(str::parse::<PaymentTerm>)
            .transpose()
            .map_err(|e| invalid("term", &e))?;

        Ok(PaymentNotification {
            id: NotificationId::from_uuid(row.id),
            site_id,
            name: row.name,
            detail: row.detail,
            is_purchase: row.is_purchase,
            kind,
            term,
            gross_amount: Amount::from_cents(row.gross_amount_cents),
            payable_amount: Amount::from_cents(row.payable_amount_cents),
            currency: row.currency,
            notified: row.notified,
            notified_at: row.notified_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

const SELECT_COLUMNS: &str = "id, site_id, name, detail, is_purchase, kind, term, \
     gross_amount_cents, payable_amount_cents, currency, notified, notified_at, created_at";

#[async_trait]
impl PaymentNotificationRepository for PostgresPaymentNotificationRepository {
    async fn save(&self, notification: &PaymentNotification) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO weebly_payment_notifications (
                id, site_id, name, detail, is_purchase, kind, term,
                gross_amount_cents, payable_amount_cents, currency,
                notified, notified_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(notification.site_id.value())
        .bind(&notification.name)
        .bind(&notification.detail)
        .bind(notification.is_purchase)
        .bind(notification.kind.map(|k| k.as_str()))
        .bind(notification.term.map(|t| t.as_str()))
        .bind(notification.gross_amount.cents())
        .bind(notification.payable_amount.cents())
        .bind(&notification.currency)
        .bind(notification.notified)
        .bind(notification.notified_at.map(|t| *t.as_datetime()))
        .bind(notification.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to save payment notification: {}", e),
            )
        })?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<PaymentNotification>, DomainError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM weebly_payment_notifications WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to find payment notification: {}", e),
            )
        })?;

        row.map(PaymentNotification::try_from).transpose()
    }

    async fn find_unnotified(&self) -> Result<Vec<PaymentNotification>, DomainError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM weebly_payment_notifications WHERE NOT notified ORDER BY created_at",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to list pending payment notifications: {}", e),
            )
        })?;

        rows.into_iter().map(PaymentNotification::try_from).collect()
    }

    async fn mark_notified(&self, id: &NotificationId, at: Timestamp) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE weebly_payment_notifications SET
                notified = TRUE,
                notified_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to update payment notification: {}", e),
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::NotificationNotFound,
                "Payment notification not found",
            ));
        }

        Ok(())
    }
}
