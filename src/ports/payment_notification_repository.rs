//! PaymentNotificationRepository port - persistence for reported payments.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, NotificationId, Timestamp};
use crate::domain::weebly::PaymentNotification;

#[async_trait]
pub trait PaymentNotificationRepository: Send + Sync {
    /// Stores a new notification.
    async fn save(&self, notification: &PaymentNotification) -> Result<(), DomainError>;

    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<PaymentNotification>, DomainError>;

    /// Returns all notifications not yet delivered, oldest first.
    async fn find_unnotified(&self) -> Result<Vec<PaymentNotification>, DomainError>;

    /// Flags a notification as delivered.
    ///
    /// # Errors
    ///
    /// Returns `NotificationNotFound` if no notification has this id.
    async fn mark_notified(&self, id: &NotificationId, at: Timestamp) -> Result<(), DomainError>;
}
