//! In-memory implementation of PaymentNotificationRepository.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, NotificationId, Timestamp};
use crate::domain::weebly::PaymentNotification;
use crate::ports::PaymentNotificationRepository;

/// Notifications in insertion order.
#[derive(Clone, Default)]
pub struct InMemoryPaymentNotificationRepository {
    notifications: Arc<RwLock<Vec<PaymentNotification>>>,
}

impl InMemoryPaymentNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<PaymentNotification> {
        self.notifications.read().await.clone()
    }
}

#[async_trait]
impl PaymentNotificationRepository for InMemoryPaymentNotificationRepository {
    async fn save(&self, notification: &PaymentNotification) -> Result<(), DomainError> {
        let mut notifications = self.notifications.write().await;
        if notifications.iter().any(|n| n.id == notification.id) {
            return Err(DomainError::database("duplicate notification id")
                .with_detail("notification_id", notification.id.to_string()));
        }
        notifications.push(notification.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &NotificationId,
    ) -> Result<Option<PaymentNotification>, DomainError> {
        Ok(self
            .notifications
            .read()
            .await
            .iter()
            .find(|n| n.id == *id)
            .cloned())
    }

    async fn find_unnotified(&self) -> Result<Vec<PaymentNotification>, DomainError> {
        Ok(self
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| !n.notified)
            .cloned()
            .collect())
    }

    async fn mark_notified(&self, id: &NotificationId, at: Timestamp) -> Result<(), DomainError> {
        let mut notifications = self.notifications.write().await;
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == *id)
            .ok_or_else(|| {
                DomainError::new(ErrorCode::NotificationNotFound, "Payment notification not found")
                    .with_detail("notification_id", id.to_string())
            })?;
        notification.mark_notified(at);
        Ok(())
    }
}
