//! RecordPaymentHandler - stores a payment reported by the host application.

use std::sync::Arc;

use crate::domain::weebly::{NewPaymentNotification, PaymentNotification};
use crate::ports::PaymentNotificationRepository;

use super::NotificationError;

/// Validates a payment and stores it for later delivery.
pub struct RecordPaymentHandler {
    notifications: Arc<dyn PaymentNotificationRepository>,
}

impl RecordPaymentHandler {
    pub fn new(notifications: Arc<dyn PaymentNotificationRepository>) -> Self {
        Self { notifications }
    }

    pub async fn handle(
        &self,
        new: NewPaymentNotification,
    ) -> Result<PaymentNotification, NotificationError> {
        let notification = PaymentNotification::create(new)?;
        self.notifications.save(&notification).await?;

        tracing::info!(
            notification_id = %notification.id,
            site_id = %notification.site_id,
            payable = %notification.payable_amount,
            "Payment recorded"
        );

        Ok(notification)
    }
}
