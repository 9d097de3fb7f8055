//! NotifyUnnotifiedHandler - one delivery pass over pending notifications.

use std::sync::Arc;

use crate::domain::foundation::NotificationId;
use crate::ports::PaymentNotificationRepository;

use super::{NotificationError, NotifyPaymentHandler, NotifyPaymentResult};

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifySummary {
    pub notified: usize,
    pub skipped: usize,
    /// Notifications left pending, with the reason.
    pub failed: Vec<(NotificationId, String)>,
}

impl NotifySummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delivers every pending notification once, oldest first.
///
/// A failure does not stop the pass; the record stays pending for the next
/// run of the host's scheduler.
pub struct NotifyUnnotifiedHandler {
    notifications: Arc<dyn PaymentNotificationRepository>,
    notifier: Arc<NotifyPaymentHandler>,
}

impl NotifyUnnotifiedHandler {
    pub fn new(
        notifications: Arc<dyn PaymentNotificationRepository>,
        notifier: Arc<NotifyPaymentHandler>,
    ) -> Self {
        Self {
            notifications,
            notifier,
        }
    }

    pub async fn run(&self) -> Result<NotifySummary, NotificationError> {
        let pending = self.notifications.find_unnotified().await?;
        if pending.is_empty() {
            tracing::info!("There are no unnotified payments");
            return Ok(NotifySummary::default());
        }

        tracing::info!(count = pending.len(), "Notifying pending payments");

        let mut summary = NotifySummary::default();
        for notification in &pending {
            match self.notifier.notify(notification).await {
                Ok(NotifyPaymentResult::Delivered { .. }) => summary.notified += 1,
                Ok(NotifyPaymentResult::SkippedZeroAmount) => summary.skipped += 1,
                Err(e) => {
                    tracing::error!(
                        notification_id = %notification.id,
                        code = e.code(),
                        error = %e,
                        "Payment notification failed"
                    );
                    summary.failed.push((notification.id, e.to_string()));
                }
            }
        }

        tracing::info!(
            notified = summary.notified,
            skipped = summary.skipped,
            failed = summary.failed.len(),
            "Payment notification pass finished"
        );

        Ok(summary)
    }
}
