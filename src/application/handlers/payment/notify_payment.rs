//! NotifyPaymentHandler - reports a recorded payment to the platform.
//!
//! Credential selection is an explicit lookup-then-fallback:
//!
//! 1. the paying site's own credential, if stored and still valid
//! 2. otherwise the configured default credential
//!
//! When the site's token is rejected by the platform the site credential is
//! marked invalid and the call is repeated once with the default. Any other
//! failure is reported as is. There is no retry loop; the host's job runner
//! decides what to do with a failure.

use std::sync::Arc;

use crate::domain::foundation::{CredentialId, NotificationId, SiteId, Timestamp};
use crate::domain::weebly::{Credential, PaymentNotification};
use crate::ports::{
    CredentialRepository, PaymentNotificationRepository, PaymentNotificationRequest, WeeblyApi,
    WeeblyApiError,
};

use super::{DeliveryAttempt, NotificationError, TokenSource};

/// Delivery settings taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct NotificationSettings {
    /// Fallback credential for sites without a usable one of their own.
    pub default_credential_id: Option<CredentialId>,

    /// Sends `testpurchase`/`testrefund` instead of `purchase`/`refund`.
    pub test_mode: bool,
}

#[derive(Debug, Clone)]
pub struct NotifyPaymentCommand {
    pub notification_id: NotificationId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyPaymentResult {
    /// The platform accepted the notification.
    Delivered {
        credential_id: CredentialId,
        source: TokenSource,
    },
    /// Nothing to report; marked notified without a call.
    SkippedZeroAmount,
}

/// A credential picked for a delivery attempt.
#[derive(Debug, Clone)]
pub struct SelectedCredential {
    pub credential: Credential,
    pub source: TokenSource,
}

pub struct NotifyPaymentHandler {
    credentials: Arc<dyn CredentialRepository>,
    notifications: Arc<dyn PaymentNotificationRepository>,
    api: Arc<dyn WeeblyApi>,
    settings: NotificationSettings,
}

impl NotifyPaymentHandler {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        notifications: Arc<dyn PaymentNotificationRepository>,
        api: Arc<dyn WeeblyApi>,
        settings: NotificationSettings,
    ) -> Self {
        Self {
            credentials,
            notifications,
            api,
            settings,
        }
    }

    /// Loads a recorded notification and delivers it.
    pub async fn handle(
        &self,
        cmd: NotifyPaymentCommand,
    ) -> Result<NotifyPaymentResult, NotificationError> {
        let notification = self
            .notifications
            .find_by_id(&cmd.notification_id)
            .await?
            .ok_or(NotificationError::NotFound(cmd.notification_id))?;

        self.notify(&notification).await
    }

    /// Delivers one notification, falling back to the default credential at
    /// most once.
    pub async fn notify(
        &self,
        notification: &PaymentNotification,
    ) -> Result<NotifyPaymentResult, NotificationError> {
        if notification.notified {
            return Err(NotificationError::AlreadyNotified(notification.id));
        }

        if notification.gross_amount.is_zero() {
            self.notifications
                .mark_notified(&notification.id, Timestamp::now())
                .await?;
            tracing::debug!(notification_id = %notification.id, "Zero amount, nothing to report");
            return Ok(NotifyPaymentResult::SkippedZeroAmount);
        }

        let request = self.request_for(notification);
        let mut attempts = Vec::new();

        let selected = self.select_credential(notification.site_id).await?;
        let error = match self.attempt(&selected, &request).await {
            Ok(()) => return self.finish(notification, selected).await,
            Err(error) => error,
        };

        let rejected = error.is_token_rejected();
        if rejected {
            self.invalidate(&selected.credential).await?;
        }
        let from_site = selected.source == TokenSource::Site;
        attempts.push(DeliveryAttempt {
            credential_id: selected.credential.id,
            source: selected.source,
            error,
        });

        if !(from_site && rejected) {
            return Err(self.delivery_failed(notification, attempts));
        }

        // Site token refused: one more try with the default.
        let fallback = match self.default_credential().await? {
            Ok(credential) => SelectedCredential {
                credential,
                source: TokenSource::Default,
            },
            Err(reason) => {
                tracing::error!(
                    notification_id = %notification.id,
                    site_id = %notification.site_id,
                    reason = %reason,
                    "Site token rejected and no usable default credential"
                );
                return Err(NotificationError::DefaultCredentialUnavailable { reason, attempts });
            }
        };

        match self.attempt(&fallback, &request).await {
            Ok(()) => self.finish(notification, fallback).await,
            Err(error) => {
                if error.is_token_rejected() {
                    self.invalidate(&fallback.credential).await?;
                }
                attempts.push(DeliveryAttempt {
                    credential_id: fallback.credential.id,
                    source: fallback.source,
                    error,
                });
                Err(self.delivery_failed(notification, attempts))
            }
        }
    }

    /// Picks the credential for a site: its own if usable, else the default.
    ///
    /// # Errors
    ///
    /// `DefaultCredentialUnavailable` when the site has no usable credential
    /// and the default is unconfigured, missing or invalid.
    pub async fn select_credential(
        &self,
        site_id: SiteId,
    ) -> Result<SelectedCredential, NotificationError> {
        // 1. The site's own credential
        match self.credentials.find_by_site(site_id).await? {
            Some(credential) if credential.is_valid => {
                return Ok(SelectedCredential {
                    credential,
                    source: TokenSource::Site,
                });
            }
            Some(credential) => {
                tracing::debug!(
                    site_id = %site_id,
                    credential_id = %credential.id,
                    "Site credential marked invalid, using default"
                );
            }
            None => {
                tracing::debug!(site_id = %site_id, "No site credential, using default");
            }
        }

        // 2. The default
        match self.default_credential().await? {
            Ok(credential) => Ok(SelectedCredential {
                credential,
                source: TokenSource::Default,
            }),
            Err(reason) => {
                tracing::error!(site_id = %site_id, reason = %reason, "No usable credential for site");
                Err(NotificationError::DefaultCredentialUnavailable {
                    reason,
                    attempts: Vec::new(),
                })
            }
        }
    }

    /// Resolves the default credential. The inner error says why it is unusable.
    async fn default_credential(
        &self,
    ) -> Result<Result<Credential, String>, NotificationError> {
        let Some(id) = self.settings.default_credential_id else {
            return Ok(Err("no default credential is configured".to_string()));
        };

        let resolved = match self.credentials.find_by_id(&id).await? {
            Some(credential) if credential.is_valid => Ok(credential),
            Some(_) => Err(format!("default credential {} is marked invalid", id)),
            None => Err(format!("default credential {} does not exist", id)),
        };
        Ok(resolved)
    }

    async fn attempt(
        &self,
        selected: &SelectedCredential,
        request: &PaymentNotificationRequest,
    ) -> Result<(), WeeblyApiError> {
        self.api
            .notify_payment(&selected.credential.access_token, request)
            .await
            .map_err(|e| {
                tracing::warn!(
                    credential_id = %selected.credential.id,
                    source = %selected.source,
                    error = %e,
                    "Payment notification attempt failed"
                );
                e
            })
    }

    async fn invalidate(&self, credential: &Credential) -> Result<(), NotificationError> {
        tracing::warn!(
            credential_id = %credential.id,
            site_id = %credential.site_id,
            "Platform rejected access token, marking credential invalid"
        );
        self.credentials.set_validity(&credential.id, false).await?;
        Ok(())
    }

    async fn finish(
        &self,
        notification: &PaymentNotification,
        selected: SelectedCredential,
    ) -> Result<NotifyPaymentResult, NotificationError> {
        self.notifications
            .mark_notified(&notification.id, Timestamp::now())
            .await?;

        tracing::info!(
            notification = %notification,
            credential_id = %selected.credential.id,
            source = %selected.source,
            "Payment notification delivered"
        );

        Ok(NotifyPaymentResult::Delivered {
            credential_id: selected.credential.id,
            source: selected.source,
        })
    }

    fn delivery_failed(
        &self,
        notification: &PaymentNotification,
        attempts: Vec<DeliveryAttempt>,
    ) -> NotificationError {
        tracing::error!(
            notification_id = %notification.id,
            site_id = %notification.site_id,
            attempts = attempts.len(),
            "Payment notification not delivered"
        );
        NotificationError::Delivery { attempts }
    }

    fn request_for(&self, notification: &PaymentNotification) -> PaymentNotificationRequest {
        PaymentNotificationRequest {
            name: notification.name.clone(),
            method: notification.method(self.settings.test_mode),
            gross_amount: notification.gross_amount,
            payable_amount: notification.payable_amount,
            detail: notification.detail.clone(),
            kind: notification.kind,
            term: notification.term,
            currency: Some(notification.currency.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryCredentialRepository, InMemoryPaymentNotificationRepository,
    };
    use crate::adapters::weebly::MockWeeblyApi;
    use crate::domain::foundation::WeeblyUserId;
    use crate::domain::weebly::{Amount, CredentialGrant, NewPaymentNotification, PaymentMethod};
    use secrecy::SecretString;

    const PAYING_SITE: i64 = 456;
    const DEFAULT_SITE: i64 = 1;

    struct Fixture {
        credentials: InMemoryCredentialRepository,
        notifications: InMemoryPaymentNotificationRepository,
        api: MockWeeblyApi,
        default_id: CredentialId,
    }

    impl Fixture {
        async fn new() -> Self {
            let credentials = InMemoryCredentialRepository::new();
            let default = install(&credentials, DEFAULT_SITE, "default-token").await;
            Self {
                credentials,
                notifications: InMemoryPaymentNotificationRepository::new(),
                api: MockWeeblyApi::new(),
                default_id: default,
            }
        }

        fn handler(
            &self,
            default_credential_id: Option<CredentialId>,
            test_mode: bool,
        ) -> NotifyPaymentHandler {
            NotifyPaymentHandler::new(
                Arc::new(self.credentials.clone()),
                Arc::new(self.notifications.clone()),
                Arc::new(self.api.clone()),
                NotificationSettings {
                    default_credential_id,
                    test_mode,
                },
            )
        }

        fn default_handler(&self) -> NotifyPaymentHandler {
            self.handler(Some(self.default_id), false)
        }

        async fn record(&self, gross_cents: i64) -> PaymentNotification {
            let notification = PaymentNotification::create(NewPaymentNotification {
                site_id: SiteId::new(PAYING_SITE).unwrap(),
                name: "Pro plan".to_string(),
                detail: None,
                is_purchase: true,
                kind: None,
                term: None,
                gross_amount: Amount::from_cents(gross_cents),
                currency: None,
            })
            .unwrap();
            self.notifications.save(&notification).await.unwrap();
            notification
        }

        async fn stored(&self, id: NotificationId) -> PaymentNotification {
            self.notifications.find_by_id(&id).await.unwrap().unwrap()
        }

        async fn credential(&self, site: i64) -> Credential {
            self.credentials
                .find_by_site(SiteId::new(site).unwrap())
                .await
                .unwrap()
                .unwrap()
        }
    }

    async fn install(repo: &InMemoryCredentialRepository, site: i64, token: &str) -> CredentialId {
        let grant = CredentialGrant::new(
            SiteId::new(site).unwrap(),
            WeeblyUserId::new(7).unwrap(),
            SecretString::new(token.to_string()),
            None,
        )
        .unwrap();
        repo.upsert(grant).await.unwrap().credential.id
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Credential selection
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn valid_site_token_is_used() {
        let fx = Fixture::new().await;
        let site_id = install(&fx.credentials, PAYING_SITE, "site-token").await;
        let notification = fx.record(1000).await;

        let result = fx.default_handler().notify(&notification).await.unwrap();

        assert_eq!(
            result,
            NotifyPaymentResult::Delivered {
                credential_id: site_id,
                source: TokenSource::Site
            }
        );
        assert_eq!(fx.api.tokens_used("notify_payment"), vec!["site-token"]);
        assert!(fx.stored(notification.id).await.notified);
    }

    #[tokio::test]
    async fn missing_site_credential_falls_back_to_default() {
        let fx = Fixture::new().await;
        let notification = fx.record(1000).await;

        let result = fx.default_handler().notify(&notification).await.unwrap();

        assert_eq!(
            result,
            NotifyPaymentResult::Delivered {
                credential_id: fx.default_id,
                source: TokenSource::Default
            }
        );
        assert_eq!(fx.api.tokens_used("notify_payment"), vec!["default-token"]);
    }

    #[tokio::test]
    async fn invalid_site_credential_is_skipped() {
        let fx = Fixture::new().await;
        let site_id = install(&fx.credentials, PAYING_SITE, "site-token").await;
        fx.credentials.set_validity(&site_id, false).await.unwrap();

        let selected = fx
            .default_handler()
            .select_credential(SiteId::new(PAYING_SITE).unwrap())
            .await
            .unwrap();

        assert_eq!(selected.source, TokenSource::Default);
        assert_eq!(selected.credential.id, fx.default_id);
    }

    #[tokio::test]
    async fn unconfigured_default_is_configuration_error() {
        let fx = Fixture::new().await;
        let notification = fx.record(1000).await;

        let err = fx.handler(None, false).notify(&notification).await.unwrap_err();

        assert!(matches!(err, NotificationError::DefaultCredentialUnavailable { .. }));
        assert!(err.attempts().is_empty());
        assert_eq!(fx.api.call_count("notify_payment"), 0);
        assert!(!fx.stored(notification.id).await.notified);
    }

    #[tokio::test]
    async fn dangling_default_is_configuration_error() {
        let fx = Fixture::new().await;
        let notification = fx.record(1000).await;

        let err = fx
            .handler(Some(CredentialId::new()), false)
            .notify(&notification)
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::DefaultCredentialUnavailable { .. }));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Fallback on rejection
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn rejected_site_token_retries_once_with_default() {
        let fx = Fixture::new().await;
        install(&fx.credentials, PAYING_SITE, "site-token").await;
        fx.api.reject_token("site-token");
        let notification = fx.record(1000).await;

        let result = fx.default_handler().notify(&notification).await.unwrap();

        assert_eq!(
            result,
            NotifyPaymentResult::Delivered {
                credential_id: fx.default_id,
                source: TokenSource::Default
            }
        );
        assert_eq!(
            fx.api.tokens_used("notify_payment"),
            vec!["site-token", "default-token"]
        );
        assert!(!fx.credential(PAYING_SITE).await.is_valid);
        assert!(fx.stored(notification.id).await.notified);
    }

    #[tokio::test]
    async fn rejected_default_fails_without_further_attempts() {
        let fx = Fixture::new().await;
        install(&fx.credentials, PAYING_SITE, "site-token").await;
        fx.api.reject_token("site-token");
        fx.api.reject_token("default-token");
        let notification = fx.record(1000).await;

        let err = fx.default_handler().notify(&notification).await.unwrap_err();

        let NotificationError::Delivery { attempts } = &err else {
            panic!("expected delivery failure, got {:?}", err);
        };
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].source, TokenSource::Site);
        assert_eq!(attempts[1].source, TokenSource::Default);
        assert_eq!(fx.api.call_count("notify_payment"), 2);
        assert!(!fx.credential(DEFAULT_SITE).await.is_valid);
        assert!(!fx.stored(notification.id).await.notified);
    }

    #[tokio::test]
    async fn rejected_default_after_fallback_selection_is_not_retried() {
        let fx = Fixture::new().await;
        fx.api.reject_token("default-token");
        let notification = fx.record(1000).await;

        let err = fx.default_handler().notify(&notification).await.unwrap_err();

        assert_eq!(err.attempts().len(), 1);
        assert_eq!(fx.api.call_count("notify_payment"), 1);
    }

    #[tokio::test]
    async fn rejected_site_token_with_invalid_default_reports_attempt() {
        let fx = Fixture::new().await;
        install(&fx.credentials, PAYING_SITE, "site-token").await;
        fx.credentials.set_validity(&fx.default_id, false).await.unwrap();
        fx.api.reject_token("site-token");
        let notification = fx.record(1000).await;

        let err = fx.default_handler().notify(&notification).await.unwrap_err();

        assert!(matches!(err, NotificationError::DefaultCredentialUnavailable { .. }));
        assert_eq!(err.attempts().len(), 1);
        assert_eq!(fx.api.call_count("notify_payment"), 1);
    }

    #[tokio::test]
    async fn network_failure_does_not_fall_back() {
        let fx = Fixture::new().await;
        install(&fx.credentials, PAYING_SITE, "site-token").await;
        fx.api
            .fail_token("site-token", WeeblyApiError::network("connection reset"));
        let notification = fx.record(1000).await;

        let err = fx.default_handler().notify(&notification).await.unwrap_err();

        assert!(matches!(err, NotificationError::Delivery { .. }));
        assert_eq!(fx.api.tokens_used("notify_payment"), vec!["site-token"]);
        assert!(fx.credential(PAYING_SITE).await.is_valid);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Notification state
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn zero_amount_is_marked_without_call() {
        let fx = Fixture::new().await;
        let notification = fx.record(0).await;

        let result = fx.default_handler().notify(&notification).await.unwrap();

        assert_eq!(result, NotifyPaymentResult::SkippedZeroAmount);
        assert_eq!(fx.api.call_count("notify_payment"), 0);
        assert!(fx.stored(notification.id).await.notified);
    }

    #[tokio::test]
    async fn already_notified_is_rejected() {
        let fx = Fixture::new().await;
        let mut notification = fx.record(1000).await;
        notification.mark_notified(Timestamp::now());

        let err = fx.default_handler().notify(&notification).await.unwrap_err();

        assert!(matches!(err, NotificationError::AlreadyNotified(_)));
        assert_eq!(fx.api.call_count("notify_payment"), 0);
    }

    #[tokio::test]
    async fn handle_loads_by_id() {
        let fx = Fixture::new().await;
        let notification = fx.record(1000).await;
        let handler = fx.default_handler();

        handler
            .handle(NotifyPaymentCommand {
                notification_id: notification.id,
            })
            .await
            .unwrap();
        let err = handler
            .handle(NotifyPaymentCommand {
                notification_id: NotificationId::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mode_sends_test_method() {
        let fx = Fixture::new().await;
        let notification = fx.record(1000).await;

        fx.handler(Some(fx.default_id), true)
            .notify(&notification)
            .await
            .unwrap();

        let delivered = fx.api.delivered_notifications();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1.method, PaymentMethod::TestPurchase);
        assert_eq!(delivered[0].1.payable_amount, Amount::from_cents(300));
        assert_eq!(delivered[0].1.currency.as_deref(), Some("USD"));
    }
}
