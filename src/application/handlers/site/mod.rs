//! Site API handlers.
//!
//! Calls made on behalf of one installed site, always with that site's own
//! access token. The platform is the authority on whether a token still
//! works: a rejection marks the credential invalid and the next success
//! marks it valid again.
//!
//! Profile refreshes copy the owner's and the site's details from the
//! platform into the profile store, next to the credential.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::foundation::{DomainError, SiteId};
use crate::domain::weebly::{Credential, SiteProfile, UserProfile};
use crate::ports::{CardUpdate, CredentialRepository, ProfileRepository, WeeblyApi, WeeblyApiError};

/// Status the platform reports after a successful deauthorize.
const DISCONNECTED: &str = "disconnected";

#[derive(Debug, Error)]
pub enum SiteApiError {
    #[error("No credential stored for site {0}")]
    CredentialNotFound(SiteId),

    #[error("Platform call failed: {0}")]
    Api(WeeblyApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] DomainError),
}

/// Result of a deauthorize call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeauthorizeResult {
    /// Status reported by the platform.
    pub status: String,
    /// True when the platform confirmed the disconnect.
    pub disconnected: bool,
}

/// Result of a profile refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRefresh {
    pub user_changed: bool,
    pub site_changed: bool,

    /// False when the platform no longer knows the site.
    pub site_found: bool,
}

pub struct SiteApiHandler {
    credentials: Arc<dyn CredentialRepository>,
    profiles: Arc<dyn ProfileRepository>,
    api: Arc<dyn WeeblyApi>,
}

impl SiteApiHandler {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        profiles: Arc<dyn ProfileRepository>,
        api: Arc<dyn WeeblyApi>,
    ) -> Self {
        Self {
            credentials,
            profiles,
            api,
        }
    }

    pub async fn publish_site(&self, site_id: SiteId) -> Result<(), SiteApiError> {
        let credential = self.credential(site_id).await?;
        let outcome = self.api.publish_site(&credential.access_token, site_id).await;
        self.track(&credential, outcome).await?;
        tracing::info!(site_id = %site_id, "Site published");
        Ok(())
    }

    /// Replaces the app's header snippet. It goes live with the next publish.
    pub async fn publish_snippet(&self, site_id: SiteId, snippet: &str) -> Result<(), SiteApiError> {
        let credential = self.credential(site_id).await?;
        let outcome = self
            .api
            .publish_snippet(&credential.access_token, site_id, snippet)
            .await;
        self.track(&credential, outcome).await?;
        tracing::info!(site_id = %site_id, "Snippet updated");
        Ok(())
    }

    pub async fn update_card(&self, site_id: SiteId, update: &CardUpdate) -> Result<(), SiteApiError> {
        let credential = self.credential(site_id).await?;
        let outcome = self
            .api
            .update_card(&credential.access_token, site_id, update)
            .await;
        self.track(&credential, outcome).await?;
        tracing::info!(site_id = %site_id, card = %update.card_name, "Card updated");
        Ok(())
    }

    /// Disconnects the app from the site.
    ///
    /// The credential is kept so later refunds can still be matched to the
    /// site; it is only marked invalid.
    pub async fn deauthorize(&self, site_id: SiteId) -> Result<DeauthorizeResult, SiteApiError> {
        let credential = self.credential(site_id).await?;
        let outcome = self.api.deauthorize(&credential.access_token, site_id).await;
        let status = self.track(&credential, outcome).await?;

        let disconnected = status == DISCONNECTED;
        if disconnected {
            self.credentials.set_validity(&credential.id, false).await?;
            tracing::info!(site_id = %site_id, "App deauthorized");
        } else {
            tracing::error!(site_id = %site_id, status = %status, "Deauthorize did not disconnect");
        }

        Ok(DeauthorizeResult {
            status,
            disconnected,
        })
    }

    /// Refreshes the owner's and the site's profiles from the platform.
    ///
    /// A "Site not found" answer is recorded on the site profile rather than
    /// returned as an error.
    pub async fn refresh_profile(&self, site_id: SiteId) -> Result<ProfileRefresh, SiteApiError> {
        let credential = self.credential(site_id).await?;

        // 1. Owner
        let outcome = self
            .api
            .get_user(&credential.access_token, credential.user_id)
            .await;
        let details = self.track(&credential, outcome).await?;
        let user = UserProfile::new(credential.user_id, details.name, details.email);
        let user_changed = match self.profiles.find_user(credential.user_id).await? {
            Some(previous) => previous.name != user.name || previous.email != user.email,
            None => true,
        };
        self.profiles.save_user(&user).await?;

        // 2. Site
        let mut profile = self
            .profiles
            .find_site(site_id)
            .await?
            .unwrap_or_else(|| SiteProfile::unknown(site_id));
        let site_changed = match self.api.get_site(&credential.access_token, site_id).await {
            Err(e) if e.is_not_found() => {
                tracing::warn!(site_id = %site_id, error = %e, "Site not found on the platform");
                profile.mark_missing()
            }
            outcome => {
                let details = self.track(&credential, outcome).await?;
                profile.apply(details.snapshot)
            }
        };
        self.profiles.save_site(&profile).await?;

        if site_changed {
            tracing::info!(site_id = %site_id, is_found = profile.is_found, "Site profile changed");
        }

        Ok(ProfileRefresh {
            user_changed,
            site_changed,
            site_found: profile.is_found,
        })
    }

    /// Refreshes the profile of every site the owner of `site_id` can see.
    ///
    /// Returns the number of site profiles written.
    pub async fn refresh_owner_sites(&self, site_id: SiteId) -> Result<usize, SiteApiError> {
        let credential = self.credential(site_id).await?;
        let outcome = self.api.list_sites(&credential.access_token).await;
        let sites = self.track(&credential, outcome).await?;

        let mut written = 0;
        for site in sites {
            let mut profile = self
                .profiles
                .find_site(site.site_id)
                .await?
                .unwrap_or_else(|| SiteProfile::unknown(site.site_id));
            profile.apply(site.snapshot);
            self.profiles.save_site(&profile).await?;
            written += 1;
        }

        tracing::info!(site_id = %site_id, sites = written, "Owner sites refreshed");
        Ok(written)
    }

    async fn credential(&self, site_id: SiteId) -> Result<Credential, SiteApiError> {
        self.credentials
            .find_by_site(site_id)
            .await?
            .ok_or(SiteApiError::CredentialNotFound(site_id))
    }

    /// Records what the outcome says about the token.
    async fn track<T>(
        &self,
        credential: &Credential,
        outcome: Result<T, WeeblyApiError>,
    ) -> Result<T, SiteApiError> {
        match outcome {
            Ok(value) => {
                if !credential.is_valid {
                    tracing::info!(credential_id = %credential.id, "Token accepted again, marking credential valid");
                    self.credentials.set_validity(&credential.id, true).await?;
                }
                Ok(value)
            }
            Err(e) => {
                if e.is_token_rejected() && credential.is_valid {
                    tracing::warn!(
                        credential_id = %credential.id,
                        site_id = %credential.site_id,
                        "Platform rejected access token, marking credential invalid"
                    );
                    self.credentials.set_validity(&credential.id, false).await?;
                }
                Err(SiteApiError::Api(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryCredentialRepository, InMemoryProfileRepository};
    use crate::adapters::weebly::MockWeeblyApi;
    use crate::domain::foundation::WeeblyUserId;
    use crate::domain::weebly::{CredentialGrant, SiteSnapshot};
    use crate::ports::UserDetails;
    use secrecy::SecretString;

    fn site() -> SiteId {
        SiteId::new(456).unwrap()
    }

    async fn setup() -> (InMemoryCredentialRepository, MockWeeblyApi, SiteApiHandler) {
        let repo = InMemoryCredentialRepository::new();
        let grant = CredentialGrant::new(
            site(),
            WeeblyUserId::new(123).unwrap(),
            SecretString::new("site-token".to_string()),
            None,
        )
        .unwrap();
        repo.upsert(grant).await.unwrap();
        let api = MockWeeblyApi::new();
        let handler = SiteApiHandler::new(
            Arc::new(repo.clone()),
            Arc::new(InMemoryProfileRepository::new()),
            Arc::new(api.clone()),
        );
        (repo, api, handler)
    }

    async fn setup_with_profiles() -> (InMemoryProfileRepository, MockWeeblyApi, SiteApiHandler) {
        let (repo, api, _) = setup().await;
        let profiles = InMemoryProfileRepository::new();
        let handler = SiteApiHandler::new(
            Arc::new(repo),
            Arc::new(profiles.clone()),
            Arc::new(api.clone()),
        );
        (profiles, api, handler)
    }

    fn owner() -> WeeblyUserId {
        WeeblyUserId::new(123).unwrap()
    }

    fn shop(title: &str, language: Option<&str>) -> SiteSnapshot {
        SiteSnapshot {
            user_id: Some(owner()),
            title: Some(title.to_string()),
            domain: Some("shop.example.com".to_string()),
            is_published: true,
            language: language.map(str::to_string),
        }
    }

    async fn is_valid(repo: &InMemoryCredentialRepository) -> bool {
        repo.find_by_site(site()).await.unwrap().unwrap().is_valid
    }

    #[tokio::test]
    async fn publish_uses_site_token() {
        let (_, api, handler) = setup().await;

        handler.publish_site(site()).await.unwrap();

        assert_eq!(api.tokens_used("publish_site"), vec!["site-token"]);
    }

    #[tokio::test]
    async fn snippet_is_sent_without_publishing_site() {
        let (_, api, handler) = setup().await;

        handler.publish_snippet(site(), "<script></script>").await.unwrap();

        assert_eq!(api.call_count("publish_snippet"), 1);
        assert_eq!(api.call_count("publish_site"), 0);
    }

    #[tokio::test]
    async fn unknown_site_is_not_found() {
        let (_, api, handler) = setup().await;

        let err = handler.publish_site(SiteId::new(999).unwrap()).await.unwrap_err();

        assert!(matches!(err, SiteApiError::CredentialNotFound(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn rejection_invalidates_and_success_restores() {
        let (repo, api, handler) = setup().await;
        api.reject_token("site-token");

        let card = CardUpdate {
            card_name: "stats".to_string(),
            hidden: false,
            card_data: serde_json::json!([]),
        };
        let err = handler.update_card(site(), &card).await.unwrap_err();
        assert!(matches!(err, SiteApiError::Api(ref e) if e.is_token_rejected()));
        assert!(!is_valid(&repo).await);

        api.clear_errors();
        handler.update_card(site(), &card).await.unwrap();
        assert!(is_valid(&repo).await);
    }

    #[tokio::test]
    async fn server_error_keeps_credential_valid() {
        let (repo, api, handler) = setup().await;
        api.set_method_error("publish_site", WeeblyApiError::api("boom").with_status(500));

        let err = handler.publish_site(site()).await.unwrap_err();

        assert!(matches!(err, SiteApiError::Api(ref e) if e.status == Some(500)));
        assert!(is_valid(&repo).await);
    }

    #[tokio::test]
    async fn deauthorize_keeps_record_marked_invalid() {
        let (repo, _, handler) = setup().await;

        let result = handler.deauthorize(site()).await.unwrap();

        assert!(result.disconnected);
        assert_eq!(repo.len().await, 1);
        assert!(!is_valid(&repo).await);
    }

    #[tokio::test]
    async fn unexpected_deauthorize_status_leaves_credential() {
        let (repo, api, handler) = setup().await;
        api.set_deauthorize_status("pending");

        let result = handler.deauthorize(site()).await.unwrap();

        assert!(!result.disconnected);
        assert_eq!(result.status, "pending");
        assert!(is_valid(&repo).await);
    }

    // ═══════════════════════════════════════════════════════════════
    // Profile Refresh
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn refresh_stores_owner_and_site() {
        let (profiles, api, handler) = setup_with_profiles().await;
        api.set_user(
            owner(),
            UserDetails {
                name: Some("Ada".to_string()),
                email: Some("ada@example.com".to_string()),
            },
        );
        api.set_site(site(), shop("Ada's Shop", Some("en")));

        let result = handler.refresh_profile(site()).await.unwrap();

        assert!(result.user_changed && result.site_changed && result.site_found);
        let user = profiles.find_user(owner()).await.unwrap().unwrap();
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
        let stored = profiles.find_site(site()).await.unwrap().unwrap();
        assert_eq!(stored.title.as_deref(), Some("Ada's Shop"));
        assert_eq!(stored.user_id, Some(owner()));
        assert_eq!(api.tokens_used("get_site"), vec!["site-token"]);
    }

    #[tokio::test]
    async fn unchanged_refresh_reports_no_change() {
        let (_, api, handler) = setup_with_profiles().await;
        api.set_user(owner(), UserDetails::default());
        api.set_site(site(), shop("Shop", Some("en")));
        handler.refresh_profile(site()).await.unwrap();

        let again = handler.refresh_profile(site()).await.unwrap();

        assert!(!again.user_changed);
        assert!(!again.site_changed);
    }

    #[tokio::test]
    async fn missing_site_is_recorded_not_raised() {
        let (profiles, api, handler) = setup_with_profiles().await;
        api.set_user(owner(), UserDetails::default());
        api.set_site(site(), shop("Shop", Some("en")));
        handler.refresh_profile(site()).await.unwrap();
        api.remove_site(site());

        let result = handler.refresh_profile(site()).await.unwrap();

        assert!(!result.site_found);
        assert!(result.site_changed);
        let stored = profiles.find_site(site()).await.unwrap().unwrap();
        assert!(!stored.is_found);
        assert_eq!(stored.title.as_deref(), Some("Shop"));
    }

    #[tokio::test]
    async fn refresh_without_language_keeps_previous() {
        let (profiles, api, handler) = setup_with_profiles().await;
        api.set_user(owner(), UserDetails::default());
        api.set_site(site(), shop("Shop", Some("de")));
        handler.refresh_profile(site()).await.unwrap();
        api.set_site(site(), shop("Shop", None));

        handler.refresh_profile(site()).await.unwrap();

        let stored = profiles.find_site(site()).await.unwrap().unwrap();
        assert_eq!(stored.language.as_deref(), Some("de"));
    }

    #[tokio::test]
    async fn rejected_token_during_refresh_invalidates_credential() {
        let (repo, api, _) = setup().await;
        let handler = SiteApiHandler::new(
            Arc::new(repo.clone()),
            Arc::new(InMemoryProfileRepository::new()),
            Arc::new(api.clone()),
        );
        api.reject_token("site-token");

        let err = handler.refresh_profile(site()).await.unwrap_err();

        assert!(matches!(err, SiteApiError::Api(ref e) if e.is_token_rejected()));
        assert!(!is_valid(&repo).await);
        assert_eq!(api.call_count("get_site"), 0);
    }

    #[tokio::test]
    async fn owner_sites_are_all_written() {
        let (profiles, api, handler) = setup_with_profiles().await;
        api.set_site(site(), shop("Main", None));
        api.set_site(SiteId::new(457).unwrap(), shop("Second", None));

        let written = handler.refresh_owner_sites(site()).await.unwrap();

        assert_eq!(written, 2);
        let second = profiles
            .find_site(SiteId::new(457).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.title.as_deref(), Some("Second"));
    }
}
