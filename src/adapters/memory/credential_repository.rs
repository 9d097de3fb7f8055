//! In-memory implementation of CredentialRepository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{CredentialId, DomainError, ErrorCode, SiteId};
use crate::domain::weebly::{Credential, CredentialGrant};
use crate::ports::{CredentialRepository, UpsertResult};

/// Credentials keyed by site, so a site can only ever hold one.
#[derive(Clone, Default)]
pub struct InMemoryCredentialRepository {
    by_site: Arc<RwLock<HashMap<SiteId, Credential>>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.by_site.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.by_site.read().await.is_empty()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn find_by_id(&self, id: &CredentialId) -> Result<Option<Credential>, DomainError> {
        Ok(self
            .by_site
            .read()
            .await
            .values()
            .find(|c| c.id == *id)
            .cloned())
    }

    async fn find_by_site(&self, site_id: SiteId) -> Result<Option<Credential>, DomainError> {
        Ok(self.by_site.read().await.get(&site_id).cloned())
    }

    async fn upsert(&self, grant: CredentialGrant) -> Result<UpsertResult, DomainError> {
        let mut by_site = self.by_site.write().await;

        match by_site.get_mut(&grant.site_id) {
            Some(existing) => {
                existing.reinstall(grant);
                Ok(UpsertResult {
                    credential: existing.clone(),
                    inserted: false,
                })
            }
            None => {
                let credential = Credential::from_grant(grant);
                by_site.insert(credential.site_id, credential.clone());
                Ok(UpsertResult {
                    credential,
                    inserted: true,
                })
            }
        }
    }

    async fn set_validity(&self, id: &CredentialId, is_valid: bool) -> Result<(), DomainError> {
        let mut by_site = self.by_site.write().await;
        let credential = by_site
            .values_mut()
            .find(|c| c.id == *id)
            .ok_or_else(|| {
                DomainError::new(ErrorCode::CredentialNotFound, "Credential not found")
                    .with_detail("credential_id", id.to_string())
            })?;

        if is_valid {
            credential.mark_valid();
        } else {
            credential.mark_invalid();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::WeeblyUserId;
    use secrecy::{ExposeSecret, SecretString};

    fn grant(site: i64, token: &str) -> CredentialGrant {
        CredentialGrant::new(
            SiteId::new(site).unwrap(),
            WeeblyUserId::new(1).unwrap(),
            SecretString::new(token.to_string()),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn first_upsert_inserts() {
        let repo = InMemoryCredentialRepository::new();

        let result = repo.upsert(grant(1, "a")).await.unwrap();

        assert!(result.inserted);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn repeat_upsert_updates_in_place() {
        let repo = InMemoryCredentialRepository::new();
        let first = repo.upsert(grant(1, "a")).await.unwrap();

        let second = repo.upsert(grant(1, "b")).await.unwrap();

        assert!(!second.inserted);
        assert_eq!(second.credential.id, first.credential.id);
        assert_eq!(repo.len().await, 1);
        let stored = repo.find_by_site(SiteId::new(1).unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.access_token.expose_secret(), "b");
    }

    #[tokio::test]
    async fn sites_are_stored_separately() {
        let repo = InMemoryCredentialRepository::new();
        repo.upsert(grant(1, "a")).await.unwrap();
        repo.upsert(grant(2, "b")).await.unwrap();
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn find_by_id_returns_credential() {
        let repo = InMemoryCredentialRepository::new();
        let result = repo.upsert(grant(1, "a")).await.unwrap();

        let found = repo.find_by_id(&result.credential.id).await.unwrap();

        assert!(found.is_some());
        assert!(repo.find_by_id(&CredentialId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_validity_updates_flag() {
        let repo = InMemoryCredentialRepository::new();
        let id = repo.upsert(grant(1, "a")).await.unwrap().credential.id;

        repo.set_validity(&id, false).await.unwrap();

        let stored = repo.find_by_id(&id).await.unwrap().unwrap();
        assert!(!stored.is_valid);
    }

    #[tokio::test]
    async fn set_validity_on_unknown_id_fails() {
        let repo = InMemoryCredentialRepository::new();
        let err = repo.set_validity(&CredentialId::new(), true).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CredentialNotFound);
    }
}
