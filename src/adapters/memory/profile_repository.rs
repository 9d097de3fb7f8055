//! In-memory implementation of ProfileRepository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, SiteId, WeeblyUserId};
use crate::domain::weebly::{SiteProfile, UserProfile};
use crate::ports::ProfileRepository;

#[derive(Clone, Default)]
pub struct InMemoryProfileRepository {
    users: Arc<RwLock<HashMap<WeeblyUserId, UserProfile>>>,
    sites: Arc<RwLock<HashMap<SiteId, SiteProfile>>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn find_user(&self, user_id: WeeblyUserId) -> Result<Option<UserProfile>, DomainError> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn save_user(&self, profile: &UserProfile) -> Result<(), DomainError> {
        self.users
            .write()
            .await
            .insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn find_site(&self, site_id: SiteId) -> Result<Option<SiteProfile>, DomainError> {
        Ok(self.sites.read().await.get(&site_id).cloned())
    }

    async fn save_site(&self, profile: &SiteProfile) -> Result<(), DomainError> {
        self.sites
            .write()
            .await
            .insert(profile.site_id, profile.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_replaces_previous_site_profile() {
        let repo = InMemoryProfileRepository::new();
        let site_id = SiteId::new(456).unwrap();
        let mut profile = SiteProfile::unknown(site_id);
        repo.save_site(&profile).await.unwrap();

        profile.mark_missing();
        repo.save_site(&profile).await.unwrap();

        let stored = repo.find_site(site_id).await.unwrap().unwrap();
        assert!(!stored.is_found);
    }

    #[tokio::test]
    async fn unknown_user_is_none() {
        let repo = InMemoryProfileRepository::new();
        assert!(repo
            .find_user(WeeblyUserId::new(1).unwrap())
            .await
            .unwrap()
            .is_none());
    }
}
