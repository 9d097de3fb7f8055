//! ProfileRepository port - cached owner and site metadata.
//!
//! Profiles are keyed by the platform's own ids and overwritten on every
//! refresh.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SiteId, WeeblyUserId};
use crate::domain::weebly::{SiteProfile, UserProfile};

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn find_user(&self, user_id: WeeblyUserId) -> Result<Option<UserProfile>, DomainError>;

    /// Inserts or replaces the profile for its user.
    async fn save_user(&self, profile: &UserProfile) -> Result<(), DomainError>;

    async fn find_site(&self, site_id: SiteId) -> Result<Option<SiteProfile>, DomainError>;

    /// Inserts or replaces the profile for its site.
    async fn save_site(&self, profile: &SiteProfile) -> Result<(), DomainError>;
}
