//! CredentialRepository port - persistence for per-site access tokens.
//!
//! Storage must guarantee at most one credential per site. `upsert` is the
//! only write path for tokens, so a repeat installation updates the existing
//! row instead of adding a second one.

use async_trait::async_trait;

use crate::domain::foundation::{CredentialId, DomainError, SiteId};
use crate::domain::weebly::{Credential, CredentialGrant};

/// Result of an upsert.
#[derive(Debug, Clone)]
pub struct UpsertResult {
    pub credential: Credential,

    /// True when a new row was created, false when an existing one was updated.
    pub inserted: bool,
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Finds a credential by its id.
    async fn find_by_id(&self, id: &CredentialId) -> Result<Option<Credential>, DomainError>;

    /// Finds the credential installed for a site.
    async fn find_by_site(&self, site_id: SiteId) -> Result<Option<Credential>, DomainError>;

    /// Inserts a credential for the grant's site, or refreshes the existing one.
    ///
    /// Refreshing replaces token, owner and version and marks the credential
    /// valid again.
    async fn upsert(&self, grant: CredentialGrant) -> Result<UpsertResult, DomainError>;

    /// Records whether the platform still accepts a credential's token.
    ///
    /// # Errors
    ///
    /// Returns `CredentialNotFound` if no credential has this id.
    async fn set_validity(&self, id: &CredentialId, is_valid: bool) -> Result<(), DomainError>;
}
