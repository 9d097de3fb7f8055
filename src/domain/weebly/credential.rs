//! Credential record for one app installation.
//!
//! A credential is created when a site finishes the OAuth exchange and is
//! refreshed in place when the same site installs again. Records are never
//! deleted: an uninstalled site keeps its (now unusable) row so refunds can
//! still reference it.
//!
//! # Invariants
//!
//! - At most one credential per `site_id` (unique constraint in storage)
//! - `access_token` is never empty
//! - `version` is at most [`MAX_VERSION_LEN`] characters
//! - `updated_at >= created_at`

use secrecy::{ExposeSecret, SecretString};

use crate::domain::foundation::{CredentialId, SiteId, Timestamp, ValidationError, WeeblyUserId};

/// Longest app version string stored with a credential.
pub const MAX_VERSION_LEN: usize = 20;

/// Checks an installed app version against the stored column width.
pub fn check_version(version: &str) -> Result<(), ValidationError> {
    if version.chars().count() > MAX_VERSION_LEN {
        return Err(ValidationError::invalid_format(
            "version",
            format!("must be at most {} characters", MAX_VERSION_LEN),
        ));
    }
    Ok(())
}

/// Result of a successful authorization code exchange, ready to persist.
#[derive(Debug, Clone)]
pub struct CredentialGrant {
    pub site_id: SiteId,
    pub user_id: WeeblyUserId,
    pub access_token: SecretString,
    pub version: Option<String>,
}

impl CredentialGrant {
    /// Creates a grant, rejecting an empty token or an oversized version.
    pub fn new(
        site_id: SiteId,
        user_id: WeeblyUserId,
        access_token: SecretString,
        version: Option<String>,
    ) -> Result<Self, ValidationError> {
        if access_token.expose_secret().trim().is_empty() {
            return Err(ValidationError::empty_field("access_token"));
        }
        let version = version.filter(|v| !v.is_empty());
        if let Some(version) = &version {
            check_version(version)?;
        }
        Ok(Self {
            site_id,
            user_id,
            access_token,
            version,
        })
    }
}

/// Persisted access token plus metadata for one site.
#[derive(Debug, Clone)]
pub struct Credential {
    pub id: CredentialId,
    pub site_id: SiteId,
    pub user_id: WeeblyUserId,
    pub access_token: SecretString,

    /// False once the platform has rejected the token.
    pub is_valid: bool,

    /// App version installed on the site.
    pub version: Option<String>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Credential {
    /// Creates a fresh credential from a grant.
    pub fn from_grant(grant: CredentialGrant) -> Self {
        let now = Timestamp::now();
        Self {
            id: CredentialId::new(),
            site_id: grant.site_id,
            user_id: grant.user_id,
            access_token: grant.access_token,
            is_valid: true,
            version: grant.version,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a repeat installation: new token, owner and version, valid again.
    ///
    /// Identity and `created_at` are kept.
    pub fn reinstall(&mut self, grant: CredentialGrant) {
        debug_assert_eq!(self.site_id, grant.site_id);
        self.user_id = grant.user_id;
        self.access_token = grant.access_token;
        if grant.version.is_some() {
            self.version = grant.version;
        }
        self.is_valid = true;
        self.touch();
    }

    /// Records that the platform rejected this token.
    pub fn mark_invalid(&mut self) {
        self.is_valid = false;
        self.touch();
    }

    /// Records that the platform accepted this token.
    pub fn mark_valid(&mut self) {
        self.is_valid = true;
        self.touch();
    }

    fn touch(&mut self) {
        let now = Timestamp::now();
        if now.is_before(&self.updated_at) {
            return;
        }
        self.updated_at = now;
    }
}
