//! Site owner and site metadata kept next to the credential.
//!
//! Profiles are a cache of what the platform reports; the platform stays the
//! authority. Text longer than the stored column is cut to fit rather than
//! rejected, since the values come from the platform and not from a user.

use crate::domain::foundation::{SiteId, Timestamp, WeeblyUserId};

pub const MAX_USER_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_SITE_TITLE_LEN: usize = 1024;
pub const MAX_SITE_DOMAIN_LEN: usize = 512;
pub const MAX_LANGUAGE_LEN: usize = 8;

/// Owner details as last reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: WeeblyUserId,
    pub name: Option<String>,

    /// Dropped when the platform value does not look like an address.
    pub email: Option<String>,
    pub refreshed_at: Timestamp,
}

impl UserProfile {
    pub fn new(user_id: WeeblyUserId, name: Option<String>, email: Option<String>) -> Self {
        Self {
            user_id,
            name: fit(name, MAX_USER_NAME_LEN),
            email: email
                .map(|e| e.trim().to_string())
                .filter(|e| e.len() <= MAX_EMAIL_LEN && is_plausible_email(e)),
            refreshed_at: Timestamp::now(),
        }
    }
}

/// Site details as last reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub site_id: SiteId,
    pub user_id: Option<WeeblyUserId>,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub is_published: bool,
    pub language: Option<String>,

    /// False once the platform answers "Site not found".
    pub is_found: bool,
    pub refreshed_at: Timestamp,
}

/// One refresh result for a site, already parsed from the platform response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SiteSnapshot {
    pub user_id: Option<WeeblyUserId>,
    pub title: Option<String>,
    pub domain: Option<String>,
    pub is_published: bool,

    /// `None` when the platform sent no usable language.
    pub language: Option<String>,
}

impl SiteProfile {
    /// A profile nothing is known about yet.
    pub fn unknown(site_id: SiteId) -> Self {
        Self {
            site_id,
            user_id: None,
            title: None,
            domain: None,
            is_published: false,
            language: None,
            is_found: true,
            refreshed_at: Timestamp::now(),
        }
    }

    /// Applies a fresh snapshot. Returns true when anything changed.
    ///
    /// A missing or oversized language keeps the previous one.
    pub fn apply(&mut self, snapshot: SiteSnapshot) -> bool {
        let language = snapshot
            .language
            .filter(|l| l.chars().count() <= MAX_LANGUAGE_LEN)
            .or_else(|| self.language.clone());
        let next = Self {
            site_id: self.site_id,
            user_id: snapshot.user_id.or(self.user_id),
            title: fit(snapshot.title, MAX_SITE_TITLE_LEN),
            domain: fit(snapshot.domain, MAX_SITE_DOMAIN_LEN),
            is_published: snapshot.is_published,
            language,
            is_found: true,
            refreshed_at: Timestamp::now(),
        };

        let changed = next.user_id != self.user_id
            || next.title != self.title
            || next.domain != self.domain
            || next.is_published != self.is_published
            || next.language != self.language
            || !self.is_found;
        *self = next;
        changed
    }

    /// Records that the platform no longer knows the site.
    pub fn mark_missing(&mut self) -> bool {
        let changed = self.is_found;
        self.is_found = false;
        self.refreshed_at = Timestamp::now();
        changed
    }
}

fn fit(value: Option<String>, max_chars: usize) -> Option<String> {
    value.map(|mut v| {
        if let Some((cut, _)) = v.char_indices().nth(max_chars) {
            v.truncate(cut);
        }
        v
    })
}

fn is_plausible_email(raw: &str) -> bool {
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !raw.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
