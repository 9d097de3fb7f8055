//! Signed install state carried through the platform's grant page.
//!
//! The install request to `/oauth/start` is signed by the platform, but the
//! redirect back with the authorization code is not. The start step therefore
//! seals the verified site and owner into a `state` parameter on
//! `redirect_uri`, and completion takes the site and owner from that value
//! only. A code issued for one site cannot be bound to another.
//!
//! Wire form: `site_id.user_id.timestamp.hmac[.hex(version)]`, with the HMAC
//! computed by the request signing rule over the same fields plus a fixed
//! `purpose` so no other signed parameter set can stand in for it.

use super::errors::SignatureError;
use super::signature::{RequestAuthenticator, SIGNATURE_PARAM};
use crate::domain::foundation::{SiteId, WeeblyUserId};

/// Query parameter carrying the sealed state.
pub const STATE_PARAM: &str = "state";

/// How long a sealed state stays usable.
pub const INSTALL_STATE_MAX_AGE_SECS: i64 = 3600;

const PURPOSE: &str = "install_state";
const SEPARATOR: char = '.';

/// Site and owner an install was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallState {
    pub site_id: SiteId,
    pub user_id: WeeblyUserId,
    pub version: Option<String>,
}

impl InstallState {
    /// Seals the state, stamped with `issued_at` (unix seconds).
    pub fn seal(&self, authenticator: &RequestAuthenticator, issued_at: i64) -> String {
        let timestamp = issued_at.to_string();
        let signature = authenticator.sign(&self.signed_params(&timestamp));

        let mut fields = vec![
            self.site_id.to_string(),
            self.user_id.to_string(),
            timestamp,
            signature,
        ];
        if let Some(version) = &self.version {
            fields.push(hex::encode(version));
        }
        fields.join(&SEPARATOR.to_string())
    }

    /// Verifies a sealed state and returns what it was sealed for.
    ///
    /// # Errors
    ///
    /// - `MissingSignature` - empty state
    /// - `InvalidSignature` - malformed, tampered or sealed with another secret
    /// - `Expired` - older than [`INSTALL_STATE_MAX_AGE_SECS`]
    pub fn open(raw: &str, authenticator: &RequestAuthenticator) -> Result<Self, SignatureError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SignatureError::MissingSignature);
        }

        let fields: Vec<&str> = raw.split(SEPARATOR).collect();
        let (site_id, user_id, timestamp, signature, version) = match fields.as_slice() {
            [site, user, ts, sig] => (*site, *user, *ts, *sig, None),
            [site, user, ts, sig, version] => (*site, *user, *ts, *sig, Some(*version)),
            _ => return Err(SignatureError::InvalidSignature),
        };
        let version = version.map(decode_version).transpose()?;

        let mut params = vec![
            ("site_id".to_string(), site_id.to_string()),
            ("user_id".to_string(), user_id.to_string()),
            ("timestamp".to_string(), timestamp.to_string()),
            ("purpose".to_string(), PURPOSE.to_string()),
        ];
        if let Some(version) = &version {
            params.push(("version".to_string(), version.clone()));
        }
        params.push((SIGNATURE_PARAM.to_string(), signature.to_string()));

        let identity = authenticator.authenticate_within(&params, INSTALL_STATE_MAX_AGE_SECS)?;

        Ok(Self {
            site_id: identity.require_site()?,
            user_id: identity.require_user()?,
            version,
        })
    }

    fn signed_params(&self, timestamp: &str) -> Vec<(String, String)> {
        let mut params = vec![
            ("site_id".to_string(), self.site_id.to_string()),
            ("user_id".to_string(), self.user_id.to_string()),
            ("timestamp".to_string(), timestamp.to_string()),
            ("purpose".to_string(), PURPOSE.to_string()),
        ];
        if let Some(version) = &self.version {
            params.push(("version".to_string(), version.clone()));
        }
        params
    }
}

fn decode_version(raw: &str) -> Result<String, SignatureError> {
    hex::decode(raw)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|v| !v.is_empty())
        .ok_or(SignatureError::InvalidSignature)
}
