//! Site-scoped JWTs for the app's editor elements.
//!
//! Elements running inside the site editor talk back to the app with a token
//! that names the site and its owner, signed HS256 with the app secret.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{SiteId, Timestamp, WeeblyUserId};

/// Claims carried by a site token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTokenClaims {
    pub user_id: WeeblyUserId,
    pub site_id: SiteId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

#[derive(Debug, Error)]
pub enum SiteTokenError {
    #[error("Site token expired")]
    Expired,

    #[error("Invalid site token: {0}")]
    Invalid(String),

    #[error("Failed to sign site token: {0}")]
    Signing(String),
}

/// Issues and verifies site tokens.
#[derive(Clone)]
pub struct SiteTokenIssuer {
    secret: SecretString,
}

impl SiteTokenIssuer {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Issues a token for the site, expiring after `exp_minutes` when given.
    pub fn issue(
        &self,
        user_id: WeeblyUserId,
        site_id: SiteId,
        exp_minutes: Option<i64>,
    ) -> Result<String, SiteTokenError> {
        let claims = SiteTokenClaims {
            user_id,
            site_id,
            exp: exp_minutes.map(|m| Timestamp::now().plus_minutes(m).as_unix_secs()),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
        .map_err(|e| SiteTokenError::Signing(e.to_string()))
    }

    /// Verifies signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> Result<SiteTokenClaims, SiteTokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.leeway = 0;

        decode::<SiteTokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => SiteTokenError::Expired,
            _ => SiteTokenError::Invalid(e.to_string()),
        })
    }
}
