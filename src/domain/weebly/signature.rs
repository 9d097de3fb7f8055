//! Signed request verification for App Center requests.
//!
//! The platform signs the query string of every request it sends to the app:
//! all parameters except `hmac` are sorted by name, joined as `name=value`
//! pairs separated by `&`, and the result is HMAC-SHA256'd with the app
//! secret and hex-encoded into the `hmac` parameter.
//!
//! [`RequestAuthenticator::authenticate`] recomputes that value, compares it in
//! constant time and hands back a [`SignedIdentity`] for the handler to use.
//! Any mismatch rejects the request.

use std::collections::{BTreeMap, BTreeSet};

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::SignatureError;
use crate::domain::foundation::{SiteId, WeeblyUserId};

/// Name of the query parameter carrying the signature.
pub const SIGNATURE_PARAM: &str = "hmac";

/// Allowed clock skew for signed timestamps from the future.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

type HmacSha256 = Hmac<Sha256>;

/// Builds the string that gets signed: every parameter except the signature,
/// ordered by name (then value), as `name=value` joined with `&`.
pub fn canonical_payload(params: &[(String, String)]) -> String {
    let mut pairs: Vec<(&str, &str)> = params
        .iter()
        .filter(|(name, _)| name.as_str() != SIGNATURE_PARAM)
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    pairs.sort_unstable();

    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Computes the lowercase hex signature for a parameter set.
pub fn compute_signature(params: &[(String, String)], secret: &str) -> String {
    hex::encode(mac_bytes(secret.as_bytes(), &canonical_payload(params)))
}

fn mac_bytes(secret: &[u8], payload: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Identity carried by a request whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIdentity {
    /// Installing site, when the platform included one.
    pub site_id: Option<SiteId>,
    /// Site owner, when the platform included one.
    pub user_id: Option<WeeblyUserId>,
    /// App version the site has installed.
    pub version: Option<String>,
    params: BTreeMap<String, String>,
}

impl SignedIdentity {
    /// Returns a signed parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns a signed parameter or `MissingParameter`.
    pub fn require_param(&self, name: &'static str) -> Result<&str, SignatureError> {
        self.param(name)
            .filter(|value| !value.is_empty())
            .ok_or(SignatureError::MissingParameter(name))
    }

    pub fn require_site(&self) -> Result<SiteId, SignatureError> {
        self.site_id.ok_or(SignatureError::MissingParameter("site_id"))
    }

    pub fn require_user(&self) -> Result<WeeblyUserId, SignatureError> {
        self.user_id.ok_or(SignatureError::MissingParameter("user_id"))
    }
}

/// Verifies platform-signed query parameters.
#[derive(Clone)]
pub struct RequestAuthenticator {
    secret: SecretString,
    max_age_secs: Option<i64>,
}

impl RequestAuthenticator {
    /// Creates an authenticator for the given app secret.
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            max_age_secs: None,
        }
    }

    /// Rejects requests whose signed `timestamp` is older than `max_age_secs`.
    pub fn with_max_age_secs(mut self, max_age_secs: Option<i64>) -> Self {
        self.max_age_secs = max_age_secs;
        self
    }

    /// Signs a parameter set the way the platform does.
    pub fn sign(&self, params: &[(String, String)]) -> String {
        compute_signature(params, self.secret.expose_secret())
    }

    /// Verifies the signature and extracts the signed identity.
    ///
    /// # Errors
    ///
    /// - `MissingSignature` - no (or empty, or repeated) `hmac` parameter
    /// - `RepeatedParameter` - any other parameter appears more than once
    /// - `InvalidSignature` - not hex, or does not match the parameters
    /// - `Expired` / `InvalidTimestamp` - outside the configured window
    /// - `MalformedParameter` - `site_id` or `user_id` is not a valid id
    pub fn authenticate(
        &self,
        params: &[(String, String)],
    ) -> Result<SignedIdentity, SignatureError> {
        self.verify(params, self.max_age_secs)
    }

    /// Like [`authenticate`](Self::authenticate), but always enforces a
    /// `timestamp` no older than `max_age_secs`.
    pub fn authenticate_within(
        &self,
        params: &[(String, String)],
        max_age_secs: i64,
    ) -> Result<SignedIdentity, SignatureError> {
        self.verify(params, Some(max_age_secs))
    }

    fn verify(
        &self,
        params: &[(String, String)],
        max_age_secs: Option<i64>,
    ) -> Result<SignedIdentity, SignatureError> {
        let mut signatures = params
            .iter()
            .filter(|(name, _)| name.as_str() == SIGNATURE_PARAM)
            .map(|(_, value)| value.trim());
        let provided = match (signatures.next(), signatures.next()) {
            (Some(value), None) if !value.is_empty() => value,
            _ => return Err(SignatureError::MissingSignature),
        };

        let mut seen = BTreeSet::new();
        if let Some((name, _)) = params.iter().find(|(name, _)| !seen.insert(name.as_str())) {
            tracing::warn!(param = %name, "Signed request repeats a parameter");
            return Err(SignatureError::RepeatedParameter(name.clone()));
        }

        let provided = hex::decode(provided).map_err(|_| {
            tracing::warn!("Signed request carries a non-hex signature");
            SignatureError::InvalidSignature
        })?;

        let expected = mac_bytes(
            self.secret.expose_secret().as_bytes(),
            &canonical_payload(params),
        );
        if !constant_time_compare(&expected, &provided) {
            tracing::warn!(
                site_id = params_value(params, "site_id").unwrap_or("-"),
                "Signed request failed verification"
            );
            return Err(SignatureError::InvalidSignature);
        }

        if let Some(max_age) = max_age_secs {
            check_timestamp(
                params_value(params, "timestamp"),
                chrono::Utc::now().timestamp(),
                max_age,
            )?;
        }

        build_identity(params)
    }
}

fn params_value<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn check_timestamp(raw: Option<&str>, now: i64, max_age: i64) -> Result<(), SignatureError> {
    let timestamp: i64 = raw
        .and_then(|value| value.trim().parse().ok())
        .ok_or(SignatureError::InvalidTimestamp)?;
    let age = now - timestamp;

    if age > max_age {
        return Err(SignatureError::Expired);
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(SignatureError::InvalidTimestamp);
    }
    Ok(())
}

fn build_identity(params: &[(String, String)]) -> Result<SignedIdentity, SignatureError> {
    let site_id = params_value(params, "site_id")
        .map(|raw| {
            raw.parse::<SiteId>()
                .map_err(|_| SignatureError::MalformedParameter("site_id"))
        })
        .transpose()?;
    let user_id = params_value(params, "user_id")
        .map(|raw| {
            raw.parse::<WeeblyUserId>()
                .map_err(|_| SignatureError::MalformedParameter("user_id"))
        })
        .transpose()?;
    let version = params_value(params, "version")
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let params = params
        .iter()
        .filter(|(name, _)| name.as_str() != SIGNATURE_PARAM)
        .cloned()
        .collect();

    Ok(SignedIdentity {
        site_id,
        user_id,
        version,
        params,
    })
}
