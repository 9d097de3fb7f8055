//! Weebly App Center domain.
//!
//! - `signature` - signed request verification
//! - `install_state` - signed site/owner binding across the OAuth redirect
//! - `credential` - per-site access tokens
//! - `profile` - owner and site metadata cached from the platform
//! - `payment_notification` - purchases and refunds reported to the platform
//! - `site_token` - JWTs handed to editor elements

mod credential;
mod errors;
mod install_state;
mod payment_notification;
mod profile;
mod signature;
mod site_token;

pub use credential::{check_version, Credential, CredentialGrant, MAX_VERSION_LEN};
pub use errors::SignatureError;
pub use install_state::{InstallState, INSTALL_STATE_MAX_AGE_SECS, STATE_PARAM};
pub use payment_notification::{
    Amount, NewPaymentNotification, PaymentKind, PaymentMethod, PaymentNotification, PaymentTerm,
    DEFAULT_CURRENCY, MAX_GROSS_CENTS, MAX_TEXT_LEN,
};
pub use profile::{
    SiteProfile, SiteSnapshot, UserProfile, MAX_EMAIL_LEN, MAX_LANGUAGE_LEN, MAX_SITE_DOMAIN_LEN,
    MAX_SITE_TITLE_LEN, MAX_USER_NAME_LEN,
};
pub use signature::{
    canonical_payload, compute_signature, RequestAuthenticator, SignedIdentity, SIGNATURE_PARAM,
};
pub use site_token::{SiteTokenClaims, SiteTokenError, SiteTokenIssuer};
