//! Install (OAuth) handlers.
//!
//! The platform starts an install by sending the merchant to the app with a
//! signed request; the app bounces them back to the platform's `callback_url`
//! to grant access. The platform then redirects to the app with an
//! authorization code, which is exchanged for a site access token.

mod complete_oauth;
mod errors;
mod start_oauth;

pub use complete_oauth::{CompleteOAuthCommand, CompleteOAuthHandler, CompleteOAuthResult};
pub use errors::OAuthError;
pub use start_oauth::{StartOAuthCommand, StartOAuthHandler, StartOAuthResult};

use reqwest::Url;

/// Install flow settings taken from configuration.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub scope: String,

    /// Where the platform sends the authorization code.
    pub redirect_uri: String,

    /// Callback URLs must be on this domain or a subdomain of it.
    pub platform_domain: String,
}

/// Parses a platform-supplied URL, accepting only HTTPS on the platform domain.
///
/// The exchange posts the client secret to this URL, so anything else is refused.
pub(crate) fn platform_url(raw: &str, platform_domain: &str) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    if url.scheme() != "https" {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    let domain = platform_domain.trim_start_matches('.').to_ascii_lowercase();
    let allowed = host == domain || host.ends_with(&format!(".{}", domain));
    allowed.then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_platform_hosts() {
        assert!(platform_url("https://weebly.com/app", "weebly.com").is_some());
        assert!(platform_url("https://www.weebly.com/app-center/oauth", "weebly.com").is_some());
    }

    #[test]
    fn rejects_plain_http() {
        assert!(platform_url("http://www.weebly.com/app", "weebly.com").is_none());
    }

    #[test]
    fn rejects_lookalike_hosts() {
        assert!(platform_url("https://evilweebly.com/x", "weebly.com").is_none());
        assert!(platform_url("https://weebly.com.evil.io/x", "weebly.com").is_none());
    }

    #[test]
    fn rejects_garbage() {
        assert!(platform_url("not a url", "weebly.com").is_none());
    }
}
