//! Signed-request extractor for axum.
//!
//! Platform-initiated requests carry their parameters in the query string,
//! signed with the app secret under `hmac`. `SignedRequest` verifies them
//! before the handler body runs and hands the handler the verified identity:
//!
//! ```ignore
//! async fn start(SignedRequest(identity): SignedRequest) -> impl IntoResponse {
//!     format!("site {:?}", identity.site_id)
//! }
//! ```
//!
//! The state must provide an `Arc<RequestAuthenticator>` through `FromRef`.

use std::sync::Arc;

use axum::{
    extract::{FromRef, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::weebly::{RequestAuthenticator, SignatureError, SignedIdentity};

use crate::adapters::http::dto::ErrorResponse;

/// Extractor that only succeeds for a correctly signed query string.
#[derive(Debug, Clone)]
pub struct SignedRequest(pub SignedIdentity);

impl<S> axum::extract::FromRequestParts<S> for SignedRequest
where
    S: Send + Sync,
    Arc<RequestAuthenticator>: FromRef<S>,
{
    type Rejection = SignatureRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        let authenticator = Arc::<RequestAuthenticator>::from_ref(state);
        Box::pin(async move {
            // Repeated keys are kept so a doubled `hmac` is caught.
            let Query(params) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
                .map_err(|_| SignatureRejection(SignatureError::MissingSignature))?;

            authenticator
                .authenticate(&params)
                .map(SignedRequest)
                .map_err(|e| {
                    tracing::debug!(path = %parts.uri.path(), error = %e, "Signed request rejected");
                    SignatureRejection(e)
                })
        })
    }
}

/// Rejection for requests that fail signature verification.
#[derive(Debug)]
pub struct SignatureRejection(pub SignatureError);

impl IntoResponse for SignatureRejection {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let body = ErrorResponse::new(self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}

impl SignatureRejection {
    pub fn status_code(&self) -> StatusCode {
        self.0.status_code()
    }
}
