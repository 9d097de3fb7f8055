//! HTTP middleware for axum.
//!
//! - `signed_request` - platform request signature verification

pub mod signed_request;

pub use signed_request::{SignatureRejection, SignedRequest};
