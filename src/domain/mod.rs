//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `weebly` - Signed requests, credentials, payment notifications, site tokens

pub mod foundation;
pub mod weebly;
