//! Weebly Connect - Weebly App Center integration
//!
//! Verifies platform-signed requests, runs the two-step OAuth install flow,
//! stores one access token per installed site, and reports purchases and
//! refunds back to the platform with a fallback credential.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
