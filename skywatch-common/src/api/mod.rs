//! Shared API concerns
//!
//! Pure functions only; no HTTP framework dependencies. Axum middleware
//! lives in the service crates.

pub mod auth;
