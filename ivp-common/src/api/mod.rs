//! Shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Shared request/response types
//!
//! The service crate wraps these with axum extractors and handlers.

pub mod auth;
pub mod types;

pub use auth::{
    hash_password, issue_token, parse_bearer, validate_token, verify_password, ApiAuthError,
    Claims, TOKEN_LIFETIME_SECS,
};
pub use types::{ErrorBody, ErrorDetail, TokenResponse};
