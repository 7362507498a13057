//! Credential primitives: password hashing and bearer tokens
//!
//! # Architecture
//!
//! - Passwords are hashed with Argon2id (random 16-byte salt) and stored as
//!   PHC strings
//! - Bearer tokens are HS256 JWTs whose `sub` is the user id
//! - Token lifetime is 3600 seconds
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions. No HTTP framework
//! dependencies - request extraction lives in the service crate.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer token lifetime in seconds
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Credential error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// Stored hash could not be parsed or produced
    HashError(String),

    /// Token signature, expiry or shape invalid
    InvalidToken(String),

    /// Token subject is not a user id
    InvalidSubject(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::HashError(err) => write!(f, "Password hash error: {}", err),
            ApiAuthError::InvalidToken(err) => write!(f, "Invalid token: {}", err),
            ApiAuthError::InvalidSubject(sub) => write!(f, "Invalid token subject: {}", sub),
        }
    }
}

impl std::error::Error for ApiAuthError {}

/// JWT claims carried by bearer tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Issued-at (Unix seconds)
    pub iat: i64,
    /// Expiry (Unix seconds)
    pub exp: i64,
}

// ========================================
// Passwords
// ========================================

/// Hash a password into a PHC string
pub fn hash_password(password: &str) -> Result<String, ApiAuthError> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| ApiAuthError::HashError(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiAuthError::HashError(e.to_string()))
}

/// Check a password against a stored PHC string
///
/// Returns `Ok(false)` for a wrong password, `Err` only for an unusable hash.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ApiAuthError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| ApiAuthError::HashError(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

// ========================================
// Tokens
// ========================================

/// Issue a bearer token for `user_id`, valid for [`TOKEN_LIFETIME_SECS`]
pub fn issue_token(user_id: Uuid, secret: &str) -> Result<String, ApiAuthError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiAuthError::InvalidToken(e.to_string()))
}

/// Validate a bearer token and return the user id it names
pub fn validate_token(token: &str, secret: &str) -> Result<Uuid, ApiAuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ApiAuthError::InvalidToken(e.to_string()))?;

    Uuid::parse_str(&data.claims.sub)
        .map_err(|_| ApiAuthError::InvalidSubject(data.claims.sub.clone()))
}

/// Extract the token from an `Authorization` header value
///
/// The scheme is matched case-insensitively per RFC 7235.
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// ========================================
// Tests
// ========================================
