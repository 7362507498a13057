//! Registered users

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Stored user (includes the password hash; never serialized)
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRead {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub is_active: bool,
}

impl From<&User> for UserRead {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            is_active: user.is_active,
        }
    }
}

/// POST /auth/register request body
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl UserCreate {
    /// Normalize and validate registration fields
    ///
    /// Email is trimmed and lowercased; username is trimmed.
    pub fn validated(mut self) -> Result<Self, String> {
        self.email = self.email.trim().to_lowercase();
        self.username = self.username.trim().to_string();

        let valid_email = match self.email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
            }
            None => false,
        };
        if !valid_email {
            return Err(format!("Invalid email address: {}", self.email));
        }
        if self.username.is_empty() {
            return Err("Username must not be empty".to_string());
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            ));
        }
        Ok(self)
    }
}

/// POST /auth/jwt/login form body (`username` carries the email)
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}
