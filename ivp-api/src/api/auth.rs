//! Registration, login and the bearer-token extractor
//!
//! POST /auth/register, POST /auth/jwt/login, GET /users/me

use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};

use crate::api::{ApiForm, ApiJson};
use crate::db::{users, OwnerScope};
use crate::error::{ApiError, ApiResult};
use crate::models::{LoginForm, User, UserCreate, UserRead};
use crate::AppState;
use ivp_common::api::{hash_password, issue_token, parse_bearer, validate_token, verify_password, TokenResponse};
use ivp_common::{time, uuid_utils};

/// Authenticated, active caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    /// Recording access limited to this caller
    pub fn scope(&self) -> OwnerScope {
        OwnerScope::new(self.0.id)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let token = parse_bearer(header)
            .ok_or_else(|| ApiError::Unauthorized("Malformed Authorization header".to_string()))?;

        let user_id = validate_token(token, &state.jwt_secret).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })?;

        let user = users::get_user(&state.db, user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| ApiError::Unauthorized("Unknown or inactive user".to_string()))?;

        Ok(AuthUser(user))
    }
}

/// Argon2 hashing runs on the blocking pool
async fn hash_in_background(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn verify_in_background(password: String, stored_hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UserCreate>,
) -> ApiResult<(StatusCode, Json<UserRead>)> {
    let request = request.validated().map_err(ApiError::BadRequest)?;
    let hashed_password = hash_in_background(request.password).await?;

    let user = User {
        id: uuid_utils::generate(),
        email: request.email,
        username: request.username,
        hashed_password,
        is_active: true,
        created_at: time::now(),
    };
    users::create_user(&state.db, &user).await?;

    Ok((StatusCode::CREATED, Json(UserRead::from(&user))))
}

/// POST /auth/jwt/login (form: `username` = email, `password`)
pub async fn login(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    let email = form.username.trim().to_lowercase();

    let user = match users::find_by_email(&state.db, &email).await? {
        Some(user) if user.is_active => user,
        _ => return Err(ApiError::LoginBadCredentials),
    };

    if !verify_in_background(form.password, user.hashed_password.clone()).await? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::LoginBadCredentials);
    }

    let token = issue_token(user.id, &state.jwt_secret).map_err(|e| ApiError::Internal(e.to_string()))?;
    tracing::debug!(user_id = %user.id, "Issued access token");

    Ok(Json(TokenResponse::bearer(token)))
}

/// GET /users/me
pub async fn me(user: AuthUser) -> Json<UserRead> {
    Json(UserRead::from(&user.0))
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/jwt/login", post(login))
        .route("/users/me", get(me))
}
