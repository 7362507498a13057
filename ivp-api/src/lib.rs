//! ivp-api library interface
//!
//! Exposes the router, application state and building blocks for
//! integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::workflow::IngestionPipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub pipeline: Arc<IngestionPipeline>,
    /// Bearer-token signing secret
    pub jwt_secret: Arc<str>,
    /// Cancellation tokens of in-flight submissions, keyed by recording id
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Parent of every submission token; cancelled on shutdown
    pub shutdown: CancellationToken,
    pub startup_time: DateTime<Utc>,
    /// Last server-side error, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, pipeline: IngestionPipeline, jwt_secret: &str) -> Self {
        Self {
            db,
            pipeline: Arc::new(pipeline),
            jwt_secret: Arc::from(jwt_secret),
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// HTTP-level settings for [`build_router`]
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        let server = ivp_common::config::ServerConfig::default();
        Self {
            cors_origins: server.cors_origins,
            max_upload_bytes: server.max_upload_bytes,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build application router
pub fn build_router(state: AppState, settings: &RouterSettings) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::question_routes())
        .merge(api::auth_routes())
        .merge(api::recording_routes(settings.max_upload_bytes))
        .layer(cors_layer(&settings.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
