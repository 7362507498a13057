//! HTTP API handlers for ivp-api

pub mod auth;
pub mod extract;
pub mod health;
pub mod questions;
pub mod recordings;

pub use auth::{auth_routes, AuthUser};
pub use extract::{ApiForm, ApiJson, ApiPath};
pub use health::health_routes;
pub use questions::question_routes;
pub use recordings::recording_routes;
