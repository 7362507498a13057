//! # IVP Common Library
//!
//! Shared code for the interview-practice backend:
//! - Error type and result alias
//! - Configuration loading (environment, TOML, defaults)
//! - Database bootstrap (connection pool, schema)
//! - Password hashing and bearer-token primitives
//! - Time and UUID helpers

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
