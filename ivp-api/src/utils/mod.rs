//! Utility modules for ivp-api

pub mod retry;

pub use retry::{retry_with_backoff, RetryPolicy};
