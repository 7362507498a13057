//! Database access for ivp-api
//!
//! Pool creation and schema bootstrap live in `ivp_common::db`; this module
//! holds the per-table queries.

pub mod questions;
pub mod recordings;
pub mod users;

pub use recordings::OwnerScope;
