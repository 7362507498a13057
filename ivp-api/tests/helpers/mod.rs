//! Test Helper Utilities
//!
//! Shared utilities for testing ivp-api

#![allow(dead_code)]

pub mod app;
pub mod stubs;

pub use app::{body_json, get_request, json_request, multipart_request, TestApp, TEST_JWT_SECRET};
pub use stubs::{
    sample_feedback, StubFeedback, StubFeedbackOutcome, StubTranscriber, StubTranscription,
};
