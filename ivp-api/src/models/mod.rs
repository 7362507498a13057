//! Data models for ivp-api
//!
//! - Questions and categories
//! - Recordings and their lifecycle state machine
//! - Rubric feedback decoded from the language model
//! - Users

pub mod feedback;
pub mod question;
pub mod recording;
pub mod user;

pub use feedback::{Feedback, FEEDBACK_KEYS};
pub use question::{NewQuestion, Question, QuestionCategory};
pub use recording::{FailureReason, Recording, RecordingStatus};
pub use user::{LoginForm, User, UserCreate, UserRead};
