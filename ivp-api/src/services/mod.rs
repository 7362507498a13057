//! Services for ivp-api
//!
//! Vendor clients sit behind the [`Transcriber`] and [`FeedbackGenerator`]
//! traits so the ingestion pipeline can be driven by stubs in tests.

pub mod audio_store;
pub mod feedback;
pub mod question_generator;
pub mod transcription;

pub use audio_store::AudioStore;
pub use feedback::{FeedbackError, FeedbackGenerator, FeedbackSettings, OpenAiFeedbackClient};
pub use transcription::{
    AssemblyAiClient, Transcriber, Transcript, TranscriptionError, TranscriptionSettings,
    UploadHandle,
};
