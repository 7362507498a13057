//! Recording ingestion workflow
//!
//! Upload persistence → transcription → feedback → finalization, with
//! per-stage commits and an ERRORED terminal state.

pub mod ingestion;

pub use ingestion::{IngestionFailure, IngestionPipeline, PipelineError, Stage, Submission};
