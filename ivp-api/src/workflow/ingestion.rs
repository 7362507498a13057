//! Recording ingestion pipeline
//!
//! Takes one uploaded answer from raw bytes to a finalized recording:
//!
//! 1. **Validation**: audio is non-empty, question exists
//! 2. **Storage**: bytes written under the recording id (create-new)
//! 3. **Persistence**: row inserted in TRANSCRIBING
//! 4. **Transcription**: upload + poll; transcript committed
//! 5. **Feedback**: rubric feedback committed; row FINALIZED
//!
//! Each committed write stands alone; no transaction spans a vendor call.
//! A failure after step 3 leaves the row ERRORED with a `failure_reason`.

use sqlx::SqlitePool;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::{questions, OwnerScope};
use crate::models::{FailureReason, Recording, RecordingStatus};
use crate::services::{
    AudioStore, FeedbackError, FeedbackGenerator, Transcriber, Transcript, TranscriptionError,
};
use ivp_common::time;

/// One recording submission
#[derive(Debug, Clone)]
pub struct Submission {
    /// Allocated by the caller so in-flight submissions can be addressed by id
    pub recording_id: Uuid,
    pub owner: Uuid,
    pub question_id: i64,
    pub original_filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Pipeline stage at which a submission failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validation,
    Storage,
    Persistence,
    Transcription,
    Feedback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::Storage => "storage",
            Stage::Persistence => "persistence",
            Stage::Transcription => "transcription",
            Stage::Feedback => "feedback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cause of a pipeline failure
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Audio storage failed: {0}")]
    Storage(#[source] std::io::Error),

    #[error(transparent)]
    Database(#[from] ivp_common::Error),

    #[error(transparent)]
    Transcription(TranscriptionError),

    #[error(transparent)]
    Feedback(#[from] FeedbackError),

    #[error("Submission cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TranscriptionError> for PipelineError {
    fn from(err: TranscriptionError) -> Self {
        match err {
            TranscriptionError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Transcription(other),
        }
    }
}

/// Failed submission: stage, cause, and the persisted recording (if any)
#[derive(Debug, Error)]
#[error("Ingestion failed at {stage} stage: {error}")]
pub struct IngestionFailure {
    pub stage: Stage,
    #[source]
    pub error: PipelineError,
    pub recording: Option<Recording>,
}

impl IngestionFailure {
    fn before_persist(stage: Stage, error: PipelineError) -> Self {
        Self {
            stage,
            error,
            recording: None,
        }
    }
}

/// Ingestion pipeline with injected storage and vendor clients
pub struct IngestionPipeline {
    db: SqlitePool,
    audio_store: AudioStore,
    transcriber: Arc<dyn Transcriber>,
    feedback: Arc<dyn FeedbackGenerator>,
}

impl IngestionPipeline {
    pub fn new(
        db: SqlitePool,
        audio_store: AudioStore,
        transcriber: Arc<dyn Transcriber>,
        feedback: Arc<dyn FeedbackGenerator>,
    ) -> Self {
        Self {
            db,
            audio_store,
            transcriber,
            feedback,
        }
    }

    pub fn audio_store(&self) -> &AudioStore {
        &self.audio_store
    }

    /// Run a submission to completion
    ///
    /// Returns the finalized recording, or the failure with whatever was
    /// persisted before it.
    pub async fn submit(
        &self,
        submission: Submission,
        cancel: &CancellationToken,
    ) -> Result<Recording, IngestionFailure> {
        let Submission {
            recording_id,
            owner,
            question_id,
            original_filename,
            bytes,
        } = submission;
        let scope = OwnerScope::new(owner);
        let submitted_at = time::now();

        tracing::info!(
            recording_id = %recording_id,
            user_id = %owner,
            question_id,
            bytes = bytes.len(),
            "Recording submission received"
        );

        // RECEIVED
        if bytes.is_empty() {
            return Err(IngestionFailure::before_persist(
                Stage::Validation,
                PipelineError::Validation("Uploaded audio is empty".to_string()),
            ));
        }
        match questions::question_exists(&self.db, question_id).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(IngestionFailure::before_persist(
                    Stage::Validation,
                    PipelineError::NotFound(format!("Question {}", question_id)),
                ));
            }
            Err(e) => {
                return Err(IngestionFailure::before_persist(Stage::Validation, e.into()));
            }
        }

        // RECEIVED → AUDIO_STORED
        let location = self
            .audio_store
            .save(recording_id, original_filename.as_deref(), &bytes)
            .await
            .map_err(|e| IngestionFailure::before_persist(Stage::Storage, PipelineError::Storage(e)))?;

        let mut recording = Recording::new(recording_id, owner, question_id, location, submitted_at);

        // AUDIO_STORED → TRANSCRIBING; the row is created directly in this state
        recording.status = RecordingStatus::Transcribing;
        if let Err(e) = scope.insert(&self.db, &recording).await {
            tracing::error!(recording_id = %recording_id, error = %e, "Failed to insert recording");
            if let Err(io_err) = self.audio_store.remove(&recording.recording_url).await {
                tracing::warn!(
                    path = %recording.recording_url,
                    error = %io_err,
                    "Failed to remove audio for unpersisted recording"
                );
            }
            return Err(IngestionFailure::before_persist(Stage::Persistence, e.into()));
        }

        // TRANSCRIBING → TRANSCRIBED
        let transcript = match self.transcribe(&bytes, cancel).await {
            Ok(transcript) => transcript,
            Err(err) => {
                return Err(self
                    .abandon(&scope, recording, Stage::Transcription, err.into())
                    .await);
            }
        };

        recording.attach_transcript(transcript.text, transcript.audio_duration);
        recording.transition_to(RecordingStatus::GeneratingFeedback);
        self.commit(&scope, &recording).await?;

        // GENERATING_FEEDBACK → FINALIZED
        let transcript_text = recording.transcript.clone().unwrap_or_default();
        let feedback = tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            result = self.feedback.generate(&transcript_text) => result.map_err(PipelineError::from),
        };
        let feedback = match feedback {
            Ok(feedback) => feedback,
            Err(err) => return Err(self.abandon(&scope, recording, Stage::Feedback, err).await),
        };

        if let Err(msg) = recording.attach_feedback(feedback) {
            return Err(IngestionFailure {
                stage: Stage::Feedback,
                error: PipelineError::Internal(msg),
                recording: Some(recording),
            });
        }
        self.commit(&scope, &recording).await?;

        tracing::info!(
            recording_id = %recording.id,
            duration_seconds = ?recording.duration_seconds,
            "Recording finalized"
        );

        Ok(recording)
    }

    async fn transcribe(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Transcript, TranscriptionError> {
        let handle = tokio::select! {
            _ = cancel.cancelled() => return Err(TranscriptionError::Cancelled),
            result = self.transcriber.upload(bytes) => result?,
        };
        self.transcriber.transcribe(&handle, cancel).await
    }

    async fn commit(&self, scope: &OwnerScope, recording: &Recording) -> Result<(), IngestionFailure> {
        scope.save(&self.db, recording).await.map_err(|e| IngestionFailure {
            stage: Stage::Persistence,
            error: e.into(),
            recording: Some(recording.clone()),
        })
    }

    /// Mark the recording ERRORED and build the failure
    async fn abandon(
        &self,
        scope: &OwnerScope,
        mut recording: Recording,
        stage: Stage,
        error: PipelineError,
    ) -> IngestionFailure {
        let reason = match (&error, stage) {
            (PipelineError::Cancelled, _) => FailureReason::Cancelled,
            (_, Stage::Feedback) => FailureReason::FeedbackFailed,
            _ => FailureReason::TranscriptionFailed,
        };

        tracing::warn!(
            recording_id = %recording.id,
            stage = %stage,
            reason = reason.as_str(),
            error = %error,
            "Recording ingestion failed"
        );

        recording.fail(reason);
        if let Err(e) = scope.save(&self.db, &recording).await {
            tracing::error!(
                recording_id = %recording.id,
                error = %e,
                "Failed to persist errored recording"
            );
        }

        IngestionFailure {
            stage,
            error,
            recording: Some(recording),
        }
    }
}
