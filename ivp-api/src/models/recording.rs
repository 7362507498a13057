//! Recorded answers and their lifecycle
//!
//! A recording progresses through:
//! RECEIVED → AUDIO_STORED → TRANSCRIBING → TRANSCRIBED → GENERATING_FEEDBACK → FINALIZED
//! with ERRORED reachable from any non-terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::Feedback;

/// Recording lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    /// Upload accepted, nothing stored yet
    Received,
    /// Audio written to durable storage
    AudioStored,
    /// Transcription vendor job in progress
    Transcribing,
    /// Transcript attached
    Transcribed,
    /// Language-model feedback in progress
    GeneratingFeedback,
    /// Transcript and feedback attached
    Finalized,
    /// A stage failed; see `failure_reason`
    Errored,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingStatus::Received => "received",
            RecordingStatus::AudioStored => "audio_stored",
            RecordingStatus::Transcribing => "transcribing",
            RecordingStatus::Transcribed => "transcribed",
            RecordingStatus::GeneratingFeedback => "generating_feedback",
            RecordingStatus::Finalized => "finalized",
            RecordingStatus::Errored => "errored",
        }
    }
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(RecordingStatus::Received),
            "audio_stored" => Ok(RecordingStatus::AudioStored),
            "transcribing" => Ok(RecordingStatus::Transcribing),
            "transcribed" => Ok(RecordingStatus::Transcribed),
            "generating_feedback" => Ok(RecordingStatus::GeneratingFeedback),
            "finalized" => Ok(RecordingStatus::Finalized),
            "errored" => Ok(RecordingStatus::Errored),
            other => Err(format!("Unknown recording status: {}", other)),
        }
    }
}

/// Why a recording ended up ERRORED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    TranscriptionFailed,
    FeedbackFailed,
    Cancelled,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::TranscriptionFailed => "transcription_failed",
            FailureReason::FeedbackFailed => "feedback_failed",
            FailureReason::Cancelled => "cancelled",
        }
    }
}

impl FromStr for FailureReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcription_failed" => Ok(FailureReason::TranscriptionFailed),
            "feedback_failed" => Ok(FailureReason::FeedbackFailed),
            "cancelled" => Ok(FailureReason::Cancelled),
            other => Err(format!("Unknown failure reason: {}", other)),
        }
    }
}

/// Recorded answer to a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question_id: i64,
    /// Storage location of the raw audio
    pub recording_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub transcript: Option<String>,
    pub duration_seconds: Option<f64>,
    pub feedback_json: Option<Feedback>,
    pub status: RecordingStatus,
    pub failure_reason: Option<FailureReason>,
}

impl Recording {
    /// New recording whose audio is already stored
    pub fn new(
        id: Uuid,
        user_id: Uuid,
        question_id: i64,
        recording_url: String,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            question_id,
            recording_url,
            created_at: submitted_at,
            updated_at: submitted_at,
            transcript: None,
            duration_seconds: None,
            feedback_json: None,
            status: RecordingStatus::AudioStored,
            failure_reason: None,
        }
    }

    /// Move to `new_status`, refreshing `updated_at`
    pub fn transition_to(&mut self, new_status: RecordingStatus) {
        tracing::debug!(
            recording_id = %self.id,
            from = %self.status,
            to = %new_status,
            "Recording state transition"
        );
        self.status = new_status;
        self.updated_at = ivp_common::time::now();
    }

    /// Attach the transcript (TRANSCRIBING → TRANSCRIBED)
    pub fn attach_transcript(&mut self, text: String, duration_seconds: Option<f64>) {
        self.transcript = Some(text);
        self.duration_seconds = duration_seconds;
        self.transition_to(RecordingStatus::Transcribed);
    }

    /// Attach feedback (GENERATING_FEEDBACK → FINALIZED)
    ///
    /// Feedback is derived from the transcript, so a recording without one
    /// cannot accept feedback.
    pub fn attach_feedback(&mut self, feedback: Feedback) -> Result<(), String> {
        if self.transcript.is_none() {
            return Err(format!(
                "Recording {} has no transcript; feedback cannot be attached",
                self.id
            ));
        }
        self.feedback_json = Some(feedback);
        self.transition_to(RecordingStatus::Finalized);
        Ok(())
    }

    /// Enter the absorbing ERRORED state
    pub fn fail(&mut self, reason: FailureReason) {
        self.failure_reason = Some(reason);
        self.transition_to(RecordingStatus::Errored);
    }
}
