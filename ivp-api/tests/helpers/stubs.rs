//! In-process vendor stubs implementing the client traits

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use ivp_api::models::Feedback;
use ivp_api::services::{
    FeedbackError, FeedbackGenerator, Transcriber, Transcript, TranscriptionError, UploadHandle,
};

/// What the stub transcriber does once a job is submitted
#[derive(Debug, Clone)]
pub enum StubTranscription {
    Text(String, Option<f64>),
    JobFailed(String),
    Timeout,
    /// Block until the submission is cancelled
    HangUntilCancelled,
    /// Panic inside `transcribe`
    Panic,
}

pub struct StubTranscriber {
    outcome: StubTranscription,
    pub upload_calls: AtomicUsize,
    pub transcribe_calls: AtomicUsize,
    pub uploaded_bytes: Mutex<Vec<Vec<u8>>>,
    /// Notified when `transcribe` starts
    pub started: Notify,
}

impl StubTranscriber {
    pub fn new(outcome: StubTranscription) -> Self {
        Self {
            outcome,
            upload_calls: AtomicUsize::new(0),
            transcribe_calls: AtomicUsize::new(0),
            uploaded_bytes: Mutex::new(Vec::new()),
            started: Notify::new(),
        }
    }

    pub fn transcribe_calls(&self) -> usize {
        self.transcribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn upload(&self, audio: &[u8]) -> Result<UploadHandle, TranscriptionError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploaded_bytes.lock().unwrap().push(audio.to_vec());
        Ok(UploadHandle {
            upload_url: "https://cdn.test/upload/1".to_string(),
        })
    }

    async fn transcribe(
        &self,
        _handle: &UploadHandle,
        cancel: &CancellationToken,
    ) -> Result<Transcript, TranscriptionError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();

        match &self.outcome {
            StubTranscription::Text(text, duration) => Ok(Transcript {
                text: text.clone(),
                audio_duration: *duration,
            }),
            StubTranscription::JobFailed(reason) => Err(TranscriptionError::JobFailed(reason.clone())),
            StubTranscription::Timeout => Err(TranscriptionError::Timeout {
                waited: Duration::from_secs(600),
            }),
            StubTranscription::HangUntilCancelled => {
                cancel.cancelled().await;
                Err(TranscriptionError::Cancelled)
            }
            StubTranscription::Panic => panic!("stub transcriber panicked"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StubFeedbackOutcome {
    Ok(Feedback),
    Malformed(String),
    Vendor(u16),
}

pub struct StubFeedback {
    outcome: StubFeedbackOutcome,
    pub calls: AtomicUsize,
    pub transcripts: Mutex<Vec<String>>,
}

impl StubFeedback {
    pub fn new(outcome: StubFeedbackOutcome) -> Self {
        Self {
            outcome,
            calls: AtomicUsize::new(0),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedbackGenerator for StubFeedback {
    async fn generate(&self, transcript: &str) -> Result<Feedback, FeedbackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transcripts.lock().unwrap().push(transcript.to_string());

        match &self.outcome {
            StubFeedbackOutcome::Ok(feedback) => Ok(feedback.clone()),
            StubFeedbackOutcome::Malformed(msg) => Err(FeedbackError::Malformed(msg.clone())),
            StubFeedbackOutcome::Vendor(status) => Err(FeedbackError::Vendor {
                status: *status,
                body: "stub vendor failure".to_string(),
            }),
        }
    }
}

pub fn sample_feedback() -> Feedback {
    Feedback {
        clarity: "Mostly clear, one vague sentence.".to_string(),
        structure: "WEAK: no conclusion.".to_string(),
        tone: "Confident.".to_string(),
        language: "Precise.".to_string(),
        suggested_improvements: "Close with the outcome.".to_string(),
    }
}
