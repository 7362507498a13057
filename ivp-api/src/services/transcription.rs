//! Speech-to-text vendor client
//!
//! Speaks the AssemblyAI v2 protocol:
//! 1. `POST /v2/upload` with raw audio bytes → `{upload_url}`
//! 2. `POST /v2/transcript` with `{audio_url}` → `{id}`
//! 3. `GET /v2/transcript/{id}` until `status` is `completed` or `error`
//!
//! The poll loop is bounded by `max_wait` and aborts on cancellation. In both
//! cases the vendor job is deleted before returning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::utils::{retry_with_backoff, RetryPolicy};
use ivp_common::config::TranscriptionConfig;

const USER_AGENT: &str = concat!("ivp-api/", env!("CARGO_PKG_VERSION"));

/// Per-request HTTP timeout (the poll loop as a whole is bounded separately)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Transcription client errors
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transcription vendor returned HTTP {status}: {body}")]
    Vendor { status: u16, body: String },

    #[error("Transcription job failed: {0}")]
    JobFailed(String),

    #[error("Malformed transcription response: {0}")]
    Malformed(String),

    #[error("Transcription did not complete within {waited:?}")]
    Timeout { waited: Duration },

    #[error("Transcription cancelled")]
    Cancelled,
}

impl TranscriptionError {
    /// Connection failures, 429 and 5xx are worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            TranscriptionError::Transport(_) => true,
            TranscriptionError::Vendor { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Vendor-side location of uploaded audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadHandle {
    pub upload_url: String,
}

/// Completed transcription
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    /// Audio length in seconds, when the vendor reports it
    pub audio_duration: Option<f64>,
}

/// Port for audio transcription
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Upload raw audio to the vendor
    async fn upload(&self, audio: &[u8]) -> Result<UploadHandle, TranscriptionError>;

    /// Start a transcription job for uploaded audio and wait for its result
    async fn transcribe(
        &self,
        handle: &UploadHandle,
        cancel: &CancellationToken,
    ) -> Result<Transcript, TranscriptionError>;
}

/// Connection and polling settings for [`AssemblyAiClient`]
#[derive(Clone)]
pub struct TranscriptionSettings {
    pub base_url: String,
    pub api_key: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl std::fmt::Debug for TranscriptionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("poll_interval", &self.poll_interval)
            .field("max_wait", &self.max_wait)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .finish()
    }
}

impl TranscriptionSettings {
    pub fn from_config(config: &TranscriptionConfig, api_key: String) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_wait: Duration::from_secs(config.max_wait_secs),
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    audio_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    audio_duration: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// AssemblyAI-compatible transcription client
pub struct AssemblyAiClient {
    http_client: reqwest::Client,
    settings: TranscriptionSettings,
    retry: RetryPolicy,
}

impl AssemblyAiClient {
    pub fn new(settings: TranscriptionSettings) -> Result<Self, TranscriptionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TranscriptionError::Transport(e.to_string()))?;

        let retry = RetryPolicy::new(settings.max_attempts, settings.initial_backoff);

        Ok(Self {
            http_client,
            settings,
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url, path)
    }

    async fn upload_once(&self, audio: &[u8]) -> Result<UploadResponse, TranscriptionError> {
        let response = self
            .http_client
            .post(self.url("/v2/upload"))
            .header(reqwest::header::AUTHORIZATION, &self.settings.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| TranscriptionError::Transport(e.to_string()))?;

        decode(response).await
    }

    async fn submit_once(&self, handle: &UploadHandle) -> Result<SubmitResponse, TranscriptionError> {
        let response = self
            .http_client
            .post(self.url("/v2/transcript"))
            .header(reqwest::header::AUTHORIZATION, &self.settings.api_key)
            .json(&SubmitRequest {
                audio_url: &handle.upload_url,
            })
            .send()
            .await
            .map_err(|e| TranscriptionError::Transport(e.to_string()))?;

        decode(response).await
    }

    /// One status request, bounded by `timeout` rather than the client default
    async fn poll_once(&self, job_id: &str, timeout: Duration) -> Result<JobResponse, TranscriptionError> {
        let response = self
            .http_client
            .get(self.url(&format!("/v2/transcript/{}", job_id)))
            .header(reqwest::header::AUTHORIZATION, &self.settings.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TranscriptionError::Transport(e.to_string()))?;

        decode(response).await
    }

    /// Best-effort removal of an abandoned job
    async fn delete_job(&self, job_id: &str) {
        let result = self
            .http_client
            .delete(self.url(&format!("/v2/transcript/{}", job_id)))
            .header(reqwest::header::AUTHORIZATION, &self.settings.api_key)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::info!(job_id, "Deleted abandoned transcription job");
            }
            Ok(response) => {
                tracing::warn!(
                    job_id,
                    status = response.status().as_u16(),
                    "Vendor refused to delete abandoned transcription job"
                );
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Failed to delete abandoned transcription job");
            }
        }
    }

    /// Poll `job_id` until it settles, the deadline passes, or `cancel` fires
    async fn await_job(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Transcript, TranscriptionError> {
        let started = Instant::now();
        let deadline = started + self.settings.max_wait;
        let mut polls = 0u32;

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TranscriptionError::Cancelled),
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    return Err(TranscriptionError::Timeout {
                        waited: started.elapsed(),
                    });
                }
                result = retry_with_backoff(
                    "transcript poll",
                    self.retry,
                    TranscriptionError::is_transient,
                    || {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        self.poll_once(job_id, remaining.min(REQUEST_TIMEOUT))
                    },
                ) => result,
            };
            let job = match polled {
                Ok(job) => job,
                // A request cut short by the deadline is a timeout, not a transport fault
                Err(_) if Instant::now() >= deadline => {
                    return Err(TranscriptionError::Timeout {
                        waited: started.elapsed(),
                    });
                }
                Err(e) => return Err(e),
            };
            polls += 1;

            match job.status.as_str() {
                "completed" => {
                    let text = job.text.ok_or_else(|| {
                        TranscriptionError::Malformed("completed job has no text".to_string())
                    })?;
                    tracing::info!(
                        job_id,
                        polls,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        audio_duration = ?job.audio_duration,
                        "Transcription completed"
                    );
                    return Ok(Transcript {
                        text,
                        audio_duration: job.audio_duration,
                    });
                }
                "error" => {
                    let reason = job.error.unwrap_or_else(|| "unknown vendor error".to_string());
                    return Err(TranscriptionError::JobFailed(reason));
                }
                "queued" | "processing" => {
                    tracing::debug!(job_id, status = %job.status, polls, "Transcription pending");
                }
                other => {
                    return Err(TranscriptionError::Malformed(format!(
                        "unknown job status '{}'",
                        other
                    )));
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(TranscriptionError::Timeout {
                    waited: started.elapsed(),
                });
            }

            let pause = self.settings.poll_interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Err(TranscriptionError::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}

#[async_trait]
impl Transcriber for AssemblyAiClient {
    async fn upload(&self, audio: &[u8]) -> Result<UploadHandle, TranscriptionError> {
        tracing::debug!(bytes = audio.len(), "Uploading audio to transcription vendor");

        let uploaded = retry_with_backoff(
            "audio upload",
            self.retry,
            TranscriptionError::is_transient,
            || self.upload_once(audio),
        )
        .await?;

        Ok(UploadHandle {
            upload_url: uploaded.upload_url,
        })
    }

    async fn transcribe(
        &self,
        handle: &UploadHandle,
        cancel: &CancellationToken,
    ) -> Result<Transcript, TranscriptionError> {
        if cancel.is_cancelled() {
            return Err(TranscriptionError::Cancelled);
        }

        let job = retry_with_backoff(
            "transcript submit",
            self.retry,
            TranscriptionError::is_transient,
            || self.submit_once(handle),
        )
        .await?;

        tracing::info!(job_id = %job.id, "Transcription job submitted");

        let result = self.await_job(&job.id, cancel).await;

        if matches!(
            result,
            Err(TranscriptionError::Timeout { .. }) | Err(TranscriptionError::Cancelled)
        ) {
            self.delete_job(&job.id).await;
        }

        result
    }
}

/// Map a vendor response to `T`, or to `Vendor` / `Malformed`
async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TranscriptionError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| TranscriptionError::Transport(e.to_string()))?;

    if !status.is_success() {
        return Err(TranscriptionError::Vendor {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| TranscriptionError::Malformed(e.to_string()))
}
