//! Language-model feedback client
//!
//! Sends the transcript inside a fixed rubric prompt to an OpenAI-compatible
//! chat-completions endpoint and decodes the reply into [`Feedback`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::Feedback;
use crate::utils::{retry_with_backoff, RetryPolicy};
use ivp_common::config::FeedbackConfig;

const USER_AGENT: &str = concat!("ivp-api/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Feedback client errors
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Feedback vendor returned HTTP {status}: {body}")]
    Vendor { status: u16, body: String },

    #[error("Malformed feedback response: {0}")]
    Malformed(String),
}

impl FeedbackError {
    pub fn is_transient(&self) -> bool {
        match self {
            FeedbackError::Transport(_) => true,
            FeedbackError::Vendor { status, .. } => *status == 429 || *status >= 500,
            FeedbackError::Malformed(_) => false,
        }
    }
}

/// Port for transcript evaluation
#[async_trait]
pub trait FeedbackGenerator: Send + Sync {
    async fn generate(&self, transcript: &str) -> Result<Feedback, FeedbackError>;
}

#[derive(Clone)]
pub struct FeedbackSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl std::fmt::Debug for FeedbackSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl FeedbackSettings {
    pub fn from_config(config: &FeedbackConfig, api_key: String) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Build the rubric prompt with the transcript embedded verbatim
pub fn build_prompt(transcript: &str) -> String {
    format!(
        "You are a senior technical interviewer with more than fifteen years of experience, \
         known for being brutally honest and direct. Candidates come to you for the hard truth \
         they need in order to improve, so do not soften weak answers.\n\n\
         Rules:\n\
         - A weak answer is called WEAK.\n\
         - An average answer is called AVERAGE, with what is missing.\n\
         - Say 'good' only when the answer is genuinely strong.\n\
         - Name specific technical gaps, missing detail and poor organization.\n\
         - Say plainly what would fail a real interview.\n\n\
         Candidate response: {transcript}\n\n\
         Evaluate the response in five areas:\n\
         - Clarity: is the message clear? Point out vagueness or confusion.\n\
         - Structure: is it well organized? Point out missing structure.\n\
         - Tone: is it confident and professional? Point out uncertain language.\n\
         - Language: is the vocabulary precise and technical? Point out weak word choices.\n\
         - Suggested improvements: specific, actionable fixes.\n\n\
         Respond with a JSON object using exactly these keys: \
         Clarity, Structure, Tone, Language, Suggested improvements."
    )
}

/// OpenAI chat-completions feedback client
pub struct OpenAiFeedbackClient {
    http_client: reqwest::Client,
    settings: FeedbackSettings,
    retry: RetryPolicy,
}

impl OpenAiFeedbackClient {
    pub fn new(settings: FeedbackSettings) -> Result<Self, FeedbackError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FeedbackError::Transport(e.to_string()))?;

        let retry = RetryPolicy::new(settings.max_attempts, settings.initial_backoff);

        Ok(Self {
            http_client,
            settings,
            retry,
        })
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, FeedbackError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.settings.temperature,
        };

        let response = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.settings.base_url))
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FeedbackError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FeedbackError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(FeedbackError::Vendor {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse =
            serde_json::from_str(&body).map_err(|e| FeedbackError::Malformed(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| FeedbackError::Malformed("response has no choices".to_string()))
    }
}

#[async_trait]
impl FeedbackGenerator for OpenAiFeedbackClient {
    async fn generate(&self, transcript: &str) -> Result<Feedback, FeedbackError> {
        let prompt = build_prompt(transcript);

        tracing::debug!(
            model = %self.settings.model,
            transcript_chars = transcript.len(),
            "Requesting interview feedback"
        );

        let text = retry_with_backoff(
            "feedback completion",
            self.retry,
            FeedbackError::is_transient,
            || self.complete_once(&prompt),
        )
        .await?;

        Feedback::from_model_text(&text).map_err(FeedbackError::Malformed)
    }
}
