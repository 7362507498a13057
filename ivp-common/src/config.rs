//! Configuration loading
//!
//! Two sources feed the service configuration:
//! 1. **Environment variables**: secrets and the database URL (highest priority)
//! 2. **TOML file**: secrets as a fallback, plus every tunable with built-in defaults
//!
//! Required secrets are resolved once at startup. Missing secrets fail
//! immediately with a single error naming every absent key.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable holding the database connection string
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
/// Environment variable holding the transcription vendor key
pub const ENV_ASSEMBLYAI_API_KEY: &str = "ASSEMBLYAI_API_KEY";
/// Environment variable holding the language-model vendor key
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable holding the bearer-token signing secret
pub const ENV_JWT_SECRET: &str = "JWT_SECRET";

/// TOML configuration file contents
///
/// Every section is optional; absent values fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Database connection string (sqlite://...)
    #[serde(default)]
    pub database_url: Option<String>,

    /// AssemblyAI API key (fallback for ASSEMBLYAI_API_KEY)
    #[serde(default)]
    pub assemblyai_api_key: Option<String>,

    /// OpenAI API key (fallback for OPENAI_API_KEY)
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Bearer-token signing secret (fallback for JWT_SECRET)
    #[serde(default)]
    pub jwt_secret: Option<String>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,

    #[serde(default)]
    pub feedback: FeedbackConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Directory receiving uploaded audio (default: `<data dir>/uploads`)
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,

    /// Largest accepted request body for recording uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Browser origins allowed by CORS
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter directive (RUST_LOG overrides)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Transcription vendor tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_transcription_base_url")]
    pub base_url: String,

    /// Delay between job-status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on the whole poll loop
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Attempts per vendor call when the failure is transient
    #[serde(default = "default_transcription_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_transcription_backoff_ms")]
    pub initial_backoff_ms: u64,
}

/// Language-model vendor tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_feedback_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Attempts per request when the failure is transient
    #[serde(default = "default_feedback_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_feedback_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            upload_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: default_transcription_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            max_wait_secs: default_max_wait_secs(),
            max_attempts: default_transcription_attempts(),
            initial_backoff_ms: default_transcription_backoff_ms(),
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            base_url: default_feedback_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_attempts: default_feedback_attempts(),
            initial_backoff_ms: default_feedback_backoff_ms(),
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_cors_origins() -> Vec<String> {
    [
        "http://localhost:3001",
        "http://localhost:3002",
        "http://localhost:5173",
        "http://127.0.0.1:3001",
        "http://127.0.0.1:3002",
        "http://127.0.0.1:5173",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_log_level() -> String {
    "ivp_api=info,tower_http=info".to_string()
}

fn default_transcription_base_url() -> String {
    "https://api.assemblyai.com".to_string()
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_max_wait_secs() -> u64 {
    600
}

fn default_transcription_attempts() -> u32 {
    3
}

fn default_transcription_backoff_ms() -> u64 {
    500
}

fn default_feedback_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_feedback_attempts() -> u32 {
    2
}

fn default_feedback_backoff_ms() -> u64 {
    1000
}

/// Secrets and connection string resolved at startup
#[derive(Clone)]
pub struct Secrets {
    pub database_url: String,
    pub assemblyai_api_key: String,
    pub openai_api_key: String,
    pub jwt_secret: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("database_url", &self.database_url)
            .field("assemblyai_api_key", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

/// Load the TOML configuration
///
/// An explicitly requested file must exist and parse. Without an explicit
/// path the platform default (`<config dir>/ivp/ivp-api.toml`) is used when
/// present; otherwise built-in defaults apply.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                warn!("No TOML config file found, using built-in defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Platform config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ivp").join("ivp-api.toml"))
}

/// OS-dependent data folder for the database and uploads
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ivp"))
        .unwrap_or_else(|| PathBuf::from("./ivp_data"))
}

/// Resolve secrets from the process environment, then TOML
pub fn resolve_secrets(toml_config: &TomlConfig) -> Result<Secrets> {
    resolve_secrets_with(toml_config, |name| std::env::var(name).ok())
}

/// Resolve secrets with an injectable environment lookup
///
/// **Priority:** ENV → TOML. The database URL falls back to a SQLite file in
/// the default data folder; every other secret is mandatory.
pub fn resolve_secrets_with<F>(toml_config: &TomlConfig, env: F) -> Result<Secrets>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = Vec::new();

    let mut pick = |env_name: &str, toml_value: &Option<String>| -> Option<String> {
        if let Some(value) = env(env_name).filter(|v| is_valid_key(v)) {
            info!("{} loaded from environment variable", env_name);
            return Some(value);
        }
        if let Some(value) = toml_value.as_ref().filter(|v| is_valid_key(v)) {
            info!("{} loaded from TOML config", env_name);
            return Some(value.clone());
        }
        missing.push(env_name.to_string());
        None
    };

    let assemblyai_api_key = pick(ENV_ASSEMBLYAI_API_KEY, &toml_config.assemblyai_api_key);
    let openai_api_key = pick(ENV_OPENAI_API_KEY, &toml_config.openai_api_key);
    let jwt_secret = pick(ENV_JWT_SECRET, &toml_config.jwt_secret);

    let database_url = env(ENV_DATABASE_URL)
        .filter(|v| is_valid_key(v))
        .or_else(|| toml_config.database_url.clone().filter(|v| is_valid_key(v)))
        .unwrap_or_else(|| {
            let path = default_data_dir().join("ivp.db");
            format!("sqlite://{}?mode=rwc", path.display())
        });

    match (assemblyai_api_key, openai_api_key, jwt_secret) {
        (Some(assemblyai_api_key), Some(openai_api_key), Some(jwt_secret)) => Ok(Secrets {
            database_url,
            assemblyai_api_key,
            openai_api_key,
            jwt_secret,
        }),
        _ => Err(Error::Config(format!(
            "Missing required configuration: {}. Set each as an environment variable \
             or in the TOML config file (lowercase key).",
            missing.join(", ")
        ))),
    }
}

/// Validate a secret value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
