//! Service configuration for ivp-api
//!
//! Resolved once at startup: CLI overrides → ENV → TOML → defaults. Secrets
//! come from `ivp_common::config::resolve_secrets`; everything else from the
//! TOML sections.

use std::path::PathBuf;

use crate::services::{FeedbackSettings, TranscriptionSettings};
use ivp_common::config::{default_data_dir, Secrets, TomlConfig};

/// Fully resolved service configuration (holds secrets; not `Debug`)
#[derive(Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    pub transcription: TranscriptionSettings,
    pub feedback: FeedbackSettings,
}

impl ServiceConfig {
    /// Combine TOML settings with resolved secrets
    ///
    /// `bind_override` comes from the command line and wins over TOML.
    pub fn resolve(toml_config: &TomlConfig, secrets: Secrets, bind_override: Option<String>) -> Self {
        let upload_dir = toml_config
            .server
            .upload_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("uploads"));

        Self {
            bind_addr: bind_override.unwrap_or_else(|| toml_config.server.bind_addr.clone()),
            database_url: secrets.database_url,
            jwt_secret: secrets.jwt_secret,
            upload_dir,
            max_upload_bytes: toml_config.server.max_upload_bytes,
            cors_origins: toml_config.server.cors_origins.clone(),
            transcription: TranscriptionSettings::from_config(
                &toml_config.transcription,
                secrets.assemblyai_api_key,
            ),
            feedback: FeedbackSettings::from_config(&toml_config.feedback, secrets.openai_api_key),
        }
    }
}
