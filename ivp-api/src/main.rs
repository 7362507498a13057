//! ivp-api - Interview practice backend
//!
//! Stores interview questions, accepts recorded answers, and returns
//! transcripts with rubric feedback from external speech and language-model
//! vendors.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ivp_api::config::ServiceConfig;
use ivp_api::services::{AssemblyAiClient, AudioStore, OpenAiFeedbackClient};
use ivp_api::workflow::IngestionPipeline;
use ivp_api::{AppState, RouterSettings};

/// Command-line arguments for ivp-api
#[derive(Parser, Debug)]
#[command(name = "ivp-api")]
#[command(about = "Interview practice backend")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/ivp/ivp-api.toml)
    #[arg(short, long, env = "IVP_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides [server].bind_addr
    #[arg(short, long, env = "IVP_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = ivp_common::config::load_toml_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the TOML default
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ivp-api v{}", env!("CARGO_PKG_VERSION"));

    let secrets = ivp_common::config::resolve_secrets(&toml_config)
        .context("Missing required configuration")?;
    let config = ServiceConfig::resolve(&toml_config, secrets, args.bind);

    let db = ivp_common::db::init_database(&config.database_url)
        .await
        .context("Failed to initialize database")?;
    info!("Database ready");

    let audio_store = AudioStore::new(&config.upload_dir);
    audio_store
        .ensure_dir()
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.upload_dir.display()))?;
    info!("Upload dir: {}", config.upload_dir.display());

    let transcriber = AssemblyAiClient::new(config.transcription.clone())
        .context("Failed to build transcription client")?;
    let feedback = OpenAiFeedbackClient::new(config.feedback.clone())
        .context("Failed to build feedback client")?;
    info!(
        transcription = %config.transcription.base_url,
        feedback = %config.feedback.base_url,
        model = %config.feedback.model,
        "Vendor clients initialized"
    );

    let pipeline = IngestionPipeline::new(db.clone(), audio_store, Arc::new(transcriber), Arc::new(feedback));
    let state = AppState::new(db, pipeline, &config.jwt_secret);
    let shutdown = state.shutdown.clone();

    let app = ivp_api::build_router(
        state,
        &RouterSettings {
            cors_origins: config.cors_origins.clone(),
            max_upload_bytes: config.max_upload_bytes,
        },
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then cancel every in-flight submission
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    shutdown.cancel();
}
