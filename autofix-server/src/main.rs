use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use autofix_core::{GeminiClient, ServiceType};
use autofix_server::config::Config;
use autofix_server::github::{create_github_client, GitHubClient};
use autofix_server::recording::instrumented_client;
use autofix_server::{build_router, get_bot_version, AppState, FlowSettings, LocalMirror, RecordingLogger};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!("Starting autofix {} with {:?}", get_bot_version(), config);

    let recording_logger = if config.recording_enabled {
        info!("Recording enabled, logging to: {}", config.recording_log_path);
        Some(RecordingLogger::new(PathBuf::from(&config.recording_log_path)))
    } else {
        None
    };

    let github_client = GitHubClient::new(
        create_github_client(recording_logger.clone())?,
        config.github_token.clone(),
        config.repo.clone(),
        config.github_api_url.clone(),
    );

    let gemini_client = GeminiClient::new(
        instrumented_client(ServiceType::Gemini, recording_logger.clone())?,
        config.google_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_api_url.clone(),
    );
    info!("Using Gemini model {}", gemini_client.model());

    let settings = FlowSettings::new(config.target_file.clone(), config.base_branch.clone());
    info!(
        "Target file {} ({}) on {}, mirrored to {}",
        settings.target_file,
        settings.language.name,
        settings.base_branch,
        config.local_file_path.display()
    );

    let app_state = Arc::new(AppState {
        repository: Arc::new(github_client),
        generator: Arc::new(gemini_client),
        mirror: LocalMirror::new(config.local_file_path.clone()),
        settings,
        recording_logger,
    });

    let app = build_router(app_state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
