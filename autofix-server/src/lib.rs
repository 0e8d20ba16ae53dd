pub mod config;
pub mod flow;
pub mod github;
pub mod mirror;
pub mod recording;
pub mod webhook;

use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use autofix_core::{CodeGenerator, RepositoryHost};

pub use flow::{FlowError, FlowOutcome, FlowSettings, FlowStep};
pub use github::{GitHubClient, RepoSlug};
pub use mirror::LocalMirror;
pub use recording::RecordingLogger;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

fn short_hash(hash: &str) -> String {
    hash.chars().take(8).collect()
}

pub fn get_bot_version() -> String {
    if let Some(git_hash) = option_env!("AUTOFIX_GIT_HASH") {
        short_hash(git_hash)
    } else if let Some(git_hash) = built_info::GIT_COMMIT_HASH {
        short_hash(git_hash)
    } else {
        built_info::PKG_VERSION.to_string()
    }
}

/// Shared by every request; built once at startup.
pub struct AppState {
    pub repository: Arc<dyn RepositoryHost>,
    pub generator: Arc<dyn CodeGenerator>,
    pub mirror: LocalMirror,
    pub settings: FlowSettings,
    pub recording_logger: Option<RecordingLogger>,
}

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "autofix",
        "version": get_bot_version()
    })))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(webhook::webhook_router(state.clone()))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
