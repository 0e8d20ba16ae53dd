use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Json, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use autofix_core::Issue;

use crate::flow::{run_issue_flow, FlowContext, FlowError, FlowOutcome, FlowStep};
use crate::recording::{CorrelationId, Direction, EventType, RecordedEvent, Sanitizer};
use crate::AppState;

pub const IGNORED_MESSAGE: &str = "OK, but event ignored";

/// Upper bound on a buffered webhook body. GitHub issue payloads are far smaller.
pub const MAX_WEBHOOK_BODY_SIZE: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct IssueEventPayload {
    pub action: Option<String>,
    pub issue: Option<IssuePayload>,
    pub repository: Option<Repository>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IssuePayload {
    pub number: u64,
    pub title: String,
    /// GitHub sends `null` for an issue opened without a description.
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Repository {
    pub full_name: String,
}

/// The issue to act on, if this payload is an `opened` issue event.
pub fn qualifying_issue(payload: &IssueEventPayload) -> Option<Issue> {
    if payload.action.as_deref() != Some("opened") {
        return None;
    }
    let issue = payload.issue.as_ref()?;
    Some(Issue::new(
        issue.number,
        issue.title.clone(),
        issue.body.clone().unwrap_or_default(),
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WebhookResponse {
    Handled {
        status: String,
        /// The pull request URL, or the error message when the flow failed.
        pr_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        failed_step: Option<FlowStep>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        completed_steps: Vec<FlowStep>,
        /// The pull request opened before a later step failed.
        #[serde(skip_serializing_if = "Option::is_none")]
        opened_pr_url: Option<String>,
    },
    Ignored {
        msg: String,
    },
}

impl WebhookResponse {
    pub fn ignored() -> Self {
        WebhookResponse::Ignored {
            msg: IGNORED_MESSAGE.to_string(),
        }
    }

    pub fn from_flow(result: Result<FlowOutcome, FlowError>) -> Self {
        match result {
            Ok(outcome) => WebhookResponse::Handled {
                status: "success".to_string(),
                pr_url: outcome.pr_url,
                failed_step: None,
                completed_steps: Vec::new(),
                opened_pr_url: None,
            },
            Err(err) => WebhookResponse::Handled {
                status: "success".to_string(),
                pr_url: format!("{:#}", err.cause),
                failed_step: Some(err.step),
                completed_steps: err.completed,
                opened_pr_url: err.opened_pr_url,
            },
        }
    }
}

/// Tags the delivery with a correlation id and records it when recording is on.
async fn correlate_webhook(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let correlation_id = CorrelationId(Uuid::new_v4().to_string());

    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY_SIZE)
        .await
        .map_err(|_| {
            error!("Webhook body too large or read error");
            StatusCode::PAYLOAD_TOO_LARGE
        })?;

    if let Some(ref logger) = state.recording_logger {
        let headers_map = headers_to_hashmap(&parts.headers);
        let body = serde_json::from_slice::<serde_json::Value>(&bytes)
            .map(|value| Sanitizer::sanitize_json(&value))
            .unwrap_or(serde_json::Value::Null);
        let mut metadata = HashMap::new();
        if let Some(event) = headers_map.get("x-github-event") {
            metadata.insert("github_event".to_string(), event.clone());
        }
        logger.record(RecordedEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            correlation_id: correlation_id.0.clone(),
            event_type: EventType::WebhookReceived,
            direction: Direction::Request,
            operation: "webhook".to_string(),
            data: serde_json::json!({
                "headers": Sanitizer::sanitize_headers(&headers_map),
                "body": body
            }),
            metadata,
        });
    }

    let mut new_request = Request::from_parts(parts, axum::body::Body::from(bytes));
    new_request.extensions_mut().insert(correlation_id);

    Ok(next.run(new_request).await)
}

fn headers_to_hashmap(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect()
}

pub async fn issue_webhook_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<WebhookResponse>, StatusCode> {
    info!("Received webhook payload");

    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .map(|id| id.0.clone());

    let (_parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_WEBHOOK_BODY_SIZE)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let payload: IssueEventPayload = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Ignoring unparseable webhook payload: {}", e);
            return Ok(Json(WebhookResponse::ignored()));
        }
    };

    let Some(issue) = qualifying_issue(&payload) else {
        info!(
            "Ignoring event (action: {:?}, issue present: {})",
            payload.action,
            payload.issue.is_some()
        );
        return Ok(Json(WebhookResponse::ignored()));
    };

    info!(
        "Processing issue #{} in {}: {}",
        issue.number,
        payload
            .repository
            .as_ref()
            .map(|r| r.full_name.as_str())
            .unwrap_or("unknown"),
        issue.title
    );

    let ctx = FlowContext {
        repository: state.repository.as_ref(),
        generator: state.generator.as_ref(),
        mirror: &state.mirror,
        settings: &state.settings,
        correlation_id: correlation_id.as_deref(),
    };

    let result = run_issue_flow(&ctx, &issue).await;
    if let Err(ref e) = result {
        error!(
            "Failed to handle issue #{} (completed: {:?}): {}",
            issue.number, e.completed, e
        );
    }

    Ok(Json(WebhookResponse::from_flow(result)))
}

pub fn webhook_router(middleware_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhook", post(issue_webhook_handler))
        .route_layer(middleware::from_fn_with_state(
            middleware_state,
            correlate_webhook,
        ))
}
