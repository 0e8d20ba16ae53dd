mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use autofix_server::build_router;
use autofix_server::webhook::MAX_WEBHOOK_BODY_SIZE;

use common::{Call, FakeGenerator, FakeRepository, Harness};

async fn post_webhook(harness: &Harness, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-github-event", "issues")
        .body(body.into())
        .unwrap();

    let response = build_router(harness.state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn opened(number: u64, title: &str, body: &str) -> String {
    json!({
        "action": "opened",
        "issue": {"number": number, "title": title, "body": body},
        "repository": {"full_name": "octo/game"}
    })
    .to_string()
}

fn ignored() -> Value {
    json!({"msg": "OK, but event ignored"})
}

#[tokio::test]
async fn test_opened_issue_returns_pr_url() {
    let harness = Harness::new(FakeRepository::empty(), FakeGenerator::replying("print(1)"));

    let (status, body) = post_webhook(&harness, opened(42, "App crashes on load", "Traceback: ...")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "success", "pr_url": "https://github.com/octo/game/pull/7"})
    );
    assert!(harness
        .repository
        .calls()
        .contains(&Call::CloseIssue(42)));
    assert_eq!(harness.mirror_contents().as_deref(), Some("print(1)"));
}

#[tokio::test]
async fn test_other_actions_are_ignored_without_remote_calls() {
    let harness = Harness::new(FakeRepository::empty(), FakeGenerator::replying("print(1)"));

    for action in ["closed", "edited", "labeled"] {
        let payload = json!({
            "action": action,
            "issue": {"number": 1, "title": "t", "body": "b"}
        });
        let (status, body) = post_webhook(&harness, payload.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ignored());
    }

    assert!(harness.repository.calls().is_empty());
    assert!(harness.generator.prompts().is_empty());
}

#[tokio::test]
async fn test_missing_issue_is_ignored() {
    let harness = Harness::new(FakeRepository::empty(), FakeGenerator::replying("print(1)"));

    let (_, body) = post_webhook(&harness, json!({"action": "opened"}).to_string()).await;
    assert_eq!(body, ignored());

    let (_, body) = post_webhook(
        &harness,
        json!({"action": "opened", "issue": {"number": 3}}).to_string(),
    )
    .await;
    assert_eq!(body, ignored());

    assert!(harness.repository.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_json_is_ignored() {
    let harness = Harness::new(FakeRepository::empty(), FakeGenerator::replying("print(1)"));

    let (status, body) = post_webhook(&harness, "not json {").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, ignored());
    assert!(harness.repository.calls().is_empty());
}

#[tokio::test]
async fn test_generation_error_is_reported_in_success_shape() {
    let harness = Harness::new(
        FakeRepository::empty(),
        FakeGenerator::failing("Gemini API error: 500 internal"),
    );

    let (status, body) = post_webhook(&harness, opened(9, "Add sound", "")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "success",
            "pr_url": "Gemini API error: 500 internal",
            "failed_step": "generate",
            "completed_steps": ["read_file"]
        })
    );
    assert_eq!(harness.repository.calls().len(), 1);
}

#[tokio::test]
async fn test_health_reports_service_and_version() {
    let harness = Harness::new(FakeRepository::empty(), FakeGenerator::replying(""));

    let response = build_router(harness.state.clone())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "autofix");
    assert!(body["version"].as_str().is_some_and(|v| !v.is_empty()));
}

#[tokio::test]
async fn test_local_write_failure_keeps_opened_pull_request_url() {
    let harness =
        Harness::with_blocked_mirror(FakeRepository::empty(), FakeGenerator::replying("print(1)"));

    let (status, body) = post_webhook(&harness, opened(42, "App crashes on load", "")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["failed_step"], "write_local");
    assert_eq!(body["opened_pr_url"], "https://github.com/octo/game/pull/7");
    assert_eq!(
        body["completed_steps"],
        json!([
            "read_file",
            "generate",
            "create_branch",
            "commit_file",
            "open_pull_request",
            "close_issue"
        ])
    );
}

#[tokio::test]
async fn test_oversized_body_is_rejected_before_processing() {
    let harness = Harness::new(FakeRepository::empty(), FakeGenerator::replying("print(1)"));
    let oversized = format!(
        r#"{{"action":"opened","issue":{{"number":1,"title":"t","body":"{}"}}}}"#,
        "x".repeat(MAX_WEBHOOK_BODY_SIZE)
    );

    let request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(Body::from(oversized))
        .unwrap();
    let response = build_router(harness.state.clone())
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(harness.repository.calls().is_empty());
    assert!(harness.generator.prompts().is_empty());
}
