use anyhow::Result;
use axum::http;
use reqwest::{Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use std::collections::HashMap;
use uuid::Uuid;

use autofix_core::build_http_client;

use super::{
    CorrelationId, Direction, RecordedEvent, RecordingLogger, Sanitizer, ServiceType,
    CORRELATION_ID_HEADER,
};

const MAX_RECORDED_BODY: usize = 10_000;

/// Records every outgoing request and its response status under the
/// delivery's correlation id.
pub struct RecordingMiddleware {
    logger: RecordingLogger,
    service_type: ServiceType,
}

impl RecordingMiddleware {
    pub fn new(logger: RecordingLogger, service_type: ServiceType) -> Self {
        Self {
            logger,
            service_type,
        }
    }
}

#[async_trait::async_trait]
impl Middleware for RecordingMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let correlation_id = match req.headers().get(CORRELATION_ID_HEADER) {
            Some(value) => value
                .to_str()
                .map(str::to_string)
                .unwrap_or_else(|_| Uuid::new_v4().to_string()),
            None => extensions
                .get::<CorrelationId>()
                .map(|id| id.0.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
        };

        if !req.headers().contains_key(CORRELATION_ID_HEADER) {
            if let Ok(value) = correlation_id.parse() {
                req.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
        }

        let request_data = RequestData::from_request(&req);
        self.record(
            &correlation_id,
            Direction::Request,
            format!("{} {}", request_data.method, extract_path(&request_data.url)),
            serde_json::to_value(&request_data).unwrap_or(serde_json::Value::Null),
        );

        let response = next.run(req, extensions).await;

        match &response {
            Ok(resp) => {
                let response_data = ResponseData::from_response(resp);
                self.record(
                    &correlation_id,
                    Direction::Response,
                    format!("response_{}", response_data.status_code),
                    serde_json::to_value(&response_data).unwrap_or(serde_json::Value::Null),
                );
            }
            Err(err) => self.record(
                &correlation_id,
                Direction::Response,
                "error".to_string(),
                serde_json::json!({
                    "error": err.to_string(),
                    "error_type": format!("{:?}", err)
                }),
            ),
        }

        response
    }
}

impl RecordingMiddleware {
    fn record(
        &self,
        correlation_id: &str,
        direction: Direction,
        operation: String,
        data: serde_json::Value,
    ) {
        self.logger.record(RecordedEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            correlation_id: correlation_id.to_string(),
            event_type: self.service_type.event_type(),
            direction,
            operation,
            data,
            metadata: HashMap::new(),
        });
    }
}

#[derive(Debug, serde::Serialize)]
struct RequestData {
    method: String,
    url: String,
    headers: HashMap<String, String>,
    body: serde_json::Value,
}

impl RequestData {
    fn from_request(request: &Request) -> Self {
        let body = match request.body().map(|body| body.as_bytes()) {
            None => serde_json::Value::String("[NO_BODY]".to_string()),
            Some(None) => serde_json::Value::String("[STREAM_BODY]".to_string()),
            Some(Some(bytes)) if bytes.len() > MAX_RECORDED_BODY => {
                serde_json::Value::String(format!("[LARGE_BODY_{}b]", bytes.len()))
            }
            Some(Some(bytes)) => match serde_json::from_slice::<serde_json::Value>(bytes) {
                Ok(json) => Sanitizer::sanitize_json(&json),
                Err(_) => match std::str::from_utf8(bytes) {
                    Ok(text) => serde_json::Value::String(text.to_string()),
                    Err(_) => serde_json::Value::String(format!("[BINARY_BODY_{}b]", bytes.len())),
                },
            },
        };

        Self {
            method: request.method().to_string(),
            url: request.url().to_string(),
            headers: Sanitizer::sanitize_headers(&header_map(request.headers())),
            body,
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct ResponseData {
    status_code: u16,
    headers: HashMap<String, String>,
    body_size: u64,
}

impl ResponseData {
    fn from_response(response: &Response) -> Self {
        Self {
            status_code: response.status().as_u16(),
            headers: Sanitizer::sanitize_headers(&header_map(response.headers())),
            body_size: response.content_length().unwrap_or(0),
        }
    }
}

fn header_map(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
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

fn extract_path(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// HTTP client for `service_type`, recording traffic when a logger is given.
pub fn instrumented_client(
    service_type: ServiceType,
    recording_logger: Option<RecordingLogger>,
) -> Result<ClientWithMiddleware> {
    let mut builder = ClientBuilder::new(build_http_client()?);

    if let Some(logger) = recording_logger {
        builder = builder.with(RecordingMiddleware::new(logger, service_type));
    }

    Ok(builder.build())
}
