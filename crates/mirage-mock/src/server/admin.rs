//! Route dispatch for the admin API.
//!
//! Served on the admin port and, under the admin prefix, on the runtime
//! port. Paths are matched after the prefix has been stripped.

use super::response::{
    empty_reply, error_reply, json_reply, read_body, reply, HttpResponse, ResponseHeaders,
};
use super::ServerState;
use crate::admin::AdminError;
use crate::kafka::{KafkaMessage, KafkaScenarioError};
use crate::metrics;
use crate::request::parse_query_string;
use base64::Engine;
use hyper::body::Incoming;
use hyper::{Method, Request, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const VERSION_HEADER: &str = "x-snapshot-version";

enum KafkaRoute {
    Start(String),
    Stop(String),
    Executions,
    Execution(String),
    Peek(String),
    Take(String),
    Clear(String),
    Lag,
}

impl KafkaRoute {
    /// Parse route from path segments after `/kafka`
    fn parse(segments: &[&str]) -> Option<Self> {
        match segments {
            ["start", id] => Some(KafkaRoute::Start(decode_segment(id))),
            ["stop", id] => Some(KafkaRoute::Stop(decode_segment(id))),
            ["executions"] => Some(KafkaRoute::Executions),
            ["executions", id] => Some(KafkaRoute::Execution(decode_segment(id))),
            ["poll", topic] => Some(KafkaRoute::Peek(decode_segment(topic))),
            ["poll", topic, "take"] => Some(KafkaRoute::Take(decode_segment(topic))),
            ["poll", topic, "clear"] => Some(KafkaRoute::Clear(decode_segment(topic))),
            ["lag"] => Some(KafkaRoute::Lag),
            _ => None,
        }
    }
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

pub async fn route_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<HttpResponse, hyper::Error> {
    let method = req.method().clone();
    let path = state.strip_admin_prefix(req.uri().path()).to_string();
    let query = req.uri().query().map(|s| s.to_string());

    debug!("Admin API: {} {}", method, path);

    let response = route_by_path(&method, &path, query.as_deref(), req, &state).await;
    Ok(response)
}

async fn route_by_path(
    method: &Method,
    path: &str,
    query: Option<&str>,
    req: Request<Incoming>,
    state: &ServerState,
) -> HttpResponse {
    match (method, path) {
        (&Method::GET, "/health") => return handle_health(state),
        (&Method::GET, "/metrics") => return handle_metrics(),
        (&Method::GET, "/contract") => return handle_get_contract(state).await,
        (&Method::PUT, "/contract") => return handle_put_contract(req, state).await,
        (&Method::POST, "/contract/validate") => return handle_validate(req, state).await,
        (&Method::POST, "/reload") => return handle_reload(state).await,
        _ => {}
    }

    if let Some(rest) = path.strip_prefix("/kafka/") {
        let segments: Vec<&str> = rest.split('/').collect();
        let Some(route) = KafkaRoute::parse(&segments) else {
            return error_reply(StatusCode::NOT_FOUND, "Not Found");
        };
        return match (method, route) {
            (&Method::POST, KafkaRoute::Start(id)) => handle_kafka_start(&id, state),
            (&Method::POST, KafkaRoute::Stop(id)) => handle_kafka_stop(&id, state),
            (&Method::GET, KafkaRoute::Executions) => {
                json_reply(StatusCode::OK, &state.kafka.executions())
            }
            (&Method::GET, KafkaRoute::Execution(id)) => handle_kafka_execution(&id, state),
            (&Method::GET, KafkaRoute::Peek(topic)) => handle_peek(&topic, query, state),
            (&Method::POST, KafkaRoute::Take(topic)) => handle_take(&topic, query, state),
            (&Method::POST, KafkaRoute::Clear(topic)) => handle_clear(&topic, state),
            (&Method::GET, KafkaRoute::Lag) => {
                json_reply(StatusCode::OK, &json!({ "lag": state.kafka.store().lag() }))
            }
            _ => error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
        };
    }

    error_reply(StatusCode::NOT_FOUND, "Not Found")
}

// =============================================================================
// System
// =============================================================================

fn handle_health(state: &ServerState) -> HttpResponse {
    json_reply(
        StatusCode::OK,
        &json!({
            "status": "ok",
            "version": state.contracts.active_version(),
        }),
    )
}

fn handle_metrics() -> HttpResponse {
    reply(StatusCode::OK, metrics::collect_metrics())
        .with_header("content-type", "text/plain; version=0.0.4")
}

// =============================================================================
// Contract
// =============================================================================

async fn handle_get_contract(state: &ServerState) -> HttpResponse {
    match state.contracts.current_contract().await {
        Ok(view) => {
            let version = view.version.to_string();
            reply(StatusCode::OK, view.raw)
                .with_header("content-type", "application/yaml")
                .with_header("etag", &format!("\"{version}\""))
                .with_header(VERSION_HEADER, &version)
        }
        Err(e) => admin_error(e),
    }
}

async fn handle_put_contract(req: Request<Incoming>, state: &ServerState) -> HttpResponse {
    let Some(expected) = if_match(&req) else {
        return error_reply(
            StatusCode::PRECONDITION_REQUIRED,
            "If-Match header with the current snapshot version is required",
        );
    };
    let text = match read_text(req).await {
        Ok(text) => text,
        Err(resp) => return resp,
    };

    match state.contracts.update_contract(&expected, &text).await {
        Ok(version) => {
            info!(version = %version, "Admin contract update applied");
            json_reply(StatusCode::OK, &json!({ "version": version }))
                .with_header("etag", &format!("\"{version}\""))
                .with_header(VERSION_HEADER, version.as_str())
        }
        Err(e) => admin_error(e),
    }
}

async fn handle_validate(req: Request<Incoming>, state: &ServerState) -> HttpResponse {
    let expected = if_match(&req);
    let text = match read_text(req).await {
        Ok(text) => text,
        Err(resp) => return resp,
    };
    match state.contracts.validate_contract(expected.as_deref(), &text) {
        Ok(report) => json_reply(StatusCode::OK, &report),
        Err(e) => admin_error(e),
    }
}

async fn handle_reload(state: &ServerState) -> HttpResponse {
    let result = state.reload.reload().await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    json_reply(status, &result)
}

fn if_match(req: &Request<Incoming>) -> Option<String> {
    req.headers()
        .get(hyper::header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().trim_start_matches("W/").trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

async fn read_text(req: Request<Incoming>) -> Result<String, HttpResponse> {
    let body = read_body(req).await.map_err(|e| {
        error_reply(StatusCode::BAD_REQUEST, &format!("Failed to read request body: {e}"))
    })?;
    String::from_utf8(body.to_vec())
        .map_err(|_| error_reply(StatusCode::BAD_REQUEST, "Contract body must be UTF-8"))
}

fn admin_error(error: AdminError) -> HttpResponse {
    match error {
        AdminError::VersionConflict { actual } => {
            warn!(actual = %actual, "Admin contract write rejected: version conflict");
            json_reply(
                StatusCode::CONFLICT,
                &json!({
                    "errors": [{ "code": "409", "message": "Version conflict" }],
                    "actualVersion": actual,
                }),
            )
            .with_header(VERSION_HEADER, actual.as_str())
        }
        AdminError::Invalid(e) => error_reply(StatusCode::BAD_REQUEST, &e.to_string()),
        AdminError::SourceUnavailable(e) => {
            error_reply(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
        }
    }
}

// =============================================================================
// Kafka executions
// =============================================================================

fn handle_kafka_start(scenario_id: &str, state: &ServerState) -> HttpResponse {
    match state.kafka.start_scenario(scenario_id) {
        Ok(view) => json_reply(StatusCode::OK, &view),
        Err(e @ (KafkaScenarioError::NotFound { .. } | KafkaScenarioError::NotConfigured)) => {
            warn!(scenario = scenario_id, "Kafka scenario start failed: {}", e);
            error_reply(StatusCode::NOT_FOUND, &e.to_string())
        }
        Err(e @ KafkaScenarioError::Conflict(_)) => {
            warn!(scenario = scenario_id, "Kafka scenario start conflict: {}", e);
            error_reply(StatusCode::CONFLICT, &e.to_string())
        }
    }
}

fn handle_kafka_stop(execution_id: &str, state: &ServerState) -> HttpResponse {
    let Ok(id) = Uuid::parse_str(execution_id) else {
        return error_reply(StatusCode::BAD_REQUEST, "Invalid execution id");
    };
    match state.kafka.stop_execution(&id) {
        Some(view) => json_reply(StatusCode::OK, &view),
        None => error_reply(StatusCode::NOT_FOUND, "Execution not found"),
    }
}

fn handle_kafka_execution(execution_id: &str, state: &ServerState) -> HttpResponse {
    let Ok(id) = Uuid::parse_str(execution_id) else {
        return error_reply(StatusCode::BAD_REQUEST, "Invalid execution id");
    };
    match state.kafka.execution(&id) {
        Some(view) => json_reply(StatusCode::OK, &view),
        None => error_reply(StatusCode::NOT_FOUND, "Execution not found"),
    }
}

// =============================================================================
// Kafka topic inspection
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeMode {
    None,
    Text,
    Json,
}

impl DecodeMode {
    fn from_query(query: Option<&str>) -> Self {
        let params = parse_query_string(query);
        let value = params
            .get("decode")
            .and_then(|v| v.first())
            .map(|v| v.to_ascii_lowercase());
        match value.as_deref() {
            Some("text") => DecodeMode::Text,
            Some("json") => DecodeMode::Json,
            _ => DecodeMode::None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            DecodeMode::None => "none",
            DecodeMode::Text => "text",
            DecodeMode::Json => "json",
        }
    }
}

#[derive(Debug, Serialize)]
struct KafkaMessageDto {
    topic: String,
    key: String,
    value: KafkaValueDto,
}

#[derive(Debug, Serialize)]
struct KafkaValueDto {
    raw: String,
    decoded: Option<Value>,
    decode: &'static str,
    source: String,
}

#[derive(Debug, Serialize)]
struct PeekResponse {
    topic: String,
    count: usize,
    messages: Vec<KafkaMessageDto>,
}

fn to_dto(message: &KafkaMessage, mode: DecodeMode) -> KafkaMessageDto {
    let bytes = &message.value.bytes;
    let decoded = match mode {
        DecodeMode::None => None,
        DecodeMode::Text => Some(Value::String(String::from_utf8_lossy(bytes).into_owned())),
        DecodeMode::Json => match serde_json::from_slice(bytes) {
            Ok(value) => Some(value),
            Err(_) => {
                debug!(
                    topic = %message.topic,
                    key = %message.key,
                    "Kafka message value is not JSON, leaving decoded empty"
                );
                None
            }
        },
    };
    KafkaMessageDto {
        topic: message.topic.clone(),
        key: message.key.clone(),
        value: KafkaValueDto {
            raw: base64::engine::general_purpose::STANDARD.encode(bytes),
            decoded,
            decode: mode.as_str(),
            source: message.value.source.as_str().to_ascii_lowercase(),
        },
    }
}

fn handle_peek(topic: &str, query: Option<&str>, state: &ServerState) -> HttpResponse {
    let mode = DecodeMode::from_query(query);
    let messages: Vec<KafkaMessageDto> = state
        .kafka
        .store()
        .peek(topic)
        .iter()
        .map(|m| to_dto(m, mode))
        .collect();
    json_reply(
        StatusCode::OK,
        &PeekResponse {
            topic: topic.to_string(),
            count: messages.len(),
            messages,
        },
    )
}

fn handle_take(topic: &str, query: Option<&str>, state: &ServerState) -> HttpResponse {
    let mode = DecodeMode::from_query(query);
    match state.kafka.store().take(topic) {
        Some(message) => json_reply(StatusCode::OK, &to_dto(&message, mode)),
        None => empty_reply(StatusCode::NO_CONTENT),
    }
}

fn handle_clear(topic: &str, state: &ServerState) -> HttpResponse {
    let cleared = state.kafka.store().clear(topic);
    info!(topic, cleared, "Kafka topic cleared");
    json_reply(StatusCode::OK, &json!({ "topic": topic, "cleared": cleared }))
}
