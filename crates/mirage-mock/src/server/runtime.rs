//! Handler for the mock runtime port.

use super::admin;
use super::response::{
    empty_reply, error_reply, reply, status_code, HttpResponse, ResponseHeaders,
};
use super::ServerState;
use crate::behavior::{BehaviorResult, Payload};
use crate::metrics;
use crate::request::GenericRequest;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use std::sync::Arc;
use tracing::debug;

pub const SNAPSHOT_HEADER: &str = "x-mirage-snapshot";

pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<HttpResponse, hyper::Error> {
    if state.is_admin_path(req.uri().path()) {
        return admin::route_request(req, state).await;
    }

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Ok(error_reply(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read request body: {e}"),
            ))
        }
    };

    let request = GenericRequest::from_http(&parts.method, &parts.uri, &parts.headers, body.clone());
    let processed = state.processor.process(&request);

    if !processed.delay.is_zero() {
        let route = processed.outcome.route_id.as_deref().unwrap_or("-");
        debug!("Delaying {} by {:?}", route, processed.delay);
        metrics::record_delay(route, processed.delay.as_secs_f64() * 1000.0);
        tokio::time::sleep(processed.delay).await;
    }

    let outcome = processed.outcome.result.kind();
    let mut response = match processed.outcome.result {
        BehaviorResult::Mock {
            status,
            headers,
            payload,
        } => mock_response(status, &headers, payload),
        BehaviorResult::Error { status } => empty_reply(status_code(status)),
        BehaviorResult::Proxy => {
            state
                .proxy
                .forward(&parts.method, &parts.uri, &parts.headers, body)
                .await
        }
    };

    response.set_header(SNAPSHOT_HEADER, processed.pin.version().as_str());
    metrics::record_request(parts.method.as_str(), response.status().as_u16(), outcome);
    Ok(response)
}

fn mock_response(
    status: u16,
    headers: &std::collections::BTreeMap<String, String>,
    payload: Payload,
) -> HttpResponse {
    let content_type = payload.default_content_type();
    let mut response = reply(status_code(status), payload.to_bytes());
    for (name, value) in headers {
        response.set_header(name, value);
    }
    if let Some(content_type) = content_type {
        if !response.headers().contains_key(hyper::header::CONTENT_TYPE) {
            response.set_header("content-type", content_type);
        }
    }
    response
}
