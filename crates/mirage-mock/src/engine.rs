//! Request resolution against a pinned snapshot.

use crate::behavior::{Behavior, BehaviorResult};
use crate::request::GenericRequest;
use crate::snapshot::{Snapshot, SnapshotPin, SnapshotRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutcome {
    pub result: BehaviorResult,
    /// `None` when the fallback was applied
    pub route_id: Option<String>,
}

pub struct BehaviorEngine;

impl BehaviorEngine {
    /// Route the request and apply the matched behavior, or `fallback` when
    /// no route matches.
    pub fn handle(snapshot: &Snapshot, request: &GenericRequest, fallback: &Behavior) -> EngineOutcome {
        match snapshot.router().find(request) {
            Some(m) => {
                debug!(
                    method = %request.method,
                    path = %request.operation,
                    route = m.route.id.as_deref().unwrap_or("-"),
                    "Route matched"
                );
                EngineOutcome {
                    result: m.route.behavior.apply(&m.params),
                    route_id: m.route.id.clone(),
                }
            }
            None => {
                debug!(method = %request.method, path = %request.operation, "No route matched, applying fallback");
                EngineOutcome {
                    result: fallback.apply(&HashMap::new()),
                    route_id: None,
                }
            }
        }
    }
}

/// Result of processing one request. Holding it keeps the snapshot pinned;
/// drop it once the response has been written.
#[derive(Debug)]
pub struct ProcessedRequest {
    pub pin: SnapshotPin,
    pub outcome: EngineOutcome,
    /// Delay to await before writing the response
    pub delay: Duration,
}

pub struct RequestProcessor {
    registry: Arc<SnapshotRegistry>,
}

impl RequestProcessor {
    pub fn new(registry: Arc<SnapshotRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SnapshotRegistry> {
        &self.registry
    }

    pub fn process(&self, request: &GenericRequest) -> ProcessedRequest {
        let pin = self.registry.pin();
        let outcome = BehaviorEngine::handle(pin.snapshot(), request, pin.fallback());
        let delay = outcome
            .route_id
            .as_deref()
            .map(|id| pin.snapshot().delay_for_route(id).resolve())
            .unwrap_or_default();
        ProcessedRequest {
            pin,
            outcome,
            delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Payload;
    use crate::contract::payload::BodyResolver;
    use crate::contract::{ContractCompiler, ContractParser};
    use hyper::Method;

    fn registry(yaml: &str) -> Arc<SnapshotRegistry> {
        let raw = ContractParser::parse(yaml).unwrap();
        let compiled = ContractCompiler::new(BodyResolver::new("/ws")).compile(&raw).unwrap();
        Arc::new(SnapshotRegistry::new(compiled.snapshot, compiled.fallback))
    }

    fn compile(yaml: &str) -> crate::contract::CompiledContract {
        let raw = ContractParser::parse(yaml).unwrap();
        ContractCompiler::new(BodyResolver::new("/ws")).compile(&raw).unwrap()
    }

    const USERS: &str = r#"
settings: { mode: STRICT, defaultStatus: 404 }
endpoints:
  - id: user
    request: { method: GET, path: "/users/{id}" }
    response: { type: mock, status: 200, body: "user-{id}", delay: 20ms }
"#;

    #[test]
    fn test_end_to_end_match_and_fallback() {
        let processor = RequestProcessor::new(registry(USERS));

        let hit = processor.process(&GenericRequest::new(Method::GET, "/users/42"));
        assert_eq!(hit.outcome.route_id.as_deref(), Some("user"));
        assert_eq!(
            hit.outcome.result,
            BehaviorResult::Mock {
                status: 200,
                headers: Default::default(),
                payload: Payload::Text("user-42".to_string()),
            }
        );
        assert_eq!(hit.delay, Duration::from_millis(20));

        let miss = processor.process(&GenericRequest::new(Method::GET, "/nope"));
        assert_eq!(miss.outcome.route_id, None);
        assert_eq!(miss.outcome.result, BehaviorResult::Error { status: 404 });
        assert_eq!(miss.delay, Duration::ZERO);
    }

    #[test]
    fn test_matched_error_behavior_is_not_fallback() {
        let processor = RequestProcessor::new(registry(
            r#"
settings: { mode: PASSTHROUGH }
endpoints:
  - id: broken
    request: { method: GET, path: /broken }
    response: { type: error, status: 503 }
"#,
        ));
        let out = processor.process(&GenericRequest::new(Method::GET, "/broken"));
        assert_eq!(out.outcome.result, BehaviorResult::Error { status: 503 });
        assert_eq!(out.outcome.route_id.as_deref(), Some("broken"));

        let other = processor.process(&GenericRequest::new(Method::GET, "/elsewhere"));
        assert_eq!(other.outcome.result, BehaviorResult::Proxy);
    }

    #[test]
    fn test_request_keeps_snapshot_across_reload() {
        let reg = registry(USERS);
        let processor = RequestProcessor::new(Arc::clone(&reg));

        let in_flight = processor.process(&GenericRequest::new(Method::GET, "/users/1"));
        let old_version = in_flight.pin.version().clone();

        let next = compile(
            r#"
endpoints:
  - request: { method: GET, path: "/users/{id}" }
    response: { type: error, status: 410 }
"#,
        );
        reg.activate_new(next.snapshot, next.fallback);

        // old request still sees its own snapshot
        assert_eq!(in_flight.pin.version(), &old_version);
        assert_eq!(reg.cleanup_retired(), 0);

        let fresh = processor.process(&GenericRequest::new(Method::GET, "/users/1"));
        assert_ne!(fresh.pin.version(), &old_version);
        assert_eq!(fresh.outcome.result, BehaviorResult::Error { status: 410 });

        drop(in_flight);
        assert_eq!(reg.cleanup_retired(), 1);
    }
}
