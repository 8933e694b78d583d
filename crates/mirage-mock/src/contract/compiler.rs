//! Turns a parsed contract into an immutable [`Snapshot`].

use super::delay::DelaySpec;
use super::error::ContractError;
use super::payload::BodyResolver;
use super::raw::{RawContract, RawEndpoint, RawSettings};
use crate::behavior::{Behavior, MockBody, MockResponse};
use crate::kafka::KafkaCompiler;
use crate::request::{parse_method, Protocol};
use crate::routing::{PathMatcher, Route, RouteMatcher, Router, WhenCondition};
use crate::snapshot::{Mode, Settings, Snapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Priority of an endpoint without an explicit one and a static path.
pub const STATIC_PATH_PRIORITY: i32 = 10;
/// Priority of an endpoint without an explicit one and a templated path.
pub const TEMPLATED_PATH_PRIORITY: i32 = 0;

/// A compiled snapshot together with its fallback behavior.
#[derive(Debug, Clone)]
pub struct CompiledContract {
    pub snapshot: Arc<Snapshot>,
    pub fallback: Behavior,
}

#[derive(Debug, Clone)]
pub struct ContractCompiler {
    resolver: BodyResolver,
}

impl ContractCompiler {
    pub fn new(resolver: BodyResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &BodyResolver {
        &self.resolver
    }

    /// Every call yields a snapshot with a fresh version, even for the same
    /// input.
    pub fn compile(&self, raw: &RawContract) -> Result<CompiledContract, ContractError> {
        let settings = compile_settings(raw.settings.as_ref())?;

        let mut routes = Vec::with_capacity(raw.endpoints.len());
        let mut route_delays = HashMap::new();
        for (i, endpoint) in raw.endpoints.iter().enumerate() {
            let at = format!("endpoints[{i}]");
            let route_id = endpoint
                .id
                .clone()
                .unwrap_or_else(|| format!("endpoint_{}", i));
            if route_delays.contains_key(&route_id) {
                return Err(ContractError::invalid(
                    format!("{at}.id"),
                    format!("duplicate endpoint id '{route_id}'"),
                ));
            }
            let (route, delay) = self.compile_endpoint(endpoint, route_id.clone(), &at)?;
            routes.push(route);
            route_delays.insert(route_id, delay);
        }

        let kafka_scenarios = KafkaCompiler::new(&self.resolver).compile(raw.kafka.as_ref())?;

        let fallback = match settings.mode {
            Mode::Strict => Behavior::Error {
                status: settings.default_status,
            },
            Mode::Passthrough => Behavior::Proxy,
        };

        let snapshot = Snapshot::new(Router::new(routes), settings, route_delays, kafka_scenarios);
        debug!(
            version = %snapshot.version(),
            routes = snapshot.router().len(),
            scenarios = snapshot.kafka_scenario_ids().len(),
            "Compiled contract"
        );
        Ok(CompiledContract {
            snapshot: Arc::new(snapshot),
            fallback,
        })
    }

    fn compile_endpoint(
        &self,
        endpoint: &RawEndpoint,
        route_id: String,
        at: &str,
    ) -> Result<(Route, DelaySpec), ContractError> {
        let protocol = match endpoint.request.protocol.as_deref() {
            None => Protocol::Http,
            Some(p) => Protocol::parse(p).ok_or_else(|| {
                ContractError::invalid(format!("{at}.request.protocol"), format!("unsupported protocol '{p}'"))
            })?,
        };
        let method_text = endpoint
            .request
            .method
            .as_deref()
            .ok_or_else(|| ContractError::invalid(format!("{at}.request.method"), "is required"))?;
        let method = parse_method(method_text)
            .ok_or_else(|| ContractError::InvalidMethod(method_text.to_string()))?;
        let path_text = endpoint
            .request
            .path
            .as_deref()
            .ok_or_else(|| ContractError::invalid(format!("{at}.request.path"), "is required"))?;
        let path = PathMatcher::compile(path_text)?;

        let priority = endpoint.priority.unwrap_or(if path_text.contains('{') {
            TEMPLATED_PATH_PRIORITY
        } else {
            STATIC_PATH_PRIORITY
        });

        let behavior = self.compile_behavior(endpoint, at)?;
        let delay = DelaySpec::from_raw(endpoint.response.delay.as_ref(), &format!("{at}.response.delay"))?;

        let mut route = Route::new(RouteMatcher::new(protocol, method, path), behavior, priority)
            .with_id(route_id);
        if let Some(when) = &endpoint.when {
            route = route.with_when(WhenCondition::compile(when)?);
        }
        Ok((route, delay))
    }

    fn compile_behavior(&self, endpoint: &RawEndpoint, at: &str) -> Result<Behavior, ContractError> {
        let response = &endpoint.response;
        let kind = response
            .kind
            .as_deref()
            .ok_or_else(|| ContractError::invalid(format!("{at}.response.type"), "is required"))?;
        let status = response.status.unwrap_or(200);
        match kind.trim().to_ascii_lowercase().as_str() {
            "mock" => {
                let body = if let Some(file) = response.body_file.as_deref() {
                    MockBody::Raw(self.resolver.resolve(None, Some(file))?)
                } else {
                    match &response.body {
                        None | Some(serde_json::Value::Null) => MockBody::Empty,
                        Some(value) => MockBody::Template(value.clone()),
                    }
                };
                Ok(Behavior::Mock(MockResponse {
                    status,
                    headers: response.headers.clone(),
                    body,
                }))
            }
            "proxy" => Ok(Behavior::Proxy),
            "error" => Ok(Behavior::Error { status }),
            _ => Err(ContractError::UnknownResponseType(kind.to_string())),
        }
    }
}

fn compile_settings(raw: Option<&RawSettings>) -> Result<Settings, ContractError> {
    let mut settings = Settings::default();
    let Some(raw) = raw else {
        return Ok(settings);
    };
    if let Some(mode) = raw.mode.as_deref() {
        settings.mode = Mode::parse(mode).ok_or_else(|| {
            ContractError::invalid(
                "settings.mode",
                format!("'{mode}' is not one of STRICT, PASSTHROUGH"),
            )
        })?;
    }
    if let Some(status) = raw.default_status {
        if !(100..=599).contains(&status) {
            return Err(ContractError::invalid(
                "settings.defaultStatus",
                format!("{status} is not in [100, 599]"),
            ));
        }
        settings.default_status = status;
    }
    if let Some(base_url) = raw.proxy.as_ref().and_then(|p| p.base_url.as_deref()) {
        let url = reqwest::Url::parse(base_url).map_err(|e| {
            ContractError::invalid("settings.proxy.baseUrl", format!("'{base_url}': {e}"))
        })?;
        settings.proxy_base_url = Some(url);
    }
    Ok(settings)
}
