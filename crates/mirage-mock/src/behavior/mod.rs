//! Actions applied to a matched request.

pub mod template;

use crate::contract::payload::ResolvedBody;
use bytes::Bytes;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Body of a mock response as compiled from the contract.
#[derive(Debug, Clone, PartialEq)]
pub enum MockBody {
    Empty,
    /// Inline body, templated on every request
    Template(Value),
    /// `bodyFile` content, served as-is
    Raw(ResolvedBody),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub headers: BTreeMap<String, Value>,
    pub body: MockBody,
}

/// Compiled behavior of a route (or of the snapshot fallback).
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    Mock(MockResponse),
    /// Forward to the proxy base URL of the active snapshot
    Proxy,
    Error { status: u16 },
}

/// Response payload produced by a mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Text(String),
    Json(Value),
    Raw(Bytes),
}

impl Payload {
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Payload::Empty => Bytes::new(),
            Payload::Text(s) => Bytes::from(s.clone()),
            Payload::Json(v) => Bytes::from(serde_json::to_vec(v).unwrap_or_default()),
            Payload::Raw(b) => b.clone(),
        }
    }

    /// Content type used when the mock does not set one.
    pub fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Payload::Empty => None,
            Payload::Text(_) => Some("text/plain; charset=utf-8"),
            Payload::Json(_) => Some("application/json"),
            Payload::Raw(_) => Some("application/octet-stream"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorResult {
    Mock {
        status: u16,
        headers: BTreeMap<String, String>,
        payload: Payload,
    },
    Proxy,
    Error {
        status: u16,
    },
}

impl BehaviorResult {
    pub fn kind(&self) -> &'static str {
        match self {
            BehaviorResult::Mock { .. } => "mock",
            BehaviorResult::Proxy => "proxy",
            BehaviorResult::Error { .. } => "error",
        }
    }
}

impl Behavior {
    /// Apply with the merged path/query parameters of the match (empty for
    /// the fallback).
    pub fn apply(&self, params: &HashMap<String, String>) -> BehaviorResult {
        match self {
            Behavior::Mock(mock) => mock.render(params),
            Behavior::Proxy => BehaviorResult::Proxy,
            Behavior::Error { status } => BehaviorResult::Error { status: *status },
        }
    }
}

impl MockResponse {
    fn render(&self, params: &HashMap<String, String>) -> BehaviorResult {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| {
                let rendered = match template::render_value(value, params) {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (name.clone(), rendered)
            })
            .collect();

        let payload = match &self.body {
            MockBody::Empty => Payload::Empty,
            MockBody::Raw(body) => Payload::Raw(body.bytes.clone()),
            MockBody::Template(value) => match template::render_value(value, params) {
                Value::String(s) => Payload::Text(s),
                Value::Null => Payload::Empty,
                other => Payload::Json(other),
            },
        };

        BehaviorResult::Mock {
            status: self.status,
            headers,
            payload,
        }
    }
}
