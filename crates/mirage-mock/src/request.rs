//! Protocol-agnostic request model used by the routing engine.

use bytes::Bytes;
use hyper::{HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" | "https" => Some(Protocol::Http),
            _ => None,
        }
    }
}

/// Methods a contract may route on.
pub fn parse_method(value: &str) -> Option<Method> {
    match value.trim().to_ascii_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "DELETE" => Some(Method::DELETE),
        "PATCH" => Some(Method::PATCH),
        "HEAD" => Some(Method::HEAD),
        "OPTIONS" => Some(Method::OPTIONS),
        "TRACE" => Some(Method::TRACE),
        _ => None,
    }
}

/// An inbound request reduced to what routing needs.
///
/// Query parameters keep every value of a repeated key in arrival order.
/// Header names are stored lower-cased.
#[derive(Debug, Clone)]
pub struct GenericRequest {
    pub protocol: Protocol,
    pub method: Method,
    pub operation: String,
    pub query: HashMap<String, Vec<String>>,
    pub headers: HashMap<String, Vec<String>>,
    pub body: Bytes,
}

impl GenericRequest {
    pub fn new(method: Method, operation: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::Http,
            method,
            operation: operation.into(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(key.into()).or_default().push(value.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn from_http(method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes) -> Self {
        let mut header_map: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            if let Ok(v) = value.to_str() {
                header_map
                    .entry(name.as_str().to_ascii_lowercase())
                    .or_default()
                    .push(v.to_string());
            }
        }
        Self {
            protocol: Protocol::Http,
            method: method.clone(),
            operation: uri.path().to_string(),
            query: parse_query_string(uri.query()),
            headers: header_map,
            body,
        }
    }

    pub fn query_values(&self, key: &str) -> Option<&[String]> {
        self.query.get(key).map(Vec::as_slice)
    }

    pub fn header_values(&self, name: &str) -> Option<&[String]> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }
}

/// Split and percent-decode a raw query string. `+` decodes to a space.
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    let Some(query) = query else {
        return params;
    };
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key);
        if key.is_empty() {
            continue;
        }
        params.entry(key).or_default().push(decode(value));
    }
    params
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|c| c.into_owned())
        .unwrap_or(spaced)
}
