//! Structural model of a contract document.
//!
//! These types mirror the YAML/JSON schema one-to-one. Loosely-typed leaves
//! (`body`, `value`, header values and `when` rules) are kept as
//! [`serde_json::Value`] here and converted into tagged types by the
//! compiler, so nothing untyped reaches a compiled snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn default_version() -> u32 {
    1
}

/// Top-level contract document
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawContract {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RawMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<RawSettings>,
    #[serde(default)]
    pub endpoints: Vec<RawEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka: Option<RawKafkaSection>,
}

/// Informational metadata, never interpreted by the runtime
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    /// STRICT or PASSTHROUGH (case-insensitive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<RawProxy>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProxy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    pub request: RawRequest,
    pub response: RawResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<RawWhen>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResponse {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<RawDelay>,
}

/// Conditional guard on query parameters and headers
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawWhen {
    #[serde(default)]
    pub query: BTreeMap<String, Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
}

/// Delay grammar shared by responses and kafka messages.
///
/// Accepts integer milliseconds, a duration string (`250ms`, `1.5s`, `1m30s`)
/// or an object composing a fixed and a random part.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDelay {
    Millis(u64),
    Text(String),
    Spec(RawDelayObject),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawDelayObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<RawDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random: Option<RawRandomDelay>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawRandomDelay {
    pub min: RawDuration,
    pub max: RawDuration,
}

/// Scalar duration: integer milliseconds or a duration string
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDuration {
    Millis(u64),
    Text(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawKafkaSection {
    #[serde(default)]
    pub scenarios: Vec<RawKafkaScenario>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawKafkaScenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<u32>,
    #[serde(default)]
    pub messages: Vec<RawKafkaMessage>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawKafkaMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<RawDelay>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_delay_variants() {
        let delay: RawDelay = serde_yaml::from_str("150").unwrap();
        assert!(matches!(delay, RawDelay::Millis(150)));

        let delay: RawDelay = serde_yaml::from_str("1.5s").unwrap();
        assert!(matches!(delay, RawDelay::Text(ref s) if s == "1.5s"));

        let yaml = "fixed: 200ms\nrandom:\n  min: 50\n  max: 300ms";
        let delay: RawDelay = serde_yaml::from_str(yaml).unwrap();
        match delay {
            RawDelay::Spec(spec) => {
                assert!(matches!(spec.fixed, Some(RawDuration::Text(ref s)) if s == "200ms"));
                let random = spec.random.unwrap();
                assert!(matches!(random.min, RawDuration::Millis(50)));
                assert!(matches!(random.max, RawDuration::Text(ref s) if s == "300ms"));
            }
            other => panic!("expected delay object, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_delay_rejects_unknown_keys() {
        let result: Result<RawDelay, _> = serde_yaml::from_str("jitter: 10");
        assert!(result.is_err());
    }

    #[test]
    fn test_raw_contract_defaults() {
        let yaml = r#"
endpoints:
  - request: { method: GET, path: /ping }
    response: { type: mock, body: pong }
"#;
        let raw: RawContract = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(raw.version, 1);
        assert!(raw.settings.is_none());
        assert!(raw.kafka.is_none());
        assert_eq!(raw.endpoints.len(), 1);
        assert_eq!(raw.endpoints[0].response.kind.as_deref(), Some("mock"));
        assert!(raw.endpoints[0].response.status.is_none());
    }

    #[test]
    fn test_raw_kafka_message_camel_case() {
        let yaml = r#"
topic: user.created
key: u-1
valueFile: payloads/user.json
repeat: 3
"#;
        let msg: RawKafkaMessage = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(msg.value_file.as_deref(), Some("payloads/user.json"));
        assert_eq!(msg.repeat, Some(3));
    }
}
