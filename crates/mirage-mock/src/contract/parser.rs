//! Text to [`RawContract`] with structural validation.

use super::error::ContractError;
use super::raw::{RawContract, RawEndpoint, RawKafkaScenario};

pub struct ContractParser;

impl ContractParser {
    /// Parse YAML (or JSON, which is a YAML subset) and validate the
    /// structure. Semantic checks that need compiled types (methods, path
    /// templates, delays, when-rules) are left to the compiler.
    pub fn parse(text: &str) -> Result<RawContract, ContractError> {
        if text.trim().is_empty() {
            return Err(ContractError::Parse("contract is empty".to_string()));
        }
        let raw: RawContract = serde_yaml::from_str(text)?;
        Self::validate(&raw)?;
        Ok(raw)
    }

    pub fn validate(raw: &RawContract) -> Result<(), ContractError> {
        if raw.version < 1 {
            return Err(ContractError::invalid("version", "must be >= 1"));
        }

        let scenarios = raw.kafka.as_ref().map(|k| k.scenarios.as_slice()).unwrap_or(&[]);
        if raw.endpoints.is_empty() && scenarios.is_empty() {
            return Err(ContractError::invalid(
                "endpoints",
                "contract must declare at least one endpoint or kafka scenario",
            ));
        }

        if let Some(status) = raw.settings.as_ref().and_then(|s| s.default_status) {
            if !(100..=599).contains(&status) {
                return Err(ContractError::invalid(
                    "settings.defaultStatus",
                    format!("{status} is not in [100, 599]"),
                ));
            }
        }

        for (i, endpoint) in raw.endpoints.iter().enumerate() {
            validate_endpoint(endpoint, &format!("endpoints[{i}]"))?;
        }
        for (i, scenario) in scenarios.iter().enumerate() {
            validate_scenario(scenario, &format!("kafka.scenarios[{i}]"))?;
        }
        Ok(())
    }
}

fn validate_endpoint(endpoint: &RawEndpoint, at: &str) -> Result<(), ContractError> {
    if let Some(id) = &endpoint.id {
        require_non_blank(id, &format!("{at}.id"))?;
    }
    match endpoint.request.method.as_deref() {
        Some(m) if !m.trim().is_empty() => {}
        _ => return Err(ContractError::invalid(format!("{at}.request.method"), "is required")),
    }
    match endpoint.request.path.as_deref() {
        Some(p) if p.starts_with('/') => {}
        Some(p) => {
            return Err(ContractError::invalid(
                format!("{at}.request.path"),
                format!("'{p}' must start with '/'"),
            ))
        }
        None => return Err(ContractError::invalid(format!("{at}.request.path"), "is required")),
    }
    match endpoint.response.kind.as_deref() {
        Some(k) if !k.trim().is_empty() => {}
        _ => return Err(ContractError::invalid(format!("{at}.response.type"), "is required")),
    }
    if let Some(status) = endpoint.response.status {
        if !(100..=599).contains(&status) {
            return Err(ContractError::invalid(
                format!("{at}.response.status"),
                format!("{status} is not in [100, 599]"),
            ));
        }
    }
    if let Some(file) = &endpoint.response.body_file {
        require_non_blank(file, &format!("{at}.response.bodyFile"))?;
    }
    Ok(())
}

fn validate_scenario(scenario: &RawKafkaScenario, at: &str) -> Result<(), ContractError> {
    match scenario.id.as_deref() {
        Some(id) => require_non_blank(id, &format!("{at}.id"))?,
        None => return Err(ContractError::invalid(format!("{at}.id"), "is required")),
    }
    if scenario.repeat == Some(0) {
        return Err(ContractError::invalid(format!("{at}.repeat"), "must be >= 1"));
    }
    if scenario.messages.is_empty() {
        return Err(ContractError::invalid(
            format!("{at}.messages"),
            "scenario must declare at least one message",
        ));
    }
    for (i, message) in scenario.messages.iter().enumerate() {
        let at = format!("{at}.messages[{i}]");
        match message.topic.as_deref() {
            Some(topic) => require_non_blank(topic, &format!("{at}.topic"))?,
            None => return Err(ContractError::invalid(format!("{at}.topic"), "is required")),
        }
        match message.key.as_deref() {
            Some(key) => require_non_blank(key, &format!("{at}.key"))?,
            None => return Err(ContractError::invalid(format!("{at}.key"), "is required")),
        }
        if message.repeat == Some(0) {
            return Err(ContractError::invalid(format!("{at}.repeat"), "must be >= 1"));
        }
        if let Some(file) = &message.value_file {
            require_non_blank(file, &format!("{at}.valueFile"))?;
        }
    }
    Ok(())
}

fn require_non_blank(value: &str, field: &str) -> Result<(), ContractError> {
    if value.trim().is_empty() {
        Err(ContractError::invalid(field, "must not be blank"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::Invalid { field, .. } => field,
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_minimal_endpoint() {
        let raw = ContractParser::parse(
            r#"
endpoints:
  - request: { method: GET, path: "/users/{id}" }
    response: { type: mock, status: 200, body: "user-{id}" }
settings: { mode: STRICT, defaultStatus: 404 }
"#,
        )
        .unwrap();
        assert_eq!(raw.endpoints.len(), 1);
        assert_eq!(raw.settings.unwrap().default_status, Some(404));
    }

    #[test]
    fn test_parse_json_input() {
        let raw = ContractParser::parse(
            r#"{"endpoints":[{"request":{"method":"GET","path":"/a"},"response":{"type":"error","status":503}}]}"#,
        )
        .unwrap();
        assert_eq!(raw.endpoints[0].response.status, Some(503));
    }

    #[test]
    fn test_empty_contract_rejected() {
        assert!(matches!(ContractParser::parse("  "), Err(ContractError::Parse(_))));
        let err = ContractParser::parse("version: 1").unwrap_err();
        assert_eq!(field_of(err), "endpoints");
    }

    #[test]
    fn test_malformed_yaml() {
        let err = ContractParser::parse("endpoints: [ {").unwrap_err();
        assert!(matches!(err, ContractError::Parse(_)));
    }

    #[test]
    fn test_missing_path_reported_with_location() {
        let err = ContractParser::parse(
            r#"
endpoints:
  - request: { method: GET, path: /ok }
    response: { type: mock }
  - request: { method: GET }
    response: { type: mock }
"#,
        )
        .unwrap_err();
        assert_eq!(field_of(err), "endpoints[1].request.path");
    }

    #[test]
    fn test_default_status_range() {
        let err = ContractParser::parse(
            r#"
settings: { defaultStatus: 700 }
endpoints:
  - request: { method: GET, path: /a }
    response: { type: mock }
"#,
        )
        .unwrap_err();
        assert_eq!(field_of(err), "settings.defaultStatus");
    }

    #[test]
    fn test_kafka_scenario_validation() {
        let err = ContractParser::parse(
            r#"
kafka:
  scenarios:
    - id: s1
      messages:
        - { topic: t, key: k, repeat: 0 }
"#,
        )
        .unwrap_err();
        assert_eq!(field_of(err), "kafka.scenarios[0].messages[0].repeat");

        let err = ContractParser::parse(
            r#"
kafka:
  scenarios:
    - messages:
        - { topic: t, key: k }
"#,
        )
        .unwrap_err();
        assert_eq!(field_of(err), "kafka.scenarios[0].id");

        let err = ContractParser::parse(
            r#"
kafka:
  scenarios:
    - id: s1
      messages:
        - { topic: " ", key: k }
"#,
        )
        .unwrap_err();
        assert_eq!(field_of(err), "kafka.scenarios[0].messages[0].topic");
    }
}
