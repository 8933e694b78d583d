//! Conditional guards on query parameters and headers.
//!
//! Rules are compiled from the contract's loosely-typed `when` block into
//! [`WhenRule`] so evaluation never has to reject a malformed rule.

use crate::contract::raw::RawWhen;
use crate::contract::ContractError;
use crate::request::GenericRequest;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhenRule {
    /// `*`: the key must be present, any value
    Present,
    /// Case-insensitive equality against any actual value
    Equals(String),
    /// At least one listed literal equals an actual value
    AnyOf(Vec<String>),
    /// `{any: [...], all: [...]}`, both parts ANDed when present
    Composite {
        any: Option<Vec<String>>,
        all: Option<Vec<String>>,
    },
}

impl WhenRule {
    /// Compile a query rule. Headers use [`WhenRule::compile_header`].
    pub fn compile(key: &str, value: &Value) -> Result<Self, ContractError> {
        match value {
            Value::String(s) if s == "*" => Ok(WhenRule::Present),
            Value::Array(items) => Ok(WhenRule::AnyOf(literals(key, items)?)),
            Value::Object(map) => compile_composite(key, map),
            other => scalar(key, other).map(WhenRule::Equals),
        }
    }

    /// Headers only support presence and literal equality.
    pub fn compile_header(key: &str, value: &Value) -> Result<Self, ContractError> {
        match value {
            Value::String(s) if s == "*" => Ok(WhenRule::Present),
            Value::Array(_) | Value::Object(_) => Err(ContractError::InvalidWhenRule {
                key: key.to_string(),
                message: "header rules support only '*' or a literal value".to_string(),
            }),
            other => scalar(key, other).map(WhenRule::Equals),
        }
    }

    /// Evaluate against the actual values of one key; `None` means absent.
    pub fn matches(&self, actual: Option<&[String]>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self {
            WhenRule::Present => true,
            WhenRule::Equals(expected) => contains_ignore_case(actual, expected),
            WhenRule::AnyOf(expected) => expected.iter().any(|e| contains_ignore_case(actual, e)),
            WhenRule::Composite { any, all } => {
                let any_ok = any
                    .as_ref()
                    .map_or(true, |any| any.iter().any(|e| contains_ignore_case(actual, e)));
                let all_ok = all
                    .as_ref()
                    .map_or(true, |all| all.iter().all(|e| contains_ignore_case(actual, e)));
                any_ok && all_ok
            }
        }
    }
}

fn contains_ignore_case(actual: &[String], expected: &str) -> bool {
    actual.iter().any(|a| a.eq_ignore_ascii_case(expected))
}

fn scalar(key: &str, value: &Value) -> Result<String, ContractError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(ContractError::InvalidWhenRule {
            key: key.to_string(),
            message: "null is not a valid rule".to_string(),
        }),
        _ => Err(ContractError::InvalidWhenRule {
            key: key.to_string(),
            message: "expected a scalar value".to_string(),
        }),
    }
}

fn literals(key: &str, items: &[Value]) -> Result<Vec<String>, ContractError> {
    items.iter().map(|item| scalar(key, item)).collect()
}

fn compile_composite(key: &str, map: &Map<String, Value>) -> Result<WhenRule, ContractError> {
    let mut any = None;
    let mut all = None;
    for (name, value) in map {
        let list = match value {
            Value::Array(items) => literals(key, items)?,
            other => vec![scalar(key, other)?],
        };
        match name.as_str() {
            "any" => any = Some(list),
            "all" => all = Some(list),
            other => {
                return Err(ContractError::InvalidWhenRule {
                    key: key.to_string(),
                    message: format!("unknown operator '{other}' (expected any or all)"),
                })
            }
        }
    }
    if any.is_none() && all.is_none() {
        return Err(ContractError::InvalidWhenRule {
            key: key.to_string(),
            message: "object rule needs 'any' or 'all'".to_string(),
        });
    }
    Ok(WhenRule::Composite { any, all })
}

/// Compiled `when` block. Every rule must hold for the condition to hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhenCondition {
    query: Vec<(String, WhenRule)>,
    headers: Vec<(String, WhenRule)>,
}

impl WhenCondition {
    pub fn compile(raw: &RawWhen) -> Result<Self, ContractError> {
        let query = raw
            .query
            .iter()
            .map(|(k, v)| WhenRule::compile(k, v).map(|rule| (k.clone(), rule)))
            .collect::<Result<Vec<_>, _>>()?;
        let headers = raw
            .headers
            .iter()
            .map(|(k, v)| {
                WhenRule::compile_header(k, v).map(|rule| (k.to_ascii_lowercase(), rule))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { query, headers })
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.headers.is_empty()
    }

    pub fn matches(&self, request: &GenericRequest) -> bool {
        self.query
            .iter()
            .all(|(key, rule)| rule.matches(request.query_values(key)))
            && self
                .headers
                .iter()
                .all(|(key, rule)| rule.matches(request.header_values(key)))
    }
}
