//! Literal `{name}` placeholder substitution.
//!
//! Placeholders are replaced from the merged path/query parameters of a
//! route match. Unknown placeholders are left verbatim. There are no
//! expressions, filters or escapes.

use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER_REGEX.get_or_init(|| Regex::new(r"\{([^{}/]+)\}").unwrap())
}

/// Substitute placeholders in a single string.
pub fn render_str(template: &str, params: &HashMap<String, String>) -> String {
    if params.is_empty() || !template.contains('{') {
        return template.to_string();
    }
    placeholder_regex()
        .replace_all(template, |caps: &Captures| match params.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Substitute placeholders in every string leaf of a JSON tree. Map keys
/// and non-string scalars are left unchanged.
pub fn render_value(value: &Value, params: &HashMap<String, String>) -> Value {
    match value {
        Value::String(s) => Value::String(render_str(s, params)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, params)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, params)))
                .collect(),
        ),
        other => other.clone(),
    }
}
