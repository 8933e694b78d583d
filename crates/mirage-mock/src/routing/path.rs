//! Path templates with `{name}` placeholders.
//!
//! Each placeholder captures exactly one path segment (`[^/]+`). There are
//! no cross-segment wildcards; literal text is matched verbatim.

use crate::contract::ContractError;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([^/{}]+)\}").expect("valid placeholder regex"))
}

#[derive(Debug, Clone)]
pub struct PathMatcher {
    template: String,
    regex: Regex,
    names: Vec<String>,
}

impl PathMatcher {
    pub fn compile(template: &str) -> Result<Self, ContractError> {
        let invalid = |message: &str| ContractError::InvalidPath {
            template: template.to_string(),
            message: message.to_string(),
        };
        if !template.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut pattern = String::from("^");
        let mut names: Vec<String> = Vec::new();
        let mut last = 0;
        for caps in placeholder_regex().captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            let literal = &template[last..whole.start()];
            if literal.contains('{') || literal.contains('}') {
                return Err(invalid("unbalanced braces"));
            }
            pattern.push_str(&regex::escape(literal));

            let name = caps[1].trim().to_string();
            if name.is_empty() {
                return Err(invalid("empty placeholder name"));
            }
            if names.contains(&name) {
                return Err(invalid(&format!("duplicate placeholder '{name}'")));
            }
            names.push(name);
            pattern.push_str("([^/]+)");
            last = whole.end();
        }
        let tail = &template[last..];
        if tail.contains('{') || tail.contains('}') {
            return Err(invalid("unbalanced braces"));
        }
        pattern.push_str(&regex::escape(tail));
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            template: template.to_string(),
            regex,
            names,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn is_templated(&self) -> bool {
        !self.names.is_empty()
    }

    /// Extracted parameters (percent-decoded) when `path` matches.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let mut params = HashMap::with_capacity(self.names.len());
        for (i, name) in self.names.iter().enumerate() {
            let raw = caps.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
            let value = urlencoding::decode(raw)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            params.insert(name.clone(), value);
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_path() {
        let m = PathMatcher::compile("/health").unwrap();
        assert!(!m.is_templated());
        assert!(m.matches("/health").unwrap().is_empty());
        assert!(m.matches("/health/").is_none());
        assert!(m.matches("/healthz").is_none());
    }

    #[test]
    fn test_single_param() {
        let m = PathMatcher::compile("/users/{id}").unwrap();
        let params = m.matches("/users/42").unwrap();
        assert_eq!(params["id"], "42");
        assert!(m.matches("/users/42/orders").is_none());
        assert!(m.matches("/users/").is_none());
    }

    #[test]
    fn test_multiple_params_and_literal_suffix() {
        let m = PathMatcher::compile("/users/{userId}/orders/{orderId}.json").unwrap();
        let params = m.matches("/users/7/orders/99.json").unwrap();
        assert_eq!(params["userId"], "7");
        assert_eq!(params["orderId"], "99");
        assert!(m.matches("/users/7/orders/99xjson").is_none());
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let m = PathMatcher::compile("/v1.0/items+").unwrap();
        assert!(m.matches("/v1.0/items+").is_some());
        assert!(m.matches("/v1x0/items").is_none());
    }

    #[test]
    fn test_param_values_are_decoded() {
        let m = PathMatcher::compile("/files/{name}").unwrap();
        assert_eq!(m.matches("/files/a%20b").unwrap()["name"], "a b");
    }

    #[test]
    fn test_invalid_templates() {
        assert!(PathMatcher::compile("users").is_err());
        assert!(PathMatcher::compile("/users/{id").is_err());
        assert!(PathMatcher::compile("/a/{id}/b/{id}").is_err());
        assert!(PathMatcher::compile("/a/{ }").is_err());
    }
}
