//! Immutable compiled contracts and their hot-reload lifecycle.

mod handle;
mod registry;

pub use handle::{SnapshotHandle, SnapshotPin, SnapshotState};
pub use registry::SnapshotRegistry;

use crate::contract::delay::DelaySpec;
use crate::kafka::KafkaScenario;
use crate::routing::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque version token, unique per compile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotVersion(String);

impl SnapshotVersion {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SnapshotVersion {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    /// Unmatched requests get `defaultStatus`
    #[default]
    Strict,
    /// Unmatched requests are forwarded to the proxy
    Passthrough,
}

impl Mode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "STRICT" => Some(Mode::Strict),
            "PASSTHROUGH" => Some(Mode::Passthrough),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub mode: Mode,
    pub default_status: u16,
    pub proxy_base_url: Option<reqwest::Url>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::Strict,
            default_status: 404,
            proxy_base_url: None,
        }
    }
}

/// One compiled contract. Never mutated after construction.
#[derive(Debug)]
pub struct Snapshot {
    version: SnapshotVersion,
    created_at: DateTime<Utc>,
    router: Router,
    settings: Settings,
    route_delays: HashMap<String, DelaySpec>,
    kafka_scenarios: HashMap<String, Arc<KafkaScenario>>,
}

impl Snapshot {
    pub fn new(
        router: Router,
        settings: Settings,
        route_delays: HashMap<String, DelaySpec>,
        kafka_scenarios: HashMap<String, Arc<KafkaScenario>>,
    ) -> Self {
        Self {
            version: SnapshotVersion::generate(),
            created_at: Utc::now(),
            router,
            settings,
            route_delays,
            kafka_scenarios,
        }
    }

    pub fn version(&self) -> &SnapshotVersion {
        &self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn delay_for_route(&self, route_id: &str) -> DelaySpec {
        self.route_delays
            .get(route_id)
            .copied()
            .unwrap_or(DelaySpec::NONE)
    }

    pub fn kafka_scenario(&self, id: &str) -> Option<Arc<KafkaScenario>> {
        self.kafka_scenarios.get(id).cloned()
    }

    /// Scenario ids, sorted.
    pub fn kafka_scenario_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.kafka_scenarios.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn has_kafka(&self) -> bool {
        !self.kafka_scenarios.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_are_unique() {
        let a = Snapshot::new(Router::default(), Settings::default(), HashMap::new(), HashMap::new());
        let b = Snapshot::new(Router::default(), Settings::default(), HashMap::new(), HashMap::new());
        assert_ne!(a.version(), b.version());
    }

    #[test]
    fn test_mode_parse_case_insensitive() {
        assert_eq!(Mode::parse("strict"), Some(Mode::Strict));
        assert_eq!(Mode::parse("PassThrough"), Some(Mode::Passthrough));
        assert_eq!(Mode::parse("lenient"), None);
    }

    #[test]
    fn test_unknown_route_delay_is_zero() {
        let s = Snapshot::new(Router::default(), Settings::default(), HashMap::new(), HashMap::new());
        assert!(s.delay_for_route("missing").is_zero());
    }
}
