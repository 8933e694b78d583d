//! Contract read/update/validate operations behind the admin API.

use crate::contract::{ContractCompiler, ContractError, ContractParser, ContractSource, SourceError};
use crate::metrics;
use crate::snapshot::{SnapshotRegistry, SnapshotVersion};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Version conflict: active snapshot is {actual}")]
    VersionConflict { actual: SnapshotVersion },
    #[error(transparent)]
    Invalid(#[from] ContractError),
    #[error(transparent)]
    SourceUnavailable(#[from] SourceError),
}

/// Raw contract text with the version of the active snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ContractView {
    pub raw: String,
    pub version: SnapshotVersion,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub routes: usize,
    pub kafka_scenarios: Vec<String>,
}

pub struct ContractAdminService {
    source: Arc<dyn ContractSource>,
    compiler: Arc<ContractCompiler>,
    registry: Arc<SnapshotRegistry>,
    write_lock: Arc<Mutex<()>>,
}

impl ContractAdminService {
    pub fn new(
        source: Arc<dyn ContractSource>,
        compiler: Arc<ContractCompiler>,
        registry: Arc<SnapshotRegistry>,
        write_lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            source,
            compiler,
            registry,
            write_lock,
        }
    }

    pub fn active_version(&self) -> SnapshotVersion {
        self.registry.active_version()
    }

    pub async fn current_contract(&self) -> Result<ContractView, AdminError> {
        let raw = self.source.load().await?;
        Ok(ContractView {
            raw,
            version: self.registry.active_version(),
        })
    }

    /// Replace the contract if `expected_version` is still the active one.
    /// The check runs before parsing; nothing is saved or activated unless
    /// the new text compiles.
    pub async fn update_contract(
        &self,
        expected_version: &str,
        text: &str,
    ) -> Result<SnapshotVersion, AdminError> {
        let _guard = self.write_lock.lock().await;
        check_version(&self.registry, expected_version)?;

        let raw = ContractParser::parse(text)?;
        let compiled = self.compiler.compile(&raw)?;
        self.source.save(text).await?;

        let handle = self.registry.activate_new(compiled.snapshot, compiled.fallback);
        self.registry.cleanup_retired();
        metrics::record_reload(true);
        info!(version = %handle.version(), "Contract updated through admin API");
        Ok(handle.version().clone())
    }

    /// Parse and compile without activating. The version check is optional.
    pub fn validate_contract(
        &self,
        expected_version: Option<&str>,
        text: &str,
    ) -> Result<ValidationReport, AdminError> {
        if let Some(expected) = expected_version {
            check_version(&self.registry, expected)?;
        }
        let raw = ContractParser::parse(text)?;
        let compiled = self.compiler.compile(&raw)?;
        Ok(ValidationReport {
            valid: true,
            routes: compiled.snapshot.router().len(),
            kafka_scenarios: compiled.snapshot.kafka_scenario_ids(),
        })
    }
}

fn check_version(registry: &SnapshotRegistry, expected: &str) -> Result<(), AdminError> {
    let actual = registry.active_version();
    if actual.as_str() != expected.trim() {
        warn!(expected, actual = %actual, "Rejected contract write with stale version");
        return Err(AdminError::VersionConflict { actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::payload::BodyResolver;
    use crate::contract::FileContractSource;
    use tempfile::TempDir;

    const V1: &str = r#"
endpoints:
  - request: { method: GET, path: /a }
    response: { type: mock, body: one }
"#;
    const V2: &str = r#"
endpoints:
  - request: { method: GET, path: /a }
    response: { type: mock, body: two }
kafka:
  scenarios:
    - id: s1
      messages: [ { topic: t, key: k, value: v } ]
"#;

    fn setup(dir: &TempDir) -> (ContractAdminService, Arc<SnapshotRegistry>) {
        let path = dir.path().join("contract.yaml");
        std::fs::write(&path, V1).unwrap();
        let compiler = Arc::new(ContractCompiler::new(BodyResolver::new(dir.path())));
        let compiled = compiler.compile(&ContractParser::parse(V1).unwrap()).unwrap();
        let registry = Arc::new(SnapshotRegistry::new(compiled.snapshot, compiled.fallback));
        let service = ContractAdminService::new(
            Arc::new(FileContractSource::new(path)),
            compiler,
            Arc::clone(&registry),
            Arc::new(Mutex::new(())),
        );
        (service, registry)
    }

    #[tokio::test]
    async fn test_current_contract() {
        let dir = TempDir::new().unwrap();
        let (service, registry) = setup(&dir);
        let view = service.current_contract().await.unwrap();
        assert_eq!(view.raw, V1);
        assert_eq!(view.version, registry.active_version());
    }

    #[tokio::test]
    async fn test_update_with_current_version() {
        let dir = TempDir::new().unwrap();
        let (service, registry) = setup(&dir);
        let v1 = registry.active_version();

        let v2 = service.update_contract(v1.as_str(), V2).await.unwrap();
        assert_ne!(v1, v2);
        assert_eq!(registry.active_version(), v2);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("contract.yaml")).unwrap(),
            V2
        );
    }

    #[tokio::test]
    async fn test_stale_version_conflicts_with_actual() {
        let dir = TempDir::new().unwrap();
        let (service, registry) = setup(&dir);
        let actual = registry.active_version();

        match service.update_contract("stale", V2).await {
            Err(AdminError::VersionConflict { actual: got }) => assert_eq!(got, actual),
            other => panic!("expected conflict, got {other:?}"),
        }
        // checked before parsing: even garbage reports the conflict
        assert!(matches!(
            service.update_contract("stale", "{{{").await,
            Err(AdminError::VersionConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_update_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let (service, registry) = setup(&dir);
        let v1 = registry.active_version();

        let bad = "endpoints:\n  - request: { method: GET, path: /a }\n    response: { type: nope }\n";
        assert!(matches!(
            service.update_contract(v1.as_str(), bad).await,
            Err(AdminError::Invalid(ContractError::UnknownResponseType(_)))
        ));
        assert_eq!(registry.active_version(), v1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("contract.yaml")).unwrap(),
            V1
        );
    }

    #[tokio::test]
    async fn test_validate_does_not_activate() {
        let dir = TempDir::new().unwrap();
        let (service, registry) = setup(&dir);
        let v1 = registry.active_version();

        let report = service.validate_contract(None, V2).unwrap();
        assert!(report.valid);
        assert_eq!(report.routes, 1);
        assert_eq!(report.kafka_scenarios, vec!["s1"]);
        assert_eq!(registry.active_version(), v1);

        assert!(matches!(
            service.validate_contract(Some("stale"), V2),
            Err(AdminError::VersionConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_source_failure_is_distinct() {
        let dir = TempDir::new().unwrap();
        let (service, _) = setup(&dir);
        std::fs::remove_file(dir.path().join("contract.yaml")).unwrap();
        assert!(matches!(
            service.current_contract().await,
            Err(AdminError::SourceUnavailable(_))
        ));
    }
}
