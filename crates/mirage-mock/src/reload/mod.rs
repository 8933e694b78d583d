//! Reloading the active contract from its source.

mod watcher;

pub use watcher::ContractWatcher;

use crate::contract::{ContractCompiler, ContractError, ContractParser, ContractSource, SourceError};
use crate::metrics;
use crate::snapshot::{SnapshotRegistry, SnapshotVersion};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

/// Outcome of one reload attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResult {
    pub success: bool,
    pub source_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_version: Option<SnapshotVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
enum ReloadError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Load, compile and activate. Shares its writer lock with the admin
/// update path so at most one activation runs at a time.
pub struct ReloadService {
    source: Arc<dyn ContractSource>,
    compiler: Arc<ContractCompiler>,
    registry: Arc<SnapshotRegistry>,
    write_lock: Arc<Mutex<()>>,
}

impl ReloadService {
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

    /// A failed reload leaves the active snapshot untouched.
    pub async fn reload(&self) -> ReloadResult {
        let _guard = self.write_lock.lock().await;
        let source_id = self.source.id();
        match self.load_and_activate().await {
            Ok(version) => {
                metrics::record_reload(true);
                info!(source = %source_id, version = %version, "Contract reloaded");
                ReloadResult {
                    success: true,
                    source_id,
                    new_version: Some(version),
                    error: None,
                }
            }
            Err(e) => {
                metrics::record_reload(false);
                error!(source = %source_id, "Contract reload failed: {}", e);
                ReloadResult {
                    success: false,
                    source_id,
                    new_version: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn load_and_activate(&self) -> Result<SnapshotVersion, ReloadError> {
        let text = self.source.load().await?;
        let raw = ContractParser::parse(&text)?;
        let compiled = self.compiler.compile(&raw)?;
        let handle = self.registry.activate_new(compiled.snapshot, compiled.fallback);
        self.registry.cleanup_retired();
        Ok(handle.version().clone())
    }
}
