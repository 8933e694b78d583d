//! Polling watcher that reloads the contract when the workspace changes.
//!
//! The contract file and every file under the workspace root (body and
//! value files included) are scanned; a reload runs whenever the newest
//! modification time moves forward.

use super::ReloadService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct ContractWatcher {
    contract_path: PathBuf,
    workspace_root: PathBuf,
    reload: Arc<ReloadService>,
    poll_interval: Duration,
    last_modified: Option<SystemTime>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ContractWatcher {
    pub fn new(
        contract_path: PathBuf,
        workspace_root: PathBuf,
        reload: Arc<ReloadService>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            contract_path,
            workspace_root,
            reload,
            poll_interval: Duration::from_secs(1),
            last_modified: None,
            shutdown_rx,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn run(mut self) {
        self.last_modified = self.newest_modification().await;
        info!(
            contract = %self.contract_path.display(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Watching contract workspace for changes"
        );

        loop {
            if *self.shutdown_rx.borrow_and_update() {
                info!("Contract watcher shutting down");
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {
                    self.check_for_changes().await;
                }
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    async fn check_for_changes(&mut self) {
        let current = self.newest_modification().await;
        let changed = match (self.last_modified, current) {
            (Some(last), Some(current)) => current > last,
            (None, Some(_)) => true,
            _ => false,
        };
        if !changed {
            return;
        }
        self.last_modified = current;
        info!("Contract workspace changed, reloading");
        let result = self.reload.reload().await;
        if !result.success {
            warn!(
                "Reload after change failed, keeping previous snapshot: {}",
                result.error.unwrap_or_default()
            );
        }
    }

    /// The directory walk is blocking I/O and runs on the blocking pool.
    async fn newest_modification(&self) -> Option<SystemTime> {
        let contract = self.contract_path.clone();
        let workspace = self.workspace_root.clone();
        match tokio::task::spawn_blocking(move || scan_newest(&contract, &workspace)).await {
            Ok(newest) => newest,
            Err(e) => {
                warn!("Workspace scan failed: {}", e);
                None
            }
        }
    }
}

fn scan_newest(contract: &Path, workspace: &Path) -> Option<SystemTime> {
    modified(contract).max(newest_in(workspace, 0))
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

const MAX_DEPTH: usize = 16;

fn newest_in(dir: &Path, depth: usize) -> Option<SystemTime> {
    if depth > MAX_DEPTH {
        return None;
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot scan {}: {}", dir.display(), e);
            return None;
        }
    };
    let mut newest = None;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let candidate = if file_type.is_dir() {
            newest_in(&path, depth + 1)
        } else if file_type.is_file() {
            modified(&path)
        } else {
            None
        };
        newest = newest.max(candidate);
    }
    newest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::payload::BodyResolver;
    use crate::contract::{ContractCompiler, ContractParser, FileContractSource};
    use crate::snapshot::SnapshotRegistry;
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    #[test]
    fn test_newest_in_recurses() {
        let dir = TempDir::new().unwrap();
        assert!(newest_in(dir.path(), 0).is_none());

        std::fs::create_dir_all(dir.path().join("payloads/nested")).unwrap();
        std::fs::write(dir.path().join("payloads/nested/a.json"), b"{}").unwrap();
        assert!(newest_in(dir.path(), 0).is_some());
    }

    #[tokio::test]
    async fn test_newest_modification_scans_contract_and_workspace() {
        let dir = TempDir::new().unwrap();
        let contract = dir.path().join("contract.yaml");
        let workspace = dir.path().join("ws");
        std::fs::create_dir_all(workspace.join("bodies")).unwrap();

        let registry = {
            let raw = ContractParser::parse("endpoints: [{request: {method: GET, path: /a}, response: {type: mock}}]").unwrap();
            let compiled = ContractCompiler::new(BodyResolver::new(dir.path())).compile(&raw).unwrap();
            Arc::new(SnapshotRegistry::new(compiled.snapshot, compiled.fallback))
        };
        let reload = Arc::new(ReloadService::new(
            Arc::new(FileContractSource::new(contract.clone())),
            Arc::new(ContractCompiler::new(BodyResolver::new(dir.path()))),
            registry,
            Arc::new(Mutex::new(())),
        ));
        let (_tx, rx) = watch::channel(false);
        let watcher = ContractWatcher::new(contract.clone(), workspace.clone(), reload, rx);

        assert!(watcher.newest_modification().await.is_none());

        std::fs::write(workspace.join("bodies/user.json"), b"{}").unwrap();
        assert_eq!(
            watcher.newest_modification().await,
            modified(&workspace.join("bodies/user.json"))
        );

        std::fs::write(&contract, b"endpoints: []").unwrap();
        assert_eq!(
            watcher.newest_modification().await,
            scan_newest(&contract, &workspace)
        );
    }

    #[tokio::test]
    async fn test_watcher_reloads_on_change_and_stops() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contract.yaml");
        let v1 = "endpoints:\n  - request: { method: GET, path: /a }\n    response: { type: mock }\n";
        std::fs::write(&path, v1).unwrap();

        let compiler = Arc::new(ContractCompiler::new(BodyResolver::new(dir.path())));
        let compiled = compiler.compile(&ContractParser::parse(v1).unwrap()).unwrap();
        let registry = Arc::new(SnapshotRegistry::new(compiled.snapshot, compiled.fallback));
        let reload = Arc::new(ReloadService::new(
            Arc::new(FileContractSource::new(path.clone())),
            compiler,
            Arc::clone(&registry),
            Arc::new(Mutex::new(())),
        ));
        let before = registry.active_version();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let watcher = ContractWatcher::new(path.clone(), dir.path().to_path_buf(), reload, shutdown_rx)
            .with_poll_interval(Duration::from_millis(20));
        let task = tokio::spawn(watcher.run());

        tokio::time::sleep(Duration::from_millis(60)).await;
        // mtime granularity can be coarse; make sure the new write is newer
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        std::fs::write(&path, v1.replace("/a", "/b")).unwrap();

        let mut reloaded = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if registry.active_version() != before {
                reloaded = true;
                break;
            }
        }
        assert!(reloaded, "watcher did not reload the contract");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
