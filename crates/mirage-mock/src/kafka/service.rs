//! Start/stop/inspect operations over kafka scenario executions.

use super::execution::ExecutionError;
use super::registry::ScenarioExecutionRegistry;
use super::runner::{ExecutionView, ScenarioExecutionRunner};
use super::store::KafkaStore;
use crate::scheduler::Scheduler;
use crate::snapshot::SnapshotRegistry;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum KafkaScenarioError {
    #[error("No kafka scenarios are configured in the active contract")]
    NotConfigured,
    #[error("Kafka scenario '{id}' not found (available: {available:?})")]
    NotFound { id: String, available: Vec<String> },
    #[error("Execution {0} is already registered or started")]
    Conflict(Uuid),
}

impl From<ExecutionError> for KafkaScenarioError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::IllegalStart { id, .. } => KafkaScenarioError::Conflict(id),
        }
    }
}

pub struct KafkaScenarioService {
    snapshots: Arc<SnapshotRegistry>,
    executions: Arc<ScenarioExecutionRegistry>,
    scheduler: Arc<dyn Scheduler>,
    store: Arc<dyn KafkaStore>,
}

impl KafkaScenarioService {
    pub fn new(
        snapshots: Arc<SnapshotRegistry>,
        executions: Arc<ScenarioExecutionRegistry>,
        scheduler: Arc<dyn Scheduler>,
        store: Arc<dyn KafkaStore>,
    ) -> Self {
        Self {
            snapshots,
            executions,
            scheduler,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn KafkaStore> {
        &self.store
    }

    /// Launch a new execution of a scenario from the active snapshot.
    pub fn start_scenario(&self, scenario_id: &str) -> Result<ExecutionView, KafkaScenarioError> {
        let snapshot = Arc::clone(self.snapshots.active().snapshot());
        if !snapshot.has_kafka() {
            return Err(KafkaScenarioError::NotConfigured);
        }
        let scenario = snapshot
            .kafka_scenario(scenario_id)
            .ok_or_else(|| KafkaScenarioError::NotFound {
                id: scenario_id.to_string(),
                available: snapshot.kafka_scenario_ids(),
            })?;

        let runner = ScenarioExecutionRunner::new(
            scenario,
            Arc::clone(&self.scheduler),
            Arc::clone(&self.store),
        );
        self.executions
            .register(Arc::clone(&runner))
            .map_err(KafkaScenarioError::Conflict)?;
        if let Err(e) = runner.start() {
            self.executions.stop_and_remove(&runner.id());
            return Err(e.into());
        }
        Ok(runner.view())
    }

    /// Stop and evict an execution. Unknown ids return `None`.
    pub fn stop_execution(&self, execution_id: &Uuid) -> Option<ExecutionView> {
        let runner = self.executions.get(execution_id)?;
        if !self.executions.stop_and_remove(execution_id) {
            return None;
        }
        Some(runner.view())
    }

    pub fn execution(&self, execution_id: &Uuid) -> Option<ExecutionView> {
        self.executions.get(execution_id).map(|r| r.view())
    }

    pub fn executions(&self) -> Vec<ExecutionView> {
        let mut views: Vec<ExecutionView> = self.executions.all().iter().map(|r| r.view()).collect();
        views.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        views
    }

    pub fn stop_all(&self) -> usize {
        self.executions.stop_all()
    }
}
