//! Drives one [`ScenarioExecution`] through the scheduler.
//!
//! Emission is a chain: each fired step publishes its record and only then
//! schedules the next one, so at most one step per execution is pending.
//! The RUNNING check and the publish happen under the execution lock,
//! which is the same lock `stop` takes; once `stop` returns nothing more
//! is published.

use super::execution::{ExecutionError, ExecutionState, ScenarioExecution};
use super::model::{KafkaRecord, KafkaScenario};
use super::store::KafkaStore;
use crate::metrics;
use crate::scheduler::{Scheduler, TaskHandle};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Point-in-time status of an execution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionView {
    pub execution_id: Uuid,
    pub scenario_id: String,
    pub state: ExecutionState,
    pub published: u64,
    pub total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

pub struct ScenarioExecutionRunner {
    id: Uuid,
    scenario_id: String,
    execution: Mutex<ScenarioExecution>,
    pending: Mutex<Vec<TaskHandle>>,
    scheduler: Arc<dyn Scheduler>,
    store: Arc<dyn KafkaStore>,
}

impl ScenarioExecutionRunner {
    pub fn new(
        scenario: Arc<KafkaScenario>,
        scheduler: Arc<dyn Scheduler>,
        store: Arc<dyn KafkaStore>,
    ) -> Arc<Self> {
        let scenario_id = scenario.id().to_string();
        let execution = ScenarioExecution::new(scenario);
        Arc::new(Self {
            id: execution.id(),
            scenario_id,
            execution: Mutex::new(execution),
            pending: Mutex::new(Vec::new()),
            scheduler,
            store,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scenario_id(&self) -> &str {
        &self.scenario_id
    }

    pub fn state(&self) -> ExecutionState {
        self.execution.lock().state()
    }

    pub fn view(&self) -> ExecutionView {
        let exec = self.execution.lock();
        ExecutionView {
            execution_id: self.id,
            scenario_id: self.scenario_id.clone(),
            state: exec.state(),
            published: exec.published(),
            total: exec.scenario().total_emissions(),
            started_at: exec.started_at(),
            ended_at: exec.ended_at(),
        }
    }

    pub fn start(self: &Arc<Self>) -> Result<(), ExecutionError> {
        self.execution.lock().start()?;
        metrics::record_execution_event("started");
        info!(execution = %self.id, scenario = %self.scenario_id, "Kafka scenario started");
        self.schedule_next();
        Ok(())
    }

    /// Stop the execution and cancel every pending step.
    pub fn stop(&self) {
        let was_running = {
            let mut exec = self.execution.lock();
            let was_running = exec.is_running();
            exec.stop();
            was_running
        };
        let cancelled = {
            let mut pending = self.pending.lock();
            let n = pending.len();
            for handle in pending.drain(..) {
                handle.cancel();
            }
            n
        };
        if was_running {
            metrics::record_execution_event("stopped");
            info!(
                execution = %self.id,
                scenario = %self.scenario_id,
                cancelled,
                "Kafka scenario stopped"
            );
        }
    }

    fn schedule_next(self: &Arc<Self>) {
        let next = self.execution.lock().next_record();
        let Some(record) = next else {
            self.on_exhausted();
            return;
        };

        let delay = record.message.delay.resolve();
        let runner = Arc::clone(self);
        let handle = self
            .scheduler
            .schedule_task(Box::new(move || runner.emit(record)), delay);

        {
            let mut pending = self.pending.lock();
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
        // stop() may have drained `pending` while the step was being scheduled
        if !self.execution.lock().is_running() {
            for handle in self.pending.lock().drain(..) {
                handle.cancel();
            }
        }
    }

    fn emit(self: &Arc<Self>, record: KafkaRecord) -> anyhow::Result<()> {
        {
            let mut exec = self.execution.lock();
            if !exec.is_running() {
                debug!(
                    execution = %self.id,
                    topic = %record.topic,
                    "Execution no longer running, dropping step"
                );
                return Ok(());
            }
            self.store.publish(&record.topic, record.message);
            exec.mark_published();
        }
        self.schedule_next();
        Ok(())
    }

    fn on_exhausted(&self) {
        let (state, published) = {
            let exec = self.execution.lock();
            (exec.state(), exec.published())
        };
        if state != ExecutionState::Finished {
            return;
        }
        self.pending.lock().clear();
        metrics::record_execution_event("finished");
        let lag = self.store.lag();
        if lag == 0 {
            info!(
                execution = %self.id,
                scenario = %self.scenario_id,
                published,
                "Kafka scenario finished"
            );
        } else {
            warn!(
                execution = %self.id,
                scenario = %self.scenario_id,
                published,
                lag,
                "Kafka scenario finished with unconsumed messages"
            );
        }
    }
}
