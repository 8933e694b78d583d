//! Iteration state of one scenario run.
//!
//! A [`ScenarioExecution`] is a plain single-writer state machine; it is
//! owned by exactly one runner, which serializes access to it.

use super::model::{KafkaRecord, KafkaScenario};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionState {
    Created,
    Running,
    Stopped,
    Finished,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionState::Stopped | ExecutionState::Finished)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Execution {id} cannot start from state {state:?}")]
    IllegalStart { id: Uuid, state: ExecutionState },
}

#[derive(Debug)]
pub struct ScenarioExecution {
    id: Uuid,
    scenario: Arc<KafkaScenario>,
    state: ExecutionState,
    scenario_repeat_index: u32,
    message_index: usize,
    message_repeat_index: u32,
    published: u64,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl ScenarioExecution {
    pub fn new(scenario: Arc<KafkaScenario>) -> Self {
        Self {
            id: Uuid::new_v4(),
            scenario,
            state: ExecutionState::Created,
            scenario_repeat_index: 0,
            message_index: 0,
            message_repeat_index: 0,
            published: 0,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scenario(&self) -> &Arc<KafkaScenario> {
        &self.scenario
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ExecutionState::Running
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Legal only once, from `Created`.
    pub fn start(&mut self) -> Result<(), ExecutionError> {
        if self.state != ExecutionState::Created {
            return Err(ExecutionError::IllegalStart {
                id: self.id,
                state: self.state,
            });
        }
        self.state = ExecutionState::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Move to `Stopped`. Stopping a terminal execution only logs.
    pub fn stop(&mut self) {
        if self.state.is_terminal() {
            warn!(
                execution = %self.id,
                state = ?self.state,
                "Stop requested for an execution that already ended"
            );
            return;
        }
        self.state = ExecutionState::Stopped;
        self.ended_at = Some(Utc::now());
    }

    /// Next record to emit, advancing the iteration pointers. Returns `None`
    /// when not running or when all repeats are exhausted; exhaustion moves
    /// a running execution to `Finished`.
    pub fn next_record(&mut self) -> Option<KafkaRecord> {
        if self.state != ExecutionState::Running {
            return None;
        }
        if self.scenario_repeat_index >= self.scenario.repeat() {
            self.finish();
            return None;
        }

        let records = self.scenario.records();
        let record = records[self.message_index].clone();

        self.message_repeat_index += 1;
        if self.message_repeat_index >= record.message.repeat {
            self.message_repeat_index = 0;
            self.message_index += 1;
            if self.message_index >= records.len() {
                self.message_index = 0;
                self.scenario_repeat_index += 1;
            }
        }
        Some(record)
    }

    /// Count one record as published by the runner.
    pub(crate) fn mark_published(&mut self) {
        self.published += 1;
    }

    fn finish(&mut self) {
        self.state = ExecutionState::Finished;
        self.ended_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::model::fixtures::{message, scenario};
    use tracing_test::traced_test;

    fn drain(exec: &mut ScenarioExecution) -> Vec<String> {
        std::iter::from_fn(|| exec.next_record())
            .map(|r| r.message.key)
            .collect()
    }

    #[test]
    fn test_nested_repeat_order() {
        let s = scenario("s", 2, vec![message("t", "A", "a", 2), message("t", "B", "b", 1)]);
        let mut exec = ScenarioExecution::new(Arc::new(s));
        exec.start().unwrap();
        assert_eq!(drain(&mut exec), vec!["A", "A", "B", "A", "A", "B"]);
        assert_eq!(exec.state(), ExecutionState::Finished);
        assert!(exec.ended_at().is_some());
    }

    #[test]
    fn test_not_running_yields_nothing() {
        let s = scenario("s", 1, vec![message("t", "A", "a", 1)]);
        let mut exec = ScenarioExecution::new(Arc::new(s));
        assert!(exec.next_record().is_none());
        assert_eq!(exec.state(), ExecutionState::Created);
    }

    #[test]
    fn test_double_start_is_error() {
        let s = scenario("s", 1, vec![message("t", "A", "a", 1)]);
        let mut exec = ScenarioExecution::new(Arc::new(s));
        exec.start().unwrap();
        let err = exec.start().unwrap_err();
        assert_eq!(
            err,
            ExecutionError::IllegalStart {
                id: exec.id(),
                state: ExecutionState::Running
            }
        );
    }

    #[test]
    fn test_stop_is_absorbing() {
        let s = scenario("s", 3, vec![message("t", "A", "a", 1)]);
        let mut exec = ScenarioExecution::new(Arc::new(s));
        exec.start().unwrap();
        assert!(exec.next_record().is_some());
        exec.stop();
        assert_eq!(exec.state(), ExecutionState::Stopped);
        assert!(exec.next_record().is_none());
        assert_eq!(exec.state(), ExecutionState::Stopped);
        assert!(exec.start().is_err());
    }

    #[test]
    #[traced_test]
    fn test_stop_after_finish_is_noop() {
        let s = scenario("s", 1, vec![message("t", "A", "a", 1)]);
        let mut exec = ScenarioExecution::new(Arc::new(s));
        exec.start().unwrap();
        drain(&mut exec);
        assert_eq!(exec.state(), ExecutionState::Finished);
        exec.stop();
        assert_eq!(exec.state(), ExecutionState::Finished);
        assert!(logs_contain("already ended"));
    }
}
