//! Live executions by id.

use super::runner::ScenarioExecutionRunner;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Default)]
pub struct ScenarioExecutionRegistry {
    runners: DashMap<Uuid, Arc<ScenarioExecutionRunner>>,
}

impl ScenarioExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with the colliding id when it is already registered.
    pub fn register(&self, runner: Arc<ScenarioExecutionRunner>) -> Result<(), Uuid> {
        match self.runners.entry(runner.id()) {
            Entry::Occupied(existing) => Err(*existing.key()),
            Entry::Vacant(slot) => {
                slot.insert(runner);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<ScenarioExecutionRunner>> {
        self.runners.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Stop and evict. Unknown ids return `false`.
    pub fn stop_and_remove(&self, id: &Uuid) -> bool {
        match self.runners.remove(id) {
            Some((_, runner)) => {
                runner.stop();
                true
            }
            None => false,
        }
    }

    pub fn all(&self) -> Vec<Arc<ScenarioExecutionRunner>> {
        self.runners.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Stop every execution, used on shutdown.
    pub fn stop_all(&self) -> usize {
        let ids: Vec<Uuid> = self.runners.iter().map(|e| *e.key()).collect();
        ids.iter().filter(|id| self.stop_and_remove(id)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::execution::ExecutionState;
    use crate::kafka::model::fixtures::{message, scenario};
    use crate::kafka::store::InMemoryKafkaStore;
    use crate::scheduler::{RuntimeScheduler, Scheduler};

    fn runner() -> Arc<ScenarioExecutionRunner> {
        let scheduler: Arc<dyn Scheduler> = Arc::new(RuntimeScheduler::current().unwrap());
        ScenarioExecutionRunner::new(
            Arc::new(scenario("s", 1, vec![message("t", "k", "v", 1)])),
            scheduler,
            Arc::new(InMemoryKafkaStore::new()),
        )
    }

    #[tokio::test]
    async fn test_register_rejects_collision() {
        let registry = ScenarioExecutionRegistry::new();
        let r = runner();
        registry.register(Arc::clone(&r)).unwrap();
        assert_eq!(registry.register(Arc::clone(&r)), Err(r.id()));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_and_remove() {
        let registry = ScenarioExecutionRegistry::new();
        let r = runner();
        registry.register(Arc::clone(&r)).unwrap();
        r.start().unwrap();

        assert!(registry.stop_and_remove(&r.id()));
        assert!(registry.get(&r.id()).is_none());
        assert_ne!(r.state(), ExecutionState::Running);

        assert!(!registry.stop_and_remove(&r.id()));
        assert!(!registry.stop_and_remove(&Uuid::new_v4()));
    }
}
