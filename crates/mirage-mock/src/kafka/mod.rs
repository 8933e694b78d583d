//! Kafka-like scenario emulation: compiled scenarios, the execution state
//! machine, its scheduler-driven runner and the in-memory topic store.

mod compiler;
mod execution;
mod model;
mod registry;
mod runner;
mod service;
mod store;

pub use compiler::KafkaCompiler;
pub use execution::{ExecutionError, ExecutionState, ScenarioExecution};
pub use model::{KafkaMessage, KafkaRecord, KafkaScenario};
pub use registry::ScenarioExecutionRegistry;
pub use runner::{ExecutionView, ScenarioExecutionRunner};
pub use service::{KafkaScenarioError, KafkaScenarioService};
pub use store::{InMemoryKafkaStore, KafkaStore};
