//! Compiled kafka scenarios.

use crate::contract::delay::DelaySpec;
use crate::contract::payload::ResolvedBody;
use crate::contract::ContractError;

/// One synthetic message. `repeat` is the number of consecutive emissions.
#[derive(Debug, Clone, PartialEq)]
pub struct KafkaMessage {
    pub topic: String,
    pub key: String,
    pub value: ResolvedBody,
    pub repeat: u32,
    pub delay: DelaySpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KafkaRecord {
    pub topic: String,
    pub message: KafkaMessage,
}

impl KafkaRecord {
    pub fn new(message: KafkaMessage) -> Self {
        Self {
            topic: message.topic.clone(),
            message,
        }
    }
}

/// Named, repeatable sequence of records.
#[derive(Debug, Clone, PartialEq)]
pub struct KafkaScenario {
    id: String,
    repeat: u32,
    records: Vec<KafkaRecord>,
}

impl KafkaScenario {
    pub fn new(
        id: impl Into<String>,
        repeat: u32,
        records: Vec<KafkaRecord>,
    ) -> Result<Self, ContractError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContractError::invalid("kafka.scenarios.id", "must not be blank"));
        }
        if repeat == 0 {
            return Err(ContractError::invalid(
                format!("kafka.scenarios[{id}].repeat"),
                "must be >= 1",
            ));
        }
        if records.is_empty() {
            return Err(ContractError::invalid(
                format!("kafka.scenarios[{id}].messages"),
                "must not be empty",
            ));
        }
        if let Some(bad) = records.iter().position(|r| r.message.repeat == 0) {
            return Err(ContractError::invalid(
                format!("kafka.scenarios[{id}].messages[{bad}].repeat"),
                "must be >= 1",
            ));
        }
        Ok(Self {
            id,
            repeat,
            records,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    pub fn records(&self) -> &[KafkaRecord] {
        &self.records
    }

    /// Total number of emissions of one full run.
    pub fn total_emissions(&self) -> u64 {
        let per_pass: u64 = self.records.iter().map(|r| r.message.repeat as u64).sum();
        per_pass * self.repeat as u64
    }
}
