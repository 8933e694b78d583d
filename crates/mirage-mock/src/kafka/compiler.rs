//! Compiles the `kafka` section of a contract.

use super::model::{KafkaMessage, KafkaRecord, KafkaScenario};
use crate::contract::delay::DelaySpec;
use crate::contract::payload::BodyResolver;
use crate::contract::raw::{RawKafkaScenario, RawKafkaSection};
use crate::contract::ContractError;
use std::collections::HashMap;
use std::sync::Arc;

pub struct KafkaCompiler<'a> {
    resolver: &'a BodyResolver,
}

impl<'a> KafkaCompiler<'a> {
    pub fn new(resolver: &'a BodyResolver) -> Self {
        Self { resolver }
    }

    pub fn compile(
        &self,
        section: Option<&RawKafkaSection>,
    ) -> Result<HashMap<String, Arc<KafkaScenario>>, ContractError> {
        let mut scenarios = HashMap::new();
        let Some(section) = section else {
            return Ok(scenarios);
        };
        for (i, raw) in section.scenarios.iter().enumerate() {
            let scenario = self.compile_scenario(raw, &format!("kafka.scenarios[{i}]"))?;
            let id = scenario.id().to_string();
            if scenarios.contains_key(&id) {
                return Err(ContractError::DuplicateScenario(id));
            }
            scenarios.insert(id, Arc::new(scenario));
        }
        Ok(scenarios)
    }

    fn compile_scenario(
        &self,
        raw: &RawKafkaScenario,
        at: &str,
    ) -> Result<KafkaScenario, ContractError> {
        let id = raw
            .id
            .as_deref()
            .ok_or_else(|| ContractError::invalid(format!("{at}.id"), "is required"))?;

        let mut records = Vec::with_capacity(raw.messages.len());
        for (j, message) in raw.messages.iter().enumerate() {
            let at = format!("{at}.messages[{j}]");
            let topic = message
                .topic
                .clone()
                .ok_or_else(|| ContractError::invalid(format!("{at}.topic"), "is required"))?;
            let key = message
                .key
                .clone()
                .ok_or_else(|| ContractError::invalid(format!("{at}.key"), "is required"))?;
            let value = self
                .resolver
                .resolve(message.value.as_ref(), message.value_file.as_deref())?;
            let delay = DelaySpec::from_raw(message.delay.as_ref(), &format!("{at}.delay"))?;
            records.push(KafkaRecord::new(KafkaMessage {
                topic,
                key,
                value,
                repeat: message.repeat.unwrap_or(1),
                delay,
            }));
        }
        KafkaScenario::new(id, raw.repeat.unwrap_or(1), records)
    }
}
