//! Errors raised while parsing, validating and compiling contracts.

use thiserror::Error;

/// A contract could not be turned into a snapshot.
///
/// Every variant is raised synchronously by the parser or the compiler; a
/// failed compile never replaces the active snapshot.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Failed to parse contract: {0}")]
    Parse(String),
    #[error("Invalid contract at '{field}': {message}")]
    Invalid { field: String, message: String },
    #[error("Unsupported HTTP method '{0}'")]
    InvalidMethod(String),
    #[error("Invalid path template '{template}': {message}")]
    InvalidPath { template: String, message: String },
    #[error("Unknown response.type '{0}' (expected mock, proxy or error)")]
    UnknownResponseType(String),
    #[error("Invalid delay at '{field}': {message}")]
    InvalidDelay { field: String, message: String },
    #[error("Unsupported when-condition rule for '{key}': {message}")]
    InvalidWhenRule { key: String, message: String },
    #[error("Duplicate kafka scenario id '{0}'")]
    DuplicateScenario(String),
    #[error("Payload file '{path}' rejected: {reason}")]
    PayloadFile { path: String, reason: String },
}

impl ContractError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ContractError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn delay(field: impl Into<String>, message: impl Into<String>) -> Self {
        ContractError::InvalidDelay {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<serde_yaml::Error> for ContractError {
    fn from(e: serde_yaml::Error) -> Self {
        ContractError::Parse(e.to_string())
    }
}
