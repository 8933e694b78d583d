//! Control surface services used by the admin HTTP API.

mod service;

pub use service::{AdminError, ContractAdminService, ContractView, ValidationReport};
