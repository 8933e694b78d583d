//! Contract documents: parsing, validation, payload resolution, storage and
//! compilation into snapshots.

mod compiler;
pub mod delay;
mod error;
mod parser;
pub mod payload;
pub mod raw;
mod source;

pub use compiler::{
    CompiledContract, ContractCompiler, STATIC_PATH_PRIORITY, TEMPLATED_PATH_PRIORITY,
};
pub use error::ContractError;
pub use parser::ContractParser;
pub use source::{ContractSource, FileContractSource, SourceError};
