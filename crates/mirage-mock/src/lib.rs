//! Mirage: a contract-driven HTTP mock server with snapshot hot reload and
//! Kafka-like scenario emulation.

// ===== Contract pipeline =====
pub mod contract;
pub mod routing;
pub mod behavior;
pub mod snapshot;

// ===== Request handling =====
pub mod engine;
pub mod request;

// ===== Kafka scenario emulation =====
pub mod kafka;
pub mod scheduler;

// ===== Control surface and adapters =====
pub mod admin;
pub mod app;
pub mod config;
pub mod metrics;
pub mod reload;
pub mod server;
pub mod telemetry;

pub use app::MirageApp;
pub use config::{Cli, ServerConfig};
