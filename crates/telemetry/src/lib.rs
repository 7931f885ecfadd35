//! Telemetry for the active sessions engine.
//!
//! Structured logging setup, component health, and in-process counters
//! exposed over the HTTP API.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
