//! HTTP API layer for the active sessions engine.

pub mod extractors;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::{AppState, EngineSettings};
