//! Shared harness for the active sessions integration tests.

pub mod containers;
pub mod fixtures;
