//! Local session store for the active sessions engine.
//!
//! Wraps the host application's `session` table: listing, enrichment
//! updates, and single or bulk deletion.

pub mod client;
pub mod config;
pub mod health;
pub mod memory;
pub mod store;

pub use client::*;
pub use config::*;
pub use memory::MemorySessionStore;
pub use store::*;
