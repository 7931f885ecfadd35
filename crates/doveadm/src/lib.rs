//! Dovecot session backend for the active sessions engine.
//!
//! Lists live IMAP connections with `doveadm who` and drops them with
//! `doveadm kick`.

pub mod client;
pub mod config;
pub mod health;
pub mod parser;
pub mod runner;

pub use client::*;
pub use config::*;
pub use parser::{parse_who, WhoLine};
pub use runner::*;
