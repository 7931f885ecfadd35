//! Dovecot admin command configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `doveadm` invocation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoveadmConfig {
    /// Path or name of the doveadm binary
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Run doveadm through sudo
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,
    /// Path or name of the sudo binary
    #[serde(default = "default_sudo_binary")]
    pub sudo_binary: String,
    /// Per-invocation timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Kicks in flight at once during "terminate all"
    #[serde(default = "default_kick_concurrency")]
    pub kick_concurrency: usize,
}

fn default_binary() -> String {
    "doveadm".to_string()
}

fn default_use_sudo() -> bool {
    true
}

fn default_sudo_binary() -> String {
    "sudo".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_kick_concurrency() -> usize {
    4
}

impl Default for DoveadmConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            use_sudo: default_use_sudo(),
            sudo_binary: default_sudo_binary(),
            timeout_secs: default_timeout_secs(),
            kick_concurrency: default_kick_concurrency(),
        }
    }
}

impl DoveadmConfig {
    /// Program and argument vector for a doveadm subcommand.
    pub fn command(&self, args: &[&str]) -> (String, Vec<String>) {
        let args = args.iter().map(|a| a.to_string());
        if self.use_sudo {
            let mut full = vec![self.binary.clone()];
            full.extend(args);
            (self.sudo_binary.clone(), full)
        } else {
            (self.binary.clone(), args.collect())
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Concurrency for bulk kicks, never below one.
    pub fn kick_concurrency(&self) -> usize {
        self.kick_concurrency.max(1)
    }
}
