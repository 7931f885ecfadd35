//! Local session store configuration.

use serde::{Deserialize, Serialize};

/// How far "terminate all" and listing reach into the session table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// Every row in the table, regardless of owner.
    #[default]
    Global,
    /// Only rows whose payload names the acting user.
    Actor,
}

/// Local session store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database URL, or `memory` for an in-process store
    pub url: String,
    /// Session table name
    #[serde(default = "default_table")]
    pub table: String,
    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Connection acquire timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Row scope for listing and bulk deletion
    #[serde(default)]
    pub scope: ScopeMode,
}

fn default_table() -> String {
    "session".to_string()
}

fn default_pool_size() -> u32 {
    5
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "mysql://roundcube@localhost/roundcube".to_string(),
            table: default_table(),
            pool_size: default_pool_size(),
            timeout_secs: default_timeout_secs(),
            scope: ScopeMode::default(),
        }
    }
}

impl StoreConfig {
    /// Whether the in-process store should be used instead of a database.
    pub fn is_memory(&self) -> bool {
        self.url.is_empty() || self.url == "memory"
    }
}
