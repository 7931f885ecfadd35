//! Store trait shared by the MySQL and in-memory backends.

use async_trait::async_trait;
use sessions_core::{LocalRow, Result, RowUpdate};

use crate::config::ScopeMode;

/// Which rows a listing or bulk delete may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreScope {
    /// All rows (the host application's historical behaviour).
    Global,
    /// Rows owned by this username.
    Actor(String),
}

impl StoreScope {
    /// Resolve the configured mode for a given actor.
    pub fn for_actor(mode: ScopeMode, actor: &str) -> Self {
        match mode {
            ScopeMode::Global => Self::Global,
            ScopeMode::Actor => Self::Actor(actor.to_string()),
        }
    }

    /// Whether a row falls inside this scope.
    pub fn contains(&self, row: &LocalRow) -> bool {
        match self {
            Self::Global => true,
            Self::Actor(actor) => row.owner().as_deref() == Some(actor.as_str()),
        }
    }
}

/// Access to the local session table.
///
/// Implementations report connectivity problems as `Error::Store`; zero
/// affected rows is never an error.
#[async_trait]
pub trait LocalSessionStore: Send + Sync {
    /// Rows with a non-empty user agent, in storage order.
    async fn list_with_user_agent(&self, scope: &StoreScope) -> Result<Vec<LocalRow>>;

    /// Single row by session id.
    async fn get_row(&self, sess_id: &str) -> Result<Option<LocalRow>>;

    /// Apply a partial update. Returns rows affected.
    async fn update_row(&self, sess_id: &str, update: &RowUpdate) -> Result<u64>;

    /// Delete one row. Returns rows affected (0 when absent).
    async fn delete_one(&self, sess_id: &str) -> Result<u64>;

    /// Delete every row with a non-empty payload inside `scope`.
    async fn delete_all_with_payload(&self, scope: &StoreScope) -> Result<u64>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<()>;
}
