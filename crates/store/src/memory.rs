//! In-process session store.
//!
//! Backs `store.url = "memory"` for development and is the store used by
//! the engine and router tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use sessions_core::{Error, LocalRow, Result, RowUpdate};
use std::sync::Arc;

use crate::store::{LocalSessionStore, StoreScope};

/// Session rows held in memory, in insertion order.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    rows: Arc<Mutex<Vec<LocalRow>>>,
    /// Number of `update_row` calls received.
    updates: Arc<Mutex<u64>>,
    /// Simulate connectivity failures if set.
    should_fail: Arc<Mutex<bool>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<LocalRow>) -> Self {
        let store = Self::new();
        *store.rows.lock() = rows;
        store
    }

    /// Insert or replace a row.
    pub fn insert(&self, row: LocalRow) {
        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|r| r.sess_id == row.sess_id) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
    }

    /// Snapshot of all rows.
    pub fn rows(&self) -> Vec<LocalRow> {
        self.rows.lock().clone()
    }

    pub fn row(&self, sess_id: &str) -> Option<LocalRow> {
        self.rows.lock().iter().find(|r| r.sess_id == sess_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Number of update calls issued against the store.
    pub fn update_count(&self) -> u64 {
        *self.updates.lock()
    }

    /// Set failure mode for testing error handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    fn check(&self) -> Result<()> {
        if *self.should_fail.lock() {
            return Err(Error::store("memory store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalSessionStore for MemorySessionStore {
    async fn list_with_user_agent(&self, scope: &StoreScope) -> Result<Vec<LocalRow>> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|row| row.has_user_agent() && scope.contains(row))
            .cloned()
            .collect())
    }

    async fn get_row(&self, sess_id: &str) -> Result<Option<LocalRow>> {
        self.check()?;
        Ok(self.row(sess_id))
    }

    async fn update_row(&self, sess_id: &str, update: &RowUpdate) -> Result<u64> {
        self.check()?;
        *self.updates.lock() += 1;

        let mut rows = self.rows.lock();
        match rows.iter_mut().find(|r| r.sess_id == sess_id) {
            Some(row) => {
                update.apply(row);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, sess_id: &str) -> Result<u64> {
        self.check()?;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| r.sess_id != sess_id);
        Ok((before - rows.len()) as u64)
    }

    async fn delete_all_with_payload(&self, scope: &StoreScope) -> Result<u64> {
        self.check()?;
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|r| !(r.has_payload() && scope.contains(r)));
        Ok((before - rows.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}
