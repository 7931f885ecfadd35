//! MySQL-backed session store.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use regex::Regex;
use sessions_core::{Error, LocalRow, Result, RowUpdate};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::sync::LazyLock;
use std::time::Duration;
use telemetry::metrics;
use tracing::{debug, error, info};

use crate::config::StoreConfig;
use crate::store::{LocalSessionStore, StoreScope};

/// Table names are interpolated into SQL, so keep them to identifiers.
static TABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,64}$").expect("invalid table pattern"));

const COLUMNS: &str = "sess_id, changed, ip, vars, user_agent, location";

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    sess_id: String,
    changed: Option<NaiveDateTime>,
    ip: Option<String>,
    vars: Option<String>,
    user_agent: Option<String>,
    location: Option<String>,
}

impl From<SessionRow> for LocalRow {
    fn from(row: SessionRow) -> Self {
        Self {
            sess_id: row.sess_id,
            ip: row.ip.unwrap_or_default(),
            changed: row.changed.map(|c| c.and_utc()),
            vars: row.vars.unwrap_or_default(),
            user_agent: row.user_agent.unwrap_or_default(),
            location: row.location.unwrap_or_default(),
        }
    }
}

/// Session store over the host application's MySQL `session` table.
#[derive(Clone)]
pub struct MySqlSessionStore {
    pool: MySqlPool,
    config: StoreConfig,
}

impl MySqlSessionStore {
    /// Creates a store with a lazily connecting pool.
    pub fn new(config: StoreConfig) -> Result<Self> {
        if !TABLE_REGEX.is_match(&config.table) {
            return Err(Error::config(format!(
                "invalid session table name: {:?}",
                config.table
            )));
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.timeout_secs))
            .connect_lazy(&config.url)
            .map_err(|e| Error::config(format!("invalid store url: {}", e)))?;

        info!(
            table = %config.table,
            pool_size = config.pool_size,
            scope = ?config.scope,
            "Created MySQL session store"
        );

        Ok(Self { pool, config })
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn table(&self) -> &str {
        &self.config.table
    }
}

fn store_error(op: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| {
        metrics().store_errors.inc();
        error!(op, error = %e, "Session store query failed");
        Error::store(format!("{}: {}", op, e))
    }
}

#[async_trait]
impl LocalSessionStore for MySqlSessionStore {
    async fn list_with_user_agent(&self, scope: &StoreScope) -> Result<Vec<LocalRow>> {
        let sql = format!(
            "SELECT {} FROM `{}` WHERE user_agent IS NOT NULL AND user_agent != ''",
            COLUMNS,
            self.table()
        );

        let rows: Vec<SessionRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error("list"))?;

        Ok(rows
            .into_iter()
            .map(LocalRow::from)
            .filter(|row| scope.contains(row))
            .collect())
    }

    async fn get_row(&self, sess_id: &str) -> Result<Option<LocalRow>> {
        let sql = format!("SELECT {} FROM `{}` WHERE sess_id = ?", COLUMNS, self.table());

        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(sess_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error("get"))?;

        Ok(row.map(LocalRow::from))
    }

    async fn update_row(&self, sess_id: &str, update: &RowUpdate) -> Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut assignments = Vec::new();
        if update.user_agent.is_some() {
            assignments.push("user_agent = ?");
        }
        if update.location.is_some() {
            assignments.push("location = ?");
        }
        let sql = format!(
            "UPDATE `{}` SET {} WHERE sess_id = ?",
            self.table(),
            assignments.join(", ")
        );

        let mut query = sqlx::query(&sql);
        if let Some(ref ua) = update.user_agent {
            query = query.bind(ua.as_str());
        }
        if let Some(ref location) = update.location {
            query = query.bind(location.as_str());
        }

        let result = query
            .bind(sess_id)
            .execute(&self.pool)
            .await
            .map_err(store_error("update"))?;

        debug!(sess_id, rows = result.rows_affected(), "Updated session row");
        Ok(result.rows_affected())
    }

    async fn delete_one(&self, sess_id: &str) -> Result<u64> {
        let sql = format!("DELETE FROM `{}` WHERE sess_id = ?", self.table());

        let result = sqlx::query(&sql)
            .bind(sess_id)
            .execute(&self.pool)
            .await
            .map_err(store_error("delete"))?;

        Ok(result.rows_affected())
    }

    async fn delete_all_with_payload(&self, scope: &StoreScope) -> Result<u64> {
        match scope {
            StoreScope::Global => {
                let sql = format!(
                    "DELETE FROM `{}` WHERE vars IS NOT NULL AND vars != ''",
                    self.table()
                );
                let result = sqlx::query(&sql)
                    .execute(&self.pool)
                    .await
                    .map_err(store_error("delete_all"))?;
                Ok(result.rows_affected())
            }
            StoreScope::Actor(_) => {
                // Ownership lives inside the encoded payload, so filter in process.
                let sql = format!(
                    "SELECT {} FROM `{}` WHERE vars IS NOT NULL AND vars != ''",
                    COLUMNS,
                    self.table()
                );
                let rows: Vec<SessionRow> = sqlx::query_as(&sql)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(store_error("delete_all"))?;

                let mut deleted = 0;
                for row in rows.into_iter().map(LocalRow::from) {
                    if scope.contains(&row) {
                        deleted += self.delete_one(&row.sess_id).await?;
                    }
                }
                Ok(deleted)
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(store_error("ping"))?;
        Ok(())
    }
}
