//! One-time session enrichment.
//!
//! The first request after login records the browser user agent and the
//! resolved location on the session row. Afterwards the row is left alone:
//! the write happens at most once per session id.

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sessions_core::{AuthErrorCode, Error, Result, RowUpdate, UNKNOWN};
use session_store::{LocalSessionStore, ScopeMode, StoreScope};
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tracing::{debug, info};

use crate::geo::GeoResolver;

/// Enrichment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Server-reported agents shorter than this defer to the client value
    #[serde(default = "default_min_user_agent_len")]
    pub min_user_agent_len: usize,
    /// How long a captured session id is remembered in process
    #[serde(default = "default_guard_ttl_secs")]
    pub guard_ttl_secs: u64,
    /// Maximum remembered session ids
    #[serde(default = "default_guard_capacity")]
    pub guard_capacity: u64,
}

fn default_min_user_agent_len() -> usize {
    10
}

fn default_guard_ttl_secs() -> u64 {
    3600
}

fn default_guard_capacity() -> u64 {
    100_000
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            min_user_agent_len: default_min_user_agent_len(),
            guard_ttl_secs: default_guard_ttl_secs(),
            guard_capacity: default_guard_capacity(),
        }
    }
}

/// Result of a capture attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The row was updated with these values.
    Written { user_agent: String, location: String },
    /// Both fields were already present.
    AlreadyCaptured,
    /// No row exists for the session id.
    MissingSession,
}

impl CaptureOutcome {
    pub fn written(&self) -> bool {
        matches!(self, Self::Written { .. })
    }
}

/// Pick the user agent to record.
///
/// The server header wins unless it is empty or shorter than `min_len`, in
/// which case a non-empty client value replaces it. Nothing at all yields
/// `"Unknown"`.
pub fn choose_user_agent(server_ua: Option<&str>, client_ua: Option<&str>, min_len: usize) -> String {
    let server = server_ua.map(str::trim).unwrap_or_default();
    let client = client_ua.map(str::trim).filter(|c| !c.is_empty());

    let chosen = match client {
        Some(client) if server.len() < min_len => client,
        _ => server,
    };

    if chosen.is_empty() {
        UNKNOWN.to_string()
    } else {
        chosen.to_string()
    }
}

/// Performs the one-time user agent and location capture.
pub struct EnrichmentGuard {
    store: Arc<dyn LocalSessionStore>,
    geo: Arc<dyn GeoResolver>,
    config: EnrichmentConfig,
    scope: ScopeMode,
    /// Session ids already known to be enriched
    captured: Cache<String, ()>,
}

impl EnrichmentGuard {
    pub fn new(
        store: Arc<dyn LocalSessionStore>,
        geo: Arc<dyn GeoResolver>,
        config: EnrichmentConfig,
    ) -> Self {
        let captured = Cache::builder()
            .max_capacity(config.guard_capacity)
            .time_to_live(Duration::from_secs(config.guard_ttl_secs))
            .build();

        Self {
            store,
            geo,
            config,
            scope: ScopeMode::default(),
            captured,
        }
    }

    /// Under [`ScopeMode::Actor`] only the row's owner may capture it.
    pub fn with_scope(mut self, scope: ScopeMode) -> Self {
        self.scope = scope;
        self
    }

    /// Enrich `sess_id` if its user agent or location is still empty.
    ///
    /// Writes both fields in a single update, keeping whichever value was
    /// already stored. Store failures and foreign sessions are errors.
    pub async fn capture_once(
        &self,
        actor: &str,
        sess_id: &str,
        server_ua: Option<&str>,
        client_ua: Option<&str>,
    ) -> Result<CaptureOutcome> {
        if sess_id.is_empty() {
            return Ok(CaptureOutcome::MissingSession);
        }
        if self.captured.contains_key(sess_id) {
            return Ok(CaptureOutcome::AlreadyCaptured);
        }

        let Some(row) = self.store.get_row(sess_id).await? else {
            return Ok(CaptureOutcome::MissingSession);
        };
        if !StoreScope::for_actor(self.scope, actor).contains(&row) {
            return Err(Error::auth(
                AuthErrorCode::ForeignSession,
                "session belongs to another user",
            ));
        }

        let needs_user_agent = !row.has_user_agent();
        let needs_location = row.location.is_empty();

        if !needs_user_agent && !needs_location {
            self.captured.insert(sess_id.to_string(), ()).await;
            return Ok(CaptureOutcome::AlreadyCaptured);
        }

        let user_agent = if needs_user_agent {
            choose_user_agent(server_ua, client_ua, self.config.min_user_agent_len)
        } else {
            row.user_agent.clone()
        };
        let location = if needs_location {
            self.geo.resolve(&row.ip).await
        } else {
            row.location.clone()
        };

        let update = RowUpdate {
            user_agent: Some(user_agent.clone()),
            location: Some(location.clone()),
        };
        let affected = self.store.update_row(sess_id, &update).await?;
        metrics().enrichment_writes.inc();

        if affected == 0 {
            debug!(sess_id, "Session row vanished before enrichment");
        } else {
            info!(sess_id, user_agent = %user_agent, location = %location, "Session enriched");
        }

        self.captured.insert(sess_id.to_string(), ()).await;
        Ok(CaptureOutcome::Written {
            user_agent,
            location,
        })
    }
}
