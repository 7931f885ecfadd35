//! Unified session listing.

use doveadm::DoveadmClient;
use futures::stream::{self, StreamExt};
use sessions_core::{
    payload, ExternalRecord, ExternalSession, LocalRow, LocalSession, RowUpdate, SessionRecord,
    Vars, UNKNOWN,
};
use session_store::{LocalSessionStore, ScopeMode, StoreScope};
use std::sync::Arc;
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, instrument, warn};

use crate::geo::{GeoResolver, DEFAULT_LOOKUP_CONCURRENCY};

/// Merges local rows and Dovecot connections into one list.
///
/// Local sessions come first, in storage order, followed by external
/// sessions in `doveadm who` order. A failing backend contributes nothing.
/// At most `lookup_concurrency` geolocation lookups run at once.
pub struct SessionAggregator {
    store: Arc<dyn LocalSessionStore>,
    doveadm: Arc<DoveadmClient>,
    geo: Arc<dyn GeoResolver>,
    scope: ScopeMode,
    lookup_concurrency: usize,
}

impl SessionAggregator {
    pub fn new(
        store: Arc<dyn LocalSessionStore>,
        doveadm: Arc<DoveadmClient>,
        geo: Arc<dyn GeoResolver>,
        scope: ScopeMode,
    ) -> Self {
        Self {
            store,
            doveadm,
            geo,
            scope,
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
        }
    }

    pub fn with_lookup_concurrency(mut self, limit: usize) -> Self {
        self.lookup_concurrency = limit.max(1);
        self
    }

    #[instrument(skip(self))]
    pub async fn list_sessions(&self, actor: &str) -> Vec<SessionRecord> {
        let start = Instant::now();
        metrics().list_requests.inc();

        let mut sessions = self.local_sessions(actor).await;
        let local_count = sessions.len();
        sessions.extend(self.external_sessions(actor).await);
        let external_count = sessions.len() - local_count;

        metrics().local_sessions_listed.inc_by(local_count as u64);
        metrics().external_sessions_listed.inc_by(external_count as u64);
        metrics().last_list_size.set(sessions.len() as u64);
        metrics()
            .list_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        debug!(
            local = local_count,
            external = external_count,
            "Listed sessions"
        );
        sessions
    }

    async fn local_sessions(&self, actor: &str) -> Vec<SessionRecord> {
        let scope = StoreScope::for_actor(self.scope, actor);
        let rows = match self.store.list_with_user_agent(&scope).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Local session listing failed");
                return Vec::new();
            }
        };

        stream::iter(rows.into_iter().map(|row| async move { self.local_session(&row).await }))
            .buffered(self.lookup_concurrency)
            .collect()
            .await
    }

    async fn local_session(&self, row: &LocalRow) -> SessionRecord {
        let vars = match payload::try_decode(&row.vars) {
            Ok(vars) => vars,
            Err(e) => {
                if row.has_payload() {
                    metrics().payload_decode_failures.inc();
                    debug!(sess_id = %row.sess_id, error = %e, "Session payload not decodable");
                }
                Vars::new()
            }
        };

        let location = if row.location.is_empty() {
            self.resolve_and_persist(row).await
        } else {
            row.location.clone()
        };

        SessionRecord::Local(LocalSession::with_vars(row, &vars, location))
    }

    /// Resolve a missing location and store it on the row. Failed lookups
    /// are not stored so the next listing retries them.
    async fn resolve_and_persist(&self, row: &LocalRow) -> String {
        let location = self.geo.resolve(&row.ip).await;
        if location == UNKNOWN {
            debug!(sess_id = %row.sess_id, "Location unresolved, not persisting");
            return location;
        }
        if let Err(e) = self
            .store
            .update_row(&row.sess_id, &RowUpdate::location(location.clone()))
            .await
        {
            warn!(sess_id = %row.sess_id, error = %e, "Failed to persist resolved location");
        }
        location
    }

    async fn external_sessions(&self, actor: &str) -> Vec<SessionRecord> {
        let records = self.doveadm.list_for_actor(actor).await;
        stream::iter(records.into_iter().map(|record| self.external_session(record)))
            .buffered(self.lookup_concurrency)
            .collect()
            .await
    }

    async fn external_session(&self, record: ExternalRecord) -> SessionRecord {
        let location = self.geo.resolve(&record.ip).await;
        SessionRecord::External(ExternalSession::from_record(record, location))
    }
}
