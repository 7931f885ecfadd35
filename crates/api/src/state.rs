//! Application state shared across handlers.

use doveadm::DoveadmClient;
use session_engine::{
    EnrichmentConfig, EnrichmentGuard, GeoResolver, SessionAggregator, TerminationDispatcher,
    DEFAULT_LOOKUP_CONCURRENCY,
};
use session_store::{LocalSessionStore, ScopeMode};
use std::sync::Arc;
use telemetry::health;

/// Engine knobs that are not owned by a single backend.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub scope: ScopeMode,
    pub enrichment: EnrichmentConfig,
    /// Geolocation lookups in flight per listing
    pub lookup_concurrency: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scope: ScopeMode::default(),
            enrichment: EnrichmentConfig::default(),
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<SessionAggregator>,
    pub dispatcher: Arc<TerminationDispatcher>,
    pub enrichment: Arc<EnrichmentGuard>,
    store: Arc<dyn LocalSessionStore>,
    doveadm: Arc<DoveadmClient>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn LocalSessionStore>,
        doveadm: Arc<DoveadmClient>,
        geo: Arc<dyn GeoResolver>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            aggregator: Arc::new(
                SessionAggregator::new(store.clone(), doveadm.clone(), geo.clone(), settings.scope)
                    .with_lookup_concurrency(settings.lookup_concurrency),
            ),
            dispatcher: Arc::new(TerminationDispatcher::new(
                store.clone(),
                doveadm.clone(),
                settings.scope,
            )),
            enrichment: Arc::new(
                EnrichmentGuard::new(store.clone(), geo, settings.enrichment)
                    .with_scope(settings.scope),
            ),
            store,
            doveadm,
        }
    }

    /// Probe both backends and record the result in the health registry.
    pub async fn refresh_health(&self) {
        let (store_ok, doveadm_ok) = tokio::join!(
            session_store::health::check_connection(self.store.as_ref()),
            doveadm::health::check_connection(&self.doveadm),
        );

        health().store.set(store_ok, "session store unreachable");
        health().doveadm.set(doveadm_ok, "doveadm who failed");
    }
}
