//! Active Sessions Engine
//!
//! Lists and terminates a user's sessions across two backends:
//! - Roundcube sessions stored in the local `session` table
//! - Live Dovecot IMAP connections reported by `doveadm`

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState, EngineSettings};
use doveadm::{DoveadmClient, DoveadmConfig};
use session_engine::{resolver_from_config, EnrichmentConfig, GeoConfig};
use session_store::{LocalSessionStore, MemorySessionStore, MySqlSessionStore, ScopeMode, StoreConfig};
use telemetry::{health, init_tracing_from_env};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    store: StoreConfig,

    #[serde(default)]
    doveadm: DoveadmConfig,

    #[serde(default)]
    geo: GeoConfig,

    #[serde(default)]
    enrichment: EnrichmentConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            store: StoreConfig::default(),
            doveadm: DoveadmConfig::default(),
            geo: GeoConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting Active Sessions Engine v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    info!(
        store = if config.store.is_memory() { "memory" } else { "mysql" },
        table = %config.store.table,
        doveadm = %config.doveadm.binary,
        sudo = config.doveadm.use_sudo,
        geo_enabled = config.geo.enabled,
        "Loaded configuration"
    );

    if config.store.scope == ScopeMode::Global {
        warn!("store.scope = global: listing and terminate-all reach every user's local sessions");
    }

    let store: Arc<dyn LocalSessionStore> = if config.store.is_memory() {
        warn!("Using in-memory session store; sessions are not shared with the mail client");
        Arc::new(MemorySessionStore::new())
    } else {
        Arc::new(
            MySqlSessionStore::new(config.store.clone())
                .context("Failed to create session store")?,
        )
    };

    let doveadm = Arc::new(DoveadmClient::new(config.doveadm.clone()));

    let geo = resolver_from_config(&config.geo).context("Failed to create geolocation client")?;

    let state = AppState::new(
        store,
        doveadm,
        geo,
        EngineSettings {
            scope: config.store.scope,
            enrichment: config.enrichment.clone(),
            lookup_concurrency: config.geo.lookup_concurrency,
        },
    );

    check_health(&state).await;

    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::with_prefix("SESSIONS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Single-underscore spellings used by existing deployments
    if let Ok(url) = std::env::var("SESSIONS_STORE_URL") {
        config.store.url = url;
    }
    if let Ok(table) = std::env::var("SESSIONS_STORE_TABLE") {
        config.store.table = table;
    }
    if let Ok(binary) = std::env::var("SESSIONS_DOVEADM_BINARY") {
        config.doveadm.binary = binary;
    }
    if let Ok(base_url) = std::env::var("SESSIONS_GEO_BASE_URL") {
        config.geo.base_url = base_url;
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(state: &AppState) {
    state.refresh_health().await;

    if health().store.is_healthy() {
        info!("Session store: healthy");
    } else {
        error!("Session store: unhealthy");
    }

    if health().doveadm.is_healthy() {
        info!("doveadm: healthy");
    } else {
        // Local sessions still list and terminate without it.
        warn!("doveadm: unavailable, Dovecot sessions will be omitted");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
