//! IP geolocation.
//!
//! Resolves an address to a "City, Region, Country" label through the
//! ip-api.com JSON endpoint. Every failure collapses to `"Unknown"`, so a
//! flaky lookup service never blocks a session listing.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sessions_core::{validate_ip, Error, Result, UNKNOWN};
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tracing::{debug, warn};
use url::Url;

/// Geolocation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Lookup service root; `json/{ip}` is appended
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-lookup timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Disable to report every location as unknown
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Lookups in flight per listing
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
}

/// ip-api.com's free tier allows 45 requests a minute.
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 4;

fn default_base_url() -> String {
    "http://ip-api.com".to_string()
}

fn default_timeout_secs() -> u64 {
    3
}

fn default_enabled() -> bool {
    true
}

fn default_lookup_concurrency() -> usize {
    DEFAULT_LOOKUP_CONCURRENCY
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            enabled: default_enabled(),
            lookup_concurrency: default_lookup_concurrency(),
        }
    }
}

/// Maps an IP address to a human-readable location.
#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Never fails; unresolvable addresses yield `"Unknown"`.
    async fn resolve(&self, ip: &str) -> String;
}

/// ip-api.com response body.
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    city: String,
    #[serde(default, rename = "regionName")]
    region_name: String,
    #[serde(default)]
    country: String,
}

impl IpApiResponse {
    fn into_location(self) -> Result<String> {
        if self.status != "success" {
            return Err(Error::lookup(format!(
                "lookup status {}: {}",
                self.status,
                self.message.unwrap_or_default()
            )));
        }
        Ok(format!("{}, {}, {}", self.city, self.region_name, self.country))
    }
}

/// Resolver backed by the ip-api.com JSON API.
pub struct IpApiResolver {
    base_url: Url,
    http: reqwest::Client,
}

impl IpApiResolver {
    pub fn new(config: &GeoConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::config(format!("invalid geo.base_url: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, http })
    }

    /// Resolves `ip`, reporting why a lookup failed.
    pub async fn lookup(&self, ip: &str) -> Result<String> {
        let addr = validate_ip(ip)?;
        let url = self
            .base_url
            .join(&format!("json/{}", addr))
            .map_err(|e| Error::lookup(format!("bad lookup URL: {}", e)))?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::lookup(format!("request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| Error::lookup(format!("lookup service error: {}", e)))?;

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| Error::lookup(format!("malformed response: {}", e)))?;

        body.into_location()
    }
}

#[async_trait]
impl GeoResolver for IpApiResolver {
    async fn resolve(&self, ip: &str) -> String {
        let start = Instant::now();
        metrics().geo_lookups.inc();

        let result = self.lookup(ip).await;
        metrics()
            .geo_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match result {
            Ok(location) => {
                debug!(ip, location = %location, "Resolved location");
                location
            }
            Err(e) => {
                metrics().geo_lookup_failures.inc();
                warn!(ip, error = %e, "Location lookup failed");
                UNKNOWN.to_string()
            }
        }
    }
}

/// Resolver used when lookups are switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledResolver;

#[async_trait]
impl GeoResolver for DisabledResolver {
    async fn resolve(&self, _ip: &str) -> String {
        UNKNOWN.to_string()
    }
}

/// Build the resolver selected by `config`.
pub fn resolver_from_config(config: &GeoConfig) -> Result<Arc<dyn GeoResolver>> {
    if config.enabled {
        Ok(Arc::new(IpApiResolver::new(config)?))
    } else {
        Ok(Arc::new(DisabledResolver))
    }
}
