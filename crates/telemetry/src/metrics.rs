//! In-process metrics.
//!
//! Counters for every degraded path (decode, lookup, enumeration, kick,
//! store) so partial failures stay visible even though callers never see
//! them as errors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (last observed value).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the session engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Listing
    pub list_requests: Counter,
    pub local_sessions_listed: Counter,
    pub external_sessions_listed: Counter,
    pub payload_decode_failures: Counter,

    // Geolocation
    pub geo_lookups: Counter,
    pub geo_lookup_failures: Counter,

    // Dovecot
    pub enumeration_failures: Counter,
    pub who_lines_skipped: Counter,
    pub kicks_succeeded: Counter,
    pub kicks_failed: Counter,

    // Local store
    pub local_sessions_deleted: Counter,
    pub store_errors: Counter,
    pub enrichment_writes: Counter,

    // Latency histograms
    pub list_latency_ms: Histogram,
    pub geo_latency_ms: Histogram,
    pub doveadm_latency_ms: Histogram,

    // Gauges
    pub last_list_size: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub list_requests: u64,
    pub local_sessions_listed: u64,
    pub external_sessions_listed: u64,
    pub payload_decode_failures: u64,
    pub geo_lookups: u64,
    pub geo_lookup_failures: u64,
    pub enumeration_failures: u64,
    pub who_lines_skipped: u64,
    pub kicks_succeeded: u64,
    pub kicks_failed: u64,
    pub local_sessions_deleted: u64,
    pub store_errors: u64,
    pub enrichment_writes: u64,
    pub list_latency_mean_ms: f64,
    pub geo_latency_mean_ms: f64,
    pub doveadm_latency_mean_ms: f64,
    pub last_list_size: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            list_requests: self.list_requests.get(),
            local_sessions_listed: self.local_sessions_listed.get(),
            external_sessions_listed: self.external_sessions_listed.get(),
            payload_decode_failures: self.payload_decode_failures.get(),
            geo_lookups: self.geo_lookups.get(),
            geo_lookup_failures: self.geo_lookup_failures.get(),
            enumeration_failures: self.enumeration_failures.get(),
            who_lines_skipped: self.who_lines_skipped.get(),
            kicks_succeeded: self.kicks_succeeded.get(),
            kicks_failed: self.kicks_failed.get(),
            local_sessions_deleted: self.local_sessions_deleted.get(),
            store_errors: self.store_errors.get(),
            enrichment_writes: self.enrichment_writes.get(),
            list_latency_mean_ms: self.list_latency_ms.mean(),
            geo_latency_mean_ms: self.geo_latency_ms.mean(),
            doveadm_latency_mean_ms: self.doveadm_latency_ms.mean(),
            last_list_size: self.last_list_size.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
