//! Session aggregation and termination for the active sessions engine.
//!
//! - Aggregator (local rows + Dovecot connections → one list)
//! - Termination (single local, single external, or everything)
//! - Enrichment (one-time user agent / location capture)
//! - Geolocation (IP → "City, Region, Country")

pub mod aggregator;
pub mod enrichment;
pub mod geo;
pub mod termination;


pub use aggregator::SessionAggregator;
pub use enrichment::{CaptureOutcome, EnrichmentConfig, EnrichmentGuard};
pub use geo::{
    resolver_from_config, DisabledResolver, GeoConfig, GeoResolver, IpApiResolver,
    DEFAULT_LOOKUP_CONCURRENCY,
};
pub use termination::*;
