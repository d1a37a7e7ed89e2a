//! Travel discovery - place search with query refinement, provider fallback
//! and photo enrichment
//!
//! A search is refined into a concise query, located, answered by Foursquare
//! or OpenStreetMap, and decorated with a photo and a short rationale.

pub mod api;
pub mod cache;
pub mod config;
pub mod enrich;
pub mod error;
pub mod geocode;
pub mod http;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod refine;
pub mod web;

// Re-export core types for public API
pub use cache::{BoundedTtlCache, Clock, ManualClock, SystemClock};
pub use config::DiscoveryConfig;
pub use enrich::{EnrichContext, Photo, PhotoProvider, ResultEnricher};
pub use error::DiscoveryError;
pub use geocode::{GeocodeResolver, Geocoder, extract_location_phrase};
pub use models::{GeoPoint, Place, SearchRequest, SearchResponse};
pub use orchestrator::{Diagnostics, Orchestrator};
pub use providers::{PlaceProvider, ProviderOutcome, SearchParams, SearchProviderChain};
pub use refine::{ChatCompletion, QueryRefiner};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
