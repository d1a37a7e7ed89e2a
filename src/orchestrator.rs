//! Search orchestration
//!
//! Runs one search through the pipeline: refine the query, locate it, ask the
//! provider chain, then enrich the results. Every stage absorbs its own
//! failures, so the only error a caller sees is a rejected request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, instrument};

use crate::Result;
use crate::cache::BoundedTtlCache;
use crate::config::DiscoveryConfig;
use crate::enrich::{EnrichContext, OpenversePhotos, PhotoProvider, ResultEnricher, UnsplashPhotos};
use crate::geocode::{GeocodeResolver, NominatimGeocoder};
use crate::http::build_client;
use crate::models::{SearchRequest, SearchResponse};
use crate::providers::{FoursquareProvider, OverpassProvider, SearchProviderChain};
use crate::refine::{ChatCompletion, OpenAiChatClient, QueryRefiner};

/// Query used by [`Orchestrator::diagnostics`]
pub const SAMPLE_QUERY: &str = "best tacos mission sf";

/// Which upstream credentials are present
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct Credentials {
    pub llm: bool,
    pub foursquare: bool,
    pub unsplash: bool,
}

impl Credentials {
    #[must_use]
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            llm: config.llm.api_key.is_some(),
            foursquare: config.places.foursquare_api_key.is_some(),
            unsplash: config.photos.unsplash_access_key.is_some(),
        }
    }
}

/// Snapshot for the debug endpoint
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Diagnostics {
    pub version: &'static str,
    pub credentials: Credentials,
    pub sample: String,
    pub refined: String,
}

pub struct Orchestrator {
    refiner: QueryRefiner,
    resolver: Arc<GeocodeResolver>,
    chain: SearchProviderChain,
    enricher: ResultEnricher,
    credentials: Credentials,
}

impl Orchestrator {
    /// Compose already-built stages. The resolver is shared with the chain.
    #[must_use]
    pub fn new(
        refiner: QueryRefiner,
        resolver: Arc<GeocodeResolver>,
        chain: SearchProviderChain,
        enricher: ResultEnricher,
    ) -> Self {
        Self {
            refiner,
            resolver,
            chain,
            enricher,
            credentials: Credentials::default(),
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Wire the real upstream clients and fresh caches from configuration
    pub fn from_config(config: &DiscoveryConfig) -> anyhow::Result<Self> {
        let timeouts = &config.timeouts;
        let client = build_client(timeouts.longest()).context("Failed to build HTTP client")?;

        let llm = OpenAiChatClient::from_config(client.clone(), &config.llm)
            .map(|llm| Arc::new(llm) as Arc<dyn ChatCompletion>);
        let refiner = QueryRefiner::new(llm, timeouts.llm(), config.llm.max_refined_chars);

        let geocode_cache = Arc::new(BoundedTtlCache::new("geocode", config.cache.geocode_max_entries));
        let resolver = Arc::new(GeocodeResolver::new(
            Arc::new(NominatimGeocoder::new(client.clone(), &config.geocoding)),
            geocode_cache,
            Duration::from_secs(config.cache.geocode_ttl_secs),
            timeouts.geocode(),
        ));

        let search_cache = Arc::new(BoundedTtlCache::new("search", config.cache.search_max_entries));
        let chain = SearchProviderChain::new(
            Arc::new(FoursquareProvider::new(client.clone(), &config.places)),
            Arc::new(OverpassProvider::new(client.clone(), &config.places)),
            resolver.clone(),
            search_cache,
            Duration::from_secs(config.cache.search_ttl_secs),
            timeouts.search(),
        );

        let photos: Vec<Arc<dyn PhotoProvider>> = vec![
            Arc::new(UnsplashPhotos::new(client.clone(), &config.photos)),
            Arc::new(OpenversePhotos::new(client, &config.photos)),
        ];
        let enricher = ResultEnricher::new(photos, timeouts.photo(), config.photos.concurrency);

        let credentials = Credentials::from_config(config);
        info!(
            llm = credentials.llm,
            foursquare = credentials.foursquare,
            unsplash = credentials.unsplash,
            "Search pipeline ready"
        );

        Ok(Self::new(refiner, resolver, chain, enricher).with_credentials(credentials))
    }

    /// Run a search. Fails only when the request itself is invalid.
    #[instrument(skip_all, fields(q = %request.q))]
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        request.validate()?;

        let refined = self.refiner.refine(&request.q).await;
        let point = match request.point() {
            Some(point) => Some(point),
            None => self.resolver.resolve(&refined).await,
        };

        let places = self
            .chain
            .search(&refined, point, request.limit, request.radius)
            .await;
        let items = self
            .enricher
            .enrich(
                places,
                EnrichContext {
                    refined: &refined,
                    origin: point,
                },
            )
            .await;

        info!(%refined, located = point.is_some(), count = items.len(), "Search finished");
        Ok(SearchResponse { refined, items })
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let mut credentials = self.credentials;
        credentials.llm = self.refiner.is_configured();
        Diagnostics {
            version: crate::VERSION,
            credentials,
            sample: SAMPLE_QUERY.to_string(),
            refined: self.refiner.refine(SAMPLE_QUERY).await,
        }
    }
}
