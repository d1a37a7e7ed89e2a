use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::{PlaceProvider, ProviderOutcome, SearchParams};
use crate::cache::BoundedTtlCache;
use crate::geocode::GeocodeResolver;
use crate::http::with_timeout;
use crate::models::{GeoPoint, Place, SearchKey};

/// Primary provider with a single fallback, fronted by a result cache
pub struct SearchProviderChain {
    primary: Arc<dyn PlaceProvider>,
    secondary: Arc<dyn PlaceProvider>,
    resolver: Arc<GeocodeResolver>,
    cache: Arc<BoundedTtlCache<SearchKey, Vec<Place>>>,
    ttl: Duration,
    timeout: Duration,
}

impl SearchProviderChain {
    #[must_use]
    pub fn new(
        primary: Arc<dyn PlaceProvider>,
        secondary: Arc<dyn PlaceProvider>,
        resolver: Arc<GeocodeResolver>,
        cache: Arc<BoundedTtlCache<SearchKey, Vec<Place>>>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            resolver,
            cache,
            ttl,
            timeout,
        }
    }

    /// Search for places, never failing; an empty list means nothing was found
    #[instrument(name = "provider_search", skip(self))]
    pub async fn search(
        &self,
        refined: &str,
        point: Option<GeoPoint>,
        limit: u32,
        radius: u32,
    ) -> Vec<Place> {
        let key = SearchKey::new(refined, point, limit, radius);
        if let Some(places) = self.cache.get(&key) {
            debug!(count = places.len(), "Serving search from cache");
            return places;
        }

        let mut params = SearchParams {
            query: refined.trim().to_string(),
            point,
            limit,
            radius,
        };

        let primary = self.ask(self.primary.as_ref(), &params).await;
        let (places, answered) = match primary {
            ProviderOutcome::Found(places) if !places.is_empty() => (places, true),
            primary => {
                if params.point.is_none() {
                    params.point = self.resolver.resolve(&params.query).await;
                }
                match self.ask(self.secondary.as_ref(), &params).await {
                    ProviderOutcome::Found(places) => (places, true),
                    ProviderOutcome::Unavailable => {
                        (Vec::new(), matches!(primary, ProviderOutcome::Found(_)))
                    }
                }
            }
        };

        let places = finalize(places, limit);
        if answered {
            self.cache.set(key, places.clone(), self.ttl);
        } else {
            // both providers unavailable; retry on the next request
            debug!("No provider answered, not caching");
        }
        places
    }

    /// Query one provider under the timeout; failures become `Unavailable`
    async fn ask(&self, provider: &dyn PlaceProvider, params: &SearchParams) -> ProviderOutcome {
        match with_timeout(provider.name(), self.timeout, provider.search(params)).await {
            Ok(outcome) => {
                if let ProviderOutcome::Found(places) = &outcome {
                    debug!(provider = provider.name(), count = places.len(), "Provider answered");
                } else {
                    debug!(provider = provider.name(), "Provider unavailable");
                }
                outcome
            }
            Err(e) => {
                warn!(provider = provider.name(), "Provider search failed: {}", e);
                ProviderOutcome::Unavailable
            }
        }
    }
}

/// Keep located places with unique ids, in provider order, up to `limit`
fn finalize(places: Vec<Place>, limit: u32) -> Vec<Place> {
    let mut seen = HashSet::new();
    places
        .into_iter()
        .filter(|place| place.point().is_some())
        .filter(|place| seen.insert(place.id.clone()))
        .take(limit as usize)
        .collect()
}
