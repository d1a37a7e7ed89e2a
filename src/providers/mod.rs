//! Place search providers
//!
//! - Foursquare Places: primary, needs an API key
//! - Overpass (OpenStreetMap): keyless fallback, needs coordinates
//! - Chain: primary-then-secondary with a result cache

pub mod chain;
pub mod foursquare;
pub mod overpass;

use async_trait::async_trait;

use crate::Result;
use crate::models::{GeoPoint, Place};

pub use chain::SearchProviderChain;
pub use foursquare::FoursquareProvider;
pub use overpass::OverpassProvider;

/// What a provider is asked for
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub query: String,
    pub point: Option<GeoPoint>,
    pub limit: u32,
    /// Radius in meters
    pub radius: u32,
}

/// Result of asking one provider
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderOutcome {
    /// The provider could not be queried at all (no credentials, no coordinates, failure)
    Unavailable,
    /// The provider answered; the list may be empty
    Found(Vec<Place>),
}

impl ProviderOutcome {
    /// Places worth returning, or `None` when the next provider should be asked
    #[must_use]
    pub fn into_non_empty(self) -> Option<Vec<Place>> {
        match self {
            ProviderOutcome::Found(places) if !places.is_empty() => Some(places),
            _ => None,
        }
    }
}

#[async_trait]
pub trait PlaceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Query the provider. Missing prerequisites are `Ok(Unavailable)`, not errors.
    async fn search(&self, params: &SearchParams) -> Result<ProviderOutcome>;
}

/// First label of a possibly nested, `;`-separated category list
pub(crate) fn first_label<'a, I>(labels: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    labels
        .into_iter()
        .flat_map(|label| label.split(';'))
        .map(str::trim)
        .find(|label| !label.is_empty())
        .map(str::to_string)
}

/// Join the non-blank parts of an address with `", "`
pub(crate) fn compose_address<'a, I>(parts: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let parts: Vec<&str> = parts
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}
