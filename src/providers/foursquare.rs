use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{PlaceProvider, ProviderOutcome, SearchParams, compose_address, first_label};
use crate::Result;
use crate::config::PlacesConfig;
use crate::http::read_json;
use crate::models::{GeoPoint, Place};

const PROVIDER: &str = "Foursquare";
const FIELDS: &str = "fsq_id,name,categories,geocodes,location,rating,popularity";
const MAX_LIMIT: u32 = 50;
const MAX_RADIUS_M: u32 = 100_000;

/// Foursquare Places API v3 client
pub struct FoursquareProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

/// Search response from Foursquare
#[derive(Debug, Default, Deserialize)]
pub struct FoursquareResponse {
    #[serde(default)]
    pub results: Vec<FoursquarePlace>,
}

#[derive(Debug, Deserialize)]
pub struct FoursquarePlace {
    pub fsq_id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub categories: Vec<FoursquareCategory>,
    pub geocodes: Option<FoursquareGeocodes>,
    pub location: Option<FoursquareLocation>,
    pub rating: Option<f64>,
    pub popularity: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct FoursquareCategory {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FoursquareGeocodes {
    pub main: Option<FoursquareLatLng>,
}

#[derive(Debug, Deserialize)]
pub struct FoursquareLatLng {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FoursquareLocation {
    pub formatted_address: Option<String>,
    pub address: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

impl FoursquareLocation {
    fn display(&self) -> Option<String> {
        if let Some(formatted) = self.formatted_address.as_deref().map(str::trim) {
            if !formatted.is_empty() {
                return Some(formatted.to_string());
            }
        }
        compose_address([
            self.address.as_deref(),
            self.locality.as_deref(),
            self.region.as_deref(),
            self.postcode.as_deref(),
            self.country.as_deref(),
        ])
    }
}

impl FoursquarePlace {
    /// Convert to the common shape; `None` when id, name or coordinates are missing
    #[must_use]
    pub fn into_place(self) -> Option<Place> {
        let id = self.fsq_id.filter(|id| !id.is_empty())?;
        let name = self.name.filter(|name| !name.trim().is_empty())?;
        let main = self.geocodes.and_then(|g| g.main)?;
        let point = GeoPoint::new(main.latitude?, main.longitude?).ok()?;

        let category = first_label(self.categories.iter().filter_map(|c| c.name.as_deref()));
        let address = self.location.as_ref().and_then(FoursquareLocation::display);

        Some(
            Place::new(format!("fsq:{id}"), name.trim())
                .with_category(category.as_deref())
                .with_rating(self.rating)
                .with_point(point)
                .with_address(address),
        )
    }
}

/// Normalize a Foursquare response, keeping provider order
#[must_use]
pub fn normalize(response: FoursquareResponse) -> Vec<Place> {
    response
        .results
        .into_iter()
        .filter_map(FoursquarePlace::into_place)
        .collect()
}

impl FoursquareProvider {
    #[must_use]
    pub fn new(client: Client, config: &PlacesConfig) -> Self {
        Self {
            client,
            api_key: config.foursquare_api_key.clone(),
            base_url: config.foursquare_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, params: &SearchParams) -> String {
        let mut url = format!(
            "{}/places/search?query={}&limit={}&radius={}&fields={}",
            self.base_url,
            urlencoding::encode(&params.query),
            params.limit.clamp(1, MAX_LIMIT),
            params.radius.min(MAX_RADIUS_M),
            FIELDS
        );
        if let Some(point) = params.point {
            url.push_str(&format!("&ll={},{}", point.lat, point.lng));
        }
        url
    }
}

#[async_trait]
impl PlaceProvider for FoursquareProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search(&self, params: &SearchParams) -> Result<ProviderOutcome> {
        let Some(api_key) = &self.api_key else {
            debug!("No Foursquare API key configured");
            return Ok(ProviderOutcome::Unavailable);
        };

        let response = self
            .client
            .get(self.search_url(params))
            .header("Authorization", api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let body: FoursquareResponse = read_json(PROVIDER, response).await?;
        let raw = body.results.len();
        let places = normalize(body);
        info!(raw, kept = places.len(), "Foursquare search finished");
        Ok(ProviderOutcome::Found(places))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "results": [
            {
                "fsq_id": "4a1b",
                "name": "La Taqueria",
                "categories": [{"id": 13306, "name": "Taco Restaurant"}, {"id": 1, "name": "Mexican"}],
                "geocodes": {"main": {"latitude": 37.7509, "longitude": -122.4181}},
                "location": {"address": "2889 Mission St", "locality": "San Francisco", "region": "CA"},
                "rating": 9.1,
                "popularity": 0.98
            },
            {
                "fsq_id": "5c2d",
                "name": "El Farolito",
                "categories": [],
                "geocodes": {"main": {"latitude": 37.7526, "longitude": -122.4183}},
                "location": {"formatted_address": "2779 Mission St, San Francisco, CA 94110"}
            },
            {
                "fsq_id": "6e3f",
                "name": "No Coordinates Cantina",
                "location": {"address": "1 Nowhere"}
            }
        ]
    }"#;

    #[test]
    fn test_normalize_sample() {
        let response: FoursquareResponse = serde_json::from_str(SAMPLE).unwrap();
        let places = normalize(response);

        assert_eq!(places.len(), 2, "results without coordinates are dropped");

        let first = &places[0];
        assert_eq!(first.id, "fsq:4a1b");
        assert_eq!(first.name, "La Taqueria");
        assert_eq!(first.category, "Taco Restaurant");
        assert_eq!(first.rating, Some(9.1));
        assert_eq!(first.lat(), Some(37.7509));
        assert_eq!(first.address.as_deref(), Some("2889 Mission St, San Francisco, CA"));

        let second = &places[1];
        assert_eq!(second.category, "poi");
        assert_eq!(
            second.address.as_deref(),
            Some("2779 Mission St, San Francisco, CA 94110")
        );
        assert!(second.rating.is_none());
    }

    #[test]
    fn test_missing_results_field() {
        let response: FoursquareResponse = serde_json::from_str("{}").unwrap();
        assert!(normalize(response).is_empty());
    }

    #[test]
    fn test_search_url() {
        let config = PlacesConfig {
            foursquare_api_key: Some("fsq-key".into()),
            foursquare_base_url: "https://fsq.example.com/v3/".into(),
            ..PlacesConfig::default()
        };
        let provider = FoursquareProvider::new(Client::new(), &config);
        let params = SearchParams {
            query: "tacos in Mission".into(),
            point: Some(GeoPoint { lat: 37.75, lng: -122.41 }),
            limit: 80,
            radius: 6000,
        };
        assert_eq!(
            provider.search_url(&params),
            format!(
                "https://fsq.example.com/v3/places/search?query=tacos%20in%20Mission&limit=50&radius=6000&fields={FIELDS}&ll=37.75,-122.41"
            )
        );
    }

    #[tokio::test]
    async fn test_unavailable_without_key() {
        let provider = FoursquareProvider::new(Client::new(), &PlacesConfig::default());
        let params = SearchParams {
            query: "tacos".into(),
            point: None,
            limit: 20,
            radius: 6000,
        };
        assert_eq!(provider.search(&params).await.unwrap(), ProviderOutcome::Unavailable);
    }
}
