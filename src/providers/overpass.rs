use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{PlaceProvider, ProviderOutcome, SearchParams, compose_address, first_label};
use crate::Result;
use crate::config::PlacesConfig;
use crate::http::read_json;
use crate::models::{GeoPoint, Place};

const PROVIDER: &str = "Overpass";
const QUERY_TIMEOUT_SECS: u32 = 10;

/// Tags that describe what a place is, most specific first
const CATEGORY_TAGS: [&str; 6] = ["amenity", "tourism", "leisure", "shop", "cuisine", "historic"];

/// Tags matched against the search terms
const MATCH_TAGS: [&str; 5] = ["name", "amenity", "cuisine", "tourism", "shop"];

const STOP_WORDS: [&str; 18] = [
    "the", "and", "for", "with", "best", "good", "great", "top", "cheap", "nice", "near", "around",
    "places", "place", "spots", "spot", "some", "find",
];

/// OpenStreetMap search through an Overpass API interpreter
pub struct OverpassProvider {
    client: Client,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: u64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<OverpassCenter>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct OverpassCenter {
    pub lat: f64,
    pub lon: f64,
}

impl OverpassElement {
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Nodes carry coordinates directly, ways and relations through `center`
    fn point(&self) -> Option<GeoPoint> {
        match (self.lat, self.lon, &self.center) {
            (Some(lat), Some(lon), _) => GeoPoint::new(lat, lon).ok(),
            (_, _, Some(center)) => GeoPoint::new(center.lat, center.lon).ok(),
            _ => None,
        }
    }

    fn address(&self) -> Option<String> {
        let street = compose_street(self.tag("addr:housenumber"), self.tag("addr:street"));
        compose_address([street.as_deref(), self.tag("addr:city"), self.tag("addr:postcode")])
    }

    /// Convert to the common shape; `None` for unnamed elements or missing coordinates
    #[must_use]
    pub fn into_place(self) -> Option<Place> {
        let name = self.tag("name").map(str::trim).filter(|n| !n.is_empty())?;
        let point = self.point()?;
        let category = first_label(CATEGORY_TAGS.iter().filter_map(|key| self.tag(key)));

        Some(
            Place::new(format!("osm:{}/{}", self.kind, self.id), name)
                .with_category(category.as_deref())
                .with_point(point)
                .with_address(self.address()),
        )
    }
}

fn compose_street(number: Option<&str>, street: Option<&str>) -> Option<String> {
    match (number, street) {
        (Some(number), Some(street)) => Some(format!("{number} {street}")),
        (None, Some(street)) => Some(street.to_string()),
        _ => None,
    }
}

/// Normalize an Overpass response, keeping provider order
#[must_use]
pub fn normalize(response: OverpassResponse) -> Vec<Place> {
    response
        .elements
        .into_iter()
        .filter_map(OverpassElement::into_place)
        .collect()
}

/// Words of the query worth matching against OSM tags.
///
/// Everything from an `in`/`near` marker onwards names the location, not the
/// thing searched for.
#[must_use]
pub fn search_terms(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    for word in query.split_whitespace() {
        let word = word.to_lowercase();
        if word == "in" || word == "near" {
            break;
        }
        let word: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if word.chars().count() >= 3 && !STOP_WORDS.contains(&word.as_str()) && !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Build an Overpass QL query for named places around `point`
#[must_use]
pub fn build_query(terms: &[String], point: GeoPoint, radius: u32, limit: u32) -> String {
    let around = format!("(around:{},{},{})", radius, point.lat, point.lng);
    let mut selectors = String::new();

    if terms.is_empty() {
        selectors.push_str(&format!("  nwr[\"name\"][\"amenity\"]{around};\n"));
    } else {
        // terms are alphanumeric only, so they are safe inside a regex literal
        let pattern = terms.join("|");
        for tag in MATCH_TAGS {
            selectors.push_str(&format!("  nwr[\"name\"][\"{tag}\"~\"{pattern}\",i]{around};\n"));
        }
    }

    format!("[out:json][timeout:{QUERY_TIMEOUT_SECS}];\n(\n{selectors});\nout center {limit};")
}

impl OverpassProvider {
    #[must_use]
    pub fn new(client: Client, config: &PlacesConfig) -> Self {
        Self {
            client,
            url: config.overpass_url.clone(),
        }
    }
}

#[async_trait]
impl PlaceProvider for OverpassProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn search(&self, params: &SearchParams) -> Result<ProviderOutcome> {
        let Some(point) = params.point else {
            debug!("Overpass needs coordinates, none available");
            return Ok(ProviderOutcome::Unavailable);
        };

        let query = build_query(&search_terms(&params.query), point, params.radius, params.limit);
        debug!(%query, "Querying Overpass");

        let response = self
            .client
            .post(&self.url)
            .form(&[("data", query.as_str())])
            .send()
            .await?;

        let body: OverpassResponse = read_json(PROVIDER, response).await?;
        let raw = body.elements.len();
        let places = normalize(body);
        info!(raw, kept = places.len(), "Overpass search finished");
        Ok(ProviderOutcome::Found(places))
    }
}
