//! Location phrase extraction and forward geocoding

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::RngExt;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::cache::BoundedTtlCache;
use crate::config::GeocodingConfig;
use crate::error::DiscoveryError;
use crate::http::{read_json, with_timeout};
use crate::models::GeoPoint;

const PROVIDER: &str = "Nominatim";

/// Resolves a free-text location to a single point
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, phrase: &str) -> Result<Option<GeoPoint>>;
}

/// Nominatim (`/search?format=json`) client
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    email: Option<String>,
}

/// Nominatim encodes coordinates as strings
#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    #[must_use]
    pub fn new(client: Client, config: &GeocodingConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
        }
    }

    fn search_url(&self, phrase: &str) -> String {
        let mut url = format!(
            "{}/search?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(phrase)
        );
        if let Some(email) = &self.email {
            url.push_str("&email=");
            url.push_str(&urlencoding::encode(email));
        }
        url
    }
}

fn first_point(results: Vec<NominatimResult>) -> Result<Option<GeoPoint>> {
    let Some(first) = results.into_iter().next() else {
        return Ok(None);
    };
    let lat: f64 = first
        .lat
        .trim()
        .parse()
        .map_err(|_| DiscoveryError::upstream(PROVIDER, format!("bad latitude {:?}", first.lat)))?;
    let lng: f64 = first
        .lon
        .trim()
        .parse()
        .map_err(|_| DiscoveryError::upstream(PROVIDER, format!("bad longitude {:?}", first.lon)))?;
    GeoPoint::new(lat, lng)
        .map(Some)
        .map_err(|e| DiscoveryError::upstream(PROVIDER, e.to_string()))
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, phrase: &str) -> Result<Option<GeoPoint>> {
        let response = self.client.get(self.search_url(phrase)).send().await?;
        let results: Vec<NominatimResult> = read_json(PROVIDER, response).await?;
        first_point(results)
    }
}

fn strip_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, ',' | '.' | '!' | '?' | ';' | ':'))
}

/// Guess which part of a search query names a place.
///
/// Tried in order: the words after the last `in`, the words after the last
/// `near`, the second word of a two-word query, the last two words of a longer
/// one. Single words, and a marker with nothing after it, yield nothing.
#[must_use]
pub fn extract_location_phrase(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(strip_punctuation)
        .filter(|t| !t.is_empty())
        .collect();

    for marker in ["in", "near"] {
        if let Some(i) = tokens.iter().rposition(|t| t.eq_ignore_ascii_case(marker)) {
            // a dangling marker names no place
            return (i + 1 < tokens.len()).then(|| tokens[i + 1..].join(" "));
        }
    }

    match tokens.len() {
        0 | 1 => None,
        2 => Some(tokens[1].to_string()),
        n => Some(tokens[n - 2..].join(" ")),
    }
}

fn normalize_phrase(phrase: &str) -> String {
    phrase.trim().to_lowercase()
}

/// Cached geocoding of location phrases. Never fails; misses resolve to `None`.
pub struct GeocodeResolver {
    geocoder: Arc<dyn Geocoder>,
    cache: Arc<BoundedTtlCache<String, GeoPoint>>,
    ttl: Duration,
    timeout: Duration,
}

impl GeocodeResolver {
    #[must_use]
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        cache: Arc<BoundedTtlCache<String, GeoPoint>>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            geocoder,
            cache,
            ttl,
            timeout,
        }
    }

    /// Extract a location phrase from `text` and geocode it
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve(&self, text: &str) -> Option<GeoPoint> {
        let Some(phrase) = extract_location_phrase(text) else {
            debug!("No location phrase found");
            return None;
        };
        self.resolve_phrase(&phrase).await
    }

    /// Geocode a phrase that is already known to be a location
    pub async fn resolve_phrase(&self, phrase: &str) -> Option<GeoPoint> {
        let key = normalize_phrase(phrase);
        if key.is_empty() {
            return None;
        }
        if let Some(point) = self.cache.get(&key) {
            return Some(point);
        }

        match with_timeout("geocode", self.timeout, self.geocoder.geocode(&key)).await {
            Ok(Some(point)) => {
                debug!(phrase = %key, lat = point.lat, lng = point.lng, "Geocoded location");
                self.cache.set(key, point, self.jittered_ttl());
                Some(point)
            }
            Ok(None) => {
                debug!(phrase = %key, "Geocoder found nothing");
                None
            }
            Err(e) => {
                warn!(phrase = %key, "Geocoding failed: {}", e);
                None
            }
        }
    }

    // Spread expiries so entries cached together do not all lapse together
    fn jittered_ttl(&self) -> Duration {
        let jitter: f64 = rand::rng().random_range(0.9..1.1);
        self.ttl.mul_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockGeocoder {
        point: Option<GeoPoint>,
        fail: bool,
        calls: AtomicUsize,
        phrases: Mutex<Vec<String>>,
    }

    impl MockGeocoder {
        fn returning(point: Option<GeoPoint>) -> Arc<Self> {
            Arc::new(Self {
                point,
                fail: false,
                calls: AtomicUsize::new(0),
                phrases: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                point: None,
                fail: true,
                calls: AtomicUsize::new(0),
                phrases: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Geocoder for MockGeocoder {
        async fn geocode(&self, phrase: &str) -> Result<Option<GeoPoint>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.phrases.lock().unwrap().push(phrase.to_string());
            if self.fail {
                return Err(DiscoveryError::upstream(PROVIDER, "status 503"));
            }
            Ok(self.point)
        }
    }

    fn build_resolver(geocoder: Arc<MockGeocoder>) -> GeocodeResolver {
        GeocodeResolver::new(
            geocoder,
            Arc::new(BoundedTtlCache::new("geocode", 16)),
            Duration::from_secs(3600),
            Duration::from_secs(8),
        )
    }

    const MIAMI: GeoPoint = GeoPoint { lat: 25.7617, lng: -80.1918 };

    #[rstest]
    #[case("clubs in Miami", Some("Miami"))]
    #[case("tacos in Mission San Francisco", Some("Mission San Francisco"))]
    #[case("things to do in winter in Paris", Some("Paris"))]
    #[case("coffee near Union Square", Some("Union Square"))]
    #[case("museums IN Berlin!", Some("Berlin"))]
    #[case("tacos sf", Some("sf"))]
    #[case("best tacos mission sf", Some("mission sf"))]
    #[case("tacos", None)]
    #[case("tacos in", None)]
    #[case("cheap eats near", None)]
    #[case("   ", None)]
    fn test_extract_location_phrase(#[case] text: &str, #[case] expected: Option<&str>) {
        assert_eq!(extract_location_phrase(text).as_deref(), expected);
    }

    #[tokio::test]
    async fn test_resolve_uses_phrase_and_caches() {
        let geocoder = MockGeocoder::returning(Some(MIAMI));
        let resolver = build_resolver(geocoder.clone());

        assert_eq!(resolver.resolve("clubs in Miami").await, Some(MIAMI));
        assert_eq!(resolver.resolve("bars in  MIAMI ").await, Some(MIAMI));

        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(geocoder.phrases.lock().unwrap().as_slice(), ["miami"]);
    }

    #[tokio::test]
    async fn test_single_word_makes_no_call() {
        let geocoder = MockGeocoder::returning(Some(MIAMI));
        let resolver = build_resolver(geocoder.clone());

        assert_eq!(resolver.resolve("tacos").await, None);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_resolve_to_none_and_are_not_cached() {
        let geocoder = MockGeocoder::failing();
        let resolver = build_resolver(geocoder.clone());

        assert_eq!(resolver.resolve("clubs in Miami").await, None);
        assert_eq!(resolver.resolve("clubs in Miami").await, None);
        assert_eq!(geocoder.calls.load(Ordering::SeqCst), 2);

        let empty = MockGeocoder::returning(None);
        assert_eq!(build_resolver(empty).resolve("clubs in Atlantis").await, None);
    }

    #[test]
    fn test_first_point_parsing() {
        let parsed: Vec<NominatimResult> =
            serde_json::from_str(r#"[{"lat":"25.7741728","lon":"-80.19362","display_name":"Miami"}]"#)
                .unwrap();
        let point = first_point(parsed).unwrap().unwrap();
        assert!((point.lat - 25.774_172_8).abs() < 1e-9);
        assert!((point.lng + 80.193_62).abs() < 1e-9);

        assert!(first_point(Vec::new()).unwrap().is_none());

        let garbage = vec![NominatimResult { lat: "north".into(), lon: "0".into() }];
        assert!(first_point(garbage).is_err());

        let out_of_range = vec![NominatimResult { lat: "95.0".into(), lon: "0".into() }];
        assert!(first_point(out_of_range).is_err());
    }

    #[test]
    fn test_search_url_encodes_phrase() {
        let config = GeocodingConfig {
            base_url: "https://geo.example.com/".into(),
            email: Some("ops@example.com".into()),
        };
        let geocoder = NominatimGeocoder::new(Client::new(), &config);
        assert_eq!(
            geocoder.search_url("mission sf"),
            "https://geo.example.com/search?q=mission%20sf&format=json&limit=1&email=ops%40example.com"
        );
    }
}
