//! Result enrichment: a photo and a one-line rationale for every place

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::Result;
use crate::config::PhotosConfig;
use crate::http::{read_json, with_timeout};
use crate::models::{GeoPoint, Place};

pub const PLACEHOLDER_CREDIT: &str = "Unsplash";

const PLACEHOLDER_PHOTOS: [&str; 6] = [
    "https://images.unsplash.com/photo-1488646953014-85cb44e25828?w=900&fit=crop",
    "https://images.unsplash.com/photo-1506744038136-46273834b3fb?w=900&fit=crop",
    "https://images.unsplash.com/photo-1469474968028-56623f02e42e?w=900&fit=crop",
    "https://images.unsplash.com/photo-1476514525535-07fb3b4ae5f1?w=900&fit=crop",
    "https://images.unsplash.com/photo-1501785888041-af3ef285b470?w=900&fit=crop",
    "https://images.unsplash.com/photo-1507525428034-b723cf961d3e?w=900&fit=crop",
];

/// An image and who to credit for it
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub url: String,
    pub credit: String,
}

/// Looks up a representative photo by place name
#[async_trait]
pub trait PhotoProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when nothing matched or the provider is not configured
    async fn find(&self, query: &str) -> Result<Option<Photo>>;
}

/// Unsplash photo search. Needs an access key.
pub struct UnsplashPhotos {
    client: Client,
    access_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UnsplashSearch {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    urls: UnsplashUrls,
    user: Option<UnsplashUser>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    regular: Option<String>,
    small: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUser {
    name: Option<String>,
}

impl UnsplashPhotos {
    #[must_use]
    pub fn new(client: Client, config: &PhotosConfig) -> Self {
        Self {
            client,
            access_key: config.unsplash_access_key.clone(),
            base_url: config.unsplash_base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn unsplash_photo(search: UnsplashSearch) -> Option<Photo> {
    let first = search.results.into_iter().next()?;
    let url = first.urls.regular.or(first.urls.small)?;
    let author = first
        .user
        .and_then(|u| u.name)
        .unwrap_or_else(|| "Unknown".to_string());
    Some(Photo {
        url,
        credit: format!("Photo by {author} on Unsplash"),
    })
}

#[async_trait]
impl PhotoProvider for UnsplashPhotos {
    fn name(&self) -> &'static str {
        "Unsplash"
    }

    async fn find(&self, query: &str) -> Result<Option<Photo>> {
        let Some(key) = &self.access_key else {
            return Ok(None);
        };
        let url = format!(
            "{}/search/photos?query={}&per_page=1&orientation=landscape",
            self.base_url,
            urlencoding::encode(query)
        );
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Client-ID {key}"))
            .header("Accept-Version", "v1")
            .send()
            .await?;
        let search: UnsplashSearch = read_json("Unsplash", response).await?;
        Ok(unsplash_photo(search))
    }
}

/// Openverse image search. Keyless.
pub struct OpenversePhotos {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OpenverseSearch {
    #[serde(default)]
    results: Vec<OpenverseImage>,
}

#[derive(Debug, Deserialize)]
struct OpenverseImage {
    url: Option<String>,
    thumbnail: Option<String>,
    creator: Option<String>,
    license: Option<String>,
}

impl OpenversePhotos {
    #[must_use]
    pub fn new(client: Client, config: &PhotosConfig) -> Self {
        Self {
            client,
            base_url: config.openverse_base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn openverse_photo(search: OpenverseSearch) -> Option<Photo> {
    let first = search.results.into_iter().next()?;
    let url = first.url.or(first.thumbnail)?;
    let creator = first.creator.unwrap_or_else(|| "Unknown".to_string());
    let license = first.license.unwrap_or_else(|| "cc".to_string()).to_uppercase();
    Some(Photo {
        url,
        credit: format!("{creator} • {license} via Openverse"),
    })
}

#[async_trait]
impl PhotoProvider for OpenversePhotos {
    fn name(&self) -> &'static str {
        "Openverse"
    }

    async fn find(&self, query: &str) -> Result<Option<Photo>> {
        let url = format!(
            "{}/images/?q={}&page_size=1&license_type=commercial",
            self.base_url,
            urlencoding::encode(query)
        );
        let response = self.client.get(url).send().await?;
        let search: OpenverseSearch = read_json("Openverse", response).await?;
        Ok(openverse_photo(search))
    }
}

/// Deterministic stand-in image: equal coordinates always share a picture.
#[must_use]
pub fn placeholder_photo(point: Option<GeoPoint>) -> &'static str {
    let sum = point.map_or(0.0, |p| p.lat + p.lng);
    // bucket to ~10m so float noise does not change the pick
    let bucket = (sum * 10_000.0).round() as i64;
    let index = bucket.rem_euclid(PLACEHOLDER_PHOTOS.len() as i64) as usize;
    PLACEHOLDER_PHOTOS[index]
}

/// What the enricher knows about the search that produced the places
#[derive(Debug, Clone, Copy)]
pub struct EnrichContext<'a> {
    pub refined: &'a str,
    /// Where the search was centred, if known
    pub origin: Option<GeoPoint>,
}

fn rationale(place: &Place, ctx: &EnrichContext<'_>) -> String {
    let label = place.provider_label();
    let mut because = match &place.address {
        Some(address) => format!("{address} • {label}"),
        None => format!("{label} match for “{}”", ctx.refined),
    };
    if let (Some(origin), Some(point)) = (ctx.origin, place.point()) {
        because.push_str(&format!(" • {:.1} km away", origin.distance_km(&point)));
    }
    because
}

/// Attaches photos and rationales, trying photo providers in order
pub struct ResultEnricher {
    providers: Vec<Arc<dyn PhotoProvider>>,
    timeout: Duration,
    concurrency: usize,
}

impl ResultEnricher {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn PhotoProvider>>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            providers,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Enrich every place, keeping the input order
    #[instrument(name = "enrich_results", skip_all, fields(count = places.len()))]
    pub async fn enrich(&self, places: Vec<Place>, ctx: EnrichContext<'_>) -> Vec<Place> {
        stream::iter(places)
            .map(|place| self.enrich_one(place, ctx))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn enrich_one(&self, mut place: Place, ctx: EnrichContext<'_>) -> Place {
        if place.because.is_none() {
            place.because = Some(rationale(&place, &ctx));
        }
        if place.photo.is_some() {
            return place;
        }

        let photo = match self.find_photo(&place.name).await {
            Some(photo) => photo,
            None => Photo {
                url: placeholder_photo(place.point()).to_string(),
                credit: PLACEHOLDER_CREDIT.to_string(),
            },
        };
        place.photo = Some(photo.url);
        place.photo_credit = Some(photo.credit);
        place
    }

    async fn find_photo(&self, name: &str) -> Option<Photo> {
        for provider in &self.providers {
            match with_timeout(provider.name(), self.timeout, provider.find(name)).await {
                Ok(Some(photo)) => {
                    debug!(provider = provider.name(), %name, "Found photo");
                    return Some(photo);
                }
                Ok(None) => debug!(provider = provider.name(), %name, "No photo"),
                Err(e) => warn!(provider = provider.name(), %name, "Photo lookup failed: {}", e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscoveryError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Answer {
        Photo(&'static str),
        Nothing,
        Fail,
        Hang,
    }

    struct MockPhotos {
        answer: Answer,
        calls: AtomicUsize,
    }

    impl MockPhotos {
        fn new(answer: Answer) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PhotoProvider for MockPhotos {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn find(&self, query: &str) -> Result<Option<Photo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Answer::Photo(url) => Ok(Some(Photo {
                    url: url.to_string(),
                    credit: format!("credit for {query}"),
                })),
                Answer::Nothing => Ok(None),
                Answer::Fail => Err(DiscoveryError::upstream("mock", "status 502")),
                Answer::Hang => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(None)
                }
            }
        }
    }

    fn enricher(providers: Vec<Arc<MockPhotos>>) -> ResultEnricher {
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn PhotoProvider>)
            .collect();
        ResultEnricher::new(providers, Duration::from_secs(8), 4)
    }

    fn located(id: &str, lat: f64, lng: f64) -> Place {
        Place::new(id, format!("Place {id}")).with_point(GeoPoint::new(lat, lng).unwrap())
    }

    const CTX: EnrichContext<'static> = EnrichContext {
        refined: "tacos in Mission",
        origin: None,
    };

    #[tokio::test]
    async fn test_first_provider_wins() {
        let first = MockPhotos::new(Answer::Photo("https://img/1.jpg"));
        let second = MockPhotos::new(Answer::Photo("https://img/2.jpg"));
        let enricher = enricher(vec![first.clone(), second.clone()]);

        let places = enricher.enrich(vec![located("fsq:1", 1.0, 2.0)], CTX).await;
        assert_eq!(places[0].photo.as_deref(), Some("https://img/1.jpg"));
        assert_eq!(places[0].photo_credit.as_deref(), Some("credit for Place fsq:1"));
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_provider_after_failure() {
        let first = MockPhotos::new(Answer::Fail);
        let second = MockPhotos::new(Answer::Photo("https://img/2.jpg"));
        let enricher = enricher(vec![first, second]);

        let places = enricher.enrich(vec![located("fsq:1", 1.0, 2.0)], CTX).await;
        assert_eq!(places[0].photo.as_deref(), Some("https://img/2.jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_placeholder_after_timeout_and_nothing() {
        let enricher = enricher(vec![MockPhotos::new(Answer::Hang), MockPhotos::new(Answer::Nothing)]);

        let places = enricher.enrich(vec![located("osm:node/1", 1.0, 2.0)], CTX).await;
        assert_eq!(places[0].photo.as_deref(), Some(placeholder_photo(places[0].point())));
        assert_eq!(places[0].photo_credit.as_deref(), Some(PLACEHOLDER_CREDIT));
    }

    #[tokio::test]
    async fn test_placeholder_is_deterministic() {
        let enricher = enricher(vec![MockPhotos::new(Answer::Nothing)]);
        let places = enricher
            .enrich(
                vec![
                    located("fsq:a", 37.7749, -122.4194),
                    located("fsq:b", 37.7749, -122.4194),
                    located("fsq:c", 40.7128, -74.0060),
                ],
                CTX,
            )
            .await;

        assert_eq!(places[0].photo, places[1].photo);
        assert_ne!(places[0].photo, places[2].photo);
    }

    #[tokio::test]
    async fn test_existing_photo_kept_and_order_preserved() {
        let provider = MockPhotos::new(Answer::Photo("https://img/new.jpg"));
        let enricher = enricher(vec![provider.clone()]);

        let mut with_photo = located("fsq:1", 1.0, 2.0);
        with_photo.photo = Some("https://img/original.jpg".into());
        let ids = ["fsq:1", "fsq:2", "fsq:3", "fsq:4", "fsq:5", "fsq:6"];
        let mut places = vec![with_photo];
        places.extend(ids[1..].iter().map(|id| located(id, 1.0, 2.0)));

        let enriched = enricher.enrich(places, CTX).await;
        let got: Vec<&str> = enriched.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(got, ids);
        assert_eq!(enriched[0].photo.as_deref(), Some("https://img/original.jpg"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_rationale() {
        let enricher = enricher(vec![]);
        let with_address = located("fsq:1", 37.7599, -122.4148).with_address(Some("2889 Mission St".into()));
        let without = located("osm:node/2", 37.7599, -122.4148);

        let places = enricher.enrich(vec![with_address, without], CTX).await;
        assert_eq!(places[0].because.as_deref(), Some("2889 Mission St • Foursquare"));
        assert_eq!(
            places[1].because.as_deref(),
            Some("OpenStreetMap match for “tacos in Mission”")
        );

        let ctx = EnrichContext {
            refined: "tacos",
            origin: Some(GeoPoint::new(37.7599, -122.4148).unwrap()),
        };
        let places = enricher.enrich(vec![located("fsq:3", 37.7599, -122.4148)], ctx).await;
        assert_eq!(places[0].because.as_deref(), Some("Foursquare match for “tacos” • 0.0 km away"));
    }

    #[test]
    fn test_provider_payloads() {
        let unsplash: UnsplashSearch = serde_json::from_str(
            r#"{"total":1,"results":[{"urls":{"regular":"https://u/r.jpg","small":"https://u/s.jpg"},"user":{"name":"Ana"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            unsplash_photo(unsplash),
            Some(Photo {
                url: "https://u/r.jpg".into(),
                credit: "Photo by Ana on Unsplash".into()
            })
        );

        let openverse: OpenverseSearch = serde_json::from_str(
            r#"{"result_count":1,"results":[{"url":null,"thumbnail":"https://o/t.jpg","creator":"Bo","license":"by-sa"}]}"#,
        )
        .unwrap();
        assert_eq!(
            openverse_photo(openverse),
            Some(Photo {
                url: "https://o/t.jpg".into(),
                credit: "Bo • BY-SA via Openverse".into()
            })
        );

        let empty: OpenverseSearch = serde_json::from_str(r#"{"results":[]}"#).unwrap();
        assert!(openverse_photo(empty).is_none());
    }

    #[tokio::test]
    async fn test_unsplash_skipped_without_key() {
        let photos = UnsplashPhotos::new(Client::new(), &PhotosConfig::default());
        assert!(photos.find("Dolores Park").await.unwrap().is_none());
    }
}
