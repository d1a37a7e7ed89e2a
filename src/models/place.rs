//! Normalized place and coordinate models

use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

/// Category used when a provider gives no label
pub const DEFAULT_CATEGORY: &str = "poi";

/// A validated latitude/longitude pair
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lng: f64,
}

impl GeoPoint {
    /// Create a point, rejecting out-of-range or non-finite coordinates
    pub fn new(lat: f64, lng: f64) -> Result<Self, DiscoveryError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DiscoveryError::validation(format!(
                "latitude {lat} is outside [-90, 90]"
            )));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(DiscoveryError::validation(format!(
                "longitude {lng} is outside [-180, 180]"
            )));
        }
        Ok(Self { lat, lng })
    }

    /// Build a point from an optional pair; `None` unless both halves are present and valid
    #[must_use]
    pub fn from_pair(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Self::new(lat, lng).ok(),
            _ => None,
        }
    }

    /// Great-circle distance in kilometers
    #[must_use]
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine::distance(
            haversine::Location {
                latitude: self.lat,
                longitude: self.lng,
            },
            haversine::Location {
                latitude: other.lat,
                longitude: other.lng,
            },
            haversine::Units::Kilometers,
        )
    }
}

/// A place search result in the common shape shared by all providers
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(from = "PlaceRecord")]
pub struct Place {
    /// Provider-prefixed identifier (`fsq:…`, `osm:node/…`)
    pub id: String,
    pub name: String,
    pub category: String,
    pub rating: Option<f64>,
    lat: Option<f64>,
    lng: Option<f64>,
    pub address: Option<String>,
    pub photo: Option<String>,
    pub photo_credit: Option<String>,
    pub because: Option<String>,
}

/// Wire shape of a place; coordinates are re-paired on the way in
#[derive(Deserialize)]
struct PlaceRecord {
    id: String,
    name: String,
    category: Option<String>,
    rating: Option<f64>,
    lat: Option<f64>,
    lng: Option<f64>,
    address: Option<String>,
    photo: Option<String>,
    photo_credit: Option<String>,
    because: Option<String>,
}

impl From<PlaceRecord> for Place {
    fn from(record: PlaceRecord) -> Self {
        let mut place = Place::new(record.id, record.name)
            .with_category(record.category.as_deref())
            .with_rating(record.rating)
            .with_address(record.address);
        place.set_point(GeoPoint::from_pair(record.lat, record.lng));
        place.photo = record.photo;
        place.photo_credit = record.photo_credit;
        place.because = record.because;
        place
    }
}

impl Place {
    /// Create a place with the default category and nothing else filled in
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: DEFAULT_CATEGORY.to_string(),
            rating: None,
            lat: None,
            lng: None,
            address: None,
            photo: None,
            photo_credit: None,
            because: None,
        }
    }

    /// Set the category, keeping the default for blank labels
    #[must_use]
    pub fn with_category(mut self, category: Option<&str>) -> Self {
        if let Some(label) = category.map(str::trim).filter(|label| !label.is_empty()) {
            self.category = label.to_string();
        }
        self
    }

    #[must_use]
    pub fn with_point(mut self, point: GeoPoint) -> Self {
        self.set_point(Some(point));
        self
    }

    #[must_use]
    pub fn with_rating(mut self, rating: Option<f64>) -> Self {
        self.rating = rating.filter(|r| r.is_finite());
        self
    }

    #[must_use]
    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address.filter(|a| !a.trim().is_empty());
        self
    }

    /// Coordinates are written together so they are never half-set
    pub fn set_point(&mut self, point: Option<GeoPoint>) {
        self.lat = point.map(|p| p.lat);
        self.lng = point.map(|p| p.lng);
    }

    #[must_use]
    pub fn point(&self) -> Option<GeoPoint> {
        GeoPoint::from_pair(self.lat, self.lng)
    }

    #[must_use]
    pub fn lat(&self) -> Option<f64> {
        self.lat
    }

    #[must_use]
    pub fn lng(&self) -> Option<f64> {
        self.lng
    }

    /// Human-readable name of the provider this place came from
    #[must_use]
    pub fn provider_label(&self) -> &'static str {
        match self.id.split_once(':').map(|(prefix, _)| prefix) {
            Some("fsq") => "Foursquare",
            Some("osm") => "OpenStreetMap",
            _ => "Search",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(37.76, -122.42).is_ok());
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(90.5, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.1).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_from_pair_requires_both() {
        assert!(GeoPoint::from_pair(Some(1.0), None).is_none());
        assert!(GeoPoint::from_pair(None, Some(1.0)).is_none());
        assert_eq!(
            GeoPoint::from_pair(Some(1.0), Some(2.0)),
            Some(GeoPoint { lat: 1.0, lng: 2.0 })
        );
    }

    #[test]
    fn test_place_defaults_and_coordinates() {
        let mut place = Place::new("osm:node/1", "Taqueria").with_category(Some("  "));
        assert_eq!(place.category, DEFAULT_CATEGORY);
        assert!(place.point().is_none());

        place.set_point(Some(GeoPoint { lat: 37.75, lng: -122.41 }));
        assert_eq!(place.lat(), Some(37.75));
        assert_eq!(place.lng(), Some(-122.41));

        place.set_point(None);
        assert!(place.lat().is_none() && place.lng().is_none());
    }

    #[test]
    fn test_provider_label() {
        assert_eq!(Place::new("fsq:abc", "x").provider_label(), "Foursquare");
        assert_eq!(Place::new("osm:way/9", "x").provider_label(), "OpenStreetMap");
        assert_eq!(Place::new("plain", "x").provider_label(), "Search");
    }

    #[test]
    fn test_distance() {
        let mission = GeoPoint { lat: 37.7599, lng: -122.4148 };
        let castro = GeoPoint { lat: 37.7609, lng: -122.4350 };
        let km = mission.distance_km(&castro);
        assert!(km > 1.5 && km < 2.0, "unexpected distance {km}");
    }

    #[test]
    fn test_deserialize_keeps_coordinates_paired() {
        let half: Place =
            serde_json::from_str(r#"{"id":"fsq:1","name":"Cafe","lat":37.75}"#).unwrap();
        assert!(half.lat().is_none() && half.lng().is_none());
        assert_eq!(half.category, DEFAULT_CATEGORY);

        let out_of_range: Place =
            serde_json::from_str(r#"{"id":"fsq:2","name":"Cafe","lat":95.0,"lng":10.0}"#).unwrap();
        assert!(out_of_range.point().is_none());

        let full: Place = serde_json::from_str(
            r#"{"id":"osm:node/3","name":"Park","category":"park","lat":1.5,"lng":2.5,"photo":"https://img/p.jpg"}"#,
        )
        .unwrap();
        assert_eq!(full.point(), Some(GeoPoint { lat: 1.5, lng: 2.5 }));
        assert_eq!(full.category, "park");
        assert_eq!(full.photo.as_deref(), Some("https://img/p.jpg"));
    }

    #[test]
    fn test_serialization_shape() {
        let place = Place::new("fsq:1", "Cafe").with_point(GeoPoint { lat: 1.0, lng: 2.0 });
        let json = serde_json::to_value(&place).unwrap();
        assert_eq!(json["lat"], 1.0);
        assert_eq!(json["lng"], 2.0);
        assert_eq!(json["category"], "poi");
        assert!(json["photo"].is_null());
    }
}
