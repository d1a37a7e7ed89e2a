//! Inbound search request, response and cache key models

use serde::{Deserialize, Serialize};

use super::place::{GeoPoint, Place};
use crate::error::DiscoveryError;

pub const DEFAULT_LIMIT: u32 = 20;
pub const DEFAULT_RADIUS_M: u32 = 6000;
pub const MAX_QUERY_CHARS: usize = 300;

const LIMIT_RANGE: std::ops::RangeInclusive<u32> = 1..=50;
const RADIUS_RANGE: std::ops::RangeInclusive<u32> = 100..=50_000;

/// Search request as received from the HTTP layer
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchRequest {
    pub q: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Search radius in meters
    #[serde(default = "default_radius")]
    pub radius: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_radius() -> u32 {
    DEFAULT_RADIUS_M
}

impl SearchRequest {
    /// Create a request with default limit and radius
    #[must_use]
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            lat: None,
            lng: None,
            limit: DEFAULT_LIMIT,
            radius: DEFAULT_RADIUS_M,
        }
    }

    #[must_use]
    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.lat = Some(lat);
        self.lng = Some(lng);
        self
    }

    /// Check the request against the inbound contract
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        let chars = self.q.trim().chars().count();
        if chars == 0 {
            return Err(DiscoveryError::validation("q must not be empty"));
        }
        if self.q.chars().count() > MAX_QUERY_CHARS {
            return Err(DiscoveryError::validation(format!(
                "q must be at most {MAX_QUERY_CHARS} characters"
            )));
        }

        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => {
                GeoPoint::new(lat, lng)?;
            }
            (None, None) => {}
            _ => {
                return Err(DiscoveryError::validation(
                    "lat and lng must be provided together",
                ));
            }
        }

        if !LIMIT_RANGE.contains(&self.limit) {
            return Err(DiscoveryError::validation(format!(
                "limit must be within {}..={}",
                LIMIT_RANGE.start(),
                LIMIT_RANGE.end()
            )));
        }
        if !RADIUS_RANGE.contains(&self.radius) {
            return Err(DiscoveryError::validation(format!(
                "radius must be within {}..={}",
                RADIUS_RANGE.start(),
                RADIUS_RANGE.end()
            )));
        }
        Ok(())
    }

    /// Caller-supplied coordinates, if any
    #[must_use]
    pub fn point(&self) -> Option<GeoPoint> {
        GeoPoint::from_pair(self.lat, self.lng)
    }
}

/// Orchestrated search result
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResponse {
    pub refined: String,
    pub items: Vec<Place>,
}

/// Cache key for provider searches
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct SearchKey {
    pub query: String,
    pub lat_micro: Option<i64>, // Lat * 1000000 for precision
    pub lng_micro: Option<i64>, // Lng * 1000000 for precision
    pub limit: u32,
    pub radius: u32,
}

impl SearchKey {
    #[must_use]
    pub fn new(query: &str, point: Option<GeoPoint>, limit: u32, radius: u32) -> Self {
        // Coordinates are range-checked, so micro-degrees fit comfortably in i64
        Self {
            query: query.trim().to_lowercase(),
            lat_micro: point.map(|p| (p.lat * 1_000_000.0).round() as i64),
            lng_micro: point.map(|p| (p.lng * 1_000_000.0).round() as i64),
            limit,
            radius,
        }
    }
}
