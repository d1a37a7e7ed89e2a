//! Data models for place discovery
//!
//! - Place: the normalized search result and its coordinates
//! - Search: inbound requests, responses and cache keys

pub mod place;
pub mod search;

// Re-export all public types for convenient access
pub use place::{DEFAULT_CATEGORY, GeoPoint, Place};
pub use search::{SearchKey, SearchRequest, SearchResponse};
