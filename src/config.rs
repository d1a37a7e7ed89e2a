//! Configuration management for the discovery service
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::error::DiscoveryError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Chat-completion endpoint used to refine queries
    pub llm: LlmConfig,
    /// Forward geocoding endpoint
    pub geocoding: GeocodingConfig,
    /// Place search providers
    pub places: PlacesConfig,
    /// Photo providers
    pub photos: PhotosConfig,
    /// In-memory cache limits
    pub cache: CacheConfig,
    /// Per-call timeouts
    pub timeouts: TimeoutConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// HTTP listener
    pub server: ServerConfig,
}

/// LLM settings. Without an API key refinement is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Refined queries longer than this are discarded
    pub max_refined_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: String,
    /// Contact address sent to Nominatim, as its usage policy asks
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesConfig {
    pub foursquare_api_key: Option<String>,
    pub foursquare_base_url: String,
    pub overpass_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotosConfig {
    pub unsplash_access_key: Option<String>,
    pub unsplash_base_url: String,
    pub openverse_base_url: String,
    /// Maximum number of places enriched at the same time
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub search_ttl_secs: u64,
    pub search_max_entries: usize,
    pub geocode_ttl_secs: u64,
    pub geocode_max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub llm_seconds: u64,
    pub geocode_seconds: u64,
    pub search_seconds: u64,
    pub photo_seconds: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 48,
            max_refined_chars: 200,
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            email: None,
        }
    }
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            foursquare_api_key: None,
            foursquare_base_url: "https://api.foursquare.com/v3".to_string(),
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
        }
    }
}

impl Default for PhotosConfig {
    fn default() -> Self {
        Self {
            unsplash_access_key: None,
            unsplash_base_url: "https://api.unsplash.com".to_string(),
            openverse_base_url: "https://api.openverse.org/v1".to_string(),
            concurrency: 4,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_secs: 15 * 60,
            search_max_entries: 500,
            geocode_ttl_secs: 60 * 60,
            geocode_max_entries: 1000,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_seconds: 8,
            geocode_seconds: 8,
            search_seconds: 10,
            photo_seconds: 8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8787 }
    }
}

impl TimeoutConfig {
    #[must_use]
    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_seconds)
    }

    #[must_use]
    pub fn geocode(&self) -> Duration {
        Duration::from_secs(self.geocode_seconds)
    }

    #[must_use]
    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_seconds)
    }

    #[must_use]
    pub fn photo(&self) -> Duration {
        Duration::from_secs(self.photo_seconds)
    }

    /// Longest single budget, used as the HTTP client backstop
    #[must_use]
    pub fn longest(&self) -> Duration {
        [self.llm(), self.geocode(), self.search(), self.photo()]
            .into_iter()
            .max()
            .unwrap_or(Duration::from_secs(12))
    }
}

impl DiscoveryConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. DISCOVERY_CACHE__SEARCH_TTL_SECS=60
        builder = builder.add_source(
            Environment::with_prefix("DISCOVERY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: DiscoveryConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_credentials_from_env();
        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("travel-discovery").join("config.toml"))
    }

    /// Fill missing credentials from the conventional provider variables
    pub fn apply_credentials_from_env(&mut self) {
        fn fill(slot: &mut Option<String>, var: &str) {
            if slot.is_none() {
                *slot = env::var(var).ok().filter(|v| !v.trim().is_empty());
            }
        }
        fill(&mut self.llm.api_key, "OPENAI_API_KEY");
        fill(&mut self.places.foursquare_api_key, "FOURSQUARE_API_KEY");
        fill(&mut self.photos.unsplash_access_key, "UNSPLASH_ACCESS_KEY");
        fill(&mut self.geocoding.email, "NOMINATIM_EMAIL");
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        let defaults = Self::default();

        // Blank keys mean "not configured"
        for key in [
            &mut self.llm.api_key,
            &mut self.places.foursquare_api_key,
            &mut self.photos.unsplash_access_key,
        ] {
            if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                *key = None;
            }
        }

        if self.llm.base_url.is_empty() {
            self.llm.base_url = defaults.llm.base_url;
        }
        if self.llm.model.is_empty() {
            self.llm.model = defaults.llm.model;
        }
        if self.llm.max_tokens == 0 {
            self.llm.max_tokens = defaults.llm.max_tokens;
        }
        if self.llm.max_refined_chars == 0 {
            self.llm.max_refined_chars = defaults.llm.max_refined_chars;
        }
        if self.geocoding.base_url.is_empty() {
            self.geocoding.base_url = defaults.geocoding.base_url;
        }
        if self.places.foursquare_base_url.is_empty() {
            self.places.foursquare_base_url = defaults.places.foursquare_base_url;
        }
        if self.places.overpass_url.is_empty() {
            self.places.overpass_url = defaults.places.overpass_url;
        }
        if self.photos.unsplash_base_url.is_empty() {
            self.photos.unsplash_base_url = defaults.photos.unsplash_base_url;
        }
        if self.photos.openverse_base_url.is_empty() {
            self.photos.openverse_base_url = defaults.photos.openverse_base_url;
        }
        if self.photos.concurrency == 0 {
            self.photos.concurrency = defaults.photos.concurrency;
        }
        if self.logging.level.is_empty() {
            self.logging.level = defaults.logging.level;
        }
        if self.logging.format.is_empty() {
            self.logging.format = defaults.logging.format;
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        let timeouts = [
            ("llm", self.timeouts.llm_seconds),
            ("geocode", self.timeouts.geocode_seconds),
            ("search", self.timeouts.search_seconds),
            ("photo", self.timeouts.photo_seconds),
        ];
        for (name, seconds) in timeouts {
            if !(1..=60).contains(&seconds) {
                return Err(DiscoveryError::config(format!(
                    "{name} timeout must be between 1 and 60 seconds"
                ))
                .into());
            }
        }

        if self.cache.search_ttl_secs == 0 || self.cache.geocode_ttl_secs == 0 {
            return Err(DiscoveryError::config("Cache TTLs must be greater than zero").into());
        }

        if self.cache.search_max_entries == 0 || self.cache.geocode_max_entries == 0 {
            return Err(DiscoveryError::config("Cache sizes must be at least one entry").into());
        }

        if self.photos.concurrency > 32 {
            return Err(DiscoveryError::config("Photo concurrency cannot exceed 32").into());
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DiscoveryError::config("LLM temperature must be within 0.0..=2.0").into());
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(DiscoveryError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(DiscoveryError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = [
            ("llm.base_url", &self.llm.base_url),
            ("geocoding.base_url", &self.geocoding.base_url),
            ("places.foursquare_base_url", &self.places.foursquare_base_url),
            ("places.overpass_url", &self.places.overpass_url),
            ("photos.unsplash_base_url", &self.photos.unsplash_base_url),
            ("photos.openverse_base_url", &self.photos.openverse_base_url),
        ];
        for (name, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(DiscoveryError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }
}
