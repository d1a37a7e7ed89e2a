//! Error types and handling for the discovery service

use std::time::Duration;

use thiserror::Error;

/// Main error type for place discovery
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Configuration-related errors, including missing credentials
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// An outbound call did not finish within its budget
    #[error("{operation} timed out after {}s", after.as_secs_f32())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Upstream answered with a non-success status or a body we could not read
    #[error("{provider} rejected the request: {message}")]
    UpstreamRejected {
        provider: &'static str,
        message: String,
    },

    /// Transport-level HTTP errors
    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl DiscoveryError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new upstream rejection
    pub fn upstream<S: Into<String>>(provider: &'static str, message: S) -> Self {
        Self::UpstreamRejected {
            provider,
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether this error should be shown to the caller as a bad request
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            DiscoveryError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            DiscoveryError::Timeout { .. }
            | DiscoveryError::UpstreamRejected { .. }
            | DiscoveryError::Http { .. } => {
                "Unable to reach an external service. Please try again shortly.".to_string()
            }
            DiscoveryError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            DiscoveryError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}
