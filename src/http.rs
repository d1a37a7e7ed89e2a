//! Shared outbound HTTP plumbing
//!
//! Every call to a third-party API goes through [`with_timeout`] so that a
//! slow upstream looks exactly like a failed one to the calling stage.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::Result;
use crate::error::DiscoveryError;

pub const USER_AGENT: &str = concat!("TravelDiscovery/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by all provider clients.
///
/// Per-call budgets are applied with [`with_timeout`]; the client-level
/// timeout is only a backstop.
pub fn build_client(backstop: Duration) -> Result<Client> {
    Client::builder()
        .timeout(backstop)
        .user_agent(USER_AGENT)
        .build()
        .map_err(DiscoveryError::from)
}

/// Run `call` with a deadline, turning an elapsed deadline into [`DiscoveryError::Timeout`].
pub async fn with_timeout<T, F>(operation: &'static str, after: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(DiscoveryError::Timeout { operation, after }),
    }
}

/// Check the status and decode a JSON body, attributing failures to `provider`.
pub async fn read_json<T: DeserializeOwned>(provider: &'static str, response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(200).collect();
        return Err(DiscoveryError::upstream(
            provider,
            format!("status {status}: {snippet}"),
        ));
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| DiscoveryError::upstream(provider, format!("unparsable body: {e}")))
}
