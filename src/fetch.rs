//! Text fetching for remote domain lists.
//!
//! The resolver only needs "give me the text behind this locator". Retries
//! belong to the caller; a fetcher performs exactly one attempt.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::TransportError;

/// User agent sent with every list request.
const USER_AGENT: &str = concat!("keenetic-geosite-sync/", env!("CARGO_PKG_VERSION"));

/// Fetches the raw text behind a locator.
#[async_trait]
pub trait TextFetcher: Send + Sync {
    /// Performs a single fetch attempt bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on timeout, non-success status or
    /// network failure.
    async fn fetch(&self, locator: &str, timeout: Duration) -> Result<String, TransportError>;
}

/// HTTPS fetcher backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the crate's user agent.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the TLS backend cannot be set up.
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client (proxy settings, custom roots, ...).
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TextFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str, timeout: Duration) -> Result<String, TransportError> {
        let request = async {
            let response = self.client.get(locator).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    url: locator.to_string(),
                });
            }
            Ok(response.text().await?)
        };

        let body = tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| TransportError::Timeout {
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                url: locator.to_string(),
            })??;

        tracing::debug!(url = %locator, bytes = body.len(), "Fetched domain list");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_names_the_crate() {
        assert!(USER_AGENT.starts_with("keenetic-geosite-sync/"));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher
            .fetch("http://127.0.0.1:9/list", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Http(_) | TransportError::Timeout { .. }
        ));
    }
}
