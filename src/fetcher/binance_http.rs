//! Binance HTTP client helper module
//!
//! Provides one client for the REST API with:
//! - Generic request/response handling
//! - Retry logic with exponential backoff on transport failures, 429 and 5xx
//! - Weight header logging

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::downloader::config::RetryPolicy;
use crate::fetcher::retry_formatter::{extract_error_type, RetryContext};
use crate::fetcher::{FetcherError, FetcherResult};
use crate::metrics;

/// HTTP client for the Binance REST API
#[derive(Debug, Clone)]
pub struct BinanceHttpClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl BinanceHttpClient {
    /// Create new HTTP client
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client (cheap to clone, shares the pool)
    /// * `base_url` - Base URL for API endpoints (e.g., "<https://api.binance.com>")
    /// * `retry` - Retry policy for transient failures
    pub fn new(client: Client, base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        }
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute GET request with generic deserialization
    ///
    /// # Arguments
    /// * `endpoint` - API endpoint path (e.g., "/api/v3/klines")
    /// * `params` - Query parameters as key-value pairs
    /// * `target` - Short description used in retry logs (e.g., "BTCUSDT 1d")
    ///
    /// # Errors
    /// Returns `FetcherError::RemoteApi` for non-success statuses that are not
    /// retryable or that persist after the retry budget is spent.
    pub async fn get<T>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        target: &str,
    ) -> FetcherResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Making GET request to: {} with {} params", url, params.len());
        self.request_with_retry(&url, params, target).await
    }

    /// Retry loop
    ///
    /// Retries on:
    /// - Network errors (timeout, connection refused)
    /// - 5xx server errors
    /// - 429/418 rate limit errors
    ///
    /// Does not retry on other 4xx responses.
    async fn request_with_retry<T>(
        &self,
        url: &str,
        params: &[(&str, String)],
        target: &str,
    ) -> FetcherResult<T>
    where
        T: DeserializeOwned,
    {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let (error_type, error) = match self.client.get(url).query(params).send().await {
                Err(e) => {
                    metrics::record_api_request("network_error");
                    (
                        extract_error_type(None, Some(&e)),
                        FetcherError::Network(e.to_string()),
                    )
                }
                Ok(response) => {
                    let status = response.status();
                    metrics::record_api_request(status.as_str());

                    if status.is_success() {
                        if let Some(weight) = parse_weight_header(response.headers()) {
                            debug!("Response weight: {}", weight);
                        }
                        return response.json::<T>().await.map_err(|e| {
                            FetcherError::Parse(format!("Failed to deserialize response: {e}"))
                        });
                    }

                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| status.to_string());
                    (
                        extract_error_type(Some(status), None),
                        FetcherError::RemoteApi {
                            status: status.as_u16(),
                            message,
                        },
                    )
                }
            };

            let backoff = self.retry.backoff(attempt - 1);
            let context = RetryContext::new(attempt, max_attempts, error_type, backoff, target);

            if !error_type.is_retryable() || attempt >= max_attempts {
                warn!("{}", context.format_failure());
                return Err(error);
            }

            warn!(error = %error, "{}", context.format_retry());
            metrics::record_retry(backoff);
            tokio::time::sleep(backoff).await;
        }
    }
}

/// Parse the `X-MBX-USED-WEIGHT-1M` header.
///
/// Returns `Some(weight)` if the header is present and valid, `None` otherwise.
pub fn parse_weight_header(headers: &reqwest::header::HeaderMap) -> Option<u32> {
    let weight_str = headers.get("X-MBX-USED-WEIGHT-1M")?.to_str().ok()?;

    match weight_str.parse::<u32>() {
        Ok(weight) => Some(weight),
        Err(e) => {
            warn!("Failed to parse weight header '{}': {}", weight_str, e);
            None
        }
    }
}
