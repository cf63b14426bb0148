//! Shared HTTP client construction
//!
//! One `reqwest::Client` is built per run and cloned into every unit so all
//! requests share the same connection pool. Explicit timeouts keep a stuck
//! call from blocking its unit forever; a timed-out call surfaces as a
//! transport error and goes through the retry policy.

use reqwest::Client;
use std::time::Duration;

use crate::fetcher::{FetcherError, FetcherResult};

/// HTTP connect timeout (seconds) - time to establish TCP connection
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// HTTP request timeout (seconds) - overall time for one request including the body
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Build the HTTP client shared by all units of a run
pub fn build_http_client(
    connect_timeout: Duration,
    request_timeout: Duration,
) -> FetcherResult<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .user_agent(concat!("kline-crawler/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            FetcherError::Network(format!(
                "failed to build HTTP client: {e}. Check system TLS configuration."
            ))
        })
}
