//! Per-unit request spacing
//!
//! The klines endpoint is walked sequentially by each unit, so rate limiting is
//! a fixed minimum gap between consecutive calls of that unit rather than a
//! shared quota.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Enforces a minimum delay between consecutive requests
#[derive(Debug, Clone)]
pub struct RequestSpacing {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RequestSpacing {
    /// Create a spacing with the given minimum interval
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Spacing that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Configured minimum interval
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request may be sent, then mark it as sent.
    ///
    /// The first call never waits.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let ready_at = last + self.min_interval;
            if ready_at > Instant::now() {
                sleep_until(ready_at).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

impl Default for RequestSpacing {
    fn default() -> Self {
        Self::new(Duration::from_millis(
            crate::downloader::config::DEFAULT_REQUEST_DELAY_MS,
        ))
    }
}
