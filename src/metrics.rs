//! Prometheus metrics for crawl runs
//!
//! Uses the `metrics` facade; until [`init_metrics`] installs the Prometheus
//! exporter every macro call is a no-op, so library users and tests pay
//! nothing for it.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

static METRICS_INITIALIZED: Lazy<RwLock<bool>> = Lazy::new(|| RwLock::new(false));

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
///
/// Idempotent: later calls are ignored.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "api_requests_total",
        Unit::Count,
        "Requests sent to the klines endpoint, by status"
    );
    describe_counter!(
        "http_retries_total",
        Unit::Count,
        "Retry attempts after transient failures"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Backoff slept before a retry"
    );
    describe_counter!(
        "archive_downloads_total",
        Unit::Count,
        "Archive downloads, by outcome"
    );
    describe_counter!(
        "units_completed_total",
        Unit::Count,
        "Acquisition units that finished successfully"
    );
    describe_counter!(
        "units_failed_total",
        Unit::Count,
        "Acquisition units that failed"
    );
    describe_histogram!(
        "unit_duration_seconds",
        Unit::Seconds,
        "Wall time of one acquisition unit"
    );

    *initialized = true;
    info!("Metrics system initialized on {}", addr);
    Ok(())
}

/// Check if the exporter is installed
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Count one klines request by status label ("200", "429", "network_error", ...)
pub fn record_api_request(status: &str) {
    counter!("api_requests_total", "status" => status.to_string()).increment(1);
}

/// Record a retry and the backoff slept before it
pub fn record_retry(backoff: Duration) {
    counter!("http_retries_total").increment(1);
    histogram!("retry_backoff_duration_seconds").record(backoff.as_secs_f64());
}

/// Count one archive download by outcome ("saved", "failed")
pub fn record_archive_download(outcome: &'static str) {
    counter!("archive_downloads_total", "outcome" => outcome).increment(1);
}

/// Tracks the lifetime of one acquisition unit
pub struct UnitMetrics {
    mode: &'static str,
    start_time: Instant,
}

impl UnitMetrics {
    /// Start tracking a unit
    pub fn start(mode: &'static str) -> Self {
        Self {
            mode,
            start_time: Instant::now(),
        }
    }

    /// Record a successful unit
    pub fn record_success(&self) {
        counter!("units_completed_total", "mode" => self.mode).increment(1);
        self.record_duration();
    }

    /// Record a failed unit
    pub fn record_failure(&self) {
        counter!("units_failed_total", "mode" => self.mode).increment(1);
        self.record_duration();
    }

    fn record_duration(&self) {
        histogram!("unit_duration_seconds", "mode" => self.mode)
            .record(self.start_time.elapsed().as_secs_f64());
    }
}
