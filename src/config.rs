//! Static crawl configuration
//!
//! Loaded from a TOML file; every section and field has a default, so an
//! empty file (or no file at all) yields a runnable API-mode configuration.
//!
//! ```toml
//! mode = "bulk"
//! symbols = ["BTCUSDT"]
//! intervals = ["1m"]
//!
//! [bulk]
//! granularity = "daily"
//! start_date = "2024-01-01"
//! end_date = "2024-01-31"
//! ```

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::archive::Granularity;
use crate::downloader::config::{
    RetryPolicy, DEFAULT_DOWNLOAD_CONCURRENCY, DEFAULT_MAX_WORKERS, DEFAULT_REQUEST_DELAY_MS,
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_RETRIES,
};
use crate::downloader::AcquisitionMode;
use crate::fetcher::binance_config::SPOT_CONFIG;
use crate::fetcher::shared_resources::{
    build_http_client, HTTP_CONNECT_TIMEOUT_SECS, HTTP_REQUEST_TIMEOUT_SECS,
};
use crate::fetcher::FetcherResult;
use crate::Interval;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {reason}")]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// File is not valid TOML for [`CrawlConfig`]
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Values are out of range or inconsistent
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Complete crawl configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    /// Acquisition path
    pub mode: AcquisitionMode,
    /// Trading symbols, e.g. `BTCUSDT`
    pub symbols: Vec<String>,
    /// Kline intervals
    pub intervals: Vec<Interval>,
    /// Maximum acquisition units in flight
    pub max_workers: usize,
    /// Paginated API settings
    pub api: ApiConfig,
    /// Bulk archive settings
    pub bulk: BulkConfig,
    /// Retry policy for HTTP calls
    pub retry: RetryConfig,
    /// HTTP client settings
    pub http: HttpConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            mode: AcquisitionMode::Api,
            symbols: vec!["BTCUSDT".to_string()],
            intervals: vec![Interval::OneDay],
            max_workers: DEFAULT_MAX_WORKERS,
            api: ApiConfig::default(),
            bulk: BulkConfig::default(),
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// `[api]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// REST API base URL
    pub base_url: String,
    /// Klines requested per call (1..=1000)
    pub page_size: usize,
    /// Minimum delay between consecutive calls of one unit
    pub request_delay_ms: u64,
    /// Folder receiving `{SYMBOL}_{INTERVAL}.csv`
    pub output_dir: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: SPOT_CONFIG.api_base_url.to_string(),
            page_size: SPOT_CONFIG.max_klines_limit,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            output_dir: PathBuf::from("csv"),
        }
    }
}

impl ApiConfig {
    /// Request spacing as a duration
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// `[bulk]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BulkConfig {
    /// Archive mirror base URL
    pub base_url: String,
    /// Monthly or daily archives
    pub granularity: Granularity,
    /// First day covered (inclusive)
    pub start_date: NaiveDate,
    /// Last day covered (inclusive)
    pub end_date: NaiveDate,
    /// Concurrent archive downloads within one unit
    pub download_concurrency: usize,
    /// Root of the per-unit working directories
    pub data_dir: PathBuf,
    /// Verify archives against their `.CHECKSUM` files
    pub verify_checksum: bool,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            base_url: SPOT_CONFIG.archive_base_url.to_string(),
            granularity: Granularity::Monthly,
            start_date: NaiveDate::from_ymd_opt(2018, 8, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap_or_default(),
            download_concurrency: DEFAULT_DOWNLOAD_CONCURRENCY,
            data_dir: PathBuf::from("static"),
            verify_checksum: false,
        }
    }
}

/// `[retry]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff_ms: INITIAL_BACKOFF_MS,
            max_backoff_ms: MAX_BACKOFF_MS,
        }
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// `[http]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// TCP connect timeout
    pub connect_timeout_secs: u64,
    /// Whole-request timeout, body included
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: HTTP_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: HTTP_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl CrawlConfig {
    /// Read and parse a TOML file. Does not validate.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML text. Does not validate.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check ranges and consistency
    pub fn validate(&self) -> ConfigResult<()> {
        if self.symbols.is_empty() {
            return Err(ConfigError::Invalid("symbols must not be empty".to_string()));
        }
        if let Some(bad) = self.symbols.iter().find(|s| !is_valid_symbol(s)) {
            return Err(ConfigError::Invalid(format!(
                "invalid symbol '{bad}': expected uppercase letters and digits"
            )));
        }
        if let Some(dup) = first_duplicate(&self.symbols) {
            return Err(ConfigError::Invalid(format!("symbol '{dup}' is listed twice")));
        }
        if self.intervals.is_empty() {
            return Err(ConfigError::Invalid("intervals must not be empty".to_string()));
        }
        // `1W` parses to the same interval as `1w`
        if let Some(dup) = first_duplicate(&self.intervals) {
            return Err(ConfigError::Invalid(format!("interval '{dup}' is listed twice")));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".to_string()));
        }

        match self.mode {
            AcquisitionMode::Api => {
                let limit = SPOT_CONFIG.max_klines_limit;
                if self.api.page_size == 0 || self.api.page_size > limit {
                    return Err(ConfigError::Invalid(format!(
                        "api.page_size must be between 1 and {limit}, got {}",
                        self.api.page_size
                    )));
                }
            }
            AcquisitionMode::Bulk => {
                if self.bulk.download_concurrency == 0 {
                    return Err(ConfigError::Invalid(
                        "bulk.download_concurrency must be at least 1".to_string(),
                    ));
                }
                if self.bulk.start_date > self.bulk.end_date {
                    return Err(ConfigError::Invalid(format!(
                        "bulk.start_date {} is after bulk.end_date {}",
                        self.bulk.start_date, self.bulk.end_date
                    )));
                }
            }
        }

        if self.http.connect_timeout_secs == 0 || self.http.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("http timeouts must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Retry policy shared by both acquisition paths
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.into()
    }

    /// Shared HTTP client with the configured timeouts
    pub fn http_client(&self) -> FetcherResult<Client> {
        build_http_client(
            Duration::from_secs(self.http.connect_timeout_secs),
            Duration::from_secs(self.http.request_timeout_secs),
        )
    }
}

fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn first_duplicate<T: Eq + std::hash::Hash>(items: &[T]) -> Option<&T> {
    let mut seen = HashSet::new();
    items.iter().find(|item| !seen.insert(*item))
}
