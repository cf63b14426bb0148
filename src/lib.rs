//! # Kline Crawler Library
//!
//! Retrieves historical Binance spot candlestick ("kline") data for a set of
//! symbols and intervals and lays it out as per-symbol, per-interval CSV
//! datasets on local storage.
//!
//! ## Acquisition paths
//!
//! - **API**: walks the paginated `/api/v3/klines` endpoint backward in time
//!   from a single capture instant until the endpoint is exhausted, then
//!   writes the canonical seven-column dataset.
//! - **Bulk**: enumerates the monthly or daily archives published on the
//!   Binance Vision mirror, downloads them concurrently, extracts them and
//!   merges the fragments into one header-less file.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kline_crawler::config::CrawlConfig;
//! use kline_crawler::downloader::AcquisitionExecutor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CrawlConfig::default();
//! let executor = AcquisitionExecutor::from_config(&config)?;
//! let summary = executor
//!     .run(&config.symbols, &config.intervals, config.mode)
//!     .await;
//! assert!(!summary.has_failures());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - REST client, kline parsing and backward cursor pagination
//! - [`archive`] - archive URL enumeration, bulk retrieval, unpack-and-merge
//! - [`downloader`] - acquisition orchestration, retry policy, request spacing
//! - [`output`] - dataset writer and on-disk layout
//! - [`config`] - static crawl configuration loaded from TOML

#![warn(missing_docs)]
#![warn(clippy::all)]

use rust_decimal::Decimal;

/// Bulk archive enumeration, retrieval and merge
pub mod archive;

/// CLI command implementations
pub mod cli;

/// Static crawl configuration
pub mod config;

/// Acquisition orchestration
pub mod downloader;

/// REST fetchers
pub mod fetcher;

/// Kline intervals
pub mod interval;

/// Prometheus metrics
pub mod metrics;

/// Dataset writers
pub mod output;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

pub use interval::Interval;

/// One kline (candlestick) as returned by the exchange.
///
/// The exchange-internal fields are kept only until the record is written;
/// the dataset writer projects down to the seven canonical columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    /// Open time (Unix timestamp in milliseconds)
    pub open_time: i64,
    /// Open price
    pub open: Decimal,
    /// High price
    pub high: Decimal,
    /// Low price
    pub low: Decimal,
    /// Close price
    pub close: Decimal,
    /// Volume (base asset)
    pub volume: Decimal,
    /// Close time (Unix timestamp in milliseconds)
    pub close_time: i64,
    /// Quote asset volume
    pub quote_volume: Decimal,
    /// Number of trades
    pub trades: u64,
    /// Taker buy base asset volume
    pub taker_buy_base_volume: Decimal,
    /// Taker buy quote asset volume
    pub taker_buy_quote_volume: Decimal,
}
