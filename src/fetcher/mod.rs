//! REST fetchers for the paginated klines endpoint

use crate::{Interval, Kline};
use async_trait::async_trait;

pub mod binance_config;
pub mod binance_http;
pub mod binance_parser;
pub mod binance_spot;
pub mod pagination;
pub mod retry_formatter;
pub mod shared_resources;

pub use binance_spot::BinanceSpotKlines;
pub use pagination::{fetch_klines_backward, CursorStep, FetchCursor};

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Non-success status from the remote API
    #[error("remote API error: HTTP {status}: {message}")]
    RemoteApi {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// Transport failure (connect, timeout, body read)
    #[error("network error: {0}")]
    Network(String),

    /// Response parse error
    #[error("parse error: {0}")]
    Parse(String),

    /// Request rejected before it was sent
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The endpoint returned records but none of them moved the cursor
    #[error("pagination stalled for {symbol} {interval}: cursor {cursor} did not advance")]
    PaginationStalled {
        /// Trading symbol
        symbol: String,
        /// Kline interval
        interval: Interval,
        /// Cursor value that was requested twice
        cursor: i64,
    },

    /// Iteration cap reached
    #[error("max iterations ({max}) exceeded for {symbol} {interval}; last cursor {cursor}")]
    MaxIterationsExceeded {
        /// Trading symbol
        symbol: String,
        /// Kline interval
        interval: Interval,
        /// Iteration cap
        max: usize,
        /// Last cursor value
        cursor: i64,
    },
}

impl FetcherError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            FetcherError::RemoteApi { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// One page of klines ending at a cursor.
///
/// Implementations perform exactly one request per call; the pagination loop
/// owns cursor movement, request spacing and termination.
#[async_trait]
pub trait KlinePageSource: Send + Sync {
    /// Fetch at most `limit` klines whose open time is at or before `end_time`,
    /// in ascending open-time order.
    async fn fetch_page(
        &self,
        symbol: &str,
        interval: Interval,
        end_time: i64,
        limit: usize,
    ) -> FetcherResult<Vec<Kline>>;
}
