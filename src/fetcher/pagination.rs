//! Backward cursor pagination over the klines endpoint
//!
//! The walk starts at a capture instant and moves strictly backward in time:
//! each request asks for the newest `limit` klines at or before the cursor,
//! and the cursor then moves to one millisecond before the earliest kline
//! received. An empty page ends the walk.
//!
//! The cursor is a plain value threaded through the loop. [`FetchCursor::advance`]
//! is a pure step function, which keeps the loop free of captured mutable state
//! and makes the termination rules testable without any I/O.
//!
//! Safety mechanisms:
//! - A non-empty page that does not move the cursor is a protocol error
//! - Maximum iteration limit
//! - Fixed spacing between consecutive requests

use crate::downloader::rate_limit::RequestSpacing;
use crate::fetcher::binance_config::SPOT_CONFIG;
use crate::fetcher::{FetcherError, FetcherResult, KlinePageSource};
use crate::{Interval, Kline};
use tracing::debug;

/// Maximum number of pagination iterations to prevent infinite loops
pub const MAX_ITERATIONS: usize = 10_000;

/// End-time cursor of one backward walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchCursor {
    end_time: i64,
}

/// Outcome of feeding one page to the cursor
#[derive(Debug, Clone, PartialEq)]
pub enum CursorStep {
    /// Page accepted; continue from `next`
    Continue {
        /// Accepted klines, ascending and unique by open time, all at or before the cursor
        page: Vec<Kline>,
        /// Cursor for the next request
        next: FetchCursor,
    },
    /// Empty page: the walk is complete
    Done,
    /// The page was non-empty but held nothing at or before the cursor
    Stalled,
}

impl FetchCursor {
    /// Start a walk ending at `end_time` (inclusive)
    pub fn new(end_time: i64) -> Self {
        Self { end_time }
    }

    /// Inclusive end time for the next request
    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    /// Feed one raw page to the cursor.
    ///
    /// Klines after the cursor are dropped (they were already covered by an
    /// earlier page or lie beyond the requested end time), the rest are sorted
    /// and de-duplicated by open time. The next cursor is one millisecond
    /// before the earliest accepted kline, so it always strictly decreases.
    pub fn advance(self, mut page: Vec<Kline>) -> CursorStep {
        if page.is_empty() {
            return CursorStep::Done;
        }

        page.retain(|kline| kline.open_time <= self.end_time);
        page.sort_by_key(|kline| kline.open_time);
        page.dedup_by_key(|kline| kline.open_time);

        match page.first() {
            Some(earliest) => {
                let next = FetchCursor::new(earliest.open_time - 1);
                CursorStep::Continue { page, next }
            }
            None => CursorStep::Stalled,
        }
    }
}

/// Walk the klines endpoint backward from `end_time` until it is exhausted.
///
/// # Arguments
/// * `source` - Page source performing one request per call
/// * `symbol` - Trading symbol
/// * `interval` - Kline interval
/// * `end_time` - Inclusive end of the walk (Unix timestamp in milliseconds)
/// * `page_size` - Klines requested per call (1..=1000)
/// * `spacing` - Minimum delay between consecutive calls
///
/// # Returns
/// All klines at or before `end_time`, ascending and unique by open time
///
/// # Errors
/// Any page error aborts the walk and discards what was accumulated.
pub async fn fetch_klines_backward<S>(
    source: &S,
    symbol: &str,
    interval: Interval,
    end_time: i64,
    page_size: usize,
    spacing: &mut RequestSpacing,
) -> FetcherResult<Vec<Kline>>
where
    S: KlinePageSource + ?Sized,
{
    if page_size == 0 || page_size > SPOT_CONFIG.max_klines_limit {
        return Err(FetcherError::InvalidRequest(format!(
            "page size must be between 1 and {}, got {page_size}",
            SPOT_CONFIG.max_klines_limit
        )));
    }

    // Pages arrive newest first; they are reversed once at the end instead of
    // prepending each page to the accumulator.
    let mut pages: Vec<Vec<Kline>> = Vec::new();
    let mut total = 0usize;
    let mut cursor = FetchCursor::new(end_time);

    for iteration in 0..MAX_ITERATIONS {
        spacing.wait().await;

        debug!(
            "Fetching klines page {} for {} {} ending at {}",
            iteration + 1,
            symbol,
            interval,
            cursor.end_time()
        );

        let raw = source
            .fetch_page(symbol, interval, cursor.end_time(), page_size)
            .await?;

        match cursor.advance(raw) {
            CursorStep::Done => {
                debug!(
                    "Pagination completed after {} requests. Total klines: {}",
                    iteration + 1,
                    total
                );
                let mut klines = Vec::with_capacity(total);
                for page in pages.into_iter().rev() {
                    klines.extend(page);
                }
                return Ok(klines);
            }
            CursorStep::Continue { page, next } => {
                total += page.len();
                debug!("Received {} klines in page {}", page.len(), iteration + 1);
                pages.push(page);
                cursor = next;
            }
            CursorStep::Stalled => {
                return Err(FetcherError::PaginationStalled {
                    symbol: symbol.to_string(),
                    interval,
                    cursor: cursor.end_time(),
                });
            }
        }
    }

    Err(FetcherError::MaxIterationsExceeded {
        symbol: symbol.to_string(),
        interval,
        max: MAX_ITERATIONS,
        cursor: cursor.end_time(),
    })
}
