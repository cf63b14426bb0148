//! Backward pagination against scripted page sources

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use kline_crawler::downloader::RequestSpacing;
use kline_crawler::fetcher::{fetch_klines_backward, FetcherError, FetcherResult, KlinePageSource};
use kline_crawler::{Interval, Kline};

use crate::support::{kline, BASE_OPEN_TIME, DAY_MS};

/// Holds `total` daily klines and records every requested cursor
struct ScriptedSource {
    total: i64,
    calls: AtomicUsize,
    cursors: Mutex<Vec<i64>>,
}

impl ScriptedSource {
    fn new(total: i64) -> Self {
        Self {
            total,
            calls: AtomicUsize::new(0),
            cursors: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KlinePageSource for ScriptedSource {
    async fn fetch_page(
        &self,
        _symbol: &str,
        _interval: Interval,
        end_time: i64,
        limit: usize,
    ) -> FetcherResult<Vec<Kline>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().unwrap().push(end_time);

        let mut page: Vec<Kline> = (0..self.total)
            .map(|i| kline(BASE_OPEN_TIME + i * DAY_MS))
            .filter(|k| k.open_time <= end_time)
            .collect();
        let skip = page.len().saturating_sub(limit);
        Ok(page.split_off(skip))
    }
}

/// Always answers with the same page regardless of the cursor
struct StuckSource;

#[async_trait]
impl KlinePageSource for StuckSource {
    async fn fetch_page(
        &self,
        _symbol: &str,
        _interval: Interval,
        _end_time: i64,
        _limit: usize,
    ) -> FetcherResult<Vec<Kline>> {
        Ok(vec![kline(i64::MAX - DAY_MS)])
    }
}

/// First page succeeds, the second fails
struct FailingSecondPage {
    calls: AtomicUsize,
}

#[async_trait]
impl KlinePageSource for FailingSecondPage {
    async fn fetch_page(
        &self,
        _symbol: &str,
        _interval: Interval,
        end_time: i64,
        _limit: usize,
    ) -> FetcherResult<Vec<Kline>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(vec![kline(end_time - DAY_MS), kline(end_time)]);
        }
        Err(FetcherError::RemoteApi {
            status: 400,
            message: "Invalid symbol.".to_string(),
        })
    }
}

async fn walk<S: KlinePageSource>(
    source: &S,
    end_time: i64,
    page_size: usize,
) -> FetcherResult<Vec<Kline>> {
    let mut spacing = RequestSpacing::disabled();
    fetch_klines_backward(source, "ABC", Interval::OneDay, end_time, page_size, &mut spacing).await
}

fn assert_strictly_ascending(klines: &[Kline]) {
    for pair in klines.windows(2) {
        assert!(
            pair[0].open_time < pair[1].open_time,
            "{} is not before {}",
            pair[0].open_time,
            pair[1].open_time
        );
    }
}

#[tokio::test]
async fn test_request_count_is_pages_plus_terminator() {
    let source = ScriptedSource::new(2500);
    let klines = walk(&source, i64::MAX, 1000).await.unwrap();

    assert_eq!(klines.len(), 2500);
    // ceil(2500 / 1000) pages plus one empty page
    assert_eq!(source.calls(), 4);
}

#[tokio::test]
async fn test_exact_multiple_of_page_size() {
    let source = ScriptedSource::new(2000);
    let klines = walk(&source, i64::MAX, 1000).await.unwrap();

    assert_eq!(klines.len(), 2000);
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_result_is_ascending_and_bounded_by_end_time() {
    let source = ScriptedSource::new(300);
    let end_time = BASE_OPEN_TIME + 199 * DAY_MS;
    let klines = walk(&source, end_time, 64).await.unwrap();

    assert_eq!(klines.len(), 200);
    assert_strictly_ascending(&klines);
    assert_eq!(klines.first().unwrap().open_time, BASE_OPEN_TIME);
    assert_eq!(klines.last().unwrap().open_time, end_time);
}

#[tokio::test]
async fn test_cursor_moves_strictly_backward() {
    let source = ScriptedSource::new(50);
    walk(&source, i64::MAX, 10).await.unwrap();

    let cursors = source.cursors.lock().unwrap().clone();
    assert_eq!(cursors.len(), 6);
    for pair in cursors.windows(2) {
        assert!(pair[1] < pair[0]);
    }
    // Each cursor sits one millisecond before the oldest record of the previous page
    assert_eq!(cursors[1], BASE_OPEN_TIME + 40 * DAY_MS - 1);
}

#[tokio::test]
async fn test_empty_history_makes_one_request() {
    let source = ScriptedSource::new(0);
    let klines = walk(&source, i64::MAX, 1000).await.unwrap();

    assert!(klines.is_empty());
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_stalled_cursor_is_an_error() {
    let result = walk(&StuckSource, i64::MAX, 1000).await;
    assert!(matches!(result, Err(FetcherError::PaginationStalled { .. })));
}

#[tokio::test]
async fn test_page_error_discards_partial_history() {
    let source = FailingSecondPage {
        calls: AtomicUsize::new(0),
    };
    let result = walk(&source, BASE_OPEN_TIME + 10 * DAY_MS, 2).await;

    match result {
        Err(FetcherError::RemoteApi { status, .. }) => assert_eq!(status, 400),
        other => panic!("expected RemoteApi error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_page_size_out_of_range_is_rejected() {
    let source = ScriptedSource::new(10);

    assert!(matches!(
        walk(&source, i64::MAX, 0).await,
        Err(FetcherError::InvalidRequest(_))
    ));
    assert!(matches!(
        walk(&source, i64::MAX, 1001).await,
        Err(FetcherError::InvalidRequest(_))
    ));
    assert_eq!(source.calls(), 0);
}
