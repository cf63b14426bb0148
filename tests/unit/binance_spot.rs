//! Klines page source against a mock REST endpoint

use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kline_crawler::downloader::RetryPolicy;
use kline_crawler::fetcher::{BinanceSpotKlines, FetcherError, KlinePageSource};
use kline_crawler::Interval;

use crate::support::{kline_row, BASE_OPEN_TIME, DAY_MS};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(20),
    }
}

fn source(server: &MockServer, retry: RetryPolicy) -> BinanceSpotKlines {
    BinanceSpotKlines::new(Client::new(), server.uri(), retry)
}

#[tokio::test]
async fn test_sends_expected_query_and_parses_rows() {
    let server = MockServer::start().await;
    let end_time = BASE_OPEN_TIME + DAY_MS;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .and(query_param("symbol", "BTCUSDT"))
        .and(query_param("interval", "1d"))
        .and(query_param("endTime", end_time.to_string()))
        .and(query_param("limit", "1000"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([kline_row(BASE_OPEN_TIME), kline_row(end_time)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let klines = source(&server, RetryPolicy::none())
        .fetch_page("BTCUSDT", Interval::OneDay, end_time, 1000)
        .await
        .unwrap();

    assert_eq!(klines.len(), 2);
    assert_eq!(klines[0].open_time, BASE_OPEN_TIME);
    assert_eq!(klines[1].close_time, end_time + DAY_MS - 1);
    assert_eq!(klines[0].close.to_string(), "100.90000000");
    assert_eq!(klines[0].trades, 42);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"code":-1121,"msg":"Invalid symbol."}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = source(&server, fast_retry())
        .fetch_page("NOPE", Interval::OneDay, BASE_OPEN_TIME, 1000)
        .await;

    match result {
        Err(FetcherError::RemoteApi { status, message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("Invalid symbol"));
        }
        other => panic!("expected RemoteApi error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_recovers_after_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([kline_row(BASE_OPEN_TIME)])))
        .expect(1)
        .mount(&server)
        .await;

    let klines = source(&server, fast_retry())
        .fetch_page("BTCUSDT", Interval::OneDay, BASE_OPEN_TIME, 1000)
        .await
        .unwrap();

    assert_eq!(klines.len(), 1);
}

#[tokio::test]
async fn test_persistent_server_error_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let result = source(&server, fast_retry())
        .fetch_page("BTCUSDT", Interval::OneDay, BASE_OPEN_TIME, 1000)
        .await;

    assert_eq!(result.unwrap_err().status(), Some(500));
}

#[tokio::test]
async fn test_malformed_row_fails_the_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([kline_row(BASE_OPEN_TIME), [BASE_OPEN_TIME, "1.0"]])),
        )
        .mount(&server)
        .await;

    let result = source(&server, RetryPolicy::none())
        .fetch_page("BTCUSDT", Interval::OneDay, BASE_OPEN_TIME, 1000)
        .await;

    assert!(matches!(result, Err(FetcherError::Parse(_))));
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let source = BinanceSpotKlines::new(Client::new(), "http://127.0.0.1:1", RetryPolicy::none());

    let result = source
        .fetch_page("BTCUSDT", Interval::OneDay, BASE_OPEN_TIME, 1000)
        .await;

    assert!(matches!(result, Err(FetcherError::Network(_))));
}
