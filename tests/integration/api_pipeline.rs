//! API path end to end: mock endpoint, backward walk, CSV dataset

use reqwest::Client;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

use kline_crawler::downloader::{AcquisitionExecutor, AcquisitionMode, UnitReport};
use kline_crawler::output::KLINE_COLUMNS;
use kline_crawler::Interval;

use crate::support::{test_config, KlinesResponder, BASE_OPEN_TIME, DAY_MS};

#[tokio::test]
async fn test_full_history_written_ascending() {
    let server = MockServer::start().await;
    let responder = KlinesResponder::new(2500);
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(responder.clone())
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), &server.uri());
    let executor = AcquisitionExecutor::new(Client::new(), &config);

    let summary = executor
        .run(&["ABC".to_string()], &[Interval::OneDay], AcquisitionMode::Api)
        .await;

    assert!(!summary.has_failures());
    assert_eq!(responder.calls(), 4);

    let outcome = summary.outcome("ABC", Interval::OneDay).unwrap();
    let report = outcome.result.as_ref().unwrap();
    assert!(matches!(report, UnitReport::Api { rows: 2500, .. }));

    let dataset = dir.path().join("csv").join("ABC_1d.csv");
    assert_eq!(report.output(), &dataset);

    let content = std::fs::read_to_string(&dataset).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next().unwrap(), KLINE_COLUMNS.join(","));

    let open_times: Vec<i64> = lines
        .map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 7);
            fields[0].parse().unwrap()
        })
        .collect();
    assert_eq!(open_times.len(), 2500);
    assert_eq!(open_times[0], BASE_OPEN_TIME);
    assert_eq!(open_times[2499], BASE_OPEN_TIME + 2499 * DAY_MS);
    assert!(open_times.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_rerun_rewrites_identical_dataset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(KlinesResponder::new(120))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path(), &server.uri());
    config.api.page_size = 50;
    let executor = AcquisitionExecutor::new(Client::new(), &config);
    let symbols = ["ABC".to_string()];
    let dataset = dir.path().join("csv").join("ABC_1d.csv");

    executor.run(&symbols, &[Interval::OneDay], AcquisitionMode::Api).await;
    let first = std::fs::read(&dataset).unwrap();
    executor.run(&symbols, &[Interval::OneDay], AcquisitionMode::Api).await;
    let second = std::fs::read(&dataset).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_symbol_without_history_writes_header_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(KlinesResponder::new(0))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), &server.uri());
    let summary = AcquisitionExecutor::new(Client::new(), &config)
        .run(&["NEW".to_string()], &[Interval::OneHour], AcquisitionMode::Api)
        .await;

    assert!(!summary.has_failures());
    let content = std::fs::read_to_string(dir.path().join("csv").join("NEW_1h.csv")).unwrap();
    assert_eq!(content.lines().count(), 1);
}
