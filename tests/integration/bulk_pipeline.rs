//! Bulk path end to end: archive retrieval, checksum verification, extraction and merge

use chrono::NaiveDate;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kline_crawler::archive::{ArchiveError, ArchiveReference, ArchiveRetriever, Granularity};
use kline_crawler::config::CrawlConfig;
use kline_crawler::downloader::{
    AcquisitionError, AcquisitionExecutor, AcquisitionMode, RetryPolicy, UnitReport,
};
use kline_crawler::Interval;

use crate::support::{test_config, zip_bytes, BASE_OPEN_TIME, DAY_MS};

/// Header-less archive rows, one per day
fn fragment(first_day: i64, days: i64) -> String {
    (first_day..first_day + days)
        .map(|day| {
            let open = BASE_OPEN_TIME + day * DAY_MS;
            format!(
                "{open},1.0,2.0,0.5,1.5,10.0,{},15.0,3,5.0,7.5,0\n",
                open + DAY_MS - 1
            )
        })
        .collect()
}

fn archive_path(symbol: &str, token: &str) -> String {
    format!("/data/spot/monthly/klines/{symbol}/1d/{symbol}-1d-{token}.zip")
}

async fn serve_archive(server: &MockServer, symbol: &str, token: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(archive_path(symbol, token)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

async fn serve_checksum(server: &MockServer, symbol: &str, token: &str, digest: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{}.CHECKSUM", archive_path(symbol, token))))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("{digest}  {symbol}-1d-{token}.zip\n")),
        )
        .mount(server)
        .await;
}

fn monthly_archive(symbol: &str, token: &str, first_day: i64, days: i64) -> Vec<u8> {
    let name = format!("{symbol}-1d-{token}.csv");
    zip_bytes(&[(name.as_str(), fragment(first_day, days).as_str())])
}

/// Three monthly periods: 2024-01 through 2024-03
fn bulk_config(dir: &TempDir, server: &MockServer) -> CrawlConfig {
    let mut config = test_config(dir.path(), &server.uri());
    config.mode = AcquisitionMode::Bulk;
    config.bulk.granularity = Granularity::Monthly;
    config.bulk.start_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    config.bulk.end_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    config
}

fn unit_dir(dir: &TempDir, symbol: &str) -> std::path::PathBuf {
    dir.path().join("static").join(symbol).join("1d")
}

#[tokio::test]
async fn test_retrieval_isolates_failed_archives() {
    let server = MockServer::start().await;
    for i in [0, 2, 4] {
        Mock::given(method("GET"))
            .and(path(format!("/archives/{i}.zip")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![i as u8; 64]))
            .mount(&server)
            .await;
    }
    // 1.zip and 3.zip fall through to the mock server's default 404

    let dir = TempDir::new().unwrap();
    let references: Vec<ArchiveReference> = (0..5)
        .map(|i| ArchiveReference {
            url: format!("{}/archives/{i}.zip", server.uri()),
            destination: dir.path().join(format!("{i}.zip")),
            period: format!("2024-0{}", i + 1),
        })
        .collect();

    let report = ArchiveRetriever::new(Client::new(), RetryPolicy::none())
        .retrieve(references, 2)
        .await;

    assert_eq!(report.total(), 5);
    assert_eq!(report.saved.len(), 3);
    assert_eq!(report.failed.len(), 2);
    for failed in &report.failed {
        assert!(matches!(
            failed.error,
            ArchiveError::DownloadStatus { status: 404, .. }
        ));
        assert!(!failed.reference.destination.exists());
    }
    for saved in &report.saved {
        assert_eq!(std::fs::read(saved).unwrap().len(), 64);
    }
    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "part"))
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_bulk_unit_merges_periods_in_order() {
    let server = MockServer::start().await;
    serve_archive(&server, "ABC", "2024-01", monthly_archive("ABC", "2024-01", 0, 31)).await;
    serve_archive(&server, "ABC", "2024-02", monthly_archive("ABC", "2024-02", 31, 29)).await;
    serve_archive(&server, "ABC", "2024-03", monthly_archive("ABC", "2024-03", 60, 31)).await;

    let dir = TempDir::new().unwrap();
    let config = bulk_config(&dir, &server);
    let summary = AcquisitionExecutor::new(Client::new(), &config)
        .run(&["ABC".to_string()], &[Interval::OneDay], AcquisitionMode::Bulk)
        .await;

    assert!(!summary.has_failures());
    let report = summary
        .outcome("ABC", Interval::OneDay)
        .unwrap()
        .result
        .as_ref()
        .unwrap();
    match report {
        UnitReport::Bulk {
            merge,
            failed_archives,
        } => {
            assert_eq!(merge.archives, 3);
            assert_eq!(merge.fragments, 3);
            assert_eq!(merge.rows, 91);
            assert!(failed_archives.is_empty());
        }
        other => panic!("expected bulk report, got {other:?}"),
    }

    let merged = unit_dir(&dir, "ABC").join("ABC_1d.csv");
    assert_eq!(report.output(), &merged);

    let content = std::fs::read_to_string(&merged).unwrap();
    let expected = format!("{}{}{}", fragment(0, 31), fragment(31, 29), fragment(60, 31));
    assert_eq!(content, expected);
}

#[tokio::test]
async fn test_missing_period_is_reported_and_rest_is_merged() {
    let server = MockServer::start().await;
    serve_archive(&server, "ABC", "2024-01", monthly_archive("ABC", "2024-01", 0, 31)).await;
    serve_archive(&server, "ABC", "2024-03", monthly_archive("ABC", "2024-03", 60, 31)).await;

    let dir = TempDir::new().unwrap();
    let mut config = bulk_config(&dir, &server);
    config.retry.max_retries = 0;
    let summary = AcquisitionExecutor::new(Client::new(), &config)
        .run(&["ABC".to_string()], &[Interval::OneDay], AcquisitionMode::Bulk)
        .await;

    let report = summary
        .outcome("ABC", Interval::OneDay)
        .unwrap()
        .result
        .as_ref()
        .unwrap();
    assert_eq!(report.rows(), 62);
    assert_eq!(report.failed_archives().len(), 1);
    assert_eq!(report.failed_archives()[0].reference.period, "2024-02");
}

#[tokio::test]
async fn test_checksum_verification_rejects_mismatch() {
    let server = MockServer::start().await;
    let january = monthly_archive("ABC", "2024-01", 0, 31);
    let february = monthly_archive("ABC", "2024-02", 31, 29);
    let march = monthly_archive("ABC", "2024-03", 60, 31);

    serve_checksum(&server, "ABC", "2024-01", &format!("{:x}", Sha256::digest(&january))).await;
    serve_checksum(&server, "ABC", "2024-02", &"0".repeat(64)).await;
    serve_checksum(&server, "ABC", "2024-03", &format!("{:x}", Sha256::digest(&march))).await;
    serve_archive(&server, "ABC", "2024-01", january).await;
    serve_archive(&server, "ABC", "2024-02", february).await;
    serve_archive(&server, "ABC", "2024-03", march).await;

    let dir = TempDir::new().unwrap();
    let mut config = bulk_config(&dir, &server);
    config.bulk.verify_checksum = true;
    let summary = AcquisitionExecutor::new(Client::new(), &config)
        .run(&["ABC".to_string()], &[Interval::OneDay], AcquisitionMode::Bulk)
        .await;

    let report = summary
        .outcome("ABC", Interval::OneDay)
        .unwrap()
        .result
        .as_ref()
        .unwrap();
    assert_eq!(report.rows(), 62);
    let failed = report.failed_archives();
    assert_eq!(failed.len(), 1);
    assert!(matches!(failed[0].error, ArchiveError::ChecksumMismatch { .. }));
    assert!(!unit_dir(&dir, "ABC").join("ABC-1d-2024-02.zip").exists());
    assert!(!unit_dir(&dir, "ABC").join("ABC-1d-2024-02.zip.part").exists());
}

#[tokio::test]
async fn test_missing_checksum_keeps_archive_out_of_merge() {
    let server = MockServer::start().await;
    let january = monthly_archive("ABC", "2024-01", 0, 31);
    let february = monthly_archive("ABC", "2024-02", 31, 29);
    let march = monthly_archive("ABC", "2024-03", 60, 31);

    serve_checksum(&server, "ABC", "2024-01", &format!("{:x}", Sha256::digest(&january))).await;
    // No CHECKSUM published for 2024-02
    serve_checksum(&server, "ABC", "2024-03", &format!("{:x}", Sha256::digest(&march))).await;
    serve_archive(&server, "ABC", "2024-01", january).await;
    serve_archive(&server, "ABC", "2024-02", february).await;
    serve_archive(&server, "ABC", "2024-03", march).await;

    let dir = TempDir::new().unwrap();
    let mut config = bulk_config(&dir, &server);
    config.bulk.verify_checksum = true;
    let summary = AcquisitionExecutor::new(Client::new(), &config)
        .run(&["ABC".to_string()], &[Interval::OneDay], AcquisitionMode::Bulk)
        .await;

    let report = summary
        .outcome("ABC", Interval::OneDay)
        .unwrap()
        .result
        .as_ref()
        .unwrap();
    let failed = report.failed_archives();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].reference.period, "2024-02");
    assert!(matches!(
        failed[0].error,
        ArchiveError::DownloadStatus { status: 404, .. }
    ));
    assert_eq!(report.rows(), 62);

    let work = unit_dir(&dir, "ABC");
    assert!(!work.join("ABC-1d-2024-02.zip").exists());
    assert!(!work.join("ABC-1d-2024-02.zip.part").exists());
    assert!(!work.join("ABC-1d-2024-02.csv").exists());
    let merged = std::fs::read_to_string(work.join("ABC_1d.csv")).unwrap();
    assert_eq!(merged, format!("{}{}", fragment(0, 31), fragment(60, 31)));
}

#[tokio::test]
async fn test_failed_verification_removes_stale_archive() {
    let server = MockServer::start().await;
    let january = monthly_archive("ABC", "2024-01", 0, 31);
    serve_checksum(&server, "ABC", "2024-01", &"f".repeat(64)).await;
    serve_archive(&server, "ABC", "2024-01", january.clone()).await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("ABC-1d-2024-01.zip");
    // Left behind by an earlier run
    std::fs::write(&destination, &january).unwrap();

    let reference = ArchiveReference {
        url: format!("{}{}", server.uri(), archive_path("ABC", "2024-01")),
        destination: destination.clone(),
        period: "2024-01".to_string(),
    };
    let err = ArchiveRetriever::new(Client::new(), RetryPolicy::none())
        .with_checksum_verification(true)
        .download(&reference)
        .await
        .unwrap_err();

    assert!(matches!(err, ArchiveError::ChecksumMismatch { .. }));
    assert!(!destination.exists());
    assert!(!dir.path().join("ABC-1d-2024-01.zip.part").exists());
}

#[tokio::test]
async fn test_corrupt_archive_fails_only_its_unit() {
    let server = MockServer::start().await;
    serve_archive(&server, "GOOD", "2024-01", monthly_archive("GOOD", "2024-01", 0, 31)).await;
    serve_archive(&server, "BAD", "2024-01", b"definitely not a zip".to_vec()).await;

    let dir = TempDir::new().unwrap();
    let mut config = bulk_config(&dir, &server);
    config.bulk.end_date = config.bulk.start_date;
    let summary = AcquisitionExecutor::new(Client::new(), &config)
        .run(
            &["GOOD".to_string(), "BAD".to_string()],
            &[Interval::OneDay],
            AcquisitionMode::Bulk,
        )
        .await;

    assert!(summary.has_failures());
    let good = summary.outcome("GOOD", Interval::OneDay).unwrap();
    assert_eq!(good.result.as_ref().unwrap().rows(), 31);

    let bad = summary.outcome("BAD", Interval::OneDay).unwrap();
    assert!(matches!(
        bad.result,
        Err(AcquisitionError::Archive(ArchiveError::Extraction { .. }))
    ));
    assert!(!unit_dir(&dir, "BAD").join("BAD_1d.csv").exists());
}

#[tokio::test]
async fn test_no_archives_available_fails_unit() {
    let server = MockServer::start().await;

    let dir = TempDir::new().unwrap();
    let mut config = bulk_config(&dir, &server);
    config.retry.max_retries = 0;
    let summary = AcquisitionExecutor::new(Client::new(), &config)
        .run(&["NONE".to_string()], &[Interval::OneDay], AcquisitionMode::Bulk)
        .await;

    let outcome = summary.outcome("NONE", Interval::OneDay).unwrap();
    assert!(matches!(
        outcome.result,
        Err(AcquisitionError::Archive(ArchiveError::Merge { .. }))
    ));
}
