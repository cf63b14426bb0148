//! Acquisition executor
//!
//! Fans the symbol × interval cross product out over at most `max_workers`
//! concurrent units. API units share one capture instant as their end time;
//! bulk units each own a working directory. Every unit ends as a tagged
//! [`UnitOutcome`], so a failing unit is logged and reported without touching
//! its siblings.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use indicatif::ProgressBar;
use reqwest::Client;
use tracing::{error, info, warn, Instrument};

use crate::archive::{materialize, ArchiveError, ArchiveLocator, ArchiveRetriever};
use crate::config::{ApiConfig, BulkConfig, CrawlConfig};
use crate::downloader::config::RetryPolicy;
use crate::downloader::job::{
    AcquisitionMode, AcquisitionUnit, RunSummary, UnitOutcome, UnitReport,
};
use crate::downloader::rate_limit::RequestSpacing;
use crate::downloader::AcquisitionError;
use crate::fetcher::{fetch_klines_backward, BinanceSpotKlines, KlinePageSource};
use crate::metrics::UnitMetrics;
use crate::output::{dataset_file_name, working_dir, write_dataset};
use crate::shutdown::{self, SharedShutdown};
use crate::Interval;

/// Runs acquisition units for one crawl
pub struct AcquisitionExecutor {
    client: Client,
    retry: RetryPolicy,
    max_workers: usize,
    api: ApiConfig,
    bulk: BulkConfig,
    shutdown: Option<SharedShutdown>,
    progress: Option<ProgressBar>,
}

impl AcquisitionExecutor {
    /// Executor with its own HTTP client built from `config`
    pub fn from_config(config: &CrawlConfig) -> Result<Self, AcquisitionError> {
        Ok(Self::new(config.http_client()?, config))
    }

    /// Executor sharing an existing HTTP client
    pub fn new(client: Client, config: &CrawlConfig) -> Self {
        Self {
            client,
            retry: config.retry_policy(),
            max_workers: config.max_workers.max(1),
            api: config.api.clone(),
            bulk: config.bulk.clone(),
            shutdown: shutdown::get_global_shutdown(),
            progress: None,
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Advance `progress` once per finished unit
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run every (symbol, interval) pair in `mode`.
    ///
    /// Never fails as a whole; inspect [`RunSummary::has_failures`].
    pub async fn run(
        &self,
        symbols: &[String],
        intervals: &[Interval],
        mode: AcquisitionMode,
    ) -> RunSummary {
        let units = AcquisitionUnit::cross_product(symbols, intervals);
        // One capture instant for the whole run
        let end_time = Utc::now().timestamp_millis();

        info!(
            mode = %mode,
            units = units.len(),
            max_workers = self.max_workers,
            "Starting crawl"
        );
        if let Some(progress) = &self.progress {
            progress.set_length(units.len() as u64);
        }

        let outcomes: Vec<UnitOutcome> = stream::iter(units)
            .map(|unit| async move {
                let result = self.run_unit(&unit, mode, end_time).await;
                if let Some(progress) = &self.progress {
                    progress.set_message(unit.to_string());
                    progress.inc(1);
                }
                UnitOutcome { unit, result }
            })
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        let summary = RunSummary { mode, outcomes };
        info!(
            succeeded = summary.succeeded().count(),
            failed = summary.failed().count(),
            "Crawl finished"
        );
        summary
    }

    async fn run_unit(
        &self,
        unit: &AcquisitionUnit,
        mode: AcquisitionMode,
        end_time: i64,
    ) -> Result<UnitReport, AcquisitionError> {
        if self.shutdown_requested() {
            warn!(symbol = %unit.symbol, interval = %unit.interval, "Shutdown requested - skipping unit");
            return Err(AcquisitionError::Cancelled);
        }

        let span = tracing::info_span!(
            "acquisition_unit",
            symbol = %unit.symbol,
            interval = %unit.interval,
            mode = %mode
        );
        let unit_metrics = UnitMetrics::start(mode.as_str());

        let result = async {
            info!("Starting acquisition unit");
            match mode {
                AcquisitionMode::Api => self.run_api_unit(unit, end_time).await,
                AcquisitionMode::Bulk => self.run_bulk_unit(unit).await,
            }
        }
        .instrument(span.clone())
        .await;

        span.in_scope(|| match &result {
            Ok(report) => {
                unit_metrics.record_success();
                info!(
                    rows = report.rows(),
                    output = %report.output().display(),
                    failed_archives = report.failed_archives().len(),
                    "Acquisition unit finished"
                );
            }
            Err(e) => {
                unit_metrics.record_failure();
                error!(
                    symbol = %unit.symbol,
                    interval = %unit.interval,
                    error = %e,
                    "Acquisition unit failed"
                );
            }
        });

        result
    }

    async fn run_api_unit(
        &self,
        unit: &AcquisitionUnit,
        end_time: i64,
    ) -> Result<UnitReport, AcquisitionError> {
        let source = BinanceSpotKlines::new(self.client.clone(), &self.api.base_url, self.retry);
        self.acquire_api(&source, unit, end_time).await
    }

    /// API pipeline for one unit against any page source: paginate backward
    /// from `end_time`, then write the dataset.
    pub async fn acquire_api<S>(
        &self,
        source: &S,
        unit: &AcquisitionUnit,
        end_time: i64,
    ) -> Result<UnitReport, AcquisitionError>
    where
        S: KlinePageSource + ?Sized,
    {
        let mut spacing = RequestSpacing::new(self.api.request_delay());
        let klines = fetch_klines_backward(
            source,
            &unit.symbol,
            unit.interval,
            end_time,
            self.api.page_size,
            &mut spacing,
        )
        .await?;

        let rows = klines.len();
        let symbol = unit.symbol.clone();
        let interval = unit.interval;
        let folder = self.api.output_dir.clone();
        let path =
            tokio::task::spawn_blocking(move || write_dataset(&klines, &symbol, interval, &folder))
                .await
                .map_err(|e| AcquisitionError::TaskFailed(e.to_string()))??;

        Ok(UnitReport::Api { path, rows })
    }

    async fn run_bulk_unit(&self, unit: &AcquisitionUnit) -> Result<UnitReport, AcquisitionError> {
        let dir = working_dir(&self.bulk.data_dir, &unit.symbol, unit.interval);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ArchiveError::io(&dir, e))?;

        let locator = ArchiveLocator::new(
            &self.bulk.base_url,
            &unit.symbol,
            unit.interval,
            self.bulk.granularity,
        );
        let retriever = ArchiveRetriever::new(self.client.clone(), self.retry)
            .with_checksum_verification(self.bulk.verify_checksum);

        let retrieval = retriever
            .retrieve(
                locator.references(self.bulk.start_date, self.bulk.end_date, &dir),
                self.bulk.download_concurrency,
            )
            .await;

        if !retrieval.failed.is_empty() {
            warn!(
                saved = retrieval.saved.len(),
                failed = retrieval.failed.len(),
                "Some archives could not be downloaded"
            );
        }

        let output_name = dataset_file_name(&unit.symbol, unit.interval);
        let merge = tokio::task::spawn_blocking(move || materialize(&dir, &output_name))
            .await
            .map_err(|e| AcquisitionError::TaskFailed(e.to_string()))??;

        Ok(UnitReport::Bulk {
            merge,
            failed_archives: retrieval.failed,
        })
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|s| s.is_shutdown_requested())
            .unwrap_or(false)
    }
}
