//! `run` command

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

use super::{CliError, SelectionArgs};
use crate::config::CrawlConfig;
use crate::downloader::{AcquisitionExecutor, AcquisitionMode, RunSummary};
use crate::shutdown::SharedShutdown;

/// Upper bound on `--max-workers`
const MAX_WORKERS_LIMIT: usize = 32;

fn parse_max_workers(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("max workers must be at least 1".to_string());
    }
    if value > MAX_WORKERS_LIMIT {
        return Err(format!(
            "max workers {value} exceeds maximum of {MAX_WORKERS_LIMIT}"
        ));
    }
    Ok(value)
}

/// Arguments of `run`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Symbol, interval and date-range overrides
    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Acquisition path: api or bulk
    #[arg(long)]
    pub mode: Option<AcquisitionMode>,

    /// Maximum acquisition units in flight
    #[arg(long, value_parser = parse_max_workers)]
    pub max_workers: Option<usize>,

    /// Folder receiving API datasets
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Root of the bulk working directories
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl RunArgs {
    /// Overwrite `config` with every flag that was given
    pub fn apply(&self, config: &mut CrawlConfig) {
        self.selection.apply(config);
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(max_workers) = self.max_workers {
            config.max_workers = max_workers;
        }
        if let Some(dir) = &self.output_dir {
            config.api.output_dir = dir.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.bulk.data_dir = dir.clone();
        }
    }

    /// Run the crawl and print a summary.
    ///
    /// Returns [`CliError::UnitsFailed`] when any unit failed.
    pub async fn execute(
        &self,
        mut config: CrawlConfig,
        shutdown: SharedShutdown,
    ) -> Result<RunSummary, CliError> {
        self.apply(&mut config);
        config.validate()?;

        let mut executor = AcquisitionExecutor::from_config(&config)?.with_shutdown(shutdown);
        let progress = if self.no_progress {
            None
        } else {
            Some(create_progress_bar())
        };
        if let Some(progress) = &progress {
            executor = executor.with_progress(progress.clone());
        }

        info!(
            mode = %config.mode,
            symbols = ?config.symbols,
            intervals = config.intervals.len(),
            "Running crawl"
        );
        let summary = executor
            .run(&config.symbols, &config.intervals, config.mode)
            .await;

        if let Some(progress) = progress {
            progress.finish_and_clear();
        }
        print_summary(&summary);

        if summary.has_failures() {
            return Err(CliError::UnitsFailed {
                failed: summary.failed().count(),
                total: summary.outcomes.len(),
            });
        }
        Ok(summary)
    }
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{} run: {} succeeded, {} failed",
        summary.mode,
        summary.succeeded().count(),
        summary.failed().count()
    );

    for (unit, report) in summary.succeeded() {
        println!(
            "  [OK]     {unit}: {} rows -> {}",
            report.rows(),
            report.output().display()
        );
        for failed in report.failed_archives() {
            println!("           missing archive {}: {}", failed.reference.url, failed.error);
        }
    }
    for (unit, error) in summary.failed() {
        println!("  [FAILED] {unit}: {error}");
    }
}
