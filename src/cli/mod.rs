//! CLI command implementations
//!
//! `kline-crawler [--config FILE] [--metrics-addr ADDR] <run|urls>`; flags
//! given on the command line override values from the config file.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::archive::Granularity;
use crate::config::CrawlConfig;
use crate::Interval;

pub mod error;
pub mod run;
pub mod urls;

pub use error::CliError;
pub use run::RunArgs;
pub use urls::UrlsArgs;

/// Crawl historical Binance spot klines
#[derive(Parser, Debug)]
#[command(name = "kline-crawler", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire klines for every symbol × interval pair
    Run(RunArgs),

    /// Print the archive URLs a bulk run would download, without any I/O
    Urls(UrlsArgs),
}

impl Cli {
    /// Config file contents, or defaults when no file was given
    pub fn load_config(&self) -> Result<CrawlConfig, CliError> {
        match &self.config {
            Some(path) => Ok(CrawlConfig::load(path)?),
            None => Ok(CrawlConfig::default()),
        }
    }
}

/// Symbol, interval and date-range overrides shared by commands
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Comma-separated symbols, e.g. BTCUSDT,ETHUSDT
    #[arg(long, value_delimiter = ',')]
    pub symbols: Option<Vec<String>>,

    /// Comma-separated intervals, e.g. 1d,4h
    #[arg(long, value_delimiter = ',')]
    pub intervals: Option<Vec<Interval>>,

    /// First archive day (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last archive day (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Archive granularity: monthly or daily
    #[arg(long)]
    pub granularity: Option<Granularity>,
}

impl SelectionArgs {
    /// Overwrite `config` with every flag that was given
    pub fn apply(&self, config: &mut CrawlConfig) {
        if let Some(symbols) = &self.symbols {
            config.symbols = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
        }
        if let Some(intervals) = &self.intervals {
            config.intervals = intervals.clone();
        }
        if let Some(start) = self.start_date {
            config.bulk.start_date = start;
        }
        if let Some(end) = self.end_date {
            config.bulk.end_date = end;
        }
        if let Some(granularity) = self.granularity {
            config.bulk.granularity = granularity;
        }
    }
}
