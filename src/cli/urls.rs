//! `urls` command: dry run of the archive enumerator

use clap::Args;

use super::{CliError, SelectionArgs};
use crate::archive::ArchiveLocator;
use crate::config::{ConfigError, CrawlConfig};

/// Arguments of `urls`
#[derive(Args, Debug, Clone, Default)]
pub struct UrlsArgs {
    /// Symbol, interval and date-range overrides
    #[command(flatten)]
    pub selection: SelectionArgs,
}

impl UrlsArgs {
    /// Every archive URL in enumeration order, unit by unit
    pub fn collect_urls(&self, mut config: CrawlConfig) -> Result<Vec<String>, CliError> {
        self.selection.apply(&mut config);
        if config.bulk.start_date > config.bulk.end_date {
            return Err(ConfigError::Invalid(format!(
                "start date {} is after end date {}",
                config.bulk.start_date, config.bulk.end_date
            ))
            .into());
        }

        let mut urls = Vec::new();
        for symbol in &config.symbols {
            for interval in &config.intervals {
                let locator = ArchiveLocator::new(
                    &config.bulk.base_url,
                    symbol,
                    *interval,
                    config.bulk.granularity,
                );
                urls.extend(locator.urls(config.bulk.start_date, config.bulk.end_date));
            }
        }
        Ok(urls)
    }

    /// Print the URLs, one per line
    pub fn execute(&self, config: CrawlConfig) -> Result<(), CliError> {
        for url in self.collect_urls(config)? {
            println!("{url}");
        }
        Ok(())
    }
}
