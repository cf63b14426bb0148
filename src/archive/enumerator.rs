//! Archive URL enumeration
//!
//! Pure data generation: no network or filesystem access happens here.
//!
//! URL pattern:
//! `{base}/data/spot/{monthly|daily}/klines/{SYMBOL}/{INTERVAL}/{SYMBOL}-{INTERVAL}-{PERIOD}.zip`
//! where `PERIOD` is `YYYY-MM` (monthly) or `YYYY-MM-DD` (daily).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::fetcher::binance_config::SPOT_CONFIG;
use crate::Interval;

/// Archive publication granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One archive per calendar month
    Monthly,
    /// One archive per calendar day
    Daily,
}

impl Granularity {
    /// Path component on the mirror
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Monthly => "monthly",
            Granularity::Daily => "daily",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monthly" => Ok(Granularity::Monthly),
            "daily" => Ok(Granularity::Daily),
            _ => Err(format!(
                "Invalid granularity: {s}. Valid options: monthly, daily"
            )),
        }
    }
}

/// One calendar period covered by an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchivePeriod {
    date: NaiveDate,
    granularity: Granularity,
}

impl ArchivePeriod {
    /// First day covered (for monthly periods, the first period may start mid-month)
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Period token used in archive names: `YYYY-MM` or `YYYY-MM-DD`
    pub fn token(&self) -> String {
        match self.granularity {
            Granularity::Monthly => self.date.format("%Y-%m").to_string(),
            Granularity::Daily => self.date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Lazy, finite sequence of periods from `start` to `end` inclusive.
///
/// Cloning yields an independent iterator from the same position, so a fresh
/// `ArchivePeriods::new` (or a clone taken before iteration) restarts the
/// sequence.
#[derive(Debug, Clone)]
pub struct ArchivePeriods {
    next: Option<NaiveDate>,
    end: NaiveDate,
    granularity: Granularity,
}

impl ArchivePeriods {
    /// Periods covering `start..=end`. Empty when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate, granularity: Granularity) -> Self {
        Self {
            next: Some(start),
            end,
            granularity,
        }
    }
}

impl Iterator for ArchivePeriods {
    type Item = ArchivePeriod;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|date| *date <= self.end)?;

        self.next = match self.granularity {
            Granularity::Monthly => first_of_next_month(current),
            Granularity::Daily => current.succ_opt(),
        };

        Some(ArchivePeriod {
            date: current,
            granularity: self.granularity,
        })
    }
}

/// Calendar-safe month advancement: always lands on day 1 of the following month.
pub fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Remote location and local destination of one archive
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveReference {
    /// Remote archive URL
    pub url: String,
    /// Local path the archive is saved to
    pub destination: PathBuf,
    /// Period token the archive covers
    pub period: String,
}

impl ArchiveReference {
    /// File name of the archive (last path component of the destination)
    pub fn file_name(&self) -> String {
        self.destination
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Builds archive names and URLs for one (symbol, interval)
#[derive(Debug, Clone)]
pub struct ArchiveLocator {
    base_url: String,
    symbol: String,
    interval: Interval,
    granularity: Granularity,
}

impl ArchiveLocator {
    /// Locator rooted at `base_url` (e.g. <https://data.binance.vision>)
    pub fn new(
        base_url: impl Into<String>,
        symbol: impl Into<String>,
        interval: Interval,
        granularity: Granularity,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            symbol: symbol.into(),
            interval,
            granularity,
        }
    }

    /// Locator for the public mirror
    pub fn production(symbol: impl Into<String>, interval: Interval, granularity: Granularity) -> Self {
        Self::new(SPOT_CONFIG.archive_base_url, symbol, interval, granularity)
    }

    /// `{SYMBOL}-{INTERVAL}-{PERIOD}.zip`
    pub fn file_name(&self, period: &ArchivePeriod) -> String {
        format!("{}-{}-{}.zip", self.symbol, self.interval, period.token())
    }

    /// Full archive URL for a period
    pub fn url(&self, period: &ArchivePeriod) -> String {
        format!(
            "{}{}/{}/klines/{}/{}/{}",
            self.base_url,
            SPOT_CONFIG.archive_klines_prefix,
            self.granularity,
            self.symbol,
            self.interval,
            self.file_name(period)
        )
    }

    /// Lazy sequence of archive URLs for `start..=end`
    pub fn urls(&self, start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = String> + Clone + '_ {
        ArchivePeriods::new(start, end, self.granularity).map(move |period| self.url(&period))
    }

    /// Lazy sequence of archive references saving into `working_dir`
    pub fn references<'a>(
        &'a self,
        start: NaiveDate,
        end: NaiveDate,
        working_dir: &'a Path,
    ) -> impl Iterator<Item = ArchiveReference> + Clone + 'a {
        ArchivePeriods::new(start, end, self.granularity).map(move |period| ArchiveReference {
            url: self.url(&period),
            destination: working_dir.join(self.file_name(&period)),
            period: period.token(),
        })
    }
}
