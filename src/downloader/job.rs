//! Acquisition units and their outcomes

use crate::archive::{FailedArchive, MergeReport};
use crate::downloader::AcquisitionError;
use crate::Interval;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;

/// Acquisition path for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionMode {
    /// Backward pagination over the REST API
    #[default]
    Api,
    /// Archive download, extraction and merge
    Bulk,
}

impl AcquisitionMode {
    /// Lowercase label, also used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionMode::Api => "api",
            AcquisitionMode::Bulk => "bulk",
        }
    }
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AcquisitionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "api" => Ok(AcquisitionMode::Api),
            "bulk" => Ok(AcquisitionMode::Bulk),
            _ => Err(format!("Invalid mode: {s}. Valid options: api, bulk")),
        }
    }
}

/// One (symbol, interval) pair; independent of every other unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AcquisitionUnit {
    /// Trading symbol
    pub symbol: String,
    /// Kline interval
    pub interval: Interval,
}

impl AcquisitionUnit {
    /// Create a unit
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
        }
    }

    /// Every distinct (symbol, interval) pair, symbols outermost.
    ///
    /// Repeated pairs are dropped after their first occurrence, so no two
    /// units ever share a working directory or dataset path.
    pub fn cross_product(symbols: &[String], intervals: &[Interval]) -> Vec<Self> {
        let mut seen = HashSet::new();
        symbols
            .iter()
            .flat_map(|symbol| {
                intervals
                    .iter()
                    .map(move |interval| Self::new(symbol.clone(), *interval))
            })
            .filter(|unit| seen.insert(unit.clone()))
            .collect()
    }
}

impl std::fmt::Display for AcquisitionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.symbol, self.interval)
    }
}

/// What a successful unit produced
#[derive(Debug)]
pub enum UnitReport {
    /// API path: dataset written with a header row
    Api {
        /// Dataset path
        path: PathBuf,
        /// Data rows written
        rows: usize,
    },
    /// Bulk path: merged header-less file
    Bulk {
        /// Merge result
        merge: MergeReport,
        /// Archives that could not be downloaded
        failed_archives: Vec<FailedArchive>,
    },
}

impl UnitReport {
    /// Final output file
    pub fn output(&self) -> &PathBuf {
        match self {
            UnitReport::Api { path, .. } => path,
            UnitReport::Bulk { merge, .. } => &merge.output,
        }
    }

    /// Rows in the final output (header excluded)
    pub fn rows(&self) -> u64 {
        match self {
            UnitReport::Api { rows, .. } => *rows as u64,
            UnitReport::Bulk { merge, .. } => merge.rows,
        }
    }

    /// Archives that failed within an otherwise successful bulk unit
    pub fn failed_archives(&self) -> &[FailedArchive] {
        match self {
            UnitReport::Api { .. } => &[],
            UnitReport::Bulk {
                failed_archives, ..
            } => failed_archives,
        }
    }
}

/// A unit tagged with its result
#[derive(Debug)]
pub struct UnitOutcome {
    /// The unit
    pub unit: AcquisitionUnit,
    /// Report on success, cause on failure
    pub result: Result<UnitReport, AcquisitionError>,
}

impl UnitOutcome {
    /// Whether the unit succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of every unit of a run, in completion order
#[derive(Debug)]
pub struct RunSummary {
    /// Mode the run used
    pub mode: AcquisitionMode,
    /// Per-unit outcomes
    pub outcomes: Vec<UnitOutcome>,
}

impl RunSummary {
    /// True if any unit failed; drives the process exit code
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|outcome| !outcome.is_success())
    }

    /// Units that succeeded
    pub fn succeeded(&self) -> impl Iterator<Item = (&AcquisitionUnit, &UnitReport)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok().map(|r| (&outcome.unit, r)))
    }

    /// Units that failed
    pub fn failed(&self) -> impl Iterator<Item = (&AcquisitionUnit, &AcquisitionError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().map(|e| (&outcome.unit, e)))
    }

    /// Outcome for one unit, if it ran
    pub fn outcome(&self, symbol: &str, interval: Interval) -> Option<&UnitOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.unit.symbol == symbol && o.unit.interval == interval)
    }
}
