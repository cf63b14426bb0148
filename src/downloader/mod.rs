//! Acquisition orchestration, retry policy and request spacing
//!
//! # Overview
//!
//! 1. **Units**: the symbol × interval cross product, see [`job::AcquisitionUnit`]
//! 2. **Execution**: [`executor::AcquisitionExecutor`] runs each unit through
//!    the API or bulk pipeline with bounded concurrency
//! 3. **Spacing**: per-unit delay between consecutive API calls via
//!    [`rate_limit::RequestSpacing`]
//! 4. **Outcomes**: every unit ends as a tagged [`job::UnitOutcome`]; one
//!    unit's failure never stops its siblings
//!
//! # Components
//!
//! - [`executor`] - fan-out over units, shutdown handling, progress
//! - [`job`] - units, reports and the run summary
//! - [`rate_limit`] - request spacing
//! - [`config`] - constants and [`config::RetryPolicy`]

pub mod config;
pub mod executor;
pub mod job;
pub mod rate_limit;

pub use config::RetryPolicy;
pub use executor::AcquisitionExecutor;
pub use job::{AcquisitionMode, AcquisitionUnit, RunSummary, UnitOutcome, UnitReport};
pub use rate_limit::RequestSpacing;

use crate::archive::ArchiveError;
use crate::fetcher::FetcherError;
use crate::output::OutputError;

/// Why an acquisition unit failed
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    /// Pagination or REST failure
    #[error("fetch failed: {0}")]
    Fetcher(#[from] FetcherError),

    /// Archive download, extraction or merge failure
    #[error("archive failed: {0}")]
    Archive(#[from] ArchiveError),

    /// Dataset could not be written
    #[error("output failed: {0}")]
    Output(#[from] OutputError),

    /// Unit skipped because shutdown was requested before it started
    #[error("cancelled before start")]
    Cancelled,

    /// A blocking task panicked or was aborted
    #[error("task failed: {0}")]
    TaskFailed(String),
}
