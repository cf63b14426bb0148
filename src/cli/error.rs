//! CLI error types and conversions

use crate::config::ConfigError;
use crate::downloader::AcquisitionError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Executor could not be built (HTTP client construction)
    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Metrics exporter could not be installed
    #[error("metrics error: {0}")]
    Metrics(String),

    /// The run finished but some units failed
    #[error("{failed} of {total} acquisition unit(s) failed")]
    UnitsFailed {
        /// Failed units
        failed: usize,
        /// Units in the run
        total: usize,
    },
}
