//! Bulk archive acquisition from the Binance Vision mirror
//!
//! - [`enumerator`] - lazy, restartable sequence of monthly or daily archive locations
//! - [`retriever`] - bounded-concurrency streaming downloads with per-archive failure isolation
//! - [`merge`] - flat extraction and period-ordered concatenation of fragments

use std::path::PathBuf;

pub mod enumerator;
pub mod merge;
pub mod retriever;

pub use enumerator::{ArchiveLocator, ArchivePeriod, ArchivePeriods, ArchiveReference, Granularity};
pub use merge::{materialize, MergeReport};
pub use retriever::{ArchiveRetriever, FailedArchive, RetrievalReport};

/// Archive errors
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Non-success status for one archive
    #[error("download of {url} failed: HTTP {status}")]
    DownloadStatus {
        /// Archive URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Transport failure for one archive
    #[error("download of {url} failed: {reason}")]
    DownloadTransport {
        /// Archive URL
        url: String,
        /// Underlying error
        reason: String,
    },

    /// Local filesystem error
    #[error("IO error on {path}: {reason}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// Downloaded archive does not match its published checksum
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Archive URL
        url: String,
        /// Published SHA-256
        expected: String,
        /// SHA-256 of the downloaded bytes
        actual: String,
    },

    /// Corrupt or unreadable archive
    #[error("failed to extract {path}: {reason}")]
    Extraction {
        /// Archive path
        path: PathBuf,
        /// Underlying error
        reason: String,
    },

    /// Unreadable or malformed fragment, or nothing to merge
    #[error("failed to merge {path}: {reason}")]
    Merge {
        /// Fragment or directory path
        path: PathBuf,
        /// Underlying error
        reason: String,
    },
}

impl ArchiveError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        ArchiveError::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
