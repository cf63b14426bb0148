//! On-disk layout
//!
//! - API datasets: `{output_dir}/{SYMBOL}_{INTERVAL}.csv`
//! - Bulk working directories: `{data_dir}/{SYMBOL}/{INTERVAL}/`, holding the
//!   raw archives, the extracted fragments and the merged
//!   `{SYMBOL}_{INTERVAL}.csv`

use std::path::{Path, PathBuf};

use crate::Interval;

/// `{SYMBOL}_{INTERVAL}.csv`
pub fn dataset_file_name(symbol: &str, interval: Interval) -> String {
    format!("{symbol}_{interval}.csv")
}

/// Dataset path inside `folder`
pub fn dataset_path(folder: &Path, symbol: &str, interval: Interval) -> PathBuf {
    folder.join(dataset_file_name(symbol, interval))
}

/// Working directory of one bulk acquisition unit
pub fn working_dir(data_dir: &Path, symbol: &str, interval: Interval) -> PathBuf {
    data_dir.join(symbol).join(interval.as_str())
}
