//! Dataset writers and on-disk layout

use crate::Kline;

pub mod csv;
pub mod path;

pub use self::csv::{write_dataset, CsvKlinesWriter, KLINE_COLUMNS};
pub use self::path::{dataset_file_name, dataset_path, working_dir};

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    Csv(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data to disk
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output
    fn close(self) -> OutputResult<()>;
}

/// Trait for writing klines
pub trait KlinesWriter: OutputWriter {
    /// Write a single kline
    fn write_kline(&mut self, kline: &Kline) -> OutputResult<()>;

    /// Write multiple klines at once
    fn write_klines(&mut self, klines: &[Kline]) -> OutputResult<()> {
        for kline in klines {
            self.write_kline(kline)?;
        }
        Ok(())
    }
}
