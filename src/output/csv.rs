//! CSV dataset writer
//!
//! Projects klines to the seven canonical columns
//! `OpenTime,Open,High,Low,Close,Volume,CloseTime`. Decimals are written with
//! their original scale, so identical input always gives byte-identical files.

use crate::{Interval, Kline};
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::path::dataset_path;
use super::{KlinesWriter, OutputError, OutputResult, OutputWriter};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// Header row of every API dataset
pub const KLINE_COLUMNS: [&str; 7] = [
    "OpenTime",
    "Open",
    "High",
    "Low",
    "Close",
    "Volume",
    "CloseTime",
];

/// Persisted projection of a kline
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct KlineRecord {
    open_time: i64,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
    close_time: i64,
}

impl From<&Kline> for KlineRecord {
    fn from(kline: &Kline) -> Self {
        Self {
            open_time: kline.open_time,
            open: kline.open.to_string(),
            high: kline.high.to_string(),
            low: kline.low.to_string(),
            close: kline.close.to_string(),
            volume: kline.volume.to_string(),
            close_time: kline.close_time,
        }
    }
}

/// CSV writer for klines
pub struct CsvKlinesWriter {
    writer: Writer<BufWriter<File>>,
    klines_written: u64,
}

impl CsvKlinesWriter {
    /// Create (or truncate) `path` and write the header row.
    ///
    /// The parent directory is created if missing.
    pub fn new<P: AsRef<Path>>(path: P) -> OutputResult<Self> {
        Self::new_with_buffer_size(path, DEFAULT_BUFFER_SIZE)
    }

    /// Same as [`CsvKlinesWriter::new`] with a custom write buffer size
    pub fn new_with_buffer_size<P: AsRef<Path>>(
        path: P,
        buffer_size: usize,
    ) -> OutputResult<Self> {
        let path = path.as_ref();
        debug!("Creating CSV writer: path={}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::Io(format!("Failed to create directory: {e}")))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::Io(format!("Failed to create file: {e}")))?;

        let buf_writer = BufWriter::with_capacity(buffer_size, file);
        // Header is written up front so an empty dataset still carries it
        let mut csv_writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(buf_writer);
        csv_writer
            .write_record(KLINE_COLUMNS)
            .map_err(|e| OutputError::Csv(format!("Failed to write header: {e}")))?;

        Ok(Self {
            writer: csv_writer,
            klines_written: 0,
        })
    }

    /// Number of klines written so far
    pub fn klines_written(&self) -> u64 {
        self.klines_written
    }
}

impl KlinesWriter for CsvKlinesWriter {
    fn write_kline(&mut self, kline: &Kline) -> OutputResult<()> {
        self.writer
            .serialize(KlineRecord::from(kline))
            .map_err(|e| OutputError::Csv(format!("Failed to write kline: {e}")))?;

        self.klines_written += 1;

        if self.klines_written % 10_000 == 0 {
            self.flush()?;
            debug!("Progress: {} klines written", self.klines_written);
        }

        Ok(())
    }
}

impl OutputWriter for CsvKlinesWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::Io(format!("Failed to flush: {e}")))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;

        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::Io(format!("Failed to get inner writer: {e}")))?;

        let file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::Io(format!("Failed to get file handle: {e}")))?;

        file.sync_all()
            .map_err(|e| OutputError::Io(format!("Failed to sync file: {e}")))?;

        debug!("CSV writer closed: {} klines written", self.klines_written);
        Ok(())
    }
}

/// Write `klines` to `{folder}/{SYMBOL}_{INTERVAL}.csv`, replacing any previous file.
///
/// Rows go to `{path}.part` first and are renamed over the dataset only once
/// the file is complete and synced; on error the previous dataset is untouched.
/// Returns the dataset path.
pub fn write_dataset(
    klines: &[Kline],
    symbol: &str,
    interval: Interval,
    folder: &Path,
) -> OutputResult<PathBuf> {
    let path = dataset_path(folder, symbol, interval);
    let part = {
        let mut name = path.as_os_str().to_owned();
        name.push(".part");
        PathBuf::from(name)
    };

    let written = CsvKlinesWriter::new(&part).and_then(|mut writer| {
        writer.write_klines(klines)?;
        writer.close()
    });
    if let Err(e) = written {
        let _ = std::fs::remove_file(&part);
        return Err(e);
    }

    std::fs::rename(&part, &path).map_err(|e| {
        let _ = std::fs::remove_file(&part);
        OutputError::Io(format!("Failed to publish {}: {e}", path.display()))
    })?;

    info!(
        symbol = %symbol,
        interval = %interval,
        rows = klines.len(),
        path = %path.display(),
        "Dataset written"
    );
    Ok(path)
}
