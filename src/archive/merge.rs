//! Unpack-and-merge of downloaded archives
//!
//! Every `.zip` in a working directory is extracted flat into that same
//! directory, then every `.csv` fragment is concatenated into one header-less
//! output file. Fragments are ordered by the period token embedded in their
//! name (`{SYMBOL}-{INTERVAL}-{PERIOD}.csv`), not by directory listing order.
//! Rows are passed through without transformation.

use chrono::NaiveDate;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::archive::{ArchiveError, ArchiveResult};

/// Outcome of [`materialize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Path of the merged file
    pub output: PathBuf,
    /// Archives extracted
    pub archives: usize,
    /// Fragments concatenated
    pub fragments: usize,
    /// Rows written to the merged file
    pub rows: u64,
}

/// Extract every archive in `dir` and merge all fragments into `dir/output_name`.
///
/// Blocking; call from `spawn_blocking` inside async code.
///
/// # Errors
/// - [`ArchiveError::Extraction`] when an archive is corrupt
/// - [`ArchiveError::Merge`] when a fragment is malformed or there is nothing to merge
///
/// Already-extracted fragments stay on disk on failure.
pub fn materialize(dir: &Path, output_name: &str) -> ArchiveResult<MergeReport> {
    let archives = extract_archives(dir)?;

    let fragments = list_fragments(dir, output_name)?;
    if fragments.is_empty() {
        return Err(ArchiveError::Merge {
            path: dir.to_path_buf(),
            reason: "no fragments to merge".to_string(),
        });
    }

    let output = dir.join(output_name);
    let rows = concatenate(&fragments, &output)?;

    info!(
        output = %output.display(),
        archives,
        fragments = fragments.len(),
        rows,
        "Merged fragments"
    );

    Ok(MergeReport {
        output,
        archives,
        fragments: fragments.len(),
        rows,
    })
}

/// Extract every `.zip` in `dir` (in name order) into `dir`. Returns the archive count.
pub fn extract_archives(dir: &Path) -> ArchiveResult<usize> {
    let archives = files_with_extension(dir, "zip")?;
    for archive in &archives {
        extract_archive(archive, dir)?;
    }
    Ok(archives.len())
}

/// Extract one archive flat into `dir`.
///
/// Directory components of entry names are dropped, directory entries are
/// skipped, and entries whose names escape the archive root are skipped.
/// Returns the number of files written.
pub fn extract_archive(archive_path: &Path, dir: &Path) -> ArchiveResult<usize> {
    let extraction = |reason: String| ArchiveError::Extraction {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path).map_err(|e| ArchiveError::io(archive_path, e))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| extraction(e.to_string()))?;

    let mut written = 0;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| extraction(e.to_string()))?;

        if entry.is_dir() {
            continue;
        }

        let Some(file_name) = entry
            .enclosed_name()
            .and_then(|name| name.file_name().map(|n| n.to_owned()))
        else {
            warn!(
                archive = %archive_path.display(),
                entry = entry.name(),
                "Skipping archive entry with unsafe name"
            );
            continue;
        };

        let target = dir.join(&file_name);
        let out = File::create(&target).map_err(|e| ArchiveError::io(&target, e))?;
        let mut out = BufWriter::new(out);
        std::io::copy(&mut entry, &mut out).map_err(|e| extraction(e.to_string()))?;
        out.flush().map_err(|e| ArchiveError::io(&target, e))?;

        debug!(archive = %archive_path.display(), fragment = %target.display(), "Extracted entry");
        written += 1;
    }

    Ok(written)
}

/// `.csv` fragments in `dir`, excluding `output_name`, in merge order
pub fn list_fragments(dir: &Path, output_name: &str) -> ArchiveResult<Vec<PathBuf>> {
    let mut fragments: Vec<PathBuf> = files_with_extension(dir, "csv")?
        .into_iter()
        .filter(|path| path.file_name() != Some(OsStr::new(output_name)))
        .collect();

    fragments.sort_by_cached_key(|path| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let period = period_of(&name);
        (period.is_none(), period, name)
    });
    Ok(fragments)
}

/// Period start embedded in `{SYMBOL}-{INTERVAL}-{PERIOD}.csv`
///
/// `PERIOD` is `YYYY-MM` or `YYYY-MM-DD`; anything else yields `None`.
pub fn period_of(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name.strip_suffix(".csv").unwrap_or(file_name);
    let token = stem.splitn(3, '-').nth(2)?;

    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{token}-01"), "%Y-%m-%d"))
        .ok()
}

/// Concatenate `fragments` row by row into `output`. Returns the row count.
fn concatenate(fragments: &[PathBuf], output: &Path) -> ArchiveResult<u64> {
    let part = {
        let mut name = output.as_os_str().to_owned();
        name.push(".part");
        PathBuf::from(name)
    };
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(&part)
        .map_err(|e| merge_err(&part, e))?;

    let mut rows = 0u64;
    for fragment in fragments {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(fragment)
            .map_err(|e| merge_err(fragment, e))?;

        let mut record = csv::ByteRecord::new();
        loop {
            match reader.read_byte_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    drop(writer);
                    let _ = std::fs::remove_file(&part);
                    return Err(merge_err(fragment, e));
                }
            }
            if let Err(e) = writer.write_byte_record(&record) {
                drop(writer);
                let _ = std::fs::remove_file(&part);
                return Err(merge_err(fragment, e));
            }
            rows += 1;
        }
        debug!(fragment = %fragment.display(), "Appended fragment");
    }

    writer.flush().map_err(|e| ArchiveError::io(&part, e))?;
    drop(writer);
    std::fs::rename(&part, output).map_err(|e| ArchiveError::io(output, e))?;

    Ok(rows)
}

fn merge_err(path: &Path, e: csv::Error) -> ArchiveError {
    ArchiveError::Merge {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Regular files in `dir` with the given extension, sorted by name
fn files_with_extension(dir: &Path, extension: &str) -> ArchiveResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ArchiveError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ArchiveError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
