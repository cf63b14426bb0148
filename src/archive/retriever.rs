//! Bulk archive retriever
//!
//! Downloads archive references with bounded parallelism. Each body is
//! streamed to `{dest}.part` through an 8 KiB buffered writer and renamed into
//! place once complete, so a dropped connection never leaves a truncated
//! `.zip` behind for the merge step.

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::archive::{ArchiveError, ArchiveReference, ArchiveResult};
use crate::downloader::config::RetryPolicy;
use crate::fetcher::retry_formatter::{extract_error_type, RetryContext, RetryErrorType};
use crate::metrics;

/// Write buffer size for streamed archive bodies
pub const CHUNK_BUFFER_SIZE: usize = 8192;

/// One archive that could not be saved
#[derive(Debug)]
pub struct FailedArchive {
    /// The reference that failed
    pub reference: ArchiveReference,
    /// Why it failed
    pub error: ArchiveError,
}

/// Outcome of one [`ArchiveRetriever::retrieve`] call
#[derive(Debug, Default)]
pub struct RetrievalReport {
    /// Local paths written successfully
    pub saved: Vec<PathBuf>,
    /// References that failed, with their cause
    pub failed: Vec<FailedArchive>,
}

impl RetrievalReport {
    /// Number of references attempted
    pub fn total(&self) -> usize {
        self.saved.len() + self.failed.len()
    }
}

/// A failed attempt and, when the failure is transport-related, how to classify it for retry
struct AttemptFailure {
    kind: Option<RetryErrorType>,
    error: ArchiveError,
}

impl AttemptFailure {
    fn local(error: ArchiveError) -> Self {
        Self { kind: None, error }
    }

    fn retryable(&self) -> bool {
        self.kind.is_some_and(|kind| kind.is_retryable())
    }
}

/// Downloads archives from the mirror
#[derive(Debug, Clone)]
pub struct ArchiveRetriever {
    client: Client,
    retry: RetryPolicy,
    verify_checksum: bool,
}

impl ArchiveRetriever {
    /// Retriever sharing `client`'s connection pool
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry,
            verify_checksum: false,
        }
    }

    /// Verify each archive against its published `.CHECKSUM` sibling
    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    /// Download every reference with at most `concurrency` transfers in flight.
    ///
    /// Failures are isolated per reference; the report lists which archives
    /// were saved and which failed.
    pub async fn retrieve<I>(&self, references: I, concurrency: usize) -> RetrievalReport
    where
        I: IntoIterator<Item = ArchiveReference>,
    {
        let results: Vec<(ArchiveReference, ArchiveResult<PathBuf>)> = stream::iter(references)
            .map(|reference| async move {
                let result = self.download(&reference).await;
                (reference, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut report = RetrievalReport::default();
        for (reference, result) in results {
            match result {
                Ok(path) => {
                    metrics::record_archive_download("saved");
                    report.saved.push(path);
                }
                Err(error) => {
                    metrics::record_archive_download("failed");
                    warn!(url = %reference.url, error = %error, "Archive download failed");
                    report.failed.push(FailedArchive { reference, error });
                }
            }
        }

        info!(
            saved = report.saved.len(),
            failed = report.failed.len(),
            "Archive retrieval finished"
        );
        report
    }

    /// Download one archive, retrying transient failures.
    pub async fn download(&self, reference: &ArchiveReference) -> ArchiveResult<PathBuf> {
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let failure = match self.download_once(reference).await {
                Ok(()) => break,
                Err(failure) => failure,
            };

            if !failure.retryable() || attempt >= max_attempts {
                if let Some(kind) = failure.kind {
                    let context = RetryContext::new(
                        attempt,
                        max_attempts,
                        kind,
                        self.retry.backoff(attempt - 1),
                        &reference.url,
                    );
                    debug!("{}", context.format_failure());
                }
                return Err(failure.error);
            }

            let backoff = self.retry.backoff(attempt - 1);
            if let Some(kind) = failure.kind {
                let context =
                    RetryContext::new(attempt, max_attempts, kind, backoff, &reference.url);
                warn!(error = %failure.error, "{}", context.format_retry());
            }
            metrics::record_retry(backoff);
            tokio::time::sleep(backoff).await;
        }

        let part = part_path(&reference.destination);
        if self.verify_checksum {
            if let Err(e) = self.verify(reference, &part).await {
                // Neither the unverified bytes nor a stale copy may be merged
                remove_quietly(&part);
                if reference.destination.exists() {
                    remove_quietly(&reference.destination);
                }
                return Err(e);
            }
        }

        std::fs::rename(&part, &reference.destination).map_err(|e| {
            remove_quietly(&part);
            ArchiveError::io(&reference.destination, e)
        })?;

        debug!(path = %reference.destination.display(), "Archive saved");
        Ok(reference.destination.clone())
    }

    /// Stream one attempt into `{dest}.part`; the caller publishes it
    async fn download_once(&self, reference: &ArchiveReference) -> Result<(), AttemptFailure> {
        let url = &reference.url;
        debug!(url = %url, "Downloading archive");

        let response = self.client.get(url).send().await.map_err(|e| AttemptFailure {
            kind: Some(extract_error_type(None, Some(&e))),
            error: ArchiveError::DownloadTransport {
                url: url.clone(),
                reason: e.to_string(),
            },
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure {
                kind: Some(extract_error_type(Some(status), None)),
                error: ArchiveError::DownloadStatus {
                    url: url.clone(),
                    status: status.as_u16(),
                },
            });
        }

        let destination = &reference.destination;
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AttemptFailure::local(ArchiveError::io(parent, e)))?;
        }

        let part = part_path(destination);
        let file = std::fs::File::create(&part)
            .map_err(|e| AttemptFailure::local(ArchiveError::io(&part, e)))?;
        let mut writer = std::io::BufWriter::with_capacity(CHUNK_BUFFER_SIZE, file);

        let mut body = response.bytes_stream();
        let mut written = 0usize;
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(writer);
                    remove_quietly(&part);
                    return Err(AttemptFailure {
                        kind: Some(extract_error_type(None, Some(&e))),
                        error: ArchiveError::DownloadTransport {
                            url: url.clone(),
                            reason: e.to_string(),
                        },
                    });
                }
            };
            if let Err(e) = writer.write_all(&chunk) {
                drop(writer);
                remove_quietly(&part);
                return Err(AttemptFailure::local(ArchiveError::io(&part, e)));
            }
            written += chunk.len();
        }

        let finished = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .and_then(|file| file.sync_all());
        if let Err(e) = finished {
            remove_quietly(&part);
            return Err(AttemptFailure::local(ArchiveError::io(&part, e)));
        }

        debug!(url = %url, bytes = written, "Archive body complete");
        Ok(())
    }

    /// Compare the downloaded bytes at `part` against `{url}.CHECKSUM`
    async fn verify(&self, reference: &ArchiveReference, part: &Path) -> ArchiveResult<()> {
        let checksum_url = format!("{}.CHECKSUM", reference.url);
        let transport = |e: reqwest::Error| ArchiveError::DownloadTransport {
            url: checksum_url.clone(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(&checksum_url)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::DownloadStatus {
                url: checksum_url.clone(),
                status: status.as_u16(),
            });
        }
        let content = response.text().await.map_err(transport)?;

        // "<sha256-hex>  <filename>"
        let expected = content
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase();

        let hashed = part.to_path_buf();
        let actual = tokio::task::spawn_blocking(move || sha256_file(&hashed))
            .await
            .map_err(|e| ArchiveError::io(part, e))??;

        if actual != expected {
            return Err(ArchiveError::ChecksumMismatch {
                url: reference.url.clone(),
                expected,
                actual,
            });
        }

        debug!(url = %reference.url, "Checksum verified");
        Ok(())
    }
}

/// SHA-256 of a file as lowercase hex
pub fn sha256_file(path: &Path) -> ArchiveResult<String> {
    let mut file = std::fs::File::open(path).map_err(|e| ArchiveError::io(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| ArchiveError::io(path, e))?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "Could not remove partial file");
    }
}
