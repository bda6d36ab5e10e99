use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::task::AbortHandle;

use sideload_backend::{
    BackendError, DownloadJobId, DownloadRequest, DownloadService, JobSnapshot, JobStatus,
};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("download failed with HTTP {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

impl DownloadError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    fn http(context: &'static str, source: reqwest::Error) -> Self {
        Self::Http { context, source }
    }

    fn io_with_path(context: &'static str, path: &Path, source: &std::io::Error) -> Self {
        Self::io(
            context,
            std::io::Error::new(source.kind(), format!("{}: {source}", path.display())),
        )
    }
}

struct JobSlot {
    snapshot: JobSnapshot,
    partial_path: PathBuf,
    task: Option<AbortHandle>,
}

#[derive(Clone, Default)]
struct JobTable(Arc<Mutex<HashMap<DownloadJobId, JobSlot>>>);

impl JobTable {
    fn lock(&self) -> MutexGuard<'_, HashMap<DownloadJobId, JobSlot>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, id: DownloadJobId, update: impl FnOnce(&mut JobSnapshot)) {
        if let Some(slot) = self.lock().get_mut(&id) {
            update(&mut slot.snapshot);
        }
    }
}

/// Downloads files over HTTP on background tasks. Each job's byte counters
/// and status are kept in a table that callers poll by job id.
pub struct HttpDownloadService {
    client: reqwest::Client,
    jobs: JobTable,
    next_id: AtomicU64,
}

impl HttpDownloadService {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            jobs: JobTable::default(),
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn active_jobs(&self) -> usize {
        self.jobs
            .lock()
            .values()
            .filter(|slot| !slot.snapshot.status.is_terminal())
            .count()
    }
}

#[async_trait]
impl DownloadService for HttpDownloadService {
    async fn enqueue(&self, request: DownloadRequest) -> Result<DownloadJobId, BackendError> {
        reqwest::Url::parse(&request.url)
            .map_err(|e| BackendError::network_request_from("download", e))?;
        if let Some(parent) = request.destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let id = DownloadJobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let partial_path = partial_path(&request.destination, id);
        self.jobs.lock().insert(
            id,
            JobSlot {
                snapshot: JobSnapshot::pending(),
                partial_path: partial_path.clone(),
                task: None,
            },
        );

        info!("Queued download {id}: {} ({})", request.title, request.url);

        let client = self.client.clone();
        let jobs = self.jobs.clone();
        let handle = tokio::spawn(async move {
            jobs.update(id, |snapshot| snapshot.status = JobStatus::Running);
            let result = run_job(&client, &request, &partial_path, |downloaded, total| {
                jobs.update(id, |snapshot| {
                    snapshot.bytes_downloaded = downloaded;
                    snapshot.total_bytes = total;
                });
            })
            .await;

            match result {
                Ok(()) => {
                    info!("Download {id} complete: {}", request.destination.display());
                    jobs.update(id, |snapshot| {
                        snapshot.status = JobStatus::Successful;
                        snapshot.local_path = Some(request.destination.clone());
                    });
                }
                Err(error) => {
                    warn!("Download {id} failed: {error}");
                    let _ = tokio::fs::remove_file(&partial_path).await;
                    jobs.update(id, |snapshot| {
                        snapshot.status = JobStatus::Failed {
                            reason: error.to_string(),
                        };
                    });
                }
            }
        });

        if let Some(slot) = self.jobs.lock().get_mut(&id) {
            slot.task = Some(handle.abort_handle());
        }

        Ok(id)
    }

    async fn query(&self, id: DownloadJobId) -> Option<JobSnapshot> {
        self.jobs.lock().get(&id).map(|slot| slot.snapshot.clone())
    }

    async fn cancel(&self, id: DownloadJobId) {
        let Some(slot) = self.jobs.lock().remove(&id) else {
            return;
        };
        if let Some(task) = slot.task {
            task.abort();
        }
        if !slot.snapshot.status.is_terminal() {
            debug!("Cancelled download {id}");
            let _ = tokio::fs::remove_file(&slot.partial_path).await;
        }
    }
}

/// Partial file for one job. Jobs for the same destination never share it.
fn partial_path(destination: &Path, id: DownloadJobId) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(format!(".{}.part", id.0));
    destination.with_file_name(name)
}

async fn run_job(
    client: &reqwest::Client,
    request: &DownloadRequest,
    partial: &Path,
    on_progress: impl FnMut(u64, Option<u64>),
) -> Result<(), DownloadError> {
    download_file(client, &request.url, partial, on_progress).await?;

    if let Some(expected) = &request.expected_sha256 {
        let actual = sha256_file(partial)?;
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(DownloadError::ChecksumMismatch {
                expected: expected.clone(),
                actual,
            });
        }
        debug!("Checksum verified for {}", request.destination.display());
    }

    tokio::fs::rename(partial, &request.destination)
        .await
        .map_err(|error| {
            DownloadError::io_with_path("failed to move finished download", partial, &error)
        })
}

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    mut on_progress: impl FnMut(u64, Option<u64>),
) -> Result<(), DownloadError> {
    use futures_util::StreamExt;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|error| DownloadError::http("download request failed", error))?;

    if !response.status().is_success() {
        return Err(DownloadError::HttpStatus(response.status()));
    }

    let total = response.content_length().filter(|total| *total > 0);
    let mut downloaded: u64 = 0;
    on_progress(downloaded, total);

    let mut file = tokio::fs::File::create(dest).await.map_err(|error| {
        DownloadError::io_with_path("failed to create download file", dest, &error)
    })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|error| DownloadError::http("download stream error", error))?;
        file.write_all(&chunk).await.map_err(|error| {
            DownloadError::io_with_path("failed to write download data", dest, &error)
        })?;
        downloaded += chunk.len() as u64;
        on_progress(downloaded, total);
    }

    file.flush().await.map_err(|error| {
        DownloadError::io_with_path("failed to flush download file", dest, &error)
    })?;

    debug!("Downloaded {downloaded} bytes from {url}");
    Ok(())
}

fn sha256_file(path: &Path) -> Result<String, DownloadError> {
    let mut file = std::fs::File::open(path).map_err(|error| {
        DownloadError::io_with_path("failed to open file for checksum", path, &error)
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = file.read(&mut buffer).map_err(|error| {
            DownloadError::io_with_path("failed to read file for checksum", path, &error)
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
