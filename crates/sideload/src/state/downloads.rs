use std::collections::HashMap;
use std::path::PathBuf;

use sideload_backend::{DownloadJobId, JobSnapshot, JobStatus};

/// What the user sees for one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPhase {
    Idle,
    Downloading,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadState {
    pub is_downloading: bool,
    /// Fraction in `[0, 1]`; only grows while a job is running.
    pub progress: f32,
    pub download_id: Option<DownloadJobId>,
    pub is_update_available: bool,
    pub latest_version: Option<String>,
    pub latest_download_url: Option<String>,
    pub latest_sha256: Option<String>,
    pub installed_version: Option<String>,
    pub downloaded_file: Option<PathBuf>,
    pub failed: bool,
}

/// Result of folding one poll into a download state.
#[derive(Debug, Clone, PartialEq)]
pub enum JobProgress {
    Running(f32),
    Finished(PathBuf),
    Failed(String),
}

impl DownloadState {
    pub fn phase(&self) -> EntryPhase {
        if self.is_downloading {
            EntryPhase::Downloading
        } else if self.failed {
            EntryPhase::Failed
        } else if self.downloaded_file.is_some() {
            EntryPhase::Succeeded
        } else {
            EntryPhase::Idle
        }
    }

    pub fn begin_download(&mut self, id: DownloadJobId) {
        self.is_downloading = true;
        self.progress = 0.0;
        self.download_id = Some(id);
        self.downloaded_file = None;
        self.failed = false;
    }

    /// Fold a poll result in. `None` means the service no longer knows the
    /// job, which counts as a failure.
    pub fn apply_snapshot(&mut self, snapshot: Option<&JobSnapshot>) -> JobProgress {
        let Some(snapshot) = snapshot else {
            return self.fail("download job is no longer tracked");
        };

        match &snapshot.status {
            JobStatus::Pending | JobStatus::Running => {
                self.progress = self.progress.max(snapshot.fraction()).clamp(0.0, 1.0);
                JobProgress::Running(self.progress)
            }
            JobStatus::Successful => match &snapshot.local_path {
                Some(path) => {
                    self.is_downloading = false;
                    self.progress = 1.0;
                    self.download_id = None;
                    self.downloaded_file = Some(path.clone());
                    JobProgress::Finished(path.clone())
                }
                None => self.fail("download finished without a file"),
            },
            JobStatus::Failed { reason } => self.fail(reason),
        }
    }

    pub fn mark_failed(&mut self) {
        self.fail("");
    }

    fn fail(&mut self, reason: &str) -> JobProgress {
        self.is_downloading = false;
        self.progress = 0.0;
        self.download_id = None;
        self.failed = true;
        JobProgress::Failed(reason.to_string())
    }

    /// Back to idle after an install or dismissal. Release information is
    /// kept.
    pub fn reset(&mut self) {
        self.is_downloading = false;
        self.progress = 0.0;
        self.download_id = None;
        self.downloaded_file = None;
        self.failed = false;
    }
}

/// Per-entry state keyed by catalog package id. Entries appear on first
/// reference.
#[derive(Debug, Clone, Default)]
pub struct AppStates {
    entries: HashMap<String, DownloadState>,
}

impl AppStates {
    pub fn get(&self, package: &str) -> Option<&DownloadState> {
        self.entries.get(package)
    }

    pub fn entry(&mut self, package: &str) -> &mut DownloadState {
        self.entries.entry(package.to_string()).or_default()
    }

    pub fn has_active_downloads(&self) -> bool {
        self.entries
            .values()
            .any(|state| state.is_downloading && state.download_id.is_some())
    }

    pub fn active_jobs(&self) -> Vec<(String, DownloadJobId)> {
        self.entries
            .iter()
            .filter(|(_, state)| state.is_downloading)
            .filter_map(|(package, state)| state.download_id.map(|id| (package.clone(), id)))
            .collect()
    }
}
