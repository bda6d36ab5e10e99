use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::oneshot;
use tokio::task::JoinError;

use sideload_backend::{InstalledAppInfo, PackageRegistry};
use sideload_core::{AppCatalogEntry, ReleaseInfo, UpdateStatus, reconcile};

use crate::state::DownloadState;

use super::releases::ReleaseSource;
use super::{CheckRound, CheckTask, Session, SessionEvent};

/// What one catalog entry looked like during a check.
#[derive(Debug)]
pub(super) struct EntryCheck {
    pub package: &'static str,
    pub installed_version: Option<String>,
    pub release: Option<ReleaseInfo>,
    pub removed_stale_file: bool,
}

pub(super) fn handle_check_updates(
    session: &mut Session,
    reply: oneshot::Sender<chrono::DateTime<Utc>>,
) {
    session.check_waiters.push(reply);
    if !matches!(session.check_round, CheckRound::Idle) {
        debug!("Update check already running, waiting for it");
        return;
    }

    info!("Checking {} catalog entries for updates", session.config.catalog.len());
    let registry = Arc::clone(&session.services.registry);
    session
        .checks
        .spawn(async move { CheckTask::Launcher(registry.launcher_info().await) });
    session.check_round = CheckRound::Launcher;
}

pub(super) fn handle_check_task(session: &mut Session, joined: Result<CheckTask, JoinError>) {
    match joined {
        Ok(CheckTask::Launcher(launcher)) => spawn_entry_checks(session, launcher),
        Ok(CheckTask::Entry(check)) => {
            apply_entry_check(session.states.entry(check.package), check);
            entry_check_done(session);
        }
        Err(e) => {
            error!("Update check task failed: {e}");
            match session.check_round {
                CheckRound::Launcher => finish_round(session),
                CheckRound::Entries { .. } => entry_check_done(session),
                CheckRound::Idle => {}
            }
        }
    }
}

fn spawn_entry_checks(session: &mut Session, launcher: InstalledAppInfo) {
    let catalog = session.config.catalog;
    if catalog.is_empty() {
        finish_round(session);
        return;
    }

    let launcher = Arc::new(launcher);
    for entry in catalog {
        let launcher = Arc::clone(&launcher);
        let registry = Arc::clone(&session.services.registry);
        let releases = Arc::clone(&session.services.releases);
        let download_dir = session.config.download_dir.clone();
        session.checks.spawn(async move {
            CheckTask::Entry(
                check_entry(
                    entry,
                    &launcher,
                    registry.as_ref(),
                    releases.as_ref(),
                    &download_dir,
                )
                .await,
            )
        });
    }
    session.check_round = CheckRound::Entries {
        remaining: catalog.len(),
    };
}

fn entry_check_done(session: &mut Session) {
    if let CheckRound::Entries { remaining } = &mut session.check_round {
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            finish_round(session);
        }
    }
}

fn finish_round(session: &mut Session) {
    let checked_at = Utc::now();
    session.check_round = CheckRound::Idle;
    session.last_checked = Some(checked_at);
    debug!("Update check finished at {}", checked_at.to_rfc3339());

    for waiter in session.check_waiters.drain(..) {
        let _ = waiter.send(checked_at);
    }
    session.emit(SessionEvent::UpdatesChecked { checked_at });
}

/// Package id to query for `entry`: the catalog id, or for label-identified
/// apps the package whose launcher label matches.
pub(super) fn effective_package<'a>(
    entry: &'a AppCatalogEntry,
    launcher: &'a InstalledAppInfo,
) -> &'a str {
    if entry.identify_by_display_name {
        launcher
            .find_package_by_label(entry.display_name)
            .unwrap_or(entry.package_name)
    } else {
        entry.package_name
    }
}

async fn check_entry(
    entry: &'static AppCatalogEntry,
    launcher: &InstalledAppInfo,
    registry: &dyn PackageRegistry,
    releases: &dyn ReleaseSource,
    download_dir: &Path,
) -> EntryCheck {
    let package = effective_package(entry, launcher);
    let installed_version = match registry.installed_version(package).await {
        Ok(version) => version,
        Err(e) => {
            warn!("Installed version lookup for {package} failed: {e}");
            None
        }
    };

    let removed_stale_file = installed_version.is_some()
        && remove_downloaded_apk(&download_dir.join(entry.apk_file_name())).await;

    let release = match entry.github_repo {
        Some(repo) => releases.latest_release(repo, entry.asset_policy).await,
        None => None,
    };

    EntryCheck {
        package: entry.package_name,
        installed_version,
        release,
        removed_stale_file,
    }
}

/// Delete a previously downloaded APK. Returns whether a file was removed.
pub(super) async fn remove_downloaded_apk(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed downloaded APK {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Could not remove {}: {e}", path.display());
            false
        }
    }
}

pub(super) fn apply_entry_check(state: &mut DownloadState, check: EntryCheck) {
    state.installed_version = check.installed_version;
    if check.removed_stale_file {
        state.downloaded_file = None;
    }

    let Some(release) = check.release else {
        return;
    };

    match reconcile(state.installed_version.as_deref(), &release) {
        UpdateStatus::UpdateAvailable {
            latest_version,
            download_url,
        } => {
            info!("{}: update available ({latest_version})", check.package);
            state.is_update_available = true;
            state.latest_version = Some(latest_version);
            state.latest_download_url = Some(download_url);
            state.latest_sha256 = release.sha256;
        }
        UpdateStatus::UpToDate => {
            state.is_update_available = false;
            state.latest_version = None;
            state.latest_download_url = None;
            state.latest_sha256 = None;
        }
        // Remember the release so a first install fetches the newest build.
        UpdateStatus::NotInstalled => {
            state.is_update_available = false;
            state.latest_version = Some(release.tag_name);
            state.latest_download_url = Some(release.download_url);
            state.latest_sha256 = release.sha256;
        }
    }
}
