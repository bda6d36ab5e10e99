use log::{debug, error, info, warn};

use sideload_backend::{DownloadJobId, DownloadRequest};

use crate::error::AppError;
use crate::state::JobProgress;

use super::update_checks::remove_downloaded_apk;
use super::{Session, SessionEvent};

pub(super) async fn handle_start_download(
    session: &mut Session,
    package: &str,
) -> Result<DownloadJobId, AppError> {
    let entry = session.find_entry(package)?;

    let state = session.states.entry(entry.package_name);
    let (url, expected_sha256) = match &state.latest_download_url {
        Some(url) => (url.clone(), state.latest_sha256.clone()),
        None => (entry.download_url.to_string(), None),
    };
    let superseded = state.download_id.take();
    state.downloaded_file = None;

    if let Some(id) = superseded {
        info!("Cancelling superseded download {id} for {package}");
        session.services.downloads.cancel(id).await;
    }

    let destination = session.config.download_dir.join(entry.apk_file_name());
    remove_downloaded_apk(&destination).await;

    let request = DownloadRequest::apk(
        url,
        destination,
        format!("Downloading {}", entry.display_name),
    )
    .with_expected_sha256(expected_sha256);
    debug!("Enqueueing {} -> {}", request.url, request.destination.display());

    match session.services.downloads.enqueue(request).await {
        Ok(id) => {
            info!("Started download {id} for {package}");
            session.states.entry(entry.package_name).begin_download(id);
            Ok(id)
        }
        Err(e) => {
            error!("Could not start download for {package}: {e}");
            session.states.entry(entry.package_name).mark_failed();
            Err(AppError::operation_failed("Download", e))
        }
    }
}

pub(super) async fn handle_poll(session: &mut Session) {
    for (package, id) in session.states.active_jobs() {
        let snapshot = session.services.downloads.query(id).await;
        let progress = session.states.entry(&package).apply_snapshot(snapshot.as_ref());

        match progress {
            JobProgress::Running(fraction) => {
                session.emit(SessionEvent::Progress { package, fraction });
            }
            JobProgress::Finished(file) => {
                info!("Download {id} for {package} finished: {}", file.display());
                session.services.downloads.cancel(id).await;
                session.emit(SessionEvent::DownloadFinished { package, file });
            }
            JobProgress::Failed(reason) => {
                warn!("Download {id} for {package} failed: {reason}");
                session.services.downloads.cancel(id).await;
                session.emit(SessionEvent::DownloadFailed { package, reason });
            }
        }
    }
}
