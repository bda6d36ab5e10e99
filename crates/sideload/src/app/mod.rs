mod async_helpers;
mod downloads;
mod install;
mod presets;
mod releases;
mod update_checks;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use sideload_backend::{DownloadJobId, DownloadService, InstalledAppInfo, Launcher, PackageRegistry};
use sideload_core::AppCatalogEntry;

use crate::error::AppError;
use crate::state::{AppStates, DownloadState, InstallWizard};

pub use install::{InstallOutcome, WizardProgress, WizardView};
pub use presets::{StoreLaunch, open_store_listing};
pub use releases::{GitHubReleases, ReleaseSource};

use update_checks::EntryCheck;

/// Device and network collaborators the session drives.
#[derive(Clone)]
pub struct Services {
    pub registry: Arc<dyn PackageRegistry>,
    pub launcher: Arc<dyn Launcher>,
    pub downloads: Arc<dyn DownloadService>,
    pub releases: Arc<dyn ReleaseSource>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub catalog: &'static [AppCatalogEntry],
    pub download_dir: PathBuf,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    UpdatesChecked {
        checked_at: DateTime<Utc>,
    },
    Progress {
        package: String,
        fraction: f32,
    },
    DownloadFinished {
        package: String,
        file: PathBuf,
    },
    DownloadFailed {
        package: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub states: AppStates,
    pub last_checked: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn state(&self, package: &str) -> Option<&DownloadState> {
        self.states.get(package)
    }
}

enum SessionCommand {
    CheckUpdates(oneshot::Sender<DateTime<Utc>>),
    StartDownload {
        package: String,
        reply: oneshot::Sender<Result<DownloadJobId, AppError>>,
    },
    Install {
        package: String,
        reply: oneshot::Sender<Result<InstallOutcome, AppError>>,
    },
    AdvanceWizard {
        package: String,
        reply: oneshot::Sender<Result<WizardProgress, AppError>>,
    },
    DismissWizard {
        package: String,
        reply: oneshot::Sender<Result<(), AppError>>,
    },
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Cloneable front end of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, AppError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| AppError::SessionClosed)?;
        response.await.map_err(|_| AppError::SessionClosed)
    }

    /// Re-query every catalog entry. Resolves when the whole round is done;
    /// concurrent callers share one round.
    pub async fn check_updates(&self) -> Result<DateTime<Utc>, AppError> {
        self.request(SessionCommand::CheckUpdates).await
    }

    pub async fn start_download(&self, package: &str) -> Result<DownloadJobId, AppError> {
        self.request(|reply| SessionCommand::StartDownload {
            package: package.to_string(),
            reply,
        })
        .await?
    }

    pub async fn install(&self, package: &str) -> Result<InstallOutcome, AppError> {
        self.request(|reply| SessionCommand::Install {
            package: package.to_string(),
            reply,
        })
        .await?
    }

    pub async fn advance_wizard(&self, package: &str) -> Result<WizardProgress, AppError> {
        self.request(|reply| SessionCommand::AdvanceWizard {
            package: package.to_string(),
            reply,
        })
        .await?
    }

    pub async fn dismiss_wizard(&self, package: &str) -> Result<(), AppError> {
        self.request(|reply| SessionCommand::DismissWizard {
            package: package.to_string(),
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, AppError> {
        self.request(SessionCommand::Snapshot).await
    }
}

enum CheckTask {
    Launcher(InstalledAppInfo),
    Entry(EntryCheck),
}

/// Where the running update check is.
enum CheckRound {
    Idle,
    Launcher,
    Entries { remaining: usize },
}

struct Session {
    services: Services,
    config: SessionConfig,
    states: AppStates,
    wizards: HashMap<String, InstallWizard>,
    checks: JoinSet<CheckTask>,
    check_round: CheckRound,
    check_waiters: Vec<oneshot::Sender<DateTime<Utc>>>,
    last_checked: Option<DateTime<Utc>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Start the session actor. It stops when `cancel` fires or every handle is
/// dropped, cancelling the downloads it still tracks.
pub fn spawn_session(
    services: Services,
    config: SessionConfig,
    cancel: CancellationToken,
) -> (
    SessionHandle,
    mpsc::UnboundedReceiver<SessionEvent>,
    JoinHandle<()>,
) {
    let (commands_tx, commands_rx) = mpsc::channel(32);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let session = Session::new(services, config, events_tx);
    let task = tokio::spawn(session.run(commands_rx, cancel));

    (
        SessionHandle {
            commands: commands_tx,
        },
        events_rx,
        task,
    )
}

impl Session {
    fn new(
        services: Services,
        config: SessionConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            services,
            config,
            states: AppStates::default(),
            wizards: HashMap::new(),
            checks: JoinSet::new(),
            check_round: CheckRound::Idle,
            check_waiters: Vec::new(),
            last_checked: None,
            events,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        cancel: CancellationToken,
    ) {
        let mut poll = tokio::time::interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let polling = self.states.has_active_downloads();
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Session cancelled");
                    break;
                }
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("All session handles dropped");
                        break;
                    };
                    self.dispatch(command).await;
                }
                Some(joined) = self.checks.join_next(), if !self.checks.is_empty() => {
                    update_checks::handle_check_task(&mut self, joined);
                }
                _ = poll.tick(), if polling => {
                    downloads::handle_poll(&mut self).await;
                }
            }
        }

        self.checks.abort_all();
        for (package, id) in self.states.active_jobs() {
            debug!("Cancelling download {id} for {package} on shutdown");
            self.services.downloads.cancel(id).await;
        }
    }

    async fn dispatch(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::CheckUpdates(reply) => {
                update_checks::handle_check_updates(self, reply);
            }
            SessionCommand::StartDownload { package, reply } => {
                let _ = reply.send(downloads::handle_start_download(self, &package).await);
            }
            SessionCommand::Install { package, reply } => {
                let _ = reply.send(install::handle_install(self, &package).await);
            }
            SessionCommand::AdvanceWizard { package, reply } => {
                let _ = reply.send(install::handle_wizard_advance(self, &package).await);
            }
            SessionCommand::DismissWizard { package, reply } => {
                let _ = reply.send(install::handle_wizard_dismiss(self, &package));
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(SessionSnapshot {
                    states: self.states.clone(),
                    last_checked: self.last_checked,
                });
            }
        }
    }

    fn find_entry(&self, package: &str) -> Result<&'static AppCatalogEntry, AppError> {
        let catalog = self.config.catalog;
        catalog
            .iter()
            .find(|entry| entry.package_name == package)
            .ok_or_else(|| AppError::unknown_package(package))
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}
