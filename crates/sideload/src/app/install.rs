use std::time::Duration;

use log::{debug, info, warn};

use sideload_core::handoff::{
    can_install_unknown_apps, install_request, play_protect_request, play_store_home_request,
    unknown_sources_request,
};

use crate::error::AppError;
use crate::state::{InstallWizard, WizardStep};

use super::Session;
use super::async_helpers::run_with_timeout;

const PLATFORM_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// The step the user is looking at in an open installation wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardView {
    pub package: String,
    pub step: WizardStep,
    pub step_number: usize,
    pub step_count: usize,
}

impl WizardView {
    fn of(package: &str, wizard: &InstallWizard) -> Self {
        Self {
            package: package.to_string(),
            step: wizard.current_step(),
            step_number: wizard.step_number(),
            step_count: wizard.steps().len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The installer accepted the package directly.
    Installed,
    WizardShown(WizardView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardProgress {
    Advanced(WizardView),
    Installed,
    /// The install step failed; the wizard stays open on it.
    InstallFailed { view: WizardView, reason: String },
}

pub(super) async fn handle_install(
    session: &mut Session,
    package: &str,
) -> Result<InstallOutcome, AppError> {
    let entry = session.find_entry(package)?;
    let state = session.states.entry(entry.package_name);
    let file = state
        .downloaded_file
        .clone()
        .ok_or_else(|| AppError::nothing_to_install(package))?;

    if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
        warn!("Downloaded APK {} is gone", file.display());
        state.downloaded_file = None;
        return Err(AppError::nothing_to_install(package));
    }

    let registry = &session.services.registry;
    let platform = run_with_timeout(
        PLATFORM_QUERY_TIMEOUT,
        "Platform query",
        registry.platform_info(),
        |e| AppError::operation_failed("Platform query", e),
    )
    .await?;

    if entry.play_protect_step || !can_install_unknown_apps(&platform) {
        debug!("Opening installation wizard for {package}");
        let wizard = InstallWizard::new(entry.play_protect_step, file, platform);
        return Ok(InstallOutcome::WizardShown(open_wizard(
            session,
            entry.package_name,
            wizard,
        )));
    }

    let request = install_request(&file, &platform);
    match session.services.launcher.install_package(&request).await {
        Ok(()) => {
            info!("Installed {package} from {}", file.display());
            session.states.entry(entry.package_name).reset();
            Ok(InstallOutcome::Installed)
        }
        Err(e) => {
            warn!("Installer launch for {package} failed, opening wizard: {e}");
            let wizard = InstallWizard::new(entry.play_protect_step, file, platform);
            Ok(InstallOutcome::WizardShown(open_wizard(
                session,
                entry.package_name,
                wizard,
            )))
        }
    }
}

fn open_wizard(session: &mut Session, package: &str, wizard: InstallWizard) -> WizardView {
    let view = WizardView::of(package, &wizard);
    session.wizards.insert(package.to_string(), wizard);
    view
}

pub(super) async fn handle_wizard_advance(
    session: &mut Session,
    package: &str,
) -> Result<WizardProgress, AppError> {
    let Some(wizard) = session.wizards.get(package) else {
        return Err(AppError::no_wizard(package));
    };
    let launcher = &session.services.launcher;

    match wizard.current_step() {
        WizardStep::PlayProtect => {
            if let Err(e) = launcher.open_view(&play_protect_request()).await {
                warn!("Play Protect screen unavailable, opening the store instead: {e}");
                if let Err(e) = launcher.open_view(&play_store_home_request()).await {
                    warn!("Could not open the Play Store: {e}");
                }
            }
        }
        WizardStep::AllowUnknownSources => {
            let request = unknown_sources_request(wizard.platform());
            if let Err(e) = launcher.open_view(&request).await {
                warn!("Could not open unknown sources settings: {e}");
            }
        }
        WizardStep::Install => {
            let request = install_request(wizard.file(), wizard.platform());
            let view = WizardView::of(package, wizard);
            let result = launcher.install_package(&request).await;
            return Ok(match result {
                Ok(()) => {
                    info!("Installed {package} through the wizard");
                    session.wizards.remove(package);
                    session.states.entry(package).reset();
                    WizardProgress::Installed
                }
                Err(e) => WizardProgress::InstallFailed {
                    view,
                    reason: e.to_string(),
                },
            });
        }
    }

    let Some(wizard) = session.wizards.get_mut(package) else {
        return Err(AppError::no_wizard(package));
    };
    wizard.advance();
    Ok(WizardProgress::Advanced(WizardView::of(package, wizard)))
}

pub(super) fn handle_wizard_dismiss(session: &mut Session, package: &str) -> Result<(), AppError> {
    if session.wizards.remove(package).is_none() {
        return Err(AppError::no_wizard(package));
    }
    debug!("Dismissed installation wizard for {package}");
    session.states.entry(package).reset();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use sideload_backend::intent;

    use super::super::tests::{Harness, MockRegistry, MockReleases};
    use super::*;
    use crate::state::EntryPhase;

    fn harness() -> Harness {
        Harness::new(MockRegistry::new(), MockReleases::default())
    }

    #[tokio::test]
    async fn install_requires_a_download() {
        let harness = harness();
        let (mut session, _events) = harness.session();

        assert_eq!(
            handle_install(&mut session, "org.example.notes").await,
            Err(AppError::nothing_to_install("org.example.notes"))
        );
    }

    #[tokio::test]
    async fn vanished_download_is_forgotten() {
        let harness = harness();
        let (mut session, _events) = harness.session();
        let file = harness.seed_download(&mut session, "org.example.notes");
        std::fs::remove_file(&file).expect("remove apk");

        assert_eq!(
            handle_install(&mut session, "org.example.notes").await,
            Err(AppError::nothing_to_install("org.example.notes"))
        );
        assert_eq!(
            session.states.get("org.example.notes").expect("notes").downloaded_file,
            None
        );
    }

    #[tokio::test]
    async fn direct_install_resets_the_entry() {
        let harness = harness();
        harness.launcher.install_succeeds.store(true, Ordering::SeqCst);
        let (mut session, _events) = harness.session();
        let file = harness.seed_download(&mut session, "org.example.notes");

        let outcome = handle_install(&mut session, "org.example.notes")
            .await
            .expect("install should run");

        assert_eq!(outcome, InstallOutcome::Installed);
        let installs = harness.launcher.installs.lock().unwrap();
        assert_eq!(installs.len(), 1);
        assert_eq!(installs[0].file, file);
        assert_eq!(
            installs[0].view.data.as_deref(),
            Some("content://org.example.sideload.fileprovider/downloads/sideload_org_example_notes.apk")
        );
        let state = session.states.get("org.example.notes").expect("notes");
        assert_eq!(state.phase(), EntryPhase::Idle);
        assert!(session.wizards.is_empty());
    }

    #[tokio::test]
    async fn failed_installer_launch_opens_the_wizard() {
        let harness = harness();
        let (mut session, _events) = harness.session();
        harness.seed_download(&mut session, "org.example.notes");

        let outcome = handle_install(&mut session, "org.example.notes")
            .await
            .expect("install should run");

        assert_eq!(
            outcome,
            InstallOutcome::WizardShown(WizardView {
                package: "org.example.notes".to_string(),
                step: WizardStep::AllowUnknownSources,
                step_number: 1,
                step_count: 2,
            })
        );
        assert!(session.wizards.contains_key("org.example.notes"));
    }

    #[tokio::test]
    async fn play_protect_entries_go_straight_to_the_wizard() {
        let harness = harness();
        let (mut session, _events) = harness.session();
        harness.seed_download(&mut session, "org.example.player");

        let outcome = handle_install(&mut session, "org.example.player")
            .await
            .expect("install should run");

        let InstallOutcome::WizardShown(view) = outcome else {
            panic!("expected the wizard");
        };
        assert_eq!(view.step, WizardStep::PlayProtect);
        assert_eq!(view.step_count, 3);
        assert!(harness.launcher.installs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_install_permission_opens_the_wizard() {
        let mut registry = MockRegistry::new();
        registry.platform.can_install_unknown_apps = false;
        let harness = Harness::new(registry, MockReleases::default());
        harness.launcher.install_succeeds.store(true, Ordering::SeqCst);
        let (mut session, _events) = harness.session();
        harness.seed_download(&mut session, "org.example.notes");

        let outcome = handle_install(&mut session, "org.example.notes")
            .await
            .expect("install should run");

        assert!(matches!(outcome, InstallOutcome::WizardShown(_)));
        assert!(harness.launcher.installs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn play_protect_step_falls_back_to_store_home() {
        let harness = harness();
        harness.launcher.reject_components.store(true, Ordering::SeqCst);
        let (mut session, _events) = harness.session();
        harness.seed_download(&mut session, "org.example.player");
        handle_install(&mut session, "org.example.player")
            .await
            .expect("install should run");

        let progress = handle_wizard_advance(&mut session, "org.example.player")
            .await
            .expect("wizard should advance");

        let WizardProgress::Advanced(view) = progress else {
            panic!("expected the wizard to advance");
        };
        assert_eq!(view.step, WizardStep::AllowUnknownSources);
        assert_eq!(view.step_number, 2);
        let views = harness.launcher.views.lock().unwrap();
        assert_eq!(views.len(), 2);
        assert!(views[0].target_component.is_some());
        assert_eq!(
            views[1].data.as_deref(),
            Some("https://play.google.com/store/apps")
        );
    }

    #[tokio::test]
    async fn wizard_walks_through_to_install() {
        let harness = harness();
        let (mut session, _events) = harness.session();
        harness.seed_download(&mut session, "org.example.notes");
        handle_install(&mut session, "org.example.notes")
            .await
            .expect("install should run");

        let progress = handle_wizard_advance(&mut session, "org.example.notes")
            .await
            .expect("settings step");
        assert!(matches!(
            progress,
            WizardProgress::Advanced(WizardView {
                step: WizardStep::Install,
                ..
            })
        ));
        assert_eq!(
            harness.launcher.views.lock().unwrap()[0].action,
            intent::ACTION_MANAGE_UNKNOWN_APP_SOURCES
        );

        let progress = handle_wizard_advance(&mut session, "org.example.notes")
            .await
            .expect("install step");
        assert!(matches!(progress, WizardProgress::InstallFailed { .. }));
        assert!(session.wizards.contains_key("org.example.notes"));

        harness.launcher.install_succeeds.store(true, Ordering::SeqCst);
        let progress = handle_wizard_advance(&mut session, "org.example.notes")
            .await
            .expect("install retry");
        assert_eq!(progress, WizardProgress::Installed);
        assert!(session.wizards.is_empty());
        assert_eq!(
            session.states.get("org.example.notes").expect("notes").phase(),
            EntryPhase::Idle
        );
    }

    #[tokio::test]
    async fn dismissing_closes_the_wizard_once() {
        let harness = harness();
        let (mut session, _events) = harness.session();
        harness.seed_download(&mut session, "org.example.notes");
        handle_install(&mut session, "org.example.notes")
            .await
            .expect("install should run");

        assert_eq!(handle_wizard_dismiss(&mut session, "org.example.notes"), Ok(()));
        assert_eq!(
            session.states.get("org.example.notes").expect("notes").downloaded_file,
            None
        );
        assert_eq!(
            handle_wizard_dismiss(&mut session, "org.example.notes"),
            Err(AppError::no_wizard("org.example.notes"))
        );
        assert_eq!(
            handle_wizard_advance(&mut session, "org.example.notes").await,
            Err(AppError::no_wizard("org.example.notes"))
        );
    }
}
