use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use sideload_adb::{AdbBackend, detect_adb};
use sideload_backend::PackageRegistry;
use sideload_core::{APK_APPS, AppCatalogEntry, HttpDownloadService, PRESET_APPS};
use sideload_platform::AppPaths;

use crate::app::{
    GitHubReleases, InstallOutcome, Services, SessionConfig, SessionEvent, SessionHandle,
    StoreLaunch, WizardProgress, WizardView, open_store_listing, spawn_session,
};
use crate::cli::Command;
use crate::error::AppError;
use crate::settings::AppSettings;
use crate::state::{DownloadState, EntryPhase, PresetSequence};

type InputLines = Lines<BufReader<Stdin>>;

pub async fn run(
    command: Command,
    serial: Option<String>,
    settings: &AppSettings,
    paths: &AppPaths,
) -> Result<(), AppError> {
    let device = Arc::new(connect_device(settings, serial).await?);
    let client = http_client(settings);

    let services = Services {
        registry: device.clone(),
        launcher: device.clone(),
        downloads: Arc::new(HttpDownloadService::new(client.clone())),
        releases: Arc::new(GitHubReleases::new(
            client,
            settings.github_token().map(str::to_string),
            settings.release_check_timeout(),
        )),
    };
    let config = SessionConfig {
        catalog: APK_APPS,
        download_dir: paths.download_dir.clone(),
        poll_interval: settings.poll_interval(),
    };
    let cancel = CancellationToken::new();
    let (handle, mut events, task) = spawn_session(services, config, cancel.clone());

    let result = match command {
        Command::Status => print_status(&handle).await,
        Command::Presets => run_presets(device.as_ref()).await,
        Command::Download { package } => download(&handle, &mut events, &package)
            .await
            .map(|file| println!("Saved {}", file.display())),
        Command::Install { package } => install(&handle, &mut events, &package).await,
    };

    cancel.cancel();
    if let Err(e) = task.await {
        warn!("Session task ended abnormally: {e}");
    }
    result
}

fn http_client(settings: &AppSettings) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(settings.http_timeout())
        .read_timeout(settings.http_timeout())
        .user_agent(format!("sideload/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

async fn connect_device(
    settings: &AppSettings,
    serial: Option<String>,
) -> Result<AdbBackend, AppError> {
    let detection = detect_adb(settings.adb_path.clone()).await;
    let Some(adb) = detection.path.filter(|_| detection.found) else {
        return Err(AppError::AdbUnavailable);
    };
    info!(
        "Using adb {} at {}",
        detection.version.as_deref().unwrap_or("(unknown version)"),
        adb.display()
    );

    let backend =
        AdbBackend::new(adb, settings.app_package.clone()).with_timeout(settings.adb_timeout());
    let devices = backend
        .devices()
        .await
        .map_err(|e| AppError::operation_failed("Device discovery", e))?;
    let serial = choose_serial(serial, &devices)?;
    info!("Driving device {serial}");

    Ok(backend.with_serial(Some(serial)))
}

fn choose_serial(requested: Option<String>, devices: &[String]) -> Result<String, AppError> {
    match requested {
        Some(serial) if devices.contains(&serial) => Ok(serial),
        Some(serial) => {
            warn!("Requested device {serial} is not attached");
            Err(AppError::NoDevice)
        }
        None => {
            if devices.len() > 1 {
                warn!(
                    "{} devices attached, using {}; pass --serial to choose",
                    devices.len(),
                    devices[0]
                );
            }
            devices.first().cloned().ok_or(AppError::NoDevice)
        }
    }
}

async fn print_status(handle: &SessionHandle) -> Result<(), AppError> {
    let checked_at = handle.check_updates().await?;
    let snapshot = handle.snapshot().await?;

    println!("Checked {}", checked_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for entry in APK_APPS {
        println!(
            "{}",
            describe_entry(entry, snapshot.state(entry.package_name))
        );
    }
    Ok(())
}

fn describe_entry(entry: &AppCatalogEntry, state: Option<&DownloadState>) -> String {
    let installed = state.and_then(|state| state.installed_version.as_deref());
    let latest = state.and_then(|state| state.latest_version.as_deref());
    let update_available = state.is_some_and(|state| state.is_update_available);

    let detail = match (installed, latest) {
        (Some(installed), Some(latest)) if update_available => {
            format!("{installed}, update available: {latest}")
        }
        (Some(installed), _) => format!("{installed}, up to date"),
        (None, Some(latest)) => format!("not installed, latest {latest}"),
        (None, None) => "not installed".to_string(),
    };
    // Only literal launcher labels are visible over adb.
    let detail = if entry.identify_by_display_name && installed.is_none() {
        format!("{detail} [matched by launcher label, resource labels are not detected]")
    } else {
        detail
    };
    let download = match state.map(DownloadState::phase) {
        Some(EntryPhase::Downloading) => " (downloading)",
        Some(EntryPhase::Succeeded) => " (downloaded)",
        Some(EntryPhase::Failed) => " (last download failed)",
        Some(EntryPhase::Idle) | None => "",
    };
    format!("{:<20} {detail}{download}", entry.display_name)
}

/// Refresh release information first so the newest build is fetched.
async fn download(
    handle: &SessionHandle,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    package: &str,
) -> Result<PathBuf, AppError> {
    handle.check_updates().await?;
    let id = handle.start_download(package).await?;
    println!("Downloading {package} ({id})");

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Progress {
                package: current,
                fraction,
            } if current == package => {
                eprint!("\r{:>5.1}%", fraction * 100.0);
            }
            SessionEvent::DownloadFinished {
                package: current,
                file,
            } if current == package => {
                eprintln!();
                return Ok(file);
            }
            SessionEvent::DownloadFailed {
                package: current,
                reason,
            } if current == package => {
                eprintln!();
                return Err(AppError::operation_failed("Download", reason));
            }
            _ => {}
        }
    }
    Err(AppError::SessionClosed)
}

async fn install(
    handle: &SessionHandle,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    package: &str,
) -> Result<(), AppError> {
    download(handle, events, package).await?;

    match handle.install(package).await? {
        InstallOutcome::Installed => {
            println!("Installed {package}");
            Ok(())
        }
        InstallOutcome::WizardShown(view) => run_wizard(handle, view).await,
    }
}

async fn run_wizard(handle: &SessionHandle, mut view: WizardView) -> Result<(), AppError> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        println!(
            "Step {}/{}: {}",
            view.step_number,
            view.step_count,
            view.step.title()
        );
        println!("  {}", view.step.description());
        println!("Press Enter to continue or type q to cancel.");

        if wants_to_quit(read_line(&mut input).await?.as_deref()) {
            handle.dismiss_wizard(&view.package).await?;
            println!("Installation of {} cancelled", view.package);
            return Ok(());
        }

        match handle.advance_wizard(&view.package).await? {
            WizardProgress::Advanced(next) => view = next,
            WizardProgress::Installed => {
                println!("Installed {}", view.package);
                return Ok(());
            }
            WizardProgress::InstallFailed { view: current, reason } => {
                println!("Install failed: {reason}");
                view = current;
            }
        }
    }
}

async fn run_presets(device: &AdbBackend) -> Result<(), AppError> {
    let launcher = device.launcher_info().await;
    for entry in PRESET_APPS {
        let installed = device.is_installed(entry.package_name, &launcher).await;
        println!(
            "{:<20} {}",
            entry.display_name,
            if installed { "installed" } else { "not installed" }
        );
    }

    let mut sequence = PresetSequence::new(PRESET_APPS);
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut next = sequence.start();

    while let Some(entry) = next {
        match open_store_listing(device, entry.package_name).await {
            Ok(launch) => println!("Opened {} {}", entry.display_name, describe_launch(launch)),
            Err(e) => println!("Could not open {}: {e}", entry.display_name),
        }
        if !sequence.is_active() {
            break;
        }

        println!(
            "Press Enter for the next app ({} left) or type q to stop.",
            sequence.remaining()
        );
        if wants_to_quit(read_line(&mut input).await?.as_deref()) {
            break;
        }
        next = sequence.on_resume();
    }
    Ok(())
}

fn describe_launch(launch: StoreLaunch) -> &'static str {
    match launch {
        StoreLaunch::PlayStore => "in the Play Store",
        StoreLaunch::DeviceBrowser => "in the device browser",
        StoreLaunch::HostBrowser => "in a browser on this machine",
    }
}

async fn read_line(input: &mut InputLines) -> Result<Option<String>, AppError> {
    input
        .next_line()
        .await
        .map_err(|e| AppError::operation_failed("Read input", e))
}

/// End of input counts as quitting.
fn wants_to_quit(line: Option<&str>) -> bool {
    line.is_none_or(|line| line.trim().eq_ignore_ascii_case("q"))
}

#[cfg(test)]
mod tests {
    use sideload_core::find_apk_app;

    use super::*;

    fn devices(serials: &[&str]) -> Vec<String> {
        serials.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn choose_serial_prefers_the_requested_device() {
        let attached = devices(&["emulator-5554", "R58M123"]);

        assert_eq!(
            choose_serial(Some("R58M123".to_string()), &attached),
            Ok("R58M123".to_string())
        );
        assert_eq!(
            choose_serial(Some("missing".to_string()), &attached),
            Err(AppError::NoDevice)
        );
    }

    #[test]
    fn choose_serial_takes_the_first_device_otherwise() {
        assert_eq!(
            choose_serial(None, &devices(&["emulator-5554", "R58M123"])),
            Ok("emulator-5554".to_string())
        );
        assert_eq!(choose_serial(None, &[]), Err(AppError::NoDevice));
    }

    #[test]
    fn describe_entry_covers_each_state() {
        let entry = find_apk_app("app.lawnchair").expect("Lawnchair should be listed");

        assert_eq!(
            describe_entry(entry, None),
            format!("{:<20} not installed", "Lawnchair")
        );

        let missing = DownloadState {
            latest_version: Some("v14.0.0".to_string()),
            ..DownloadState::default()
        };
        assert!(describe_entry(entry, Some(&missing)).ends_with("not installed, latest v14.0.0"));

        let outdated = DownloadState {
            installed_version: Some("13.1".to_string()),
            latest_version: Some("v14.0.0".to_string()),
            is_update_available: true,
            ..DownloadState::default()
        };
        assert!(
            describe_entry(entry, Some(&outdated)).ends_with("13.1, update available: v14.0.0")
        );

        let current = DownloadState {
            installed_version: Some("14.0.0".to_string()),
            ..DownloadState::default()
        };
        assert!(describe_entry(entry, Some(&current)).ends_with("14.0.0, up to date"));

        let failed = DownloadState {
            failed: true,
            ..DownloadState::default()
        };
        assert!(
            describe_entry(entry, Some(&failed)).ends_with("not installed (last download failed)")
        );
    }

    #[test]
    fn label_identified_entries_flag_undetected_installs() {
        let entry = find_apk_app("kernelsu.next").expect("KernelSU Next should be listed");

        assert!(
            describe_entry(entry, None)
                .ends_with("not installed [matched by launcher label, resource labels are not detected]")
        );

        let installed = DownloadState {
            installed_version: Some("1.0.3".to_string()),
            ..DownloadState::default()
        };
        assert!(describe_entry(entry, Some(&installed)).ends_with("1.0.3, up to date"));
    }

    #[test]
    fn quitting_accepts_q_and_end_of_input() {
        assert!(wants_to_quit(None));
        assert!(wants_to_quit(Some(" Q ")));
        assert!(!wants_to_quit(Some("")));
        assert!(!wants_to_quit(Some("next")));
    }
}
