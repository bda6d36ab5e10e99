use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, trace, warn};
use tokio::process::Command;

use sideload_backend::{
    BackendError, InstallRequest, InstalledAppInfo, Launcher, PackageRegistry, PlatformInfo,
    ViewRequest,
};
use sideload_platform::background_command;

use crate::parse::{
    parse_devices, parse_failure_message, parse_launcher_activities, parse_package_list,
    parse_sdk_level, parse_version_name,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const FLAG_ACTIVITY_NEW_TASK: &str = "0x10000000";
const LAUNCHER_QUERY: &[&str] = &[
    "cmd",
    "package",
    "query-activities",
    "-a",
    "android.intent.action.MAIN",
    "-c",
    "android.intent.category.LAUNCHER",
];

/// Package registry and launcher backed by a device reachable over `adb`.
#[derive(Debug, Clone)]
pub struct AdbBackend {
    adb: PathBuf,
    serial: Option<String>,
    app_package: String,
    command_timeout: Duration,
}

impl AdbBackend {
    /// `app_package` is the on-device identity install hand-offs are made
    /// under.
    #[must_use]
    pub fn new(adb: PathBuf, app_package: impl Into<String>) -> Self {
        Self {
            adb,
            serial: None,
            app_package: app_package.into(),
            command_timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_serial(mut self, serial: Option<String>) -> Self {
        self.serial = serial;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Serials of attached devices that are ready for commands.
    pub async fn devices(&self) -> Result<Vec<String>, BackendError> {
        let output = self.execute(&["devices"]).await?;
        Ok(parse_devices(&output))
    }

    fn build_command(&self, args: &[&str]) -> Command {
        debug!(
            "Building adb command: {} {}",
            self.adb.display(),
            args.join(" ")
        );

        let mut cmd = background_command(&self.adb);
        if let Some(serial) = &self.serial {
            cmd.args(["-s", serial]);
        }
        cmd.args(args);
        cmd
    }

    async fn execute(&self, args: &[&str]) -> Result<String, BackendError> {
        info!("Executing adb command: {}", args.join(" "));

        let output =
            match tokio::time::timeout(self.command_timeout, self.build_command(args).output())
                .await
            {
                Ok(output) => output?,
                Err(_) => {
                    error!(
                        "adb command timed out after {:?}: args={args:?}",
                        self.command_timeout
                    );
                    return Err(BackendError::Timeout);
                }
            };

        debug!("adb command exit status: {:?}", output.status);
        trace!("adb stdout: {}", String::from_utf8_lossy(&output.stdout));

        if !output.stderr.is_empty() {
            trace!("adb stderr: {}", String::from_utf8_lossy(&output.stderr));
        }

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            debug!("adb command succeeded, output: {} bytes", stdout.len());
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!("adb command failed: args={args:?}, stderr='{stderr}'");
            Err(BackendError::CommandFailed { stderr })
        }
    }

    /// Run a command in the device shell. Arguments are quoted because the
    /// device joins them into a single shell line.
    async fn shell(&self, args: &[&str]) -> Result<String, BackendError> {
        let quoted: Vec<String> = args.iter().map(|arg| shell_quote(arg)).collect();
        let mut full: Vec<&str> = vec!["shell"];
        full.extend(quoted.iter().map(String::as_str));
        self.execute(&full).await
    }
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn am_start_args(request: &ViewRequest) -> Vec<&str> {
    let mut args = vec!["am", "start", "-a", request.action.as_str()];

    if let Some(data) = &request.data {
        args.extend(["-d", data.as_str()]);
    }
    if let Some(mime_type) = &request.mime_type {
        args.extend(["-t", mime_type.as_str()]);
    }
    if let Some(component) = &request.target_component {
        args.extend(["-n", component.as_str()]);
    } else if let Some(package) = &request.target_package {
        args.extend(["-p", package.as_str()]);
    }
    if request.grant_read_uri {
        args.push("--grant-read-uri-permission");
    }
    if request.new_task {
        args.extend(["-f", FLAG_ACTIVITY_NEW_TASK]);
    }

    args
}

fn request_target(request: &ViewRequest) -> String {
    request
        .data
        .clone()
        .unwrap_or_else(|| request.action.clone())
}

#[async_trait]
impl PackageRegistry for AdbBackend {
    async fn launcher_info(&self) -> InstalledAppInfo {
        match self.shell(LAUNCHER_QUERY).await {
            Ok(output) => parse_launcher_activities(&output),
            Err(e) => {
                warn!("Launcher query failed, treating as empty: {e}");
                InstalledAppInfo::default()
            }
        }
    }

    async fn installed_version(&self, package: &str) -> Result<Option<String>, BackendError> {
        let output = self.shell(&["dumpsys", "package", package]).await?;

        if !output.contains(&format!("Package [{package}]")) {
            return Ok(None);
        }

        Ok(parse_version_name(&output))
    }

    async fn is_installed(&self, package: &str, launcher: &InstalledAppInfo) -> bool {
        if launcher.contains(package) {
            return true;
        }

        // `pm list packages` filters by substring, so match exactly.
        match self.shell(&["pm", "list", "packages", package]).await {
            Ok(output) => parse_package_list(&output).contains(package),
            Err(e) => {
                warn!("Package lookup for {package} failed: {e}");
                false
            }
        }
    }

    async fn platform_info(&self) -> Result<PlatformInfo, BackendError> {
        let output = self.shell(&["getprop", "ro.build.version.sdk"]).await?;
        let sdk_level = parse_sdk_level(&output).ok_or_else(|| BackendError::CommandFailed {
            stderr: format!("unexpected SDK level '{}'", output.trim()),
        })?;

        // Installs over adb run as the shell user, which needs no per-app grant.
        Ok(PlatformInfo {
            sdk_level,
            app_package: self.app_package.clone(),
            can_install_unknown_apps: true,
        })
    }
}

#[async_trait]
impl Launcher for AdbBackend {
    async fn open_view(&self, request: &ViewRequest) -> Result<(), BackendError> {
        let target = request_target(request);
        let output = self
            .shell(&am_start_args(request))
            .await
            .map_err(|e| BackendError::launch_failed(&target, e.to_string()))?;

        match parse_failure_message(&output) {
            Some(message) => Err(BackendError::launch_failed(target, message)),
            None => Ok(()),
        }
    }

    async fn install_package(&self, request: &InstallRequest) -> Result<(), BackendError> {
        let file = request.file.to_string_lossy();
        let output = self.execute(&["install", "-r", &file]).await?;

        if let Some(message) = parse_failure_message(&output) {
            return Err(BackendError::CommandFailed { stderr: message });
        }
        if !output.contains("Success") {
            return Err(BackendError::CommandFailed {
                stderr: output.trim().to_string(),
            });
        }

        info!("Installed {}", request.file.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use sideload_backend::{Launcher, PackageRegistry, ViewRequest, intent};

    use super::{AdbBackend, am_start_args, shell_quote};

    #[test]
    fn shell_quote_leaves_plain_words_alone() {
        assert_eq!(shell_quote("org.mozilla.firefox"), "org.mozilla.firefox");
        assert_eq!(
            shell_quote("https://play.google.com/store/apps/details?id=x"),
            "'https://play.google.com/store/apps/details?id=x'"
        );
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn am_start_prefers_component_over_package() {
        let request = ViewRequest::view("market://details?id=x")
            .with_package("com.android.vending")
            .with_component("com.android.vending", "Home");

        let args = am_start_args(&request);

        assert!(args.windows(2).any(|w| w == ["-n", "com.android.vending/Home"]));
        assert!(!args.contains(&"-p"));
        assert!(args.windows(2).any(|w| w == ["-f", "0x10000000"]));
    }

    #[test]
    fn am_start_includes_type_and_grant() {
        let request = ViewRequest::view("content://x/y.apk")
            .with_mime_type("application/vnd.android.package-archive")
            .granting_read_uri();

        let args = am_start_args(&request);

        assert_eq!(&args[..4], ["am", "start", "-a", intent::ACTION_VIEW]);
        assert!(args.windows(2).any(|w| w == ["-d", "content://x/y.apk"]));
        assert!(
            args.windows(2)
                .any(|w| w == ["-t", "application/vnd.android.package-archive"])
        );
        assert!(args.contains(&"--grant-read-uri-permission"));
    }

    #[cfg(unix)]
    fn fake_adb(dir: &std::path::Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = r#"#!/bin/sh
echo "$*" >> "$0.log"
case "$*" in
  *query-activities*)
    echo "1 activities found:"
    echo "  Activity #0:"
    echo "      packageName=org.example"
    echo "      labelRes=0x0 nonLocalizedLabel=Example App icon=0x0"
    ;;
  *"dumpsys package org.example"*)
    echo "  Package [org.example] (1f2e):"
    echo "    versionName=1.2.3-release"
    ;;
  *"dumpsys package org.unversioned"*)
    echo "  Package [org.unversioned] (3a4b):"
    echo "    versionCode=7 minSdk=24 targetSdk=34"
    ;;
  *dumpsys*)
    echo "Unable to find package"
    ;;
  *"pm list packages"*)
    echo "package:org.example"
    echo "package:org.example.extra"
    ;;
  *getprop*)
    echo 33
    ;;
  *"am start"*nowhere*)
    echo "Error: Activity not started, unable to resolve Intent"
    ;;
  *"am start"*)
    echo "Starting: Intent { }"
    ;;
  *"install -r"*bad*)
    echo "Failure [INSTALL_FAILED_INVALID_APK]"
    ;;
  *"install -r"*)
    echo "Success"
    ;;
esac
"#;
        let path = dir.join("adb");
        std::fs::write(&path, script).expect("write fake adb");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod fake adb");
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn registry_reads_device_state() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let backend = AdbBackend::new(fake_adb(dir.path()), "org.sideload")
            .with_serial(Some("emulator-5554".to_string()));

        let launcher = backend.launcher_info().await;
        assert!(launcher.contains("org.example"));
        assert_eq!(launcher.find_package_by_label("Example App"), Some("org.example"));

        assert_eq!(
            backend.installed_version("org.example").await,
            Ok(Some("1.2.3-release".to_string()))
        );
        assert_eq!(backend.installed_version("org.missing").await, Ok(None));
        assert_eq!(
            backend.installed_version("org.unversioned").await,
            Ok(None)
        );

        let empty = sideload_backend::InstalledAppInfo::default();
        assert!(backend.is_installed("org.example", &empty).await);
        assert!(!backend.is_installed("org.exam", &empty).await);

        let platform = backend.platform_info().await.expect("platform info");
        assert_eq!(platform.sdk_level, 33);
        assert_eq!(platform.app_package, "org.sideload");
        assert!(platform.can_install_unknown_apps);

        let log = std::fs::read_to_string(dir.path().join("adb.log")).expect("read log");
        assert!(log.lines().all(|line| line.starts_with("-s emulator-5554 ")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launcher_reports_unresolved_intents() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let backend = AdbBackend::new(fake_adb(dir.path()), "org.sideload");

        backend
            .open_view(&ViewRequest::view("https://example.org"))
            .await
            .expect("view should start");

        let error = backend
            .open_view(&ViewRequest::view("nowhere://x"))
            .await
            .expect_err("unresolvable view should fail");
        assert!(error.to_string().contains("nowhere://x"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn install_requires_success_marker() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let backend = AdbBackend::new(fake_adb(dir.path()), "org.sideload");
        let good = sideload_backend::InstallRequest {
            file: PathBuf::from("/tmp/good.apk"),
            view: ViewRequest::view("file:///tmp/good.apk"),
        };
        let bad = sideload_backend::InstallRequest {
            file: PathBuf::from("/tmp/bad.apk"),
            view: ViewRequest::view("file:///tmp/bad.apk"),
        };

        backend.install_package(&good).await.expect("install ok");
        let error = backend
            .install_package(&bad)
            .await
            .expect_err("install should fail");
        assert!(error.to_string().contains("INSTALL_FAILED_INVALID_APK"));
    }

    #[tokio::test]
    async fn missing_binary_is_an_io_error() {
        let backend = AdbBackend::new(PathBuf::from("/nonexistent/adb"), "org.sideload");

        let error = backend.platform_info().await.expect_err("adb is missing");

        assert!(matches!(error, sideload_backend::BackendError::IoError { .. }));
    }
}
