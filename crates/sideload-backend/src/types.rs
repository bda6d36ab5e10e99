use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

pub const APK_MIME_TYPE: &str = "application/vnd.android.package-archive";

/// Intent actions, categories and packages referenced by hand-off requests.
pub mod intent {
    pub const ACTION_VIEW: &str = "android.intent.action.VIEW";
    pub const ACTION_MANAGE_UNKNOWN_APP_SOURCES: &str =
        "android.settings.MANAGE_UNKNOWN_APP_SOURCES";
    pub const ACTION_SECURITY_SETTINGS: &str = "android.settings.SECURITY_SETTINGS";
    pub const PLAY_STORE_PACKAGE: &str = "com.android.vending";
}

/// Launcher-visible packages on the device, queried once and read many times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledAppInfo {
    pub package_names: BTreeSet<String>,
    pub labels_by_package: BTreeMap<String, String>,
}

impl InstalledAppInfo {
    #[must_use]
    pub fn new(
        package_names: impl IntoIterator<Item = String>,
        labels_by_package: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            package_names: package_names.into_iter().collect(),
            labels_by_package: labels_by_package.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, package: &str) -> bool {
        self.package_names.contains(package)
    }

    /// Installed package whose launcher label matches `display_name`,
    /// ignoring case. Used for apps whose package id changes per install.
    #[must_use]
    pub fn find_package_by_label(&self, display_name: &str) -> Option<&str> {
        let wanted = display_name.to_lowercase();
        self.labels_by_package
            .iter()
            .find(|(_, label)| label.to_lowercase() == wanted)
            .map(|(package, _)| package.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DownloadJobId(pub u64);

impl fmt::Display for DownloadJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub destination: PathBuf,
    pub title: String,
    pub expected_sha256: Option<String>,
}

impl DownloadRequest {
    #[must_use]
    pub fn apk(url: impl Into<String>, destination: PathBuf, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination,
            title: title.into(),
            expected_sha256: None,
        }
    }

    #[must_use]
    pub fn with_expected_sha256(mut self, digest: Option<String>) -> Self {
        self.expected_sha256 = digest;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Successful,
    Failed { reason: String },
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub bytes_downloaded: u64,
    pub total_bytes: Option<u64>,
    pub status: JobStatus,
    pub local_path: Option<PathBuf>,
}

impl JobSnapshot {
    #[must_use]
    pub fn pending() -> Self {
        Self {
            bytes_downloaded: 0,
            total_bytes: None,
            status: JobStatus::Pending,
            local_path: None,
        }
    }

    /// Completed share of the transfer in `[0, 1]`; zero while the total size
    /// is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f32 {
        match self.total_bytes {
            Some(total) if total > 0 => {
                (self.bytes_downloaded as f64 / total as f64).clamp(0.0, 1.0) as f32
            }
            _ => 0.0,
        }
    }
}

/// A view/open request for the device's activity launcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewRequest {
    pub action: String,
    pub data: Option<String>,
    pub mime_type: Option<String>,
    pub target_package: Option<String>,
    pub target_component: Option<String>,
    pub grant_read_uri: bool,
    pub new_task: bool,
}

impl ViewRequest {
    #[must_use]
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            new_task: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn view(data: impl Into<String>) -> Self {
        Self::new(intent::ACTION_VIEW).with_data(data)
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    #[must_use]
    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }

    #[must_use]
    pub fn with_package(mut self, package: &str) -> Self {
        self.target_package = Some(package.to_string());
        self
    }

    /// Target a specific activity, given as `package/class`.
    #[must_use]
    pub fn with_component(mut self, package: &str, class: &str) -> Self {
        self.target_component = Some(format!("{package}/{class}"));
        self
    }

    #[must_use]
    pub fn granting_read_uri(mut self) -> Self {
        self.grant_read_uri = true;
        self
    }

    /// Same request without an explicit package or component, so any handler
    /// (typically a browser) may take it.
    #[must_use]
    pub fn untargeted(&self) -> Self {
        Self {
            target_package: None,
            target_component: None,
            ..self.clone()
        }
    }
}

/// Hand-off of a downloaded package archive to the system installer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub file: PathBuf,
    pub view: ViewRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformInfo {
    pub sdk_level: u32,
    pub app_package: String,
    pub can_install_unknown_apps: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> InstalledAppInfo {
        InstalledAppInfo::new(
            ["org.example.one".to_string(), "ksu.x7f2".to_string()],
            [
                ("org.example.one".to_string(), "Example One".to_string()),
                ("ksu.x7f2".to_string(), "KernelSU Next".to_string()),
            ],
        )
    }

    #[test]
    fn find_package_by_label_ignores_case() {
        let info = info();

        assert_eq!(info.find_package_by_label("kernelsu next"), Some("ksu.x7f2"));
        assert_eq!(info.find_package_by_label("Missing"), None);
    }

    #[test]
    fn contains_checks_package_names_only() {
        let info = info();

        assert!(info.contains("org.example.one"));
        assert!(!info.contains("org.example.two"));
        assert!(!info.contains("Example One"));
    }

    #[test]
    fn fraction_is_zero_without_total() {
        let snapshot = JobSnapshot {
            bytes_downloaded: 512,
            total_bytes: None,
            status: JobStatus::Running,
            local_path: None,
        };

        assert!(snapshot.fraction().abs() < f32::EPSILON);
    }

    #[test]
    fn fraction_is_clamped_to_one() {
        let snapshot = JobSnapshot {
            bytes_downloaded: 300,
            total_bytes: Some(200),
            status: JobStatus::Running,
            local_path: None,
        };

        assert!((snapshot.fraction() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn fraction_reports_partial_progress() {
        let snapshot = JobSnapshot {
            bytes_downloaded: 50,
            total_bytes: Some(200),
            status: JobStatus::Running,
            local_path: None,
        };

        assert!((snapshot.fraction() - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Successful.is_terminal());
        assert!(
            JobStatus::Failed {
                reason: "HTTP 404".to_string()
            }
            .is_terminal()
        );
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
    }

    #[test]
    fn untargeted_drops_package_and_component() {
        let request = ViewRequest::view("https://example.org")
            .with_package("com.android.vending")
            .with_component("com.android.vending", "Main");

        let fallback = request.untargeted();

        assert_eq!(fallback.target_package, None);
        assert_eq!(fallback.target_component, None);
        assert_eq!(fallback.data.as_deref(), Some("https://example.org"));
        assert!(fallback.new_task);
    }

    #[test]
    fn apk_download_request_carries_the_digest() {
        let request = DownloadRequest::apk("https://x/app.apk", PathBuf::from("/tmp/a.apk"), "A")
            .with_expected_sha256(Some("abc".to_string()));

        assert_eq!(request.destination, PathBuf::from("/tmp/a.apk"));
        assert_eq!(request.expected_sha256.as_deref(), Some("abc"));
    }
}
