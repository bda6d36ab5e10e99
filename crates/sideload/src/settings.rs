use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sideload_platform::AppPaths;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_release_check_timeout")]
    pub release_check_timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Raises the GitHub API rate limit when set.
    #[serde(default)]
    pub github_token: Option<String>,

    #[serde(default)]
    pub adb_path: Option<PathBuf>,

    #[serde(default = "default_adb_timeout")]
    pub adb_timeout_secs: u64,

    /// Device to drive when more than one is attached.
    #[serde(default)]
    pub device_serial: Option<String>,

    #[serde(default)]
    pub download_dir: Option<PathBuf>,

    /// Package the install hand-off is issued as, which also names its file
    /// provider authority.
    #[serde(default = "default_app_package")]
    pub app_package: String,
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_http_timeout() -> u64 {
    10
}

fn default_release_check_timeout() -> u64 {
    15
}

fn default_adb_timeout() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    500
}

fn default_app_package() -> String {
    "com.aosprom.sideload".to_string()
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            http_timeout_secs: default_http_timeout(),
            release_check_timeout_secs: default_release_check_timeout(),
            poll_interval_ms: default_poll_interval(),
            github_token: None,
            adb_path: None,
            adb_timeout_secs: default_adb_timeout(),
            device_serial: None,
            download_dir: None,
            app_package: default_app_package(),
        }
    }
}

impl AppSettings {
    pub fn load() -> Self {
        let Ok(paths) = AppPaths::new() else {
            return Self::default();
        };
        Self::load_from(&paths.settings_file())
    }

    fn load_from(settings_path: &Path) -> Self {
        if !settings_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(settings_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), std::io::Error> {
        let paths = AppPaths::new().map_err(std::io::Error::other)?;
        paths.ensure_dirs()?;
        self.save_to(&paths.settings_file())
    }

    fn save_to(&self, settings_path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(settings_path, content)
    }

    /// Whether a settings file exists yet, so first runs can write the
    /// defaults out for editing.
    pub fn exists() -> bool {
        AppPaths::new().is_ok_and(|paths| paths.settings_file().exists())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn adb_timeout(&self) -> Duration {
        Duration::from_secs(self.adb_timeout_secs)
    }

    pub fn release_check_timeout(&self) -> Duration {
        Duration::from_secs(self.release_check_timeout_secs)
    }

    /// Poll period for active downloads, never below 50 ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }

    pub fn github_token(&self) -> Option<&str> {
        self.github_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}
