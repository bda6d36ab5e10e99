use std::path::{Path, PathBuf};

use log::debug;
use which::which;

use sideload_platform::background_command;

use crate::parse::parse_adb_version;

#[derive(Debug, Clone)]
pub struct AdbDetection {
    pub found: bool,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    pub in_path: bool,
}

impl AdbDetection {
    fn not_found() -> Self {
        Self {
            found: false,
            path: None,
            version: None,
            in_path: false,
        }
    }
}

/// Locate an `adb` executable: an explicitly configured path first, then
/// `PATH`, then the usual SDK install locations.
pub async fn detect_adb(configured: Option<PathBuf>) -> AdbDetection {
    if let Some(path) = configured {
        if path.exists() {
            let version = get_adb_version(&path).await;
            return AdbDetection {
                found: true,
                path: Some(path),
                version,
                in_path: false,
            };
        }
        debug!("Configured adb path {} does not exist", path.display());
    }

    if let Ok(path) = which("adb") {
        let version = get_adb_version(&path).await;
        return AdbDetection {
            found: true,
            path: Some(path),
            version,
            in_path: true,
        };
    }

    for path in get_common_adb_paths(sdk_root_from_env()) {
        if path.exists() {
            let version = get_adb_version(&path).await;
            return AdbDetection {
                found: true,
                path: Some(path),
                version,
                in_path: false,
            };
        }
    }

    AdbDetection::not_found()
}

fn sdk_root_from_env() -> Option<PathBuf> {
    ["ANDROID_HOME", "ANDROID_SDK_ROOT"]
        .into_iter()
        .find_map(|key| std::env::var_os(key))
        .map(PathBuf::from)
}

fn adb_binary_name() -> &'static str {
    if cfg!(windows) { "adb.exe" } else { "adb" }
}

fn get_common_adb_paths(sdk_root: Option<PathBuf>) -> Vec<PathBuf> {
    let binary = adb_binary_name();
    let mut sdk_roots = Vec::new();

    if let Some(root) = sdk_root {
        sdk_roots.push(root);
    }

    if let Some(home) = dirs::home_dir() {
        sdk_roots.push(home.join("Android").join("Sdk"));

        #[cfg(target_os = "macos")]
        {
            sdk_roots.push(home.join("Library").join("Android").join("sdk"));
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            sdk_roots.push(local_app_data.join("Android").join("Sdk"));
        }
    }

    let mut paths: Vec<PathBuf> = sdk_roots
        .into_iter()
        .map(|root| root.join("platform-tools").join(binary))
        .collect();

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/opt/homebrew/bin/adb"));
    }

    #[cfg(unix)]
    {
        paths.push(PathBuf::from("/usr/local/bin/adb"));
        paths.push(PathBuf::from("/usr/bin/adb"));
    }

    paths
}

async fn get_adb_version(path: &Path) -> Option<String> {
    let output = background_command(path)
        .arg("version")
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_adb_version(&String::from_utf8_lossy(&output.stdout))
}
