//! Requests handed to the device to install a package archive or open a
//! store listing or settings screen.

use std::path::Path;

use sideload_backend::{APK_MIME_TYPE, InstallRequest, PlatformInfo, ViewRequest, intent};

/// First SDK level that refuses `file://` URIs across apps.
pub const CONTENT_URI_MIN_SDK: u32 = 24;
/// First SDK level with a per-app "install unknown apps" permission.
pub const PER_APP_UNKNOWN_SOURCES_MIN_SDK: u32 = 26;

const PLAY_PROTECT_ACTIVITY: &str = "com.google.android.finsky.protect.PlayProtectHomeActivity";

#[must_use]
pub fn play_store_url(package: &str) -> String {
    format!("https://play.google.com/store/apps/details?id={package}")
}

/// Store listing aimed at the Play Store app. Use
/// [`ViewRequest::untargeted`] for the browser fallback.
#[must_use]
pub fn play_store_request(package: &str) -> ViewRequest {
    ViewRequest::view(play_store_url(package)).with_package(intent::PLAY_STORE_PACKAGE)
}

#[must_use]
pub fn play_protect_request() -> ViewRequest {
    ViewRequest::view("market://details?id=com.google.android.gms")
        .with_component(intent::PLAY_STORE_PACKAGE, PLAY_PROTECT_ACTIVITY)
}

#[must_use]
pub fn play_store_home_request() -> ViewRequest {
    ViewRequest::view("https://play.google.com/store/apps")
}

/// Settings screen where the user allows this app to install packages.
#[must_use]
pub fn unknown_sources_request(platform: &PlatformInfo) -> ViewRequest {
    if platform.sdk_level >= PER_APP_UNKNOWN_SOURCES_MIN_SDK {
        ViewRequest::new(intent::ACTION_MANAGE_UNKNOWN_APP_SOURCES)
            .with_data(format!("package:{}", platform.app_package))
    } else {
        ViewRequest::new(intent::ACTION_SECURITY_SETTINGS)
    }
}

/// Install hand-off for a downloaded archive. Newer platforms get a
/// file-provider content URI, older ones a plain file URI.
#[must_use]
pub fn install_request(file: &Path, platform: &PlatformInfo) -> InstallRequest {
    let uri = if platform.sdk_level >= CONTENT_URI_MIN_SDK {
        let name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "content://{}.fileprovider/downloads/{name}",
            platform.app_package
        )
    } else {
        format!("file://{}", file.display())
    };

    InstallRequest {
        file: file.to_path_buf(),
        view: ViewRequest::view(uri)
            .with_mime_type(APK_MIME_TYPE)
            .granting_read_uri(),
    }
}

/// The platform grants install permission implicitly before per-app control.
#[must_use]
pub fn can_install_unknown_apps(platform: &PlatformInfo) -> bool {
    platform.sdk_level < PER_APP_UNKNOWN_SOURCES_MIN_SDK || platform.can_install_unknown_apps
}
