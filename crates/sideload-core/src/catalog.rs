/// Which release asset to take once the candidate APKs are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetPolicy {
    /// Take the first candidate whose name contains this, if any does.
    pub prefer: Option<&'static str>,
    /// Otherwise take the first candidate whose name does not contain this.
    pub avoid: Option<&'static str>,
}

impl AssetPolicy {
    /// Skips hardware-vendor variants (for example `-hw` Huawei builds).
    pub const DEFAULT: Self = Self {
        prefer: None,
        avoid: Some("-hw"),
    };

    #[must_use]
    pub const fn preferring(marker: &'static str) -> Self {
        Self {
            prefer: Some(marker),
            avoid: None,
        }
    }
}

impl Default for AssetPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// An app installed by downloading its APK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCatalogEntry {
    /// Package id. For apps identified by label this is only a stable key
    /// used for state and file naming.
    pub package_name: &'static str,
    pub display_name: &'static str,
    /// Static download used when no release information is available.
    pub download_url: &'static str,
    /// GitHub repository as `owner/name`.
    pub github_repo: Option<&'static str>,
    /// Detect the installed app by launcher label instead of package id.
    pub identify_by_display_name: bool,
    pub asset_policy: AssetPolicy,
    /// Walk the user through Play Protect before installing.
    pub play_protect_step: bool,
}

impl AppCatalogEntry {
    #[must_use]
    pub const fn new(
        package_name: &'static str,
        display_name: &'static str,
        download_url: &'static str,
    ) -> Self {
        Self {
            package_name,
            display_name,
            download_url,
            github_repo: None,
            identify_by_display_name: false,
            asset_policy: AssetPolicy::DEFAULT,
            play_protect_step: false,
        }
    }

    #[must_use]
    pub const fn github(mut self, repo: &'static str) -> Self {
        self.github_repo = Some(repo);
        self
    }

    #[must_use]
    pub const fn identified_by_label(mut self) -> Self {
        self.identify_by_display_name = true;
        self
    }

    #[must_use]
    pub const fn with_asset_policy(mut self, policy: AssetPolicy) -> Self {
        self.asset_policy = policy;
        self
    }

    #[must_use]
    pub const fn with_play_protect_step(mut self) -> Self {
        self.play_protect_step = true;
        self
    }

    /// Deterministic download file name, so stale files can be found and
    /// overwritten.
    #[must_use]
    pub fn apk_file_name(&self) -> String {
        format!("sideload_{}.apk", self.package_name.replace('.', "_"))
    }
}

/// An app installed through its Play Store listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetAppEntry {
    pub package_name: &'static str,
    pub display_name: &'static str,
}

impl PresetAppEntry {
    #[must_use]
    pub const fn new(package_name: &'static str, display_name: &'static str) -> Self {
        Self {
            package_name,
            display_name,
        }
    }
}

pub const APK_APPS: &[AppCatalogEntry] = &[
    AppCatalogEntry::new(
        "app.revanced.android.gms",
        "microG Services",
        "https://github.com/ReVanced/GmsCore/releases/download/v0.3.1.4.240913/app.revanced.android.gms-240913008-signed.apk",
    )
    .github("ReVanced/GmsCore"),
    AppCatalogEntry::new(
        "org.frknkrc44.hma_oss",
        "HMA-OSS",
        "https://github.com/frknkrc44/HMA-OSS/releases/download/oss-154/HMA-OSS-oss-154-release.apk",
    )
    .github("frknkrc44/HMA-OSS"),
    AppCatalogEntry::new(
        "kernelsu.next",
        "KernelSU Next",
        "https://github.com/KernelSU-Next/KernelSU-Next/releases/download/v1.0.3/KernelSU_Next_v1.0.3-spoofed_32967-release.apk",
    )
    .github("KernelSU-Next/KernelSU-Next")
    .identified_by_label()
    .with_asset_policy(AssetPolicy::preferring("spoofed")),
    AppCatalogEntry::new(
        "app.lawnchair",
        "Lawnchair",
        "https://github.com/LawnchairLauncher/lawnchair/releases/download/v14.0.0-beta2/Lawnchair.14.0.0.Beta.2.apk",
    )
    .github("LawnchairLauncher/lawnchair")
    .with_play_protect_step(),
    AppCatalogEntry::new(
        "app.lawnchair.lawnicons",
        "Lawnicons",
        "https://github.com/LawnchairLauncher/lawnicons/releases/download/v2.10.0/Lawnicons.2.10.0.apk",
    )
    .github("LawnchairLauncher/lawnicons"),
    AppCatalogEntry::new(
        "com.reveny.nativecheck",
        "Native Detector",
        "https://github.com/reveny/Android-Native-Root-Detector/releases/download/v1.2.0/native-root-detector-v1.2.0.apk",
    )
    .github("reveny/Android-Native-Root-Detector"),
    AppCatalogEntry::new(
        "com.theveloper.pixelplay",
        "PixelPlayer",
        "https://github.com/theovilardo/PixelPlayer/releases/download/0.5.0-beta/PixelPlayer-0.5.0-beta.apk",
    )
    .github("theovilardo/PixelPlayer"),
    AppCatalogEntry::new(
        "app.revanced.manager.flutter",
        "ReVanced Manager",
        "https://github.com/ReVanced/revanced-manager/releases/download/v1.23.0/revanced-manager-1.23.0.apk",
    )
    .github("ReVanced/revanced-manager"),
    AppCatalogEntry::new(
        "com.aurora.store",
        "Aurora Store",
        "https://auroraoss.com/downloads/AuroraStore/Release/AuroraStore-4.5.1.apk",
    )
    .github("AuroraOSS/AuroraStore"),
];

pub const PRESET_APPS: &[PresetAppEntry] = &[
    PresetAppEntry::new("org.mozilla.firefox", "Firefox"),
    PresetAppEntry::new("org.telegram.messenger", "Telegram"),
    PresetAppEntry::new("com.whatsapp", "WhatsApp"),
    PresetAppEntry::new("com.spotify.music", "Spotify"),
    PresetAppEntry::new("com.google.android.apps.maps", "Google Maps"),
];

/// Look up a catalog entry by its key package name.
#[must_use]
pub fn find_apk_app(package_name: &str) -> Option<&'static AppCatalogEntry> {
    APK_APPS
        .iter()
        .find(|entry| entry.package_name == package_name)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn apk_file_name_replaces_dots() {
        let entry = AppCatalogEntry::new("org.example.app", "Example", "https://x/a.apk");

        assert_eq!(entry.apk_file_name(), "sideload_org_example_app.apk");
    }

    #[test]
    fn builder_defaults_skip_hardware_variants() {
        let entry = AppCatalogEntry::new("org.example.app", "Example", "https://x/a.apk");

        assert_eq!(entry.asset_policy, AssetPolicy::DEFAULT);
        assert_eq!(entry.asset_policy.avoid, Some("-hw"));
        assert!(!entry.identify_by_display_name);
        assert!(!entry.play_protect_step);
        assert_eq!(entry.github_repo, None);
    }

    #[test]
    fn catalog_keys_are_unique() {
        let keys: HashSet<_> = APK_APPS.iter().map(|entry| entry.package_name).collect();
        assert_eq!(keys.len(), APK_APPS.len());

        let presets: HashSet<_> = PRESET_APPS.iter().map(|entry| entry.package_name).collect();
        assert_eq!(presets.len(), PRESET_APPS.len());
    }

    #[test]
    fn catalog_repositories_are_owner_slash_name() {
        for entry in APK_APPS {
            if let Some(repo) = entry.github_repo {
                let (owner, name) = repo.split_once('/').expect("repo should contain a slash");
                assert!(!owner.is_empty() && !name.is_empty() && !name.contains('/'));
            }
        }
    }

    #[test]
    fn spoofed_entry_prefers_spoofed_assets() {
        let entry = find_apk_app("kernelsu.next").expect("KernelSU Next should be listed");

        assert!(entry.identify_by_display_name);
        assert_eq!(entry.asset_policy.prefer, Some("spoofed"));
        assert_eq!(entry.asset_policy.avoid, None);
    }

    #[test]
    fn find_apk_app_misses_unknown_packages() {
        assert!(find_apk_app("org.unknown").is_none());
        assert!(find_apk_app("app.lawnchair").is_some_and(|entry| entry.play_protect_step));
    }
}
