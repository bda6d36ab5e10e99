use crate::release::ReleaseInfo;

/// Outcome of comparing an installed app against its latest release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Nothing installed; a download would be a first install, not an update.
    NotInstalled,
    UpToDate,
    UpdateAvailable {
        latest_version: String,
        download_url: String,
    },
}

impl UpdateStatus {
    #[must_use]
    pub fn is_update_available(&self) -> bool {
        matches!(self, Self::UpdateAvailable { .. })
    }
}

/// Comparable form of a release tag: `v1.2.3_build9` becomes `1.2.3`.
#[must_use]
pub fn normalize_tag(tag: &str) -> String {
    let version = strip_version_prefix(tag.trim());
    before(version, "_").trim().to_string()
}

/// Comparable form of an installed version name:
/// `1.2.3-spoofed_456-release` becomes `1.2.3`.
#[must_use]
pub fn normalize_installed(installed: &str) -> String {
    let version = strip_version_prefix(installed.trim());
    let version = remove_ignore_ascii_case(version, "-spoofed");
    let version = before(&version, "_");
    before_ignore_ascii_case(version, "-release")
        .trim()
        .to_string()
}

/// Decide whether `release` is an update for the installed version.
#[must_use]
pub fn reconcile(installed: Option<&str>, release: &ReleaseInfo) -> UpdateStatus {
    let Some(installed) = installed else {
        return UpdateStatus::NotInstalled;
    };

    if normalize_tag(&release.tag_name) == normalize_installed(installed) {
        UpdateStatus::UpToDate
    } else {
        UpdateStatus::UpdateAvailable {
            latest_version: release.tag_name.clone(),
            download_url: release.download_url.clone(),
        }
    }
}

fn strip_version_prefix(version: &str) -> &str {
    version.strip_prefix(['v', 'V']).unwrap_or(version)
}

fn before<'a>(value: &'a str, marker: &str) -> &'a str {
    value.split_once(marker).map_or(value, |(head, _)| head)
}

// ASCII lowercasing keeps byte offsets, so indices found in the lowered copy
// are valid in the original.
fn before_ignore_ascii_case<'a>(value: &'a str, marker: &str) -> &'a str {
    let lowered = value.to_ascii_lowercase();
    match lowered.find(&marker.to_ascii_lowercase()) {
        Some(index) => &value[..index],
        None => value,
    }
}

fn remove_ignore_ascii_case(value: &str, marker: &str) -> String {
    let lowered = value.to_ascii_lowercase();
    let marker = marker.to_ascii_lowercase();
    let mut out = String::with_capacity(value.len());
    let mut cursor = 0;

    while let Some(offset) = lowered[cursor..].find(&marker) {
        out.push_str(&value[cursor..cursor + offset]);
        cursor += offset + marker.len();
    }
    out.push_str(&value[cursor..]);
    out
}
