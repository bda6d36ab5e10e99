//! Core logic for Sideload that does not depend on a concrete device backend:
//! - The built-in app catalog and per-entry asset selection policy.
//! - Latest-release lookup against GitHub and asset selection.
//! - Installed-version versus release-tag reconciliation.
//! - An HTTP download service with pollable job status.
//! - Construction of installer, settings and Play Store hand-off requests.

pub mod catalog;
pub mod download;
pub mod handoff;
mod release;
mod version;

/// Catalog entry types and the built-in lists.
pub use catalog::{
    APK_APPS, AppCatalogEntry, AssetPolicy, PRESET_APPS, PresetAppEntry, find_apk_app,
};
/// Download service backed by `reqwest`.
pub use download::{DownloadError, HttpDownloadService};
/// GitHub release model, fetch helpers and asset selection.
pub use release::{
    GitHubAsset, GitHubRelease, ReleaseError, ReleaseInfo, fetch_latest_release,
    latest_release_or_none, release_info, select_asset,
};
/// Version normalization and update decision.
pub use version::{UpdateStatus, normalize_installed, normalize_tag, reconcile};
