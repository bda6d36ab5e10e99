use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::catalog::AssetPolicy;

const GITHUB_API: &str = "https://api.github.com";
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("sideload/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    #[serde(default)]
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: Option<String>,
}

impl GitHubAsset {
    /// Asset file name, taken from the download URL when the API left it empty.
    #[must_use]
    pub fn file_name(&self) -> &str {
        if self.name.is_empty() {
            self.browser_download_url
                .rsplit('/')
                .next()
                .unwrap_or(&self.browser_download_url)
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// Latest release of a repository, reduced to the one asset worth installing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub tag_name: String,
    pub download_url: String,
    pub asset_name: String,
    pub size: Option<u64>,
    pub sha256: Option<String>,
}

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("invalid repository identifier '{0}', expected owner/name")]
    InvalidRepository(String),
    #[error("failed to query latest release: {0}")]
    Request(#[source] reqwest::Error),
    #[error("latest release query failed with HTTP {status}{body_snippet}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body_snippet: String,
    },
    #[error("failed to parse latest release response: {0}")]
    Parse(#[source] reqwest::Error),
}

#[must_use]
pub fn latest_release_url(repo: &str) -> String {
    format!("{GITHUB_API}/repos/{repo}/releases/latest")
}

fn validate_repository(repo: &str) -> Result<(), ReleaseError> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(())
        }
        _ => Err(ReleaseError::InvalidRepository(repo.to_string())),
    }
}

/// Fetch the latest GitHub release of `repo` and pick its install asset.
///
/// Returns `Ok(None)` when the release publishes no assets.
///
/// # Errors
/// Returns an error when the repository identifier is malformed, the request
/// fails, the API answers with a non-success status, or the body cannot be
/// parsed.
pub async fn fetch_latest_release(
    client: &reqwest::Client,
    repo: &str,
    policy: AssetPolicy,
    token: Option<&str>,
) -> Result<Option<ReleaseInfo>, ReleaseError> {
    validate_repository(repo)?;
    let url = latest_release_url(repo);

    let mut request = client
        .get(&url)
        .header("Accept", GITHUB_ACCEPT)
        .header("User-Agent", USER_AGENT);
    if let Some(token) = token.filter(|token| !token.is_empty()) {
        request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(ReleaseError::Request)?;

    if !response.status().is_success() {
        let status = response.status();
        let body_snippet = response
            .text()
            .await
            .ok()
            .map(|body| response_snippet(&body, 160))
            .unwrap_or_default();
        return Err(ReleaseError::HttpStatus {
            status,
            body_snippet,
        });
    }

    let release: GitHubRelease = response.json().await.map_err(ReleaseError::Parse)?;
    debug!(
        "{repo}: latest release {} with {} assets",
        release.tag_name,
        release.assets.len()
    );

    Ok(release_info(release, policy))
}

/// Like [`fetch_latest_release`], but failures are logged and reported as
/// "no release information".
pub async fn latest_release_or_none(
    client: &reqwest::Client,
    repo: &str,
    policy: AssetPolicy,
    token: Option<&str>,
) -> Option<ReleaseInfo> {
    match fetch_latest_release(client, repo, policy, token).await {
        Ok(info) => info,
        Err(error) => {
            warn!("Release check for {repo} failed: {error}");
            None
        }
    }
}

#[must_use]
pub fn release_info(release: GitHubRelease, policy: AssetPolicy) -> Option<ReleaseInfo> {
    let asset = select_asset(&release.assets, policy)?;
    Some(ReleaseInfo {
        tag_name: release.tag_name.clone(),
        download_url: asset.browser_download_url.clone(),
        asset_name: asset.file_name().to_string(),
        size: (asset.size > 0).then_some(asset.size),
        sha256: asset.digest.as_deref().and_then(parse_sha256_digest),
    })
}

/// Choose the asset to install from a release.
///
/// APKs are preferred over anything else, non-debug builds over debug ones,
/// and the entry's policy breaks the remaining tie. Without any APK the first
/// asset is returned.
#[must_use]
pub fn select_asset(assets: &[GitHubAsset], policy: AssetPolicy) -> Option<&GitHubAsset> {
    let apks: Vec<&GitHubAsset> = assets
        .iter()
        .filter(|asset| ends_with_ignore_case(asset.file_name(), ".apk"))
        .collect();

    if apks.is_empty() {
        return assets.first();
    }

    let release_builds: Vec<&GitHubAsset> = apks
        .iter()
        .copied()
        .filter(|asset| !contains_ignore_case(asset.file_name(), "debug"))
        .collect();
    let candidates = if release_builds.is_empty() {
        apks
    } else {
        release_builds
    };

    let chosen = if let Some(marker) = policy.prefer {
        candidates
            .iter()
            .find(|asset| contains_ignore_case(asset.file_name(), marker))
    } else if let Some(marker) = policy.avoid {
        candidates
            .iter()
            .find(|asset| !contains_ignore_case(asset.file_name(), marker))
    } else {
        None
    };

    chosen.or(candidates.first()).copied()
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

fn ends_with_ignore_case(haystack: &str, suffix: &str) -> bool {
    haystack.len() >= suffix.len()
        && haystack.is_char_boundary(haystack.len() - suffix.len())
        && haystack[haystack.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}

fn parse_sha256_digest(digest: &str) -> Option<String> {
    let (algorithm, hash) = digest.split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") {
        return None;
    }
    if hash.len() != 64 || !hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(hash.to_ascii_lowercase())
}
