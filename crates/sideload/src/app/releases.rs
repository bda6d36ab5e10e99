use std::time::Duration;

use async_trait::async_trait;
use log::warn;

use sideload_core::{AssetPolicy, ReleaseInfo, latest_release_or_none};

/// Where the latest release of a catalog repository comes from.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// `None` when nothing usable is known; failures are logged, not returned.
    async fn latest_release(&self, repo: &str, policy: AssetPolicy) -> Option<ReleaseInfo>;
}

pub struct GitHubReleases {
    client: reqwest::Client,
    token: Option<String>,
    timeout: Duration,
}

impl GitHubReleases {
    pub fn new(client: reqwest::Client, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client,
            token,
            timeout,
        }
    }
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    async fn latest_release(&self, repo: &str, policy: AssetPolicy) -> Option<ReleaseInfo> {
        let lookup = latest_release_or_none(&self.client, repo, policy, self.token.as_deref());
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(release) => release,
            Err(_) => {
                warn!(
                    "Release check for {repo} timed out after {}s",
                    self.timeout.as_secs()
                );
                None
            }
        }
    }
}
