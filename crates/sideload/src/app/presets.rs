use log::{info, warn};

use sideload_backend::Launcher;
use sideload_core::handoff::{play_store_request, play_store_url};

use crate::error::AppError;

/// Which handler ended up showing a store listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLaunch {
    PlayStore,
    DeviceBrowser,
    HostBrowser,
}

/// Show the Play Store listing for `package`: the store app first, then any
/// device handler, then a browser on this machine.
pub async fn open_store_listing(
    launcher: &dyn Launcher,
    package: &str,
) -> Result<StoreLaunch, AppError> {
    open_store_listing_with(launcher, package, |url| open::that(url)).await
}

async fn open_store_listing_with<F>(
    launcher: &dyn Launcher,
    package: &str,
    open_host: F,
) -> Result<StoreLaunch, AppError>
where
    F: FnOnce(&str) -> std::io::Result<()>,
{
    let request = play_store_request(package);
    match launcher.open_view(&request).await {
        Ok(()) => return Ok(StoreLaunch::PlayStore),
        Err(e) => warn!("Play Store unavailable for {package}: {e}"),
    }

    match launcher.open_view(&request.untargeted()).await {
        Ok(()) => return Ok(StoreLaunch::DeviceBrowser),
        Err(e) => warn!("No device handler for the {package} listing: {e}"),
    }

    let url = play_store_url(package);
    info!("Opening {url} on this machine");
    open_host(&url)
        .map(|()| StoreLaunch::HostBrowser)
        .map_err(|e| AppError::operation_failed("Open store listing", e))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sideload_backend::{BackendError, InstallRequest, Launcher, ViewRequest};

    use super::{StoreLaunch, open_store_listing_with};

    struct ScriptedLauncher {
        accept_targeted: bool,
        accept_untargeted: bool,
        seen: Mutex<Vec<ViewRequest>>,
    }

    impl ScriptedLauncher {
        fn new(accept_targeted: bool, accept_untargeted: bool) -> Self {
            Self {
                accept_targeted,
                accept_untargeted,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Launcher for ScriptedLauncher {
        async fn open_view(&self, request: &ViewRequest) -> Result<(), BackendError> {
            self.seen.lock().unwrap().push(request.clone());
            let accepted = if request.target_package.is_some() {
                self.accept_targeted
            } else {
                self.accept_untargeted
            };
            if accepted {
                Ok(())
            } else {
                Err(BackendError::launch_failed("view", "No Activity found"))
            }
        }

        async fn install_package(&self, _request: &InstallRequest) -> Result<(), BackendError> {
            Err(BackendError::launch_failed("installer", "not scripted"))
        }
    }

    #[tokio::test]
    async fn store_app_is_tried_first() {
        let launcher = ScriptedLauncher::new(true, true);

        let launch = open_store_listing_with(&launcher, "org.mozilla.firefox", |_| {
            panic!("host browser should not be used")
        })
        .await
        .unwrap();

        assert_eq!(launch, StoreLaunch::PlayStore);
        assert_eq!(launcher.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_untargeted_request() {
        let launcher = ScriptedLauncher::new(false, true);

        let launch = open_store_listing_with(&launcher, "org.mozilla.firefox", |_| Ok(()))
            .await
            .unwrap();

        assert_eq!(launch, StoreLaunch::DeviceBrowser);
        let seen = launcher.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].target_package, None);
        assert_eq!(
            seen[1].data.as_deref(),
            Some("https://play.google.com/store/apps/details?id=org.mozilla.firefox")
        );
    }

    #[tokio::test]
    async fn host_browser_is_the_last_resort() {
        let launcher = ScriptedLauncher::new(false, false);
        let mut opened = None;

        let launch = open_store_listing_with(&launcher, "com.whatsapp", |url| {
            opened = Some(url.to_string());
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(launch, StoreLaunch::HostBrowser);
        assert_eq!(
            opened.as_deref(),
            Some("https://play.google.com/store/apps/details?id=com.whatsapp")
        );
    }

    #[tokio::test]
    async fn host_browser_failure_is_reported() {
        let launcher = ScriptedLauncher::new(false, false);

        let result = open_store_listing_with(&launcher, "com.whatsapp", |_| {
            Err(std::io::Error::other("no browser"))
        })
        .await;

        assert!(result.is_err());
    }
}
