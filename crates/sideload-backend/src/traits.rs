use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::{
    DownloadJobId, DownloadRequest, InstallRequest, InstalledAppInfo, JobSnapshot, PlatformInfo,
    ViewRequest,
};

/// Read access to the device's installed packages.
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Launcher-visible packages with their labels. Query failures yield an
    /// empty value.
    async fn launcher_info(&self) -> InstalledAppInfo;

    /// Version name of an installed package, `None` when not installed.
    async fn installed_version(&self, package: &str) -> Result<Option<String>, BackendError>;

    async fn platform_info(&self) -> Result<PlatformInfo, BackendError>;

    async fn is_installed(&self, package: &str, launcher: &InstalledAppInfo) -> bool {
        if launcher.contains(package) {
            return true;
        }
        matches!(self.installed_version(package).await, Ok(Some(_)))
    }
}

/// Starts activities on the device.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn open_view(&self, request: &ViewRequest) -> Result<(), BackendError>;

    async fn install_package(&self, request: &InstallRequest) -> Result<(), BackendError>;
}

/// File transfers identified by job, polled for progress.
#[async_trait]
pub trait DownloadService: Send + Sync {
    async fn enqueue(&self, request: DownloadRequest) -> Result<DownloadJobId, BackendError>;

    /// Current state of a job, `None` once the service no longer tracks it.
    async fn query(&self, id: DownloadJobId) -> Option<JobSnapshot>;

    /// Stop a job and forget it. Unknown ids are ignored.
    async fn cancel(&self, id: DownloadJobId);
}
