mod error;
mod traits;
mod types;

pub use error::BackendError;
pub use traits::{DownloadService, Launcher, PackageRegistry};
pub use types::{
    APK_MIME_TYPE, DownloadJobId, DownloadRequest, InstallRequest, InstalledAppInfo, JobSnapshot,
    JobStatus, PlatformInfo, ViewRequest, intent,
};
