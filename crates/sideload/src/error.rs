use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppErrorDetail {
    #[error("{0}")]
    Message(String),
    #[error("{kind}: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },
    #[error("{0}")]
    Backend(sideload_backend::BackendError),
}

impl From<String> for AppErrorDetail {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<std::io::Error> for AppErrorDetail {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<sideload_backend::BackendError> for AppErrorDetail {
    fn from(value: sideload_backend::BackendError) -> Self {
        Self::Backend(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },
    #[error("adb was not found; install the Android platform tools or set adb_path")]
    AdbUnavailable,
    #[error("No device is attached over adb")]
    NoDevice,
    #[error("{package} is not in the catalog")]
    UnknownPackage { package: String },
    #[error("{package} has no downloaded APK to install")]
    NothingToInstall { package: String },
    #[error("No installation wizard is open for {package}")]
    NoWizard { package: String },
    #[error("{operation} failed: {details}")]
    OperationFailed {
        operation: &'static str,
        details: AppErrorDetail,
    },
    #[error("The session has stopped")]
    SessionClosed,
}

impl AppError {
    pub fn timeout(operation: &'static str, seconds: u64) -> Self {
        Self::Timeout { operation, seconds }
    }

    pub fn unknown_package(package: impl Into<String>) -> Self {
        Self::UnknownPackage {
            package: package.into(),
        }
    }

    pub fn nothing_to_install(package: impl Into<String>) -> Self {
        Self::NothingToInstall {
            package: package.into(),
        }
    }

    pub fn no_wizard(package: impl Into<String>) -> Self {
        Self::NoWizard {
            package: package.into(),
        }
    }

    pub fn operation_failed(operation: &'static str, details: impl Into<AppErrorDetail>) -> Self {
        Self::OperationFailed {
            operation,
            details: details.into(),
        }
    }
}
