mod backend;
mod detection;
mod parse;

pub use backend::AdbBackend;
pub use detection::{AdbDetection, detect_adb};
pub use parse::{
    parse_adb_version, parse_devices, parse_failure_message, parse_launcher_activities,
    parse_package_list, parse_sdk_level, parse_version_name,
};
