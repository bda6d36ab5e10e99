use std::collections::{BTreeMap, BTreeSet};

use sideload_backend::InstalledAppInfo;

/// Packages from `pm list packages` (`package:<id>` per line).
#[must_use]
pub fn parse_package_list(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(|package| package.rsplit('=').next().unwrap_or(package).trim())
        .filter(|package| !package.is_empty())
        .map(str::to_string)
        .collect()
}

/// First `versionName=` in a `dumpsys package <id>` report. A package
/// without a version name (`null` or blank) yields `None`.
#[must_use]
pub fn parse_version_name(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("versionName="))
        .map(str::trim)
        .filter(|version| !version.is_empty() && *version != "null")
        .map(ToString::to_string)
}

/// Launcher activities from `cmd package query-activities`.
///
/// Each `Activity #N:` block contributes its package. Labels are only known
/// when the app sets a literal (non-resource) label.
#[must_use]
pub fn parse_launcher_activities(output: &str) -> InstalledAppInfo {
    let mut packages = BTreeSet::new();
    let mut labels = BTreeMap::new();
    let mut package: Option<String> = None;
    let mut label: Option<String> = None;

    let mut flush = |package: &mut Option<String>, label: &mut Option<String>| {
        if let Some(package) = package.take() {
            if let Some(label) = label.take() {
                labels.entry(package.clone()).or_insert(label);
            }
            packages.insert(package);
        }
        *label = None;
    };

    for line in output.lines().map(str::trim) {
        if line.starts_with("Activity #") {
            flush(&mut package, &mut label);
            continue;
        }
        if package.is_none()
            && let Some(value) = line.strip_prefix("packageName=")
        {
            package = Some(value.trim().to_string());
        }
        if label.is_none()
            && let Some(value) = field_value(line, "nonLocalizedLabel=")
            && value != "null"
        {
            label = Some(value.to_string());
        }
    }
    flush(&mut package, &mut label);

    InstalledAppInfo {
        package_names: packages,
        labels_by_package: labels,
    }
}

// Values may contain spaces, so a value ends where the next `key=` starts.
fn field_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    let end = rest
        .match_indices(' ')
        .map(|(index, _)| index)
        .find(|&index| {
            rest[index + 1..]
                .split_once('=')
                .is_some_and(|(word, _)| !word.is_empty() && !word.contains(' '))
        })
        .unwrap_or(rest.len());
    Some(rest[..end].trim())
}

#[must_use]
pub fn parse_sdk_level(output: &str) -> Option<u32> {
    output.trim().parse().ok()
}

/// Serials of devices in the `device` state from `adb devices`.
#[must_use]
pub fn parse_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.starts_with("List of devices"))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            (parts.next()? == "device").then(|| serial.to_string())
        })
        .collect()
}

/// Version from the first line of `adb version`.
#[must_use]
pub fn parse_adb_version(output: &str) -> Option<String> {
    output
        .lines()
        .next()?
        .strip_prefix("Android Debug Bridge version ")
        .map(|version| version.trim().to_string())
}

/// `am start` and `install` report failures on stdout with exit code 0.
#[must_use]
pub fn parse_failure_message(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("Error") || line.starts_with("Failure"))
        .map(str::to_string)
}
