use clap::{Parser, Subcommand};

/// Install and update Android apps on a device attached over adb.
#[derive(Debug, Parser)]
#[command(name = "sideload", version, long_about = None)]
pub struct Cli {
    /// Device serial, overriding the saved `device_serial` setting
    #[arg(long, short = 's', global = true)]
    pub serial: Option<String>,

    /// Write debug output to the log file for this run
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check every catalog app for updates (the default)
    Status,
    /// Open the Play Store listing of each preset app in turn
    Presets,
    /// Download the newest APK of a catalog app
    Download {
        /// Catalog package id, for example `app.lawnchair`
        package: String,
    },
    /// Download a catalog app and install it
    Install {
        /// Catalog package id, for example `app.lawnchair`
        package: String,
    },
}

impl Cli {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Status)
    }
}
