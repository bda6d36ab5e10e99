mod app;
mod cli;
mod driver;
mod error;
mod logging;
mod settings;
mod state;

use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};

use sideload_platform::AppPaths;

use crate::cli::Cli;
use crate::settings::AppSettings;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = AppSettings::load();

    let paths = match AppPaths::new() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let paths = match &settings.download_dir {
        Some(dir) => paths.with_download_dir(dir.clone()),
        None => paths,
    };

    logging::init_logging(
        &paths,
        settings.debug_logging || cli.debug,
        settings.max_log_size_bytes,
    );
    info!("sideload {} starting", env!("CARGO_PKG_VERSION"));

    if !AppSettings::exists()
        && let Err(e) = settings.save()
    {
        warn!("Could not write default settings: {e}");
    }

    let serial = cli.serial.clone().or_else(|| settings.device_serial.clone());
    match driver::run(cli.command(), serial, &settings, &paths).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
