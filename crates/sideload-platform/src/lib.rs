mod commands;
mod paths;

pub use commands::{HideWindow, background_command};
pub use paths::{AppPaths, AppPathsError};
