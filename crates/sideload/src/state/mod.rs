mod downloads;
mod presets;
mod wizard;

pub use downloads::{AppStates, DownloadState, EntryPhase, JobProgress};
pub use presets::PresetSequence;
pub use wizard::{InstallWizard, WizardStep};
