use std::path::{Path, PathBuf};

use sideload_backend::PlatformInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    PlayProtect,
    AllowUnknownSources,
    Install,
}

impl WizardStep {
    pub fn title(self) -> &'static str {
        match self {
            Self::PlayProtect => "Open Play Protect",
            Self::AllowUnknownSources => "Allow unknown sources",
            Self::Install => "Install APK",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::PlayProtect => "Make sure Play Protect will not block the installation.",
            Self::AllowUnknownSources => {
                "Open settings and allow this app to install unknown apps."
            }
            Self::Install => "Start installing the package.",
        }
    }
}

/// Guided installation for one downloaded APK. The last step stays current
/// until the install succeeds or the wizard is dismissed.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallWizard {
    steps: Vec<WizardStep>,
    current: usize,
    file: PathBuf,
    platform: PlatformInfo,
}

impl InstallWizard {
    pub fn new(play_protect_step: bool, file: PathBuf, platform: PlatformInfo) -> Self {
        let mut steps = Vec::with_capacity(3);
        if play_protect_step {
            steps.push(WizardStep::PlayProtect);
        }
        steps.extend([WizardStep::AllowUnknownSources, WizardStep::Install]);

        Self {
            steps,
            current: 0,
            file,
            platform,
        }
    }

    pub fn steps(&self) -> &[WizardStep] {
        &self.steps
    }

    pub fn current_step(&self) -> WizardStep {
        self.steps[self.current]
    }

    /// One-based, for display.
    pub fn step_number(&self) -> usize {
        self.current + 1
    }

    pub fn advance(&mut self) -> WizardStep {
        if self.current + 1 < self.steps.len() {
            self.current += 1;
        }
        self.current_step()
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn platform(&self) -> &PlatformInfo {
        &self.platform
    }
}
