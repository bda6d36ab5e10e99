use std::ffi::OsStr;
use std::process::Stdio;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

pub trait HideWindow {
    fn hide_window(&mut self) -> &mut Self;
}

impl HideWindow for tokio::process::Command {
    #[cfg(windows)]
    fn hide_window(&mut self) -> &mut Self {
        self.creation_flags(CREATE_NO_WINDOW)
    }

    #[cfg(not(windows))]
    fn hide_window(&mut self) -> &mut Self {
        self
    }
}

/// Command for a helper tool that runs without a console window, never reads
/// stdin, and is killed if the awaiting task is dropped.
#[must_use]
pub fn background_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.stdin(Stdio::null()).kill_on_drop(true).hide_window();
    cmd
}

#[cfg(test)]
mod tests {
    use super::{HideWindow, background_command};

    #[test]
    fn tokio_command_hide_window_is_chainable() {
        let mut cmd = tokio::process::Command::new("echo");
        let before = &raw mut cmd;
        let after = cmd.hide_window() as *mut tokio::process::Command;
        assert_eq!(before, after);
    }

    #[test]
    fn background_command_keeps_program() {
        let cmd = background_command("adb");
        assert_eq!(cmd.as_std().get_program(), "adb");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn background_command_runs_tool() {
        let output = background_command("echo")
            .arg("ok")
            .output()
            .await
            .expect("echo should run");
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "ok");
    }
}
