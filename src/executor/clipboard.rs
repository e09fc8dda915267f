// System clipboard access. Text goes through arboard; file lists are placed
// as a file-drop payload so the chat client pastes them as attachments.
use std::path::PathBuf;

use crate::errors::{RelayError, RelayResult};

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> RelayResult<()>;
    fn set_files(&mut self, paths: &[PathBuf]) -> RelayResult<()>;
}

pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> RelayResult<Self> {
        let inner = arboard::Clipboard::new()
            .map_err(|e| RelayError::Clipboard(format!("open: {e}")))?;
        Ok(Self { inner })
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> RelayResult<()> {
        self.inner
            .set_text(text.to_owned())
            .map_err(|e| RelayError::Clipboard(format!("set text: {e}")))
    }

    fn set_files(&mut self, paths: &[PathBuf]) -> RelayResult<()> {
        if paths.is_empty() {
            return Err(RelayError::Clipboard("no files to copy".into()));
        }
        set_file_drop_list(paths)?;
        tracing::debug!(count = paths.len(), "file list placed on clipboard");
        Ok(())
    }
}

/// PowerShell literal for a path: single-quoted with embedded quotes doubled.
fn ps_quote(path: &std::path::Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "''"))
}

fn set_file_drop_script(paths: &[PathBuf]) -> String {
    let list: Vec<String> = paths.iter().map(|p| ps_quote(p)).collect();
    format!("Set-Clipboard -LiteralPath {}", list.join(","))
}

#[cfg(target_os = "windows")]
fn set_file_drop_list(paths: &[PathBuf]) -> RelayResult<()> {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let output = std::process::Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command"])
        .arg(set_file_drop_script(paths))
        .creation_flags(CREATE_NO_WINDOW)
        .output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(RelayError::Clipboard(format!(
            "Set-Clipboard failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[cfg(not(target_os = "windows"))]
fn set_file_drop_list(paths: &[PathBuf]) -> RelayResult<()> {
    tracing::debug!(script = %set_file_drop_script(paths), "file-drop clipboard requested");
    Err(RelayError::Clipboard(
        "file-drop clipboard is only supported on Windows".into(),
    ))
}
