// Top-level window of the chat client: existence check, launch, z-order.
use std::path::PathBuf;

use crate::config::AutomationConfig;
use crate::errors::{RelayError, RelayResult};

pub trait AppWindow {
    /// Human-readable identity used in logs and error messages.
    fn describe(&self) -> String;
    fn exists(&self) -> bool;
    /// Start the client. Returns once the process was spawned, not once the window shows.
    fn launch(&mut self) -> RelayResult<()>;
    /// Restore and focus an existing window.
    fn activate(&mut self) -> RelayResult<()>;
    fn set_topmost(&mut self, topmost: bool) -> RelayResult<()>;
}

/// The real desktop window, found by title (and class on Windows).
pub struct DesktopWindow {
    title: String,
    class: Option<String>,
    launch_path: Option<PathBuf>,
}

impl DesktopWindow {
    pub fn from_config(config: &AutomationConfig) -> Self {
        Self {
            title: config.window_name.clone(),
            class: config.window_class.clone(),
            launch_path: config.launch_path.clone(),
        }
    }
}

impl AppWindow for DesktopWindow {
    fn describe(&self) -> String {
        match &self.class {
            Some(class) => format!("'{}' ({class})", self.title),
            None => format!("'{}'", self.title),
        }
    }

    fn exists(&self) -> bool {
        platform::exists(&self.title, self.class.as_deref())
    }

    fn launch(&mut self) -> RelayResult<()> {
        let path = self.launch_path.as_ref().ok_or_else(|| {
            RelayError::AutomationFatal(format!(
                "window {} not found and no launch_path configured",
                self.describe()
            ))
        })?;
        std::process::Command::new(path).spawn().map_err(|e| {
            RelayError::AutomationFatal(format!("launch {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), "chat client launched");
        Ok(())
    }

    fn activate(&mut self) -> RelayResult<()> {
        platform::activate(&self.title, self.class.as_deref())
    }

    fn set_topmost(&mut self, topmost: bool) -> RelayResult<()> {
        platform::set_topmost(&self.title, self.class.as_deref(), topmost)
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        FindWindowW, SetForegroundWindow, SetWindowPos, ShowWindow, HWND_NOTOPMOST, HWND_TOPMOST,
        SWP_NOMOVE, SWP_NOSIZE, SW_RESTORE,
    };

    use crate::errors::{RelayError, RelayResult};

    fn wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn find(title: &str, class: Option<&str>) -> Option<HWND> {
        let title_w = wide(title);
        let class_w = class.map(wide);
        let class_ptr = class_w
            .as_ref()
            .map_or(PCWSTR::null(), |c| PCWSTR(c.as_ptr()));
        let hwnd = unsafe { FindWindowW(class_ptr, PCWSTR(title_w.as_ptr())) }.ok()?;
        if hwnd.is_invalid() {
            None
        } else {
            Some(hwnd)
        }
    }

    fn require(title: &str, class: Option<&str>) -> RelayResult<HWND> {
        find(title, class)
            .ok_or_else(|| RelayError::AutomationFatal(format!("window '{title}' not found")))
    }

    pub fn exists(title: &str, class: Option<&str>) -> bool {
        find(title, class).is_some()
    }

    pub fn activate(title: &str, class: Option<&str>) -> RelayResult<()> {
        let hwnd = require(title, class)?;
        unsafe {
            let _ = ShowWindow(hwnd, SW_RESTORE);
            let _ = SetForegroundWindow(hwnd);
        }
        Ok(())
    }

    pub fn set_topmost(title: &str, class: Option<&str>, topmost: bool) -> RelayResult<()> {
        let hwnd = require(title, class)?;
        let insert_after = if topmost { HWND_TOPMOST } else { HWND_NOTOPMOST };
        unsafe { SetWindowPos(hwnd, insert_after, 0, 0, 0, 0, SWP_NOMOVE | SWP_NOSIZE) }
            .map_err(|e| RelayError::AutomationFatal(format!("SetWindowPos: {e}")))
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use crate::errors::RelayResult;

    pub fn exists(title: &str, _class: Option<&str>) -> bool {
        match xcap::Window::all() {
            Ok(windows) => windows.iter().any(|w| w.title() == title),
            Err(e) => {
                tracing::warn!(error = %e, "window enumeration failed");
                false
            }
        }
    }

    pub fn activate(_title: &str, _class: Option<&str>) -> RelayResult<()> {
        Ok(())
    }

    pub fn set_topmost(title: &str, _class: Option<&str>, topmost: bool) -> RelayResult<()> {
        tracing::debug!(title, topmost, "always-on-top is not supported on this platform");
        Ok(())
    }
}
