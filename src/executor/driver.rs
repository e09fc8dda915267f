//! UI automation driver for the chat client.
//!
//! Owns the single interactive window together with the input device and the
//! clipboard. The client offers no scripting feedback, so every state
//! transition is confirmed by a visual anchor:
//!
//! `Idle → Located → ChatOpen → InputReady → Sending → Idle`
//!
//! A driver is created on the dispatch worker thread and never leaves it.
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::config::{AppConfig, AutomationConfig};
use crate::errors::{RelayError, RelayResult};
use crate::executor::clipboard::{Clipboard, SystemClipboard};
use crate::executor::input::{EnigoInput, InputDevice, KeyStroke};
use crate::executor::text_input::pad_for_paste;
use crate::executor::window::{AppWindow, DesktopWindow};
use crate::perception::locator::{AnchorLocate, VisualAnchorLocator};
use crate::perception::screenshot::PrimaryScreen;
use crate::perception::types::{click_target_below, Anchor, AnchorMatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Located,
    ChatOpen,
    InputReady,
    Sending,
}

#[derive(Debug, Clone)]
pub struct Timings {
    /// Pause after each keystroke and before the screen is read after a paste.
    pub settle: Duration,
    pub text_interval: Duration,
    pub file_interval: Duration,
    pub anchor_timeout: Duration,
    pub anchor_poll: Duration,
    pub launch_timeout: Duration,
    pub launch_poll: Duration,
}

impl Timings {
    pub fn from_config(config: &AutomationConfig) -> Self {
        Self {
            settle: Duration::from_millis(config.base_interval_ms),
            text_interval: Duration::from_millis(config.text_interval_ms),
            file_interval: Duration::from_millis(config.file_interval_ms),
            anchor_timeout: Duration::from_millis(config.anchor_timeout_ms),
            anchor_poll: Duration::from_millis(config.anchor_poll_ms),
            launch_timeout: Duration::from_millis(config.launch_timeout_ms),
            launch_poll: Duration::from_millis(config.launch_poll_ms),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::from_config(&AutomationConfig::default())
    }
}

pub struct AutomationDriver {
    window: Box<dyn AppWindow>,
    input: Box<dyn InputDevice>,
    clipboard: Box<dyn Clipboard>,
    anchors: Box<dyn AnchorLocate>,
    timings: Timings,
    state: DriverState,
    topmost: bool,
}

impl AutomationDriver {
    pub fn new(
        window: Box<dyn AppWindow>,
        input: Box<dyn InputDevice>,
        clipboard: Box<dyn Clipboard>,
        anchors: Box<dyn AnchorLocate>,
        timings: Timings,
    ) -> Self {
        Self {
            window,
            input,
            clipboard,
            anchors,
            timings,
            state: DriverState::Idle,
            topmost: false,
        }
    }

    /// Driver wired to the real desktop: enigo input, system clipboard,
    /// primary-monitor capture.
    pub fn from_config(config: &AppConfig) -> RelayResult<Self> {
        let input = EnigoInput::new()?;
        let clipboard = SystemClipboard::new()?;
        let locator = VisualAnchorLocator::new(Box::new(PrimaryScreen), config.anchors.clone());
        tracing::info!(window = %config.automation.window_name, "automation driver ready");
        Ok(Self::new(
            Box::new(DesktopWindow::from_config(&config.automation)),
            Box::new(input),
            Box::new(clipboard),
            Box::new(locator),
            Timings::from_config(&config.automation),
        ))
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Deliver texts and then files to one chat. The window's always-on-top
    /// flag is cleared again whatever the outcome.
    pub fn send_message(&mut self, name: &str, texts: &[String], files: &[PathBuf]) -> RelayResult<()> {
        if name.trim().is_empty() {
            return Err(RelayError::MalformedCommand("chat name is empty".into()));
        }
        if texts.is_empty() && files.is_empty() {
            return Err(RelayError::EmptyCommand);
        }

        let outcome = self.deliver(name, texts, files);
        self.release();
        match &outcome {
            Ok(()) => tracing::info!(chat = %name, texts = texts.len(), files = files.len(), "delivered"),
            Err(e) => tracing::warn!(chat = %name, error = %e, "delivery failed"),
        }
        outcome
    }

    fn deliver(&mut self, name: &str, texts: &[String], files: &[PathBuf]) -> RelayResult<()> {
        self.locate()?;
        self.navigate_to_chat(name)?;
        self.confirm_compose_focus(name)?;
        if !texts.is_empty() {
            self.send_text(texts, self.timings.text_interval)?;
        }
        if !files.is_empty() {
            self.send_files(files, self.timings.file_interval)?;
        }
        Ok(())
    }

    /// Make sure the client window is up, launching it if needed, and pin it on top.
    pub fn locate(&mut self) -> RelayResult<()> {
        if !self.window.exists() {
            tracing::info!(window = %self.window.describe(), "window not found, launching client");
            self.window.launch()?;

            let deadline = Instant::now() + self.timings.launch_timeout;
            while !self.window.exists() {
                if Instant::now() >= deadline {
                    return Err(RelayError::AutomationFatal(format!(
                        "window {} did not appear within {:?}",
                        self.window.describe(),
                        self.timings.launch_timeout
                    )));
                }
                pause(self.timings.launch_poll);
            }
        }

        if let Err(e) = self.window.activate() {
            tracing::warn!(error = %e, "could not bring window to the foreground");
        }
        self.window.set_topmost(true)?;
        self.topmost = true;
        self.state = DriverState::Located;
        Ok(())
    }

    /// Search for `name` and open its conversation.
    ///
    /// A missing search result is reported, never retried: it may be an
    /// unknown name or a window in an unexpected state.
    pub fn navigate_to_chat(&mut self, name: &str) -> RelayResult<()> {
        self.stroke(KeyStroke::Find)?;
        self.stroke(KeyStroke::SelectAll)?;
        self.stroke(KeyStroke::Delete)?;

        // Paste rather than type: key injection mangles non-ASCII names.
        self.clipboard.set_text(name)?;
        pause(self.timings.settle);
        self.stroke(KeyStroke::Paste)?;

        match self.wait_for_anchor(Anchor::SearchResult)? {
            Some(hit) => {
                self.click_below(&hit, Anchor::SearchResult)?;
                pause(self.timings.settle);
                self.state = DriverState::ChatOpen;
                tracing::debug!(chat = %name, "chat opened");
                Ok(())
            }
            None => {
                self.stroke(KeyStroke::Escape)?;
                tracing::warn!(chat = %name, "search result anchor not found, search cancelled");
                Err(RelayError::Navigation(name.to_owned()))
            }
        }
    }

    /// Reaching ChatOpen does not prove a compose box has focus; the compose
    /// toolbar must be visible too.
    pub fn confirm_compose_focus(&mut self, name: &str) -> RelayResult<()> {
        match self.wait_for_anchor(Anchor::ComposeToolbar)? {
            Some(hit) => {
                self.click_below(&hit, Anchor::ComposeToolbar)?;
                self.state = DriverState::InputReady;
                Ok(())
            }
            None => Err(RelayError::ConversationMissing(name.to_owned())),
        }
    }

    pub fn send_text(&mut self, messages: &[String], interval: Duration) -> RelayResult<()> {
        self.state = DriverState::Sending;
        for message in messages {
            if message.is_empty() {
                return Err(RelayError::MalformedCommand("message text is empty".into()));
            }
            self.input.press(KeyStroke::SelectAll)?;
            pause(interval);
            self.input.press(KeyStroke::Delete)?;
            pause(interval);

            self.clipboard.set_text(&pad_for_paste(message))?;
            pause(interval.mul_f32(2.5));
            self.input.press(KeyStroke::Paste)?;
            pause(interval * 2);
            self.input.press(KeyStroke::Send)?;
            pause(interval * 2);
        }
        Ok(())
    }

    pub fn send_files(&mut self, paths: &[PathBuf], interval: Duration) -> RelayResult<()> {
        self.state = DriverState::Sending;
        self.clipboard.set_files(paths)?;
        self.input.press(KeyStroke::Paste)?;
        pause(interval / 2);
        self.input.press(KeyStroke::Send)?;
        // Let the client finish the upload before the window is released.
        pause(interval);
        Ok(())
    }

    fn release(&mut self) {
        if self.topmost {
            if let Err(e) = self.window.set_topmost(false) {
                tracing::warn!(error = %e, "failed to clear always-on-top");
            }
            self.topmost = false;
        }
        self.state = DriverState::Idle;
    }

    fn wait_for_anchor(&mut self, anchor: Anchor) -> RelayResult<Option<AnchorMatch>> {
        let deadline = Instant::now() + self.timings.anchor_timeout;
        loop {
            if let Some(hit) = self.anchors.locate_anchor(anchor)? {
                return Ok(Some(hit));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            pause(self.timings.anchor_poll);
        }
    }

    fn click_below(&mut self, hit: &AnchorMatch, anchor: Anchor) -> RelayResult<()> {
        let screen = self.input.screen_size()?;
        let (x, y) = click_target_below(hit, self.anchors.click_offset(anchor), screen);
        self.input.click(x, y)
    }

    fn stroke(&mut self, stroke: KeyStroke) -> RelayResult<()> {
        self.input.press(stroke)?;
        pause(self.timings.settle);
        Ok(())
    }
}

impl Drop for AutomationDriver {
    fn drop(&mut self) {
        self.release();
    }
}

fn pause(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Window that appears after `appears_after` existence checks once launched.
    struct LazyWindow {
        launched: Rc<Cell<bool>>,
        checks: Cell<u32>,
        appears_after: Option<u32>,
        topmost: Rc<Cell<bool>>,
    }

    impl AppWindow for LazyWindow {
        fn describe(&self) -> String {
            "'lazy'".into()
        }
        fn exists(&self) -> bool {
            if !self.launched.get() {
                return false;
            }
            self.checks.set(self.checks.get() + 1);
            self.appears_after.is_some_and(|n| self.checks.get() >= n)
        }
        fn launch(&mut self) -> RelayResult<()> {
            self.launched.set(true);
            Ok(())
        }
        fn activate(&mut self) -> RelayResult<()> {
            Ok(())
        }
        fn set_topmost(&mut self, topmost: bool) -> RelayResult<()> {
            self.topmost.set(topmost);
            Ok(())
        }
    }

    struct NoInput;

    impl InputDevice for NoInput {
        fn press(&mut self, _stroke: KeyStroke) -> RelayResult<()> {
            Ok(())
        }
        fn click(&mut self, _x: i32, _y: i32) -> RelayResult<()> {
            Ok(())
        }
        fn screen_size(&self) -> RelayResult<(i32, i32)> {
            Ok((800, 600))
        }
    }

    struct NoClipboard;

    impl Clipboard for NoClipboard {
        fn set_text(&mut self, _text: &str) -> RelayResult<()> {
            Ok(())
        }
        fn set_files(&mut self, _paths: &[PathBuf]) -> RelayResult<()> {
            Ok(())
        }
    }

    struct AlwaysVisible;

    impl AnchorLocate for AlwaysVisible {
        fn locate_anchor(&mut self, _anchor: Anchor) -> RelayResult<Option<AnchorMatch>> {
            Ok(Some(AnchorMatch { x: 10, y: 10, width: 20, height: 20, score: 1.0 }))
        }
        fn click_offset(&self, _anchor: Anchor) -> i32 {
            50
        }
    }

    fn timings() -> Timings {
        Timings {
            settle: Duration::ZERO,
            text_interval: Duration::ZERO,
            file_interval: Duration::ZERO,
            anchor_timeout: Duration::ZERO,
            anchor_poll: Duration::ZERO,
            launch_timeout: Duration::from_millis(50),
            launch_poll: Duration::from_millis(1),
        }
    }

    fn driver(appears_after: Option<u32>, topmost: Rc<Cell<bool>>) -> AutomationDriver {
        let window = LazyWindow {
            launched: Rc::new(Cell::new(false)),
            checks: Cell::new(0),
            appears_after,
            topmost,
        };
        AutomationDriver::new(
            Box::new(window),
            Box::new(NoInput),
            Box::new(NoClipboard),
            Box::new(AlwaysVisible),
            timings(),
        )
    }

    #[test]
    fn missing_window_is_launched_and_awaited() {
        let topmost = Rc::new(Cell::new(false));
        let mut driver = driver(Some(3), topmost.clone());
        driver.locate().unwrap();
        assert_eq!(driver.state(), DriverState::Located);
        assert!(topmost.get());
    }

    #[test]
    fn window_that_never_appears_is_fatal() {
        let mut driver = driver(None, Rc::new(Cell::new(false)));
        let err = driver.send_message("Alice", &["hi".into()], &[]).unwrap_err();
        assert!(matches!(err, RelayError::AutomationFatal(_)));
        assert_eq!(driver.state(), DriverState::Idle);
    }

    #[test]
    fn bad_arguments_are_rejected_before_touching_the_ui() {
        let topmost = Rc::new(Cell::new(false));
        let mut driver = driver(Some(1), topmost.clone());
        assert!(matches!(
            driver.send_message("  ", &["hi".into()], &[]),
            Err(RelayError::MalformedCommand(_))
        ));
        assert!(matches!(driver.send_message("Alice", &[], &[]), Err(RelayError::EmptyCommand)));
        assert!(!topmost.get());
    }

    #[test]
    fn empty_message_fails_and_releases_the_window() {
        let topmost = Rc::new(Cell::new(false));
        let mut driver = driver(Some(1), topmost.clone());
        let err = driver
            .send_message("Alice", &["first".into(), String::new()], &[])
            .unwrap_err();
        assert!(matches!(err, RelayError::MalformedCommand(_)));
        assert!(!topmost.get());
        assert_eq!(driver.state(), DriverState::Idle);
    }

    struct ExplodingInput;

    impl InputDevice for ExplodingInput {
        fn press(&mut self, _stroke: KeyStroke) -> RelayResult<()> {
            panic!("keyboard hook crashed");
        }
        fn click(&mut self, _x: i32, _y: i32) -> RelayResult<()> {
            Ok(())
        }
        fn screen_size(&self) -> RelayResult<(i32, i32)> {
            Ok((800, 600))
        }
    }

    #[test]
    fn dropping_a_located_driver_clears_topmost() {
        let topmost = Rc::new(Cell::new(false));
        let mut driver = driver(Some(1), topmost.clone());
        driver.locate().unwrap();
        assert!(topmost.get());
        drop(driver);
        assert!(!topmost.get());
    }

    #[test]
    fn panic_mid_send_still_clears_topmost() {
        let topmost = Rc::new(Cell::new(false));
        let window = LazyWindow {
            launched: Rc::new(Cell::new(false)),
            checks: Cell::new(0),
            appears_after: Some(1),
            topmost: topmost.clone(),
        };
        let mut driver = AutomationDriver::new(
            Box::new(window),
            Box::new(ExplodingInput),
            Box::new(NoClipboard),
            Box::new(AlwaysVisible),
            timings(),
        );

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            driver.send_message("Alice", &["hi".into()], &[])
        }));
        assert!(outcome.is_err());
        assert!(!topmost.get());
    }
}
