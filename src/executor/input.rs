// Physical input simulation through enigo.
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::errors::{RelayError, RelayResult};

/// Keystrokes the driver needs from the chat client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStroke {
    /// Ctrl+F: focus the global search field.
    Find,
    /// Ctrl+A
    SelectAll,
    /// Ctrl+V
    Paste,
    Delete,
    Escape,
    /// Enter: the client's send shortcut.
    Send,
}

pub trait InputDevice {
    fn press(&mut self, stroke: KeyStroke) -> RelayResult<()>;
    fn click(&mut self, x: i32, y: i32) -> RelayResult<()>;
    /// Main display size in pixels.
    fn screen_size(&self) -> RelayResult<(i32, i32)>;
}

pub struct EnigoInput {
    enigo: Enigo,
}

#[cfg(target_os = "macos")]
const SHORTCUT_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const SHORTCUT_MODIFIER: Key = Key::Control;

impl EnigoInput {
    pub fn new() -> RelayResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| RelayError::Input(format!("enigo init: {e}")))?;
        Ok(Self { enigo })
    }

    fn chord(&mut self, key: char) -> RelayResult<()> {
        self.enigo
            .key(SHORTCUT_MODIFIER, Direction::Press)
            .map_err(input_err)?;
        let tapped = self.enigo.key(Key::Unicode(key), Direction::Click);
        // Always release the modifier, even when the tap failed.
        self.enigo
            .key(SHORTCUT_MODIFIER, Direction::Release)
            .map_err(input_err)?;
        tapped.map_err(input_err)
    }

    fn tap(&mut self, key: Key) -> RelayResult<()> {
        self.enigo.key(key, Direction::Click).map_err(input_err)
    }
}

impl InputDevice for EnigoInput {
    fn press(&mut self, stroke: KeyStroke) -> RelayResult<()> {
        tracing::trace!(?stroke, "key stroke");
        match stroke {
            KeyStroke::Find => self.chord('f'),
            KeyStroke::SelectAll => self.chord('a'),
            KeyStroke::Paste => self.chord('v'),
            KeyStroke::Delete => self.tap(Key::Delete),
            KeyStroke::Escape => self.tap(Key::Escape),
            KeyStroke::Send => self.tap(Key::Return),
        }
    }

    fn click(&mut self, x: i32, y: i32) -> RelayResult<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(input_err)?;
        self.enigo
            .button(Button::Left, Direction::Click)
            .map_err(input_err)?;
        tracing::debug!(x, y, "clicked");
        Ok(())
    }

    fn screen_size(&self) -> RelayResult<(i32, i32)> {
        self.enigo.main_display().map_err(input_err)
    }
}

fn input_err(e: enigo::InputError) -> RelayError {
    RelayError::Input(e.to_string())
}
