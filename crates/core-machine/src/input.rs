//! Key-event to signal translation.
//!
//! The event pump feeds raw window events through here; out come
//! `key_down`/`key_up` signals addressed to the first keyboard wired to the
//! screen whose window saw the event. Screens without keyboards swallow
//! their input.

use core_bus::Value;
use core_signal::Signal;
use core_window::{scancode_for, Modifiers, WindowEvent, WindowId};

/// Which keyboards a screen's window feeds, captured at boot. Keyboard
/// lists are immutable after load, so the pump works off this snapshot and
/// never touches the components.
#[derive(Debug, Clone)]
pub struct ScreenWiring {
    pub window: WindowId,
    pub keyboards: Vec<String>,
}

pub struct KeyTranslator {
    wirings: Vec<ScreenWiring>,
    user: String,
}

impl KeyTranslator {
    pub fn new(wirings: Vec<ScreenWiring>, user: impl Into<String>) -> Self {
        Self {
            wirings,
            user: user.into(),
        }
    }

    fn keyboard_for(&self, window: WindowId) -> Option<&str> {
        self.wirings
            .iter()
            .find(|w| w.window == window)?
            .keyboards
            .first()
            .map(String::as_str)
    }

    /// Translate one window event; `None` for events that produce no
    /// signal (quit, unwired windows, keyboards absent).
    pub fn translate(&self, event: &WindowEvent) -> Option<Signal> {
        match event {
            WindowEvent::KeyDown {
                window,
                key,
                text,
                mods,
            } => {
                let keyboard = self.keyboard_for(*window)?;
                // Control chords deliver the raw key character; plain
                // presses deliver the translated text when there is one.
                let codepoint = if mods.contains(Modifiers::CTRL) {
                    key.base_char().map(|c| c as u32).unwrap_or(0)
                } else {
                    (*text)
                        .or_else(|| key.base_char())
                        .map(|c| c as u32)
                        .unwrap_or(0)
                };
                Some(self.key_signal("key_down", keyboard, codepoint, *key))
            }
            WindowEvent::KeyUp { window, key, .. } => {
                let keyboard = self.keyboard_for(*window)?;
                let codepoint = key.base_char().map(|c| c as u32).unwrap_or(0);
                Some(self.key_signal("key_up", keyboard, codepoint, *key))
            }
            WindowEvent::Quit => None,
        }
    }

    fn key_signal(&self, name: &str, keyboard: &str, codepoint: u32, key: core_window::Key) -> Signal {
        // The guest only understands the BMP; anything above reads as 0.
        let codepoint = if codepoint > 0xFFFF { 0 } else { codepoint };
        let scancode = scancode_for(key).unwrap_or(0);
        Signal::new(
            name,
            vec![
                Value::str(keyboard),
                Value::from(codepoint),
                Value::Int(i64::from(scancode)),
                Value::str(self.user.as_bytes()),
            ],
        )
    }
}
