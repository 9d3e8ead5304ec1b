#![forbid(unsafe_code)]

//! Platform key-code mapping and raw listener wiring.
//!
//! A [`KeyboardPlatform`] is injected into the
//! [`PressStateMachine`](crate::press::PressStateMachine). It folds raw
//! integer codes into [`KeyCode`] and owns the hook into the platform's
//! key-down/key-up listener API.

use tracing::debug;

use crate::event::KeyCode;

/// Capability implemented once per input platform.
pub trait KeyboardPlatform {
    /// Map a raw platform code. `None` means the key is not navigational.
    fn map_key_code(&self, raw: i32) -> Option<KeyCode>;

    /// Install the platform's key-down and key-up listeners.
    fn add_listeners(&mut self);

    /// Remove both listeners installed by [`add_listeners`](Self::add_listeners).
    fn remove_listeners(&mut self);
}

/// Android TV / set-top-box key table.
///
/// Codes 4 (BACK) and 7..=15 (digits 0-8) are listed explicitly as
/// unmapped; every other unknown code falls through to `None` as well.
#[must_use]
pub const fn map_android_key_code(raw: i32) -> Option<KeyCode> {
    match raw {
        19 => Some(KeyCode::Up),
        20 => Some(KeyCode::Down),
        21 => Some(KeyCode::Left),
        22 => Some(KeyCode::Right),
        23 | 66 => Some(KeyCode::Enter),
        4 | 7..=15 => None,
        _ => None,
    }
}

/// Built-in platform using [`map_android_key_code`].
#[derive(Debug, Default, Clone)]
pub struct AndroidTvKeyboard {
    listening: bool,
}

impl AndroidTvKeyboard {
    /// Create a platform with no listeners installed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true between `add_listeners` and `remove_listeners`.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listening
    }
}

impl KeyboardPlatform for AndroidTvKeyboard {
    fn map_key_code(&self, raw: i32) -> Option<KeyCode> {
        map_android_key_code(raw)
    }

    fn add_listeners(&mut self) {
        debug!("android tv key listeners installed");
        self.listening = true;
    }

    fn remove_listeners(&mut self) {
        debug!("android tv key listeners removed");
        self.listening = false;
    }
}
