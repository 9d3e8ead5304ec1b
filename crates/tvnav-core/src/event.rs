#![forbid(unsafe_code)]

//! Key codes and event kinds shared by the input and navigation layers.

use std::fmt;

/// Semantic key understood by the navigation layer.
///
/// Raw platform codes are folded into this small space by a
/// [`KeyboardPlatform`](crate::keymap::KeyboardPlatform).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Up,
    Down,
    Left,
    Right,
    Enter,
}

impl KeyCode {
    /// All five semantic keys.
    pub const ALL: [KeyCode; 5] = [
        KeyCode::Up,
        KeyCode::Down,
        KeyCode::Left,
        KeyCode::Right,
        KeyCode::Enter,
    ];

    /// Returns true for the four arrow keys.
    #[must_use]
    pub const fn is_directional(self) -> bool {
        !matches!(self, Self::Enter)
    }

    /// Returns true for Left and Right.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// Stable lowercase name, used in log fields.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Enter => "enter",
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Event kinds published by the press state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavEvent {
    /// Emitted once, immediately, when a key goes down.
    KeyDown,
    /// Emitted repeatedly while a key stays held past the initial delay.
    LongPress,
}

/// Key-down payload as delivered by the platform input source.
///
/// Key-up signals carry no payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawKeyEvent {
    /// Platform key code (Android `KEYCODE_*` values on TV boxes).
    pub key_code: i32,
    /// Platform action field, passed through untouched.
    pub action: i32,
    /// Printable label of the pressed key, if the platform supplies one.
    pub pressed_key: String,
}

impl RawKeyEvent {
    /// Create an event with only a key code.
    #[must_use]
    pub fn new(key_code: i32) -> Self {
        Self {
            key_code,
            ..Self::default()
        }
    }

    /// Builder: set the action field.
    #[must_use]
    pub fn with_action(mut self, action: i32) -> Self {
        self.action = action;
        self
    }

    /// Builder: set the pressed key label.
    #[must_use]
    pub fn with_pressed_key(mut self, label: impl Into<String>) -> Self {
        self.pressed_key = label.into();
        self
    }
}
