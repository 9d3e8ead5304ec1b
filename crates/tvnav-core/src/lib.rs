#![forbid(unsafe_code)]

//! Core: remote-control key input, event dispatch, and press timing.
//!
//! # Role in tvnav
//! `tvnav-core` is the input layer. It turns raw platform key signals into
//! semantic [`KeyCode`](event::KeyCode) events and publishes them on an
//! [`EventBus`](event_bus::EventBus). The navigation layer (`tvnav-widgets`)
//! subscribes to that bus and never sees raw hardware codes.
//!
//! # Primary responsibilities
//! - **Key mapping**: fixed table from platform integers to [`KeyCode`](event::KeyCode),
//!   behind the [`KeyboardPlatform`](keymap::KeyboardPlatform) capability.
//! - **EventBus**: synchronous publish/subscribe keyed by event kind.
//! - **PressStateMachine**: short press on key-down, then a repeating
//!   long-press stream while the key is held, absorbing hardware auto-repeat.
//!
//! Everything here is single-threaded and deterministic: time only advances
//! when the host passes an `Instant` in.

pub mod event;
pub mod event_bus;
pub mod keymap;
#[cfg(feature = "subscriber")]
pub mod logging;
pub mod press;

pub use event::{KeyCode, NavEvent, RawKeyEvent};
pub use event_bus::{EventBus, SubscriptionId};
pub use keymap::{AndroidTvKeyboard, KeyboardPlatform, map_android_key_code};
pub use press::{PressPhase, PressStateMachine, PressTiming, RepeatTimer};
