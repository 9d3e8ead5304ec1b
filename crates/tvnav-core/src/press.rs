#![forbid(unsafe_code)]

//! Short-press / long-press state machine for remote-control keys.
//!
//! Set-top boxes report a held key as a burst of raw key-down signals. This
//! module absorbs that burst and produces its own, bounded-rate stream:
//!
//! ```text
//! 0ms        +500ms   +150ms   +150ms
//! KEY_DOWN      | LONG   | LONG   | LONG ...   (held ~1s)
//!
//! 0ms    +400ms
//! KEY_DOWN        ... nothing more             (released early)
//! ```
//!
//! # States
//!
//! | From | Signal | To | Effect |
//! |------|--------|----|--------|
//! | `Idle` | key-down (mapped) | `PressedAwaitingRepeat` | emit `KeyDown`, arm initial delay |
//! | `PressedAwaitingRepeat` | timer due | `Repeating` | emit `LongPress`, arm repeat interval |
//! | `Repeating` | timer due | `Repeating` | emit `LongPress`, re-arm |
//! | any | key-up | `Idle` | cancel timer, clear key |
//! | pressed | key-down | unchanged | nothing |
//!
//! # Invariants
//!
//! 1. At most one `KeyDown` per physical press.
//! 2. The timer is armed iff the phase is not `Idle`.
//! 3. Once detached or released, [`tick`](PressStateMachine::tick) emits nothing.
//!
//! Time is injected: the host calls [`tick`](PressStateMachine::tick) with
//! the current `Instant` and may sleep until
//! [`next_deadline`](PressStateMachine::next_deadline).

use std::time::Duration;

use tracing::{debug, info, trace, warn};
use web_time::Instant;

use crate::event::{KeyCode, NavEvent, RawKeyEvent};
use crate::event_bus::EventBus;
use crate::keymap::{AndroidTvKeyboard, KeyboardPlatform};

/// Bus type the press machine publishes on.
pub type KeyBus = EventBus<NavEvent, KeyCode>;

/// Delay before the first long press.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Interval between successive long presses.
pub const DEFAULT_REPEAT_INTERVAL: Duration = Duration::from_millis(150);

const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Timing configuration for long-press detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressTiming {
    /// Time a key must stay down before the first long press (default: 500ms).
    pub initial_delay: Duration,
    /// Time between long presses once repeating (default: 150ms).
    pub repeat_interval: Duration,
}

impl Default for PressTiming {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            repeat_interval: DEFAULT_REPEAT_INTERVAL,
        }
    }
}

impl PressTiming {
    /// Builder: set the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Builder: set the repeat interval. Clamped to at least 1ms.
    #[must_use]
    pub fn with_repeat_interval(mut self, interval: Duration) -> Self {
        self.repeat_interval = interval.max(MIN_REPEAT_INTERVAL);
        self
    }
}

/// Phase of the press state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressPhase {
    #[default]
    Idle,
    PressedAwaitingRepeat,
    Repeating,
}

/// One-shot cancellable deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepeatTimer {
    deadline: Option<Instant>,
}

impl RepeatTimer {
    /// Arm the timer to fire `delay` after `from`, replacing any pending deadline.
    pub fn arm(&mut self, from: Instant, delay: Duration) {
        self.deadline = Some(from + delay);
    }

    /// Cancel the pending deadline. Returns true if one was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Pending deadline, if armed.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns true if armed and `now` has reached the deadline.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// Converts raw key-down/key-up pulses into `KeyDown` and `LongPress` events.
#[derive(Debug)]
pub struct PressStateMachine<Pl: KeyboardPlatform = AndroidTvKeyboard> {
    platform: Pl,
    bus: KeyBus,
    timing: PressTiming,
    phase: PressPhase,
    current_key: Option<KeyCode>,
    timer: RepeatTimer,
    attached: bool,
}

impl PressStateMachine<AndroidTvKeyboard> {
    /// Create a machine for the built-in Android TV key table.
    #[must_use]
    pub fn android_tv(bus: KeyBus) -> Self {
        Self::new(AndroidTvKeyboard::new(), bus)
    }
}

impl<Pl: KeyboardPlatform> PressStateMachine<Pl> {
    /// Create a detached machine publishing on `bus`.
    #[must_use]
    pub fn new(platform: Pl, bus: KeyBus) -> Self {
        Self {
            platform,
            bus,
            timing: PressTiming::default(),
            phase: PressPhase::Idle,
            current_key: None,
            timer: RepeatTimer::default(),
            attached: false,
        }
    }

    /// Builder: override the timing.
    #[must_use]
    pub fn with_timing(mut self, timing: PressTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Install the platform listeners. Raw signals are ignored until attached.
    pub fn attach(&mut self) {
        if self.attached {
            warn!("press state machine already attached");
            return;
        }
        self.platform.add_listeners();
        self.attached = true;
    }

    /// Remove the platform listeners and drop any in-flight press.
    pub fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.platform.remove_listeners();
        self.attached = false;
        self.reset();
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    #[must_use]
    pub fn phase(&self) -> PressPhase {
        self.phase
    }

    /// True between a mapped key-down and its key-up.
    #[must_use]
    pub fn is_pressing(&self) -> bool {
        self.phase != PressPhase::Idle
    }

    /// Key currently held, if any.
    #[must_use]
    pub fn current_key(&self) -> Option<KeyCode> {
        self.current_key
    }

    /// When the next long press is due, if a key is held.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    #[must_use]
    pub fn timing(&self) -> PressTiming {
        self.timing
    }

    #[must_use]
    pub fn platform(&self) -> &Pl {
        &self.platform
    }

    /// Handle a raw key-down signal.
    ///
    /// Returns true if a `KeyDown` event was published.
    pub fn on_key_down(&mut self, event: &RawKeyEvent, now: Instant) -> bool {
        if !self.attached {
            trace!(raw = event.key_code, "key-down ignored: not attached");
            return false;
        }
        if self.is_pressing() {
            trace!(raw = event.key_code, "key-down absorbed: already pressing");
            return false;
        }
        let Some(key) = self.platform.map_key_code(event.key_code) else {
            info!(
                raw = event.key_code,
                pressed_key = %event.pressed_key,
                "unrecognized key pressed"
            );
            return false;
        };

        debug!(%key, "key pressed");
        self.current_key = Some(key);
        self.phase = PressPhase::PressedAwaitingRepeat;
        self.bus.dispatch(&NavEvent::KeyDown, &key);
        self.timer.arm(now, self.timing.initial_delay);
        true
    }

    /// Handle a raw key-up signal.
    pub fn on_key_up(&mut self) {
        if !self.attached {
            return;
        }
        self.reset();
    }

    /// Fire every long press that has come due by `now`.
    ///
    /// Each elapsed interval produces exactly one event; a partial interval
    /// produces none. Returns the number of `LongPress` events published.
    pub fn tick(&mut self, now: Instant) -> usize {
        let Some(key) = self.current_key else {
            return 0;
        };
        let interval = self.timing.repeat_interval.max(MIN_REPEAT_INTERVAL);

        let mut fired = 0;
        while let Some(deadline) = self.timer.deadline() {
            if now < deadline {
                break;
            }
            debug!(%key, "long press triggered");
            self.phase = PressPhase::Repeating;
            // Re-arm from the deadline, not from `now`, so late ticks do not drift.
            self.timer.arm(deadline, interval);
            self.bus.dispatch(&NavEvent::LongPress, &key);
            fired += 1;
        }
        fired
    }

    fn reset(&mut self) {
        self.timer.cancel();
        self.phase = PressPhase::Idle;
        self.current_key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const RIGHT: i32 = 22;
    const ENTER: i32 = 66;

    type Log = Rc<RefCell<Vec<(NavEvent, KeyCode)>>>;

    fn machine() -> (PressStateMachine, Log) {
        let bus = KeyBus::new();
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        for kind in [NavEvent::KeyDown, NavEvent::LongPress] {
            let log = Rc::clone(&log);
            bus.subscribe(kind, move |key| log.borrow_mut().push((kind, *key)));
        }
        let mut m = PressStateMachine::android_tv(bus);
        m.attach();
        (m, log)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn count(log: &Log, kind: NavEvent) -> usize {
        log.borrow().iter().filter(|(k, _)| *k == kind).count()
    }

    #[test]
    fn short_press_only() {
        let (mut m, log) = machine();
        let t0 = Instant::now();

        assert!(m.on_key_down(&RawKeyEvent::new(RIGHT), t0));
        assert_eq!(m.phase(), PressPhase::PressedAwaitingRepeat);
        assert_eq!(m.tick(t0 + ms(400)), 0);
        m.on_key_up();

        assert_eq!(m.tick(t0 + ms(2000)), 0);
        assert_eq!(count(&log, NavEvent::KeyDown), 1);
        assert_eq!(count(&log, NavEvent::LongPress), 0);
        assert_eq!(m.phase(), PressPhase::Idle);
    }

    #[test]
    fn first_long_press_at_initial_delay() {
        let (mut m, log) = machine();
        let t0 = Instant::now();
        m.on_key_down(&RawKeyEvent::new(RIGHT), t0);

        assert_eq!(m.tick(t0 + ms(499)), 0);
        assert_eq!(m.tick(t0 + ms(500)), 1);
        assert_eq!(m.phase(), PressPhase::Repeating);
        assert_eq!(
            log.borrow().last().copied(),
            Some((NavEvent::LongPress, KeyCode::Right))
        );
    }

    #[test]
    fn held_key_repeats_per_interval() {
        let (mut m, log) = machine();
        let t0 = Instant::now();
        m.on_key_down(&RawKeyEvent::new(RIGHT), t0);

        // Long presses due at 500, 650, 800, 950; 1000 is a partial interval.
        let mut fired = 0;
        for step in (0..=1000).step_by(10) {
            fired += m.tick(t0 + ms(step));
        }
        assert_eq!(fired, 4);
        assert_eq!(count(&log, NavEvent::KeyDown), 1);
        assert_eq!(count(&log, NavEvent::LongPress), 4);
    }

    #[test]
    fn late_tick_catches_up_without_drift() {
        let (mut m, _log) = machine();
        let t0 = Instant::now();
        m.on_key_down(&RawKeyEvent::new(RIGHT), t0);

        assert_eq!(m.tick(t0 + ms(1000)), 4);
        assert_eq!(m.next_deadline(), Some(t0 + ms(1100)));
    }

    #[test]
    fn hardware_auto_repeat_is_absorbed() {
        let (mut m, log) = machine();
        let t0 = Instant::now();
        assert!(m.on_key_down(&RawKeyEvent::new(RIGHT), t0));
        assert!(!m.on_key_down(&RawKeyEvent::new(RIGHT), t0 + ms(50)));
        assert!(!m.on_key_down(&RawKeyEvent::new(ENTER), t0 + ms(100)));

        assert_eq!(count(&log, NavEvent::KeyDown), 1);
        assert_eq!(m.current_key(), Some(KeyCode::Right));
        // Auto-repeat did not restart the initial delay.
        assert_eq!(m.tick(t0 + ms(500)), 1);
    }

    #[test]
    fn key_up_cancels_timer() {
        let (mut m, _log) = machine();
        let t0 = Instant::now();
        m.on_key_down(&RawKeyEvent::new(RIGHT), t0);
        assert!(m.next_deadline().is_some());

        m.on_key_up();
        assert_eq!(m.next_deadline(), None);
        assert_eq!(m.current_key(), None);
        assert!(!m.is_pressing());
    }

    #[test]
    fn press_after_release_starts_new_sequence() {
        let (mut m, log) = machine();
        let t0 = Instant::now();
        m.on_key_down(&RawKeyEvent::new(RIGHT), t0);
        m.on_key_up();
        assert!(m.on_key_down(&RawKeyEvent::new(ENTER), t0 + ms(10)));

        assert_eq!(
            *log.borrow(),
            vec![
                (NavEvent::KeyDown, KeyCode::Right),
                (NavEvent::KeyDown, KeyCode::Enter)
            ]
        );
    }

    #[test]
    fn unmapped_key_emits_nothing() {
        let (mut m, log) = machine();
        let t0 = Instant::now();
        assert!(!m.on_key_down(&RawKeyEvent::new(4).with_pressed_key("BACK"), t0));
        assert!(!m.is_pressing());
        assert_eq!(m.tick(t0 + ms(1000)), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn detached_machine_ignores_signals() {
        let bus = KeyBus::new();
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        bus.subscribe(NavEvent::KeyDown, move |_| *h.borrow_mut() += 1);
        let mut m = PressStateMachine::android_tv(bus);

        assert!(!m.on_key_down(&RawKeyEvent::new(RIGHT), Instant::now()));
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn detach_mid_press_silences_timer() {
        let (mut m, log) = machine();
        let t0 = Instant::now();
        m.on_key_down(&RawKeyEvent::new(RIGHT), t0);
        m.detach();

        assert!(!m.platform().is_listening());
        assert_eq!(m.tick(t0 + ms(5000)), 0);
        assert_eq!(count(&log, NavEvent::LongPress), 0);
    }

    #[test]
    fn custom_timing() {
        let (m, _log) = machine();
        let mut m = m.with_timing(
            PressTiming::default()
                .with_initial_delay(ms(100))
                .with_repeat_interval(ms(50)),
        );
        let t0 = Instant::now();
        m.on_key_down(&RawKeyEvent::new(RIGHT), t0);
        assert_eq!(m.tick(t0 + ms(200)), 3);
    }

    #[test]
    fn zero_repeat_interval_is_clamped() {
        let timing = PressTiming::default().with_repeat_interval(Duration::ZERO);
        assert_eq!(timing.repeat_interval, MIN_REPEAT_INTERVAL);
    }

    #[test]
    fn repeat_timer_arm_cancel() {
        let mut timer = RepeatTimer::default();
        let t0 = Instant::now();
        assert!(!timer.is_due(t0));
        timer.arm(t0, ms(10));
        assert!(timer.is_armed());
        assert!(!timer.is_due(t0 + ms(9)));
        assert!(timer.is_due(t0 + ms(10)));
        assert!(timer.cancel());
        assert!(!timer.cancel());
    }
}
