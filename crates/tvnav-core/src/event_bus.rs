#![forbid(unsafe_code)]

//! Synchronous publish/subscribe registry keyed by event kind.
//!
//! # Design
//!
//! [`EventBus<K, P>`] is a cheap-to-clone handle over shared
//! `Rc<RefCell<..>>` storage. It replaces an ambient process-wide singleton:
//! whoever owns the navigation root constructs one bus and hands clones to
//! the press state machine and to each navigation session.
//!
//! # Invariants
//!
//! 1. Subscription ids are unique within their event kind at registration time.
//! 2. Subscribers of a kind are invoked in registration order.
//! 3. A kind with zero subscribers has no entry in the registry.
//! 4. `dispatch` snapshots the subscriber list before invoking anything, so a
//!    callback may subscribe, unsubscribe or dispatch re-entrantly. Changes
//!    take effect from the next dispatch.
//!
//! # Failure Modes
//!
//! - A panicking subscriber is caught and logged; the remaining subscribers
//!   still run. Effects already applied by earlier subscribers are kept.
//! - Unsubscribing an unknown id is a logged no-op.

use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{error, trace, warn};

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Callback<P> = Rc<dyn Fn(&P)>;

struct Registry<K, P> {
    kinds: FxHashMap<K, Vec<(SubscriptionId, Callback<P>)>>,
    next_id: u64,
}

impl<K: Eq + Hash, P> Registry<K, P> {
    fn allocate_id(&mut self, kind: &K) -> SubscriptionId {
        loop {
            let candidate = SubscriptionId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1);
            let taken = self
                .kinds
                .get(kind)
                .is_some_and(|subs| subs.iter().any(|(id, _)| *id == candidate));
            if !taken {
                return candidate;
            }
        }
    }
}

/// Shared publish/subscribe registry.
///
/// Cloning an `EventBus` creates a new handle to the **same** registry.
pub struct EventBus<K, P> {
    inner: Rc<RefCell<Registry<K, P>>>,
}

impl<K, P> Clone for EventBus<K, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K: fmt::Debug, P> fmt::Debug for EventBus<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventBus")
            .field("kinds", &inner.kinds.len())
            .field("next_id", &inner.next_id)
            .finish()
    }
}

impl<K: Eq + Hash + Clone + fmt::Debug, P> Default for EventBus<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone + fmt::Debug, P> EventBus<K, P> {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                kinds: FxHashMap::default(),
                next_id: 1,
            })),
        }
    }

    /// Register `callback` under `kind`.
    pub fn subscribe(&self, kind: K, callback: impl Fn(&P) + 'static) -> SubscriptionId {
        let mut reg = self.inner.borrow_mut();
        let id = reg.allocate_id(&kind);
        trace!(?kind, %id, "event bus subscribe");
        reg.kinds
            .entry(kind)
            .or_default()
            .push((id, Rc::new(callback)));
        id
    }

    /// Remove a single callback. Returns true if it was registered.
    ///
    /// Removing the last callback of a kind prunes the kind entry.
    pub fn unsubscribe(&self, kind: &K, id: SubscriptionId) -> bool {
        let mut reg = self.inner.borrow_mut();
        let Some(subs) = reg.kinds.get_mut(kind) else {
            warn!(?kind, %id, "unsubscribe from unknown event kind");
            return false;
        };
        let before = subs.len();
        subs.retain(|(sub, _)| *sub != id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            reg.kinds.remove(kind);
        }
        if !removed {
            warn!(?kind, %id, "unsubscribe of unknown subscription id");
        }
        removed
    }

    /// Invoke every subscriber of `kind` with `payload`, in registration order.
    ///
    /// Returns the number of subscribers that completed without panicking.
    pub fn dispatch(&self, kind: &K, payload: &P) -> usize {
        let snapshot: Vec<(SubscriptionId, Callback<P>)> = {
            let reg = self.inner.borrow();
            match reg.kinds.get(kind) {
                Some(subs) => subs.iter().map(|(id, cb)| (*id, Rc::clone(cb))).collect(),
                None => return 0,
            }
        };

        let mut completed = 0;
        for (id, callback) in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(()) => completed += 1,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    error!(?kind, %id, %message, "event bus subscriber panicked");
                }
            }
        }
        completed
    }

    /// Number of callbacks registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: &K) -> usize {
        self.inner.borrow().kinds.get(kind).map_or(0, Vec::len)
    }

    /// Number of event kinds with at least one subscriber.
    #[must_use]
    pub fn kind_count(&self) -> usize {
        self.inner.borrow().kinds.len()
    }

    /// Returns true if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kind_count() == 0
    }
}
