#![forbid(unsafe_code)]

//! Navigation session coordinating the focus graph, locks, and key input.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use tracing::{debug, error, trace, warn};
use tvnav_core::press::KeyBus;
use tvnav_core::{KeyCode, NavEvent, SubscriptionId};

use super::graph::{DirectionalFocusGraph, FocusGraph, FocusHooks, KeyEventOptions};
use super::{NodeCallback, NodeConfig, NodeId};

bitflags! {
    /// Reasons a session is refusing directional input.
    ///
    /// The session is locked while any reason is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LockReasons: u8 {
        /// An enclosing component disabled this subtree.
        const PARENT = 1 << 0;
        /// A modal owns input.
        const MODAL = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy)]
struct Subscriptions {
    key_down: SubscriptionId,
    long_press: SubscriptionId,
}

struct SessionState<G> {
    graph: G,
    locks: LockReasons,
    on_left_and_no_move: Option<NodeCallback>,
    on_right_and_no_move: Option<NodeCallback>,
    subscriptions: Option<Subscriptions>,
    id_counter: u64,
}

/// One navigation session over a directional focus graph.
///
/// Cheap to clone: clones share the session. Bus subscriptions hold only a
/// weak reference, so a session dropped without [`unsubscribe`](Self::unsubscribe)
/// turns its callbacks into no-ops instead of leaking.
pub struct FocusTreeManager<G: DirectionalFocusGraph + 'static = FocusGraph> {
    bus: KeyBus,
    state: Rc<RefCell<SessionState<G>>>,
}

impl<G: DirectionalFocusGraph + 'static> Clone for FocusTreeManager<G> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            state: Rc::clone(&self.state),
        }
    }
}

impl<G: DirectionalFocusGraph + 'static> fmt::Debug for FocusTreeManager<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("FocusTreeManager")
                .field("locks", &state.locks)
                .field("subscribed", &state.subscriptions.is_some())
                .field("focus", &state.graph.current_focus_node())
                .finish(),
            Err(_) => f.write_str("FocusTreeManager { <borrowed> }"),
        }
    }
}

impl FocusTreeManager<FocusGraph> {
    /// Session over a fresh [`FocusGraph`].
    #[must_use]
    pub fn with_default_graph(bus: KeyBus) -> Self {
        Self::new(bus, FocusGraph::new())
    }

    /// Focus a node directly and run its hooks.
    ///
    /// Returns true if focus moved. Ignored while locked.
    pub fn focus_node(&self, id: &NodeId) -> bool {
        let (moved, hooks) = {
            let mut state = self.state.borrow_mut();
            if !state.locks.is_empty() {
                return false;
            }
            let before = state.graph.current_focus_node();
            let hooks = state.graph.focus_node(id);
            (state.graph.current_focus_node() != before, hooks)
        };
        run_hooks(hooks);
        moved
    }
}

impl<G: DirectionalFocusGraph + 'static> FocusTreeManager<G> {
    /// Create an unlocked, unsubscribed session.
    #[must_use]
    pub fn new(bus: KeyBus, graph: G) -> Self {
        Self {
            bus,
            state: Rc::new(RefCell::new(SessionState {
                graph,
                locks: LockReasons::empty(),
                on_left_and_no_move: None,
                on_right_and_no_move: None,
                subscriptions: None,
                id_counter: 0,
            })),
        }
    }

    /// Builder: callback for a Left key that did not move focus.
    #[must_use]
    pub fn on_left_and_no_move(self, f: impl Fn() + 'static) -> Self {
        self.state.borrow_mut().on_left_and_no_move = Some(Rc::new(f));
        self
    }

    /// Builder: callback for a Right key that did not move focus.
    #[must_use]
    pub fn on_right_and_no_move(self, f: impl Fn() + 'static) -> Self {
        self.state.borrow_mut().on_right_and_no_move = Some(Rc::new(f));
        self
    }

    pub(crate) fn set_edge_callbacks(
        &self,
        left: Option<NodeCallback>,
        right: Option<NodeCallback>,
    ) {
        let mut state = self.state.borrow_mut();
        state.on_left_and_no_move = left;
        state.on_right_and_no_move = right;
    }

    /// Bus this session listens on.
    #[must_use]
    pub fn bus(&self) -> &KeyBus {
        &self.bus
    }

    /// Insert or overwrite a node.
    ///
    /// Graph errors are logged and absorbed; returns false if the node was
    /// not registered.
    pub fn register_node(&self, id: NodeId, config: NodeConfig) -> bool {
        let result = self
            .state
            .borrow_mut()
            .graph
            .register_node(id.clone(), config);
        match result {
            Ok(()) => {
                trace!(node = %id, "node registered");
                true
            }
            Err(err) => {
                error!(node = %id, %err, "node registration failed");
                false
            }
        }
    }

    /// Remove a node and its subtree. Unknown ids are ignored.
    pub fn unregister_node(&self, id: &NodeId) {
        self.state.borrow_mut().graph.unregister_node(id);
        trace!(node = %id, "node unregistered");
    }

    /// Apply a short press.
    ///
    /// Returns true if focus moved. Left/Right that leave focus in place
    /// invoke the matching edge callback.
    pub fn handle_key_down(&self, key: KeyCode) -> bool {
        handle_key(&self.state, key)
    }

    /// Apply one long-press repeat. Enter does not repeat.
    pub fn handle_long_press(&self, key: KeyCode) -> bool {
        handle_long_press(&self.state, key)
    }

    /// Add a lock reason. Adding one that is already present only warns.
    pub fn lock(&self, reason: LockReasons) {
        let mut state = self.state.borrow_mut();
        if state.locks.contains(reason) {
            warn!(?reason, "navigation already locked for this reason");
            return;
        }
        state.locks.insert(reason);
        debug!(locks = ?state.locks, "navigation locked");
    }

    /// Remove a lock reason.
    pub fn unlock(&self, reason: LockReasons) {
        let mut state = self.state.borrow_mut();
        state.locks.remove(reason);
        debug!(locks = ?state.locks, "navigation lock released");
    }

    /// Lock while `locked` is true, unlock otherwise.
    pub fn set_locked(&self, reason: LockReasons, locked: bool) {
        if locked {
            if !self.lock_reasons().contains(reason) {
                self.lock(reason);
            }
        } else {
            self.unlock(reason);
        }
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        !self.state.borrow().locks.is_empty()
    }

    #[must_use]
    pub fn lock_reasons(&self) -> LockReasons {
        self.state.borrow().locks
    }

    /// Bind this session's key-down and long-press handlers on the bus.
    pub fn subscribe(&self) {
        if self.state.borrow().subscriptions.is_some() {
            warn!("navigation session already subscribed");
            return;
        }

        let weak = Rc::downgrade(&self.state);
        let key_down = self.bus.subscribe(NavEvent::KeyDown, move |key: &KeyCode| {
            if let Some(state) = weak.upgrade() {
                handle_key(&state, *key);
            }
        });
        let weak = Rc::downgrade(&self.state);
        let long_press = self
            .bus
            .subscribe(NavEvent::LongPress, move |key: &KeyCode| {
                if let Some(state) = weak.upgrade() {
                    handle_long_press(&state, *key);
                }
            });

        self.state.borrow_mut().subscriptions = Some(Subscriptions {
            key_down,
            long_press,
        });
        debug!(%key_down, %long_press, "navigation session subscribed");
    }

    /// Release both bus subscriptions. No-op if not subscribed.
    pub fn unsubscribe(&self) {
        let Some(subs) = self.state.borrow_mut().subscriptions.take() else {
            return;
        };
        self.bus.unsubscribe(&NavEvent::KeyDown, subs.key_down);
        self.bus.unsubscribe(&NavEvent::LongPress, subs.long_press);
        debug!("navigation session unsubscribed");
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state.borrow().subscriptions.is_some()
    }

    /// Currently focused node.
    #[must_use]
    pub fn current_focus(&self) -> Option<NodeId> {
        self.state.borrow().graph.current_focus_node()
    }

    #[must_use]
    pub fn has_root(&self) -> bool {
        self.state.borrow().graph.root_node().is_ok()
    }

    /// Read access to the underlying graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&G) -> R) -> R {
        f(&self.state.borrow().graph)
    }

    /// Allocate a lineage-derived id for a new child of `parent`.
    pub fn next_node_id(&self, parent: &NodeId) -> NodeId {
        let mut state = self.state.borrow_mut();
        state.id_counter += 1;
        NodeId::new(format!("{parent}_node_{}", state.id_counter))
    }
}

fn handle_long_press<G: DirectionalFocusGraph>(
    state: &RefCell<SessionState<G>>,
    key: KeyCode,
) -> bool {
    if !key.is_directional() {
        return false;
    }
    handle_key(state, key)
}

fn handle_key<G: DirectionalFocusGraph>(state: &RefCell<SessionState<G>>, key: KeyCode) -> bool {
    let (moved, hooks, edge) = {
        let mut state = state.borrow_mut();
        if !state.locks.is_empty() {
            trace!(%key, locks = ?state.locks, "key ignored: session locked");
            return false;
        }
        if let Err(err) = state.graph.root_node() {
            warn!(%key, %err, "key ignored: no root node");
            return false;
        }

        let before = state.graph.current_focus_node();
        let hooks = state
            .graph
            .handle_key_event(key.into(), KeyEventOptions { force_focus: true });
        let moved = state.graph.current_focus_node() != before;

        let edge = match key {
            KeyCode::Left if !moved => state.on_left_and_no_move.clone(),
            KeyCode::Right if !moved => state.on_right_and_no_move.clone(),
            _ => None,
        };
        (moved, hooks, edge)
    };

    run_hooks(hooks);
    if let Some(edge) = edge {
        trace!(%key, "edge reached");
        edge();
    }
    moved
}

fn run_hooks(hooks: FocusHooks) {
    for hook in hooks {
        hook();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::focus::{Direction, GraphError, Orientation};
    use std::cell::Cell;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    /// root (horizontal): a, b, c
    fn session() -> FocusTreeManager {
        let m = FocusTreeManager::with_default_graph(KeyBus::new());
        assert!(m.register_node(
            id("root"),
            NodeConfig::new().with_orientation(Orientation::Horizontal)
        ));
        for name in ["a", "b", "c"] {
            assert!(m.register_node(id(name), NodeConfig::new().with_parent("root").focusable(true)));
        }
        m
    }

    fn counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        (hits, move || h.set(h.get() + 1))
    }

    #[test]
    fn first_key_seeds_focus() {
        let m = session();
        assert_eq!(m.current_focus(), None);
        assert!(m.handle_key_down(KeyCode::Down));
        assert_eq!(m.current_focus(), Some(id("a")));
    }

    #[test]
    fn left_without_move_fires_edge_once() {
        let (left, on_left) = counter();
        let (right, on_right) = counter();
        let m = session()
            .on_left_and_no_move(on_left)
            .on_right_and_no_move(on_right);
        m.focus_node(&id("a"));

        assert!(!m.handle_key_down(KeyCode::Left));
        assert_eq!(left.get(), 1);
        assert_eq!(right.get(), 0);

        assert!(m.handle_key_down(KeyCode::Right));
        assert_eq!(right.get(), 0);
    }

    #[test]
    fn right_at_end_fires_right_edge() {
        let (right, on_right) = counter();
        let m = session().on_right_and_no_move(on_right);
        m.focus_node(&id("c"));
        m.handle_key_down(KeyCode::Right);
        assert_eq!(right.get(), 1);
    }

    #[test]
    fn vertical_keys_never_fire_edges() {
        let (left, on_left) = counter();
        let (right, on_right) = counter();
        let m = session()
            .on_left_and_no_move(on_left)
            .on_right_and_no_move(on_right);
        m.focus_node(&id("b"));

        assert!(!m.handle_key_down(KeyCode::Up));
        assert!(!m.handle_key_down(KeyCode::Down));
        assert_eq!(left.get() + right.get(), 0);
    }

    #[test]
    fn lock_reasons_are_independent() {
        let m = session();
        m.focus_node(&id("a"));
        m.lock(LockReasons::MODAL);
        m.lock(LockReasons::PARENT);
        m.unlock(LockReasons::MODAL);

        assert!(m.is_locked());
        assert_eq!(m.lock_reasons(), LockReasons::PARENT);
        assert!(!m.handle_key_down(KeyCode::Right));
        assert_eq!(m.current_focus(), Some(id("a")));

        m.unlock(LockReasons::PARENT);
        assert!(!m.is_locked());
        assert!(m.handle_key_down(KeyCode::Right));
        assert_eq!(m.current_focus(), Some(id("b")));
    }

    #[test]
    fn relocking_same_reason_is_noop() {
        let m = session();
        m.lock(LockReasons::MODAL);
        m.lock(LockReasons::MODAL);
        assert_eq!(m.lock_reasons(), LockReasons::MODAL);
        m.unlock(LockReasons::MODAL);
        assert!(!m.is_locked());
    }

    #[test]
    fn set_locked_toggles() {
        let m = session();
        m.set_locked(LockReasons::PARENT, true);
        m.set_locked(LockReasons::PARENT, true);
        assert!(m.is_locked());
        m.set_locked(LockReasons::PARENT, false);
        assert!(!m.is_locked());
    }

    #[test]
    fn missing_root_ignores_keys() {
        let m = FocusTreeManager::with_default_graph(KeyBus::new());
        assert!(!m.has_root());
        assert!(!m.handle_key_down(KeyCode::Right));
        assert_eq!(m.current_focus(), None);
    }

    #[test]
    fn failed_registration_is_absorbed() {
        let m = session();
        assert!(!m.register_node(id("orphan"), NodeConfig::new().with_parent("nowhere")));
        assert!(m.with_graph(|g| !g.contains(&id("orphan"))));
        assert!(m.handle_key_down(KeyCode::Right));
    }

    #[test]
    fn long_press_repeats_directions_not_enter() {
        let (selects, on_select) = counter();
        let m = session();
        m.register_node(
            id("d"),
            NodeConfig::new()
                .with_parent("root")
                .focusable(true)
                .on_select(on_select),
        );
        m.focus_node(&id("c"));

        assert!(m.handle_long_press(KeyCode::Right));
        assert_eq!(m.current_focus(), Some(id("d")));
        assert!(!m.handle_long_press(KeyCode::Enter));
        assert_eq!(selects.get(), 0);

        m.handle_key_down(KeyCode::Enter);
        assert_eq!(selects.get(), 1);
    }

    #[test]
    fn bus_drives_session() {
        let m = session();
        m.subscribe();
        assert!(m.is_subscribed());
        assert_eq!(m.bus().subscriber_count(&NavEvent::KeyDown), 1);

        m.bus().dispatch(&NavEvent::KeyDown, &KeyCode::Right);
        m.bus().dispatch(&NavEvent::LongPress, &KeyCode::Right);
        assert_eq!(m.current_focus(), Some(id("b")));

        m.unsubscribe();
        assert!(m.bus().is_empty());
        m.bus().dispatch(&NavEvent::KeyDown, &KeyCode::Right);
        assert_eq!(m.current_focus(), Some(id("b")));
    }

    #[test]
    fn double_subscribe_keeps_one_binding() {
        let m = session();
        m.subscribe();
        m.subscribe();
        assert_eq!(m.bus().subscriber_count(&NavEvent::KeyDown), 1);
        m.unsubscribe();
        m.unsubscribe();
    }

    #[test]
    fn dropped_session_callbacks_are_noops() {
        let bus = KeyBus::new();
        {
            let m = FocusTreeManager::with_default_graph(bus.clone());
            m.subscribe();
        }
        assert_eq!(bus.dispatch(&NavEvent::KeyDown, &KeyCode::Up), 1);
    }

    #[test]
    fn hooks_may_reenter_session() {
        let m = session();
        let inner = m.clone();
        m.register_node(
            id("lock"),
            NodeConfig::new()
                .with_parent("root")
                .focusable(true)
                .on_focus(move || inner.lock(LockReasons::MODAL)),
        );
        m.focus_node(&id("c"));
        m.handle_key_down(KeyCode::Right);
        assert_eq!(m.current_focus(), Some(id("lock")));
        assert!(m.is_locked());
    }

    #[test]
    fn node_ids_follow_lineage() {
        let m = session();
        assert_eq!(m.next_node_id(&id("root")), id("root_node_1"));
        assert_eq!(m.next_node_id(&id("root_node_1")), id("root_node_1_node_2"));
    }

    struct Stuck {
        current: Option<NodeId>,
    }

    impl DirectionalFocusGraph for Stuck {
        fn register_node(&mut self, id: NodeId, _config: NodeConfig) -> Result<(), GraphError> {
            Err(GraphError::NodeNotFound(id))
        }

        fn unregister_node(&mut self, _id: &NodeId) {}

        fn root_node(&self) -> Result<NodeId, GraphError> {
            Ok(id("root"))
        }

        fn handle_key_event(&mut self, _: Direction, _: KeyEventOptions) -> FocusHooks {
            FocusHooks::new()
        }

        fn current_focus_node(&self) -> Option<NodeId> {
            self.current.clone()
        }
    }

    #[test]
    fn custom_graph_capability() {
        let (left, on_left) = counter();
        let m = FocusTreeManager::new(KeyBus::new(), Stuck {
            current: Some(id("x")),
        })
        .on_left_and_no_move(on_left);

        assert!(!m.register_node(id("y"), NodeConfig::new()));
        assert!(!m.handle_key_down(KeyCode::Left));
        assert_eq!(left.get(), 1);
    }
}
