#![forbid(unsafe_code)]

//! RAII mounting of navigation roots and nodes.
//!
//! A [`NavigationRoot`] owns a session for as long as it lives. Nodes are
//! mounted through a [`NavScope`], which carries the session handle and the
//! parent id explicitly; a node hands out a child scope for its own children.
//! Dropping a handle unregisters what it registered.
//!
//! A scope may also carry focus listeners. Every node mounted through it, and
//! through any scope derived from that node, calls them when it gains focus.
//! This is how a composite item reports focus of any of its descendants.
//!
//! # Example
//!
//! ```
//! use tvnav_core::press::KeyBus;
//! use tvnav_widgets::focus::{NavNode, NavigationRoot, NodeConfig, SessionOptions};
//!
//! let root = NavigationRoot::mount(KeyBus::new(), SessionOptions::default());
//! let row = NavNode::mount(&root.scope(), NodeConfig::new()).unwrap();
//! let tile = NavNode::mount(&row.scope(), NodeConfig::new().focusable(true)).unwrap();
//! assert_eq!(tile.id().as_str(), "root_node_1_node_2");
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::debug;
use tvnav_core::press::KeyBus;

use super::graph::{DirectionalFocusGraph, FocusGraph};
use super::manager::{FocusTreeManager, LockReasons};
use super::{ContextError, NodeCallback, NodeConfig, NodeId, Orientation};

type FocusListeners = SmallVec<[NodeCallback; 2]>;

/// Id of the node a [`NavigationRoot`] registers.
pub const ROOT_NODE_ID: &str = "root";

/// Options for mounting a [`NavigationRoot`].
#[derive(Clone, Default)]
pub struct SessionOptions {
    pub on_left_and_no_move: Option<NodeCallback>,
    pub on_right_and_no_move: Option<NodeCallback>,
    /// Applies the [`LockReasons::PARENT`] lock while true.
    pub is_locked_from_parent: bool,
    pub root_orientation: Orientation,
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("on_left_and_no_move", &self.on_left_and_no_move.is_some())
            .field("on_right_and_no_move", &self.on_right_and_no_move.is_some())
            .field("is_locked_from_parent", &self.is_locked_from_parent)
            .field("root_orientation", &self.root_orientation)
            .finish()
    }
}

impl SessionOptions {
    #[must_use]
    pub fn on_left_and_no_move(mut self, f: impl Fn() + 'static) -> Self {
        self.on_left_and_no_move = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_right_and_no_move(mut self, f: impl Fn() + 'static) -> Self {
        self.on_right_and_no_move = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn locked_from_parent(mut self, locked: bool) -> Self {
        self.is_locked_from_parent = locked;
        self
    }

    #[must_use]
    pub fn with_root_orientation(mut self, orientation: Orientation) -> Self {
        self.root_orientation = orientation;
        self
    }
}

/// Owner of one navigation session.
///
/// Mounting registers the root node, subscribes the session to the bus and
/// applies the parent lock. Dropping reverses all three.
pub struct NavigationRoot<G: DirectionalFocusGraph + 'static = FocusGraph> {
    session: FocusTreeManager<G>,
    root: NodeId,
}

impl NavigationRoot<FocusGraph> {
    /// Mount a root over a fresh [`FocusGraph`].
    #[must_use]
    pub fn mount(bus: KeyBus, options: SessionOptions) -> Self {
        Self::mount_with_graph(bus, FocusGraph::new(), options)
    }
}

impl<G: DirectionalFocusGraph + 'static> NavigationRoot<G> {
    /// Mount a root over a caller-supplied graph capability.
    #[must_use]
    pub fn mount_with_graph(bus: KeyBus, graph: G, options: SessionOptions) -> Self {
        let session = FocusTreeManager::new(bus, graph);
        session.set_edge_callbacks(options.on_left_and_no_move, options.on_right_and_no_move);

        let root = NodeId::from(ROOT_NODE_ID);
        session.register_node(
            root.clone(),
            NodeConfig::new().with_orientation(options.root_orientation),
        );
        session.subscribe();
        session.set_locked(LockReasons::PARENT, options.is_locked_from_parent);
        debug!(locked = options.is_locked_from_parent, "navigation root mounted");

        Self { session, root }
    }

    #[must_use]
    pub fn session(&self) -> &FocusTreeManager<G> {
        &self.session
    }

    #[must_use]
    pub fn root_id(&self) -> &NodeId {
        &self.root
    }

    /// Scope for mounting the root's direct children.
    #[must_use]
    pub fn scope(&self) -> NavScope<G> {
        NavScope::new(self.session.clone(), self.root.clone())
    }

    /// Mirror an enclosing component's "disabled" flag.
    pub fn set_locked_from_parent(&self, locked: bool) {
        self.session.set_locked(LockReasons::PARENT, locked);
    }
}

impl<G: DirectionalFocusGraph + 'static> fmt::Debug for NavigationRoot<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationRoot")
            .field("session", &self.session)
            .finish()
    }
}

impl<G: DirectionalFocusGraph + 'static> Drop for NavigationRoot<G> {
    fn drop(&mut self) {
        self.session.unsubscribe();
        self.session.unregister_node(&self.root);
        debug!("navigation root unmounted");
    }
}

/// Construction context for a node: the session and the parent to attach to.
pub struct NavScope<G: DirectionalFocusGraph + 'static = FocusGraph> {
    session: Option<FocusTreeManager<G>>,
    parent: Option<NodeId>,
    focus_listeners: FocusListeners,
}

impl<G: DirectionalFocusGraph + 'static> Clone for NavScope<G> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            parent: self.parent.clone(),
            focus_listeners: self.focus_listeners.clone(),
        }
    }
}

impl<G: DirectionalFocusGraph + 'static> fmt::Debug for NavScope<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavScope")
            .field("bound", &self.session.is_some())
            .field("parent", &self.parent)
            .field("focus_listeners", &self.focus_listeners.len())
            .finish()
    }
}

impl<G: DirectionalFocusGraph + 'static> NavScope<G> {
    #[must_use]
    pub fn new(session: FocusTreeManager<G>, parent: NodeId) -> Self {
        Self {
            session: Some(session),
            parent: Some(parent),
            focus_listeners: FocusListeners::new(),
        }
    }

    /// A scope bound to nothing. Mounting into it fails.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            session: None,
            parent: None,
            focus_listeners: FocusListeners::new(),
        }
    }

    pub fn session(&self) -> Result<&FocusTreeManager<G>, ContextError> {
        self.session.as_ref().ok_or(ContextError::MissingSession)
    }

    pub fn parent(&self) -> Result<&NodeId, ContextError> {
        self.parent.as_ref().ok_or(ContextError::MissingParent)
    }

    /// Same session and listeners, different parent.
    #[must_use]
    pub fn child(&self, parent: NodeId) -> Self {
        Self {
            session: self.session.clone(),
            parent: Some(parent),
            focus_listeners: self.focus_listeners.clone(),
        }
    }

    /// Add a listener called whenever a node mounted below this scope gains
    /// focus. Listeners inherited from enclosing scopes run first.
    #[must_use]
    pub fn with_focus_listener(mut self, listener: NodeCallback) -> Self {
        self.focus_listeners.push(listener);
        self
    }
}

/// A mounted node. Unregisters itself (and its subtree) on drop.
pub struct NavNode<G: DirectionalFocusGraph + 'static = FocusGraph> {
    session: FocusTreeManager<G>,
    id: NodeId,
    focused: Rc<Cell<bool>>,
    focus_listeners: FocusListeners,
}

impl<G: DirectionalFocusGraph + 'static> NavNode<G> {
    /// Mount under the scope's parent with a lineage-derived id.
    pub fn mount(scope: &NavScope<G>, config: NodeConfig) -> Result<Self, ContextError> {
        let id = scope.session()?.next_node_id(scope.parent()?);
        Self::mount_with_id(scope, id, config)
    }

    /// Mount under the scope's parent with an explicit id.
    ///
    /// The config's own `parent` is replaced by the scope's. The scope's
    /// focus listeners run before the config's own `on_focus`.
    pub fn mount_with_id(
        scope: &NavScope<G>,
        id: NodeId,
        mut config: NodeConfig,
    ) -> Result<Self, ContextError> {
        let session = scope.session()?.clone();
        config.parent = Some(scope.parent()?.clone());

        let focused = Rc::new(Cell::new(false));
        let on_focus = notify_listeners(&scope.focus_listeners, config.on_focus.take());
        config.on_focus = Some(track(&focused, true, on_focus));
        config.on_blur = Some(track(&focused, false, config.on_blur.take()));

        session.register_node(id.clone(), config);
        Ok(Self {
            session,
            id,
            focused,
            focus_listeners: scope.focus_listeners.clone(),
        })
    }

    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// True between this node's focus and blur hooks.
    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focused.get()
    }

    #[must_use]
    pub fn session(&self) -> &FocusTreeManager<G> {
        &self.session
    }

    /// Scope for mounting this node's children. Keeps the focus listeners
    /// this node was mounted with.
    #[must_use]
    pub fn scope(&self) -> NavScope<G> {
        NavScope {
            session: Some(self.session.clone()),
            parent: Some(self.id.clone()),
            focus_listeners: self.focus_listeners.clone(),
        }
    }
}

fn notify_listeners(listeners: &[NodeCallback], inner: Option<NodeCallback>) -> Option<NodeCallback> {
    if listeners.is_empty() {
        return inner;
    }
    let listeners: FocusListeners = listeners.iter().cloned().collect();
    Some(Rc::new(move || {
        for listener in &listeners {
            listener();
        }
        if let Some(inner) = &inner {
            inner();
        }
    }))
}

fn track(flag: &Rc<Cell<bool>>, value: bool, inner: Option<NodeCallback>) -> NodeCallback {
    let flag = Rc::clone(flag);
    Rc::new(move || {
        flag.set(value);
        if let Some(inner) = &inner {
            inner();
        }
    })
}

impl<G: DirectionalFocusGraph + 'static> fmt::Debug for NavNode<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavNode")
            .field("id", &self.id)
            .field("focused", &self.focused.get())
            .finish()
    }
}

impl<G: DirectionalFocusGraph + 'static> Drop for NavNode<G> {
    fn drop(&mut self) {
        self.session.unregister_node(&self.id);
    }
}
