#![forbid(unsafe_code)]

//! Focus tree: node identity, the directional graph capability, navigation
//! sessions, and RAII mounting helpers.
//!
//! # Layers
//!
//! - [`DirectionalFocusGraph`] is the raw "move focus in direction D" oracle.
//!   [`FocusGraph`] is the built-in tree implementation.
//! - [`FocusTreeManager`] owns one navigation session over a graph: locking,
//!   edge callbacks, and event bus wiring.
//! - [`NavigationRoot`], [`NavNode`] and [`NavScope`] thread parent ids
//!   explicitly through construction instead of looking them up ambiently.

mod graph;
mod manager;
mod mount;

pub use graph::{DirectionalFocusGraph, FocusGraph, FocusHooks, KeyEventOptions};
pub use manager::{FocusTreeManager, LockReasons};
pub use mount::{NavNode, NavScope, NavigationRoot, ROOT_NODE_ID, SessionOptions};

use std::fmt;
use std::rc::Rc;

use tvnav_core::KeyCode;

/// Callback attached to a node or a session edge.
pub type NodeCallback = Rc<dyn Fn()>;

/// Identifier of a node in the focus tree.
///
/// Identity is derived from lineage (`{parent}_node_{n}`), so a node that
/// moves to a new parent gets a new id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Axis along which a container lays out its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Orientation {
    Horizontal,
    #[default]
    Vertical,
}

/// Direction passed to the graph capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    Enter,
}

impl Direction {
    /// Axis a container must have for this direction to move between its
    /// children. `None` for Enter.
    #[must_use]
    pub const fn axis(self) -> Option<Orientation> {
        match self {
            Self::Left | Self::Right => Some(Orientation::Horizontal),
            Self::Up | Self::Down => Some(Orientation::Vertical),
            Self::Enter => None,
        }
    }

    /// Returns true if the direction walks toward later children.
    #[must_use]
    pub const fn is_forward(self) -> bool {
        matches!(self, Self::Right | Self::Down)
    }
}

impl From<KeyCode> for Direction {
    fn from(key: KeyCode) -> Self {
        match key {
            KeyCode::Up => Self::Up,
            KeyCode::Down => Self::Down,
            KeyCode::Left => Self::Left,
            KeyCode::Right => Self::Right,
            KeyCode::Enter => Self::Enter,
        }
    }
}

/// Registration parameters for a node.
#[derive(Clone, Default)]
pub struct NodeConfig {
    /// Parent node. `None` only for the root.
    pub parent: Option<NodeId>,
    pub orientation: Orientation,
    pub is_focusable: bool,
    pub on_focus: Option<NodeCallback>,
    pub on_blur: Option<NodeCallback>,
    pub on_select: Option<NodeCallback>,
}

impl fmt::Debug for NodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeConfig")
            .field("parent", &self.parent)
            .field("orientation", &self.orientation)
            .field("is_focusable", &self.is_focusable)
            .field("on_focus", &self.on_focus.is_some())
            .field("on_blur", &self.on_blur.is_some())
            .field("on_select", &self.on_select.is_some())
            .finish()
    }
}

impl NodeConfig {
    /// Non-focusable, vertical, parentless.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    #[must_use]
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    #[must_use]
    pub fn focusable(mut self, focusable: bool) -> Self {
        self.is_focusable = focusable;
        self
    }

    #[must_use]
    pub fn on_focus(mut self, f: impl Fn() + 'static) -> Self {
        self.on_focus = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_blur(mut self, f: impl Fn() + 'static) -> Self {
        self.on_blur = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn on_select(mut self, f: impl Fn() + 'static) -> Self {
        self.on_select = Some(Rc::new(f));
        self
    }
}

/// Configuration errors reported by the graph capability.
///
/// The session logs these and carries on; they never reach the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// No root node is registered.
    RootNotFound,
    /// The referenced node is not registered.
    NodeNotFound(NodeId),
    /// The parent is missing, or lies inside the node's own subtree.
    ParentNotFound { id: NodeId, parent: NodeId },
    /// A parentless node was registered while another root exists.
    RootAlreadyRegistered { existing: NodeId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootNotFound => write!(f, "no root node registered"),
            Self::NodeNotFound(id) => write!(f, "node '{id}' is not registered"),
            Self::ParentNotFound { id, parent } => {
                write!(f, "cannot register '{id}': parent '{parent}' is not a valid parent")
            }
            Self::RootAlreadyRegistered { existing } => {
                write!(f, "a root node is already registered: '{existing}'")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Usage errors: a node was set up without the context it needs.
///
/// These are programmer errors and should fail setup, not a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The scope is not bound to a navigation session.
    MissingSession,
    /// The scope has no parent node to attach to.
    MissingParent,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSession => {
                write!(f, "navigable element created outside a navigation session")
            }
            Self::MissingParent => write!(f, "navigable element created without a parent node"),
        }
    }
}

impl std::error::Error for ContextError {}
