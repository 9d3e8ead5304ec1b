#![forbid(unsafe_code)]

//! Navigation layer: focus tree sessions and focus-driven list virtualization.
//!
//! # Role in tvnav
//! `tvnav-widgets` consumes the semantic key events published by
//! `tvnav-core` and turns them into focus movement over a tree of nodes.
//!
//! # Primary responsibilities
//! - **Focus graph**: the [`DirectionalFocusGraph`](focus::DirectionalFocusGraph)
//!   capability and the built-in [`FocusGraph`](focus::FocusGraph).
//! - **Sessions**: [`FocusTreeManager`](focus::FocusTreeManager) with lock
//!   reasons, edge callbacks and bus wiring.
//! - **Mounting**: RAII [`NavigationRoot`](focus::NavigationRoot) and
//!   [`NavNode`](focus::NavNode) handles with explicit parent scopes.
//! - **Virtualization**: window arithmetic, incremental virtual-parent
//!   registration and the [`VirtualizedList`](virtualized::VirtualizedList)
//!   orchestrator.

pub mod focus;
pub mod virtualized;

pub use focus::{
    ContextError, Direction, FocusTreeManager, GraphError, LockReasons, NavNode, NavScope,
    NavigationRoot, NodeConfig, NodeId, Orientation, SessionOptions,
};
pub use virtualized::{
    IndexedItem, RenderPlan, RenderRange, VirtualizedList, VirtualizedListConfig, compute_range,
    diff_registrations,
};
