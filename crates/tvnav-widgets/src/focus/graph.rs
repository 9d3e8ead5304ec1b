#![forbid(unsafe_code)]

//! Directional focus graph: the capability a session moves focus through.
//!
//! [`DirectionalFocusGraph`] is the seam. [`FocusGraph`] is the built-in
//! tree implementation: each container has an [`Orientation`], and a
//! directional move climbs from the focused node until it finds a container
//! on the matching axis with a sibling (in that direction) that holds a
//! focusable descendant.
//!
//! # Invariants
//!
//! 1. At most one node has no parent (the root).
//! 2. Every registered non-root node's parent is registered.
//! 3. Removing a node removes its whole subtree.
//! 4. Children keep registration order; that order is the navigation order.
//! 5. The graph never invokes node callbacks itself. Moves return the hooks
//!    to run, so the caller can release its borrows first.
//!
//! # Complexity
//!
//! | Operation | Time |
//! |-----------|------|
//! | register | O(depth) |
//! | unregister | O(subtree + siblings) |
//! | move | O(depth × siblings) worst case |

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::{Direction, GraphError, NodeCallback, NodeConfig, NodeId, Orientation};

/// Node callbacks a move produced, in the order they must run
/// (`on_blur` of the old node, then `on_focus` of the new one, or
/// `on_select` for Enter).
pub type FocusHooks = SmallVec<[NodeCallback; 2]>;

/// Options for [`DirectionalFocusGraph::handle_key_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyEventOptions {
    /// When nothing is focused, focus the first focusable node instead of
    /// ignoring the event.
    pub force_focus: bool,
}

/// Raw "move focus in direction D" oracle.
pub trait DirectionalFocusGraph {
    /// Insert a node, replacing any node with the same id.
    fn register_node(&mut self, id: NodeId, config: NodeConfig) -> Result<(), GraphError>;

    /// Remove a node and its subtree. Unknown ids are ignored.
    fn unregister_node(&mut self, id: &NodeId);

    /// The root node, or [`GraphError::RootNotFound`].
    fn root_node(&self) -> Result<NodeId, GraphError>;

    /// Apply a key to the focus state and return the hooks to run.
    fn handle_key_event(&mut self, direction: Direction, options: KeyEventOptions) -> FocusHooks;

    /// Currently focused node.
    fn current_focus_node(&self) -> Option<NodeId>;
}

#[derive(Clone)]
struct GraphNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    orientation: Orientation,
    is_focusable: bool,
    on_focus: Option<NodeCallback>,
    on_blur: Option<NodeCallback>,
    on_select: Option<NodeCallback>,
    /// Child on the path to the most recently focused descendant.
    active_child: Option<NodeId>,
}

impl GraphNode {
    fn from_config(config: NodeConfig) -> Self {
        Self {
            parent: config.parent,
            children: Vec::new(),
            orientation: config.orientation,
            is_focusable: config.is_focusable,
            on_focus: config.on_focus,
            on_blur: config.on_blur,
            on_select: config.on_select,
            active_child: None,
        }
    }
}

/// Tree-shaped focus graph.
#[derive(Default)]
pub struct FocusGraph {
    nodes: FxHashMap<NodeId, GraphNode>,
    root: Option<NodeId>,
    current: Option<NodeId>,
}

impl std::fmt::Debug for FocusGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusGraph")
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .field("current", &self.current)
            .finish()
    }
}

impl FocusGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Parent of a registered node.
    #[must_use]
    pub fn parent(&self, id: &NodeId) -> Option<&NodeId> {
        self.nodes.get(id).and_then(|n| n.parent.as_ref())
    }

    /// Children of a registered node, in navigation order.
    #[must_use]
    pub fn children(&self, id: &NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |n| n.children.as_slice())
    }

    /// Focus `id` directly. Returns the hooks to run; empty if `id` is not a
    /// focusable registered node or already focused.
    pub fn focus_node(&mut self, id: &NodeId) -> FocusHooks {
        match self.nodes.get(id) {
            Some(node) if node.is_focusable => self.move_focus(id.clone()),
            _ => FocusHooks::new(),
        }
    }

    /// Remove every node and clear focus.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.current = None;
    }

    /// True if `candidate` is `ancestor` or lies below it.
    fn is_within(&self, candidate: &NodeId, ancestor: &NodeId) -> bool {
        let mut cursor = Some(candidate);
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            cursor = self.nodes.get(id).and_then(|n| n.parent.as_ref());
        }
        false
    }

    fn subtree(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(&next) {
                stack.extend(node.children.iter().cloned());
                out.push(next);
            }
        }
        out
    }

    /// First focusable node at or below `id`, preferring the remembered path.
    fn focusable_descendant(&self, id: &NodeId) -> Option<NodeId> {
        let node = self.nodes.get(id)?;
        if node.is_focusable {
            return Some(id.clone());
        }
        if let Some(active) = &node.active_child
            && let Some(found) = self.focusable_descendant(active)
        {
            return Some(found);
        }
        node.children
            .iter()
            .find_map(|child| self.focusable_descendant(child))
    }

    fn find_target(&self, from: &NodeId, direction: Direction) -> Option<NodeId> {
        let axis = direction.axis()?;
        let mut child = from;
        while let Some(parent_id) = self.nodes.get(child).and_then(|n| n.parent.as_ref()) {
            let parent = self.nodes.get(parent_id)?;
            if parent.orientation == axis
                && let Some(pos) = parent.children.iter().position(|c| c == child)
            {
                let found = if direction.is_forward() {
                    parent.children[pos + 1..]
                        .iter()
                        .find_map(|s| self.focusable_descendant(s))
                } else {
                    parent.children[..pos]
                        .iter()
                        .rev()
                        .find_map(|s| self.focusable_descendant(s))
                };
                if found.is_some() {
                    return found;
                }
            }
            child = parent_id;
        }
        None
    }

    fn move_focus(&mut self, target: NodeId) -> FocusHooks {
        let mut hooks = FocusHooks::new();
        if self.current.as_ref() == Some(&target) {
            return hooks;
        }
        if let Some(prev) = self.current.take()
            && let Some(cb) = self.nodes.get(&prev).and_then(|n| n.on_blur.clone())
        {
            hooks.push(cb);
        }

        let mut child = target.clone();
        while let Some(parent) = self.nodes.get(&child).and_then(|n| n.parent.clone()) {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.active_child = Some(child);
            }
            child = parent;
        }

        if let Some(cb) = self.nodes.get(&target).and_then(|n| n.on_focus.clone()) {
            hooks.push(cb);
        }
        self.current = Some(target);
        hooks
    }
}

impl DirectionalFocusGraph for FocusGraph {
    fn register_node(&mut self, id: NodeId, config: NodeConfig) -> Result<(), GraphError> {
        match &config.parent {
            None => {
                if let Some(existing) = &self.root
                    && *existing != id
                {
                    return Err(GraphError::RootAlreadyRegistered {
                        existing: existing.clone(),
                    });
                }
            }
            Some(parent) => {
                let valid = self.nodes.contains_key(parent)
                    && !(self.nodes.contains_key(&id) && self.is_within(parent, &id));
                if !valid {
                    return Err(GraphError::ParentNotFound {
                        id,
                        parent: parent.clone(),
                    });
                }
            }
        }

        if self.nodes.contains_key(&id) {
            self.unregister_node(&id);
        }

        let parent = config.parent.clone();
        self.nodes.insert(id.clone(), GraphNode::from_config(config));
        match parent {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.push(id);
                }
            }
            None => self.root = Some(id),
        }
        Ok(())
    }

    fn unregister_node(&mut self, id: &NodeId) {
        let Some(parent) = self.nodes.get(id).map(|n| n.parent.clone()) else {
            return;
        };

        if let Some(current) = &self.current
            && self.is_within(current, id)
        {
            self.current = None;
        }

        match parent {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.retain(|c| c != id);
                    if p.active_child.as_ref() == Some(id) {
                        p.active_child = None;
                    }
                }
            }
            None => self.root = None,
        }

        for removed in self.subtree(id) {
            self.nodes.remove(&removed);
        }
    }

    fn root_node(&self) -> Result<NodeId, GraphError> {
        self.root.clone().ok_or(GraphError::RootNotFound)
    }

    fn handle_key_event(&mut self, direction: Direction, options: KeyEventOptions) -> FocusHooks {
        let Some(current) = self.current.clone() else {
            if !options.force_focus {
                return FocusHooks::new();
            }
            let seed = self
                .root
                .as_ref()
                .and_then(|root| self.focusable_descendant(root));
            return match seed {
                Some(target) => self.move_focus(target),
                None => FocusHooks::new(),
            };
        };

        if direction == Direction::Enter {
            return self
                .nodes
                .get(&current)
                .and_then(|n| n.on_select.clone())
                .into_iter()
                .collect();
        }

        match self.find_target(&current, direction) {
            Some(target) => self.move_focus(target),
            None => FocusHooks::new(),
        }
    }

    fn current_focus_node(&self) -> Option<NodeId> {
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const FORCE: KeyEventOptions = KeyEventOptions { force_focus: true };

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn container(parent: &str, orientation: Orientation) -> NodeConfig {
        NodeConfig::new()
            .with_parent(parent)
            .with_orientation(orientation)
    }

    fn leaf(parent: &str) -> NodeConfig {
        NodeConfig::new().with_parent(parent).focusable(true)
    }

    fn run(hooks: FocusHooks) {
        for hook in hooks {
            hook();
        }
    }

    /// root (vertical)
    /// ├── row1 (horizontal): a, b, c
    /// └── row2 (horizontal): d, e
    fn grid() -> FocusGraph {
        let mut g = FocusGraph::new();
        g.register_node(id("root"), NodeConfig::new()).unwrap();
        g.register_node(id("row1"), container("root", Orientation::Horizontal))
            .unwrap();
        g.register_node(id("row2"), container("root", Orientation::Horizontal))
            .unwrap();
        for name in ["a", "b", "c"] {
            g.register_node(id(name), leaf("row1")).unwrap();
        }
        for name in ["d", "e"] {
            g.register_node(id(name), leaf("row2")).unwrap();
        }
        g
    }

    #[test]
    fn empty_graph_has_no_root() {
        let g = FocusGraph::new();
        assert_eq!(g.root_node(), Err(GraphError::RootNotFound));
        assert!(g.is_empty());
    }

    #[test]
    fn register_builds_tree() {
        let g = grid();
        assert_eq!(g.root_node(), Ok(id("root")));
        assert_eq!(g.node_count(), 8);
        assert_eq!(g.children(&id("row1")), &[id("a"), id("b"), id("c")]);
        assert_eq!(g.parent(&id("d")), Some(&id("row2")));
    }

    #[test]
    fn register_with_missing_parent_fails() {
        let mut g = grid();
        let err = g.register_node(id("x"), leaf("nope")).unwrap_err();
        assert_eq!(
            err,
            GraphError::ParentNotFound {
                id: id("x"),
                parent: id("nope")
            }
        );
        assert!(!g.contains(&id("x")));
    }

    #[test]
    fn second_root_rejected() {
        let mut g = grid();
        let err = g.register_node(id("other"), NodeConfig::new()).unwrap_err();
        assert_eq!(
            err,
            GraphError::RootAlreadyRegistered {
                existing: id("root")
            }
        );
    }

    #[test]
    fn reparent_into_own_subtree_rejected() {
        let mut g = grid();
        let err = g
            .register_node(id("row1"), container("a", Orientation::Vertical))
            .unwrap_err();
        assert!(matches!(err, GraphError::ParentNotFound { .. }));
        assert!(g.contains(&id("a")));
    }

    #[test]
    fn register_overwrites_existing() {
        let mut g = grid();
        g.register_node(id("a"), leaf("row2")).unwrap();
        assert_eq!(g.children(&id("row1")), &[id("b"), id("c")]);
        assert_eq!(g.children(&id("row2")), &[id("d"), id("e"), id("a")]);
    }

    #[test]
    fn unregister_removes_subtree() {
        let mut g = grid();
        g.unregister_node(&id("row1"));
        assert!(!g.contains(&id("a")));
        assert!(!g.contains(&id("c")));
        assert_eq!(g.children(&id("root")), &[id("row2")]);
        assert_eq!(g.node_count(), 4);
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let mut g = grid();
        g.unregister_node(&id("ghost"));
        assert_eq!(g.node_count(), 8);
    }

    #[test]
    fn force_focus_seeds_first_focusable() {
        let mut g = grid();
        run(g.handle_key_event(Direction::Down, KeyEventOptions::default()));
        assert_eq!(g.current_focus_node(), None);

        run(g.handle_key_event(Direction::Down, FORCE));
        assert_eq!(g.current_focus_node(), Some(id("a")));
    }

    #[test]
    fn horizontal_moves_within_row() {
        let mut g = grid();
        run(g.handle_key_event(Direction::Right, FORCE));
        run(g.handle_key_event(Direction::Right, FORCE));
        assert_eq!(g.current_focus_node(), Some(id("b")));
        run(g.handle_key_event(Direction::Right, FORCE));
        assert_eq!(g.current_focus_node(), Some(id("c")));

        // Edge of the row: no move.
        let hooks = g.handle_key_event(Direction::Right, FORCE);
        assert!(hooks.is_empty());
        assert_eq!(g.current_focus_node(), Some(id("c")));

        run(g.handle_key_event(Direction::Left, FORCE));
        assert_eq!(g.current_focus_node(), Some(id("b")));
    }

    #[test]
    fn vertical_move_between_rows_remembers_column() {
        let mut g = grid();
        g.focus_node(&id("e"));
        run(g.handle_key_event(Direction::Up, FORCE));
        assert_eq!(g.current_focus_node(), Some(id("a")));

        run(g.handle_key_event(Direction::Right, FORCE));
        run(g.handle_key_event(Direction::Down, FORCE));
        // row2 remembers `e` as its active child.
        assert_eq!(g.current_focus_node(), Some(id("e")));
    }

    #[test]
    fn skips_containers_without_focusable_descendants() {
        let mut g = FocusGraph::new();
        g.register_node(id("root"), NodeConfig::new().with_orientation(Orientation::Horizontal))
            .unwrap();
        g.register_node(id("v0"), container("root", Orientation::Vertical))
            .unwrap();
        g.register_node(id("v1"), container("root", Orientation::Vertical))
            .unwrap();
        g.register_node(id("v2"), container("root", Orientation::Vertical))
            .unwrap();
        g.register_node(id("i0"), leaf("v0")).unwrap();
        g.register_node(id("i2"), leaf("v2")).unwrap();

        g.focus_node(&id("i0"));
        run(g.handle_key_event(Direction::Right, FORCE));
        assert_eq!(g.current_focus_node(), Some(id("i2")));
    }

    #[test]
    fn hooks_order_blur_then_focus() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut g = FocusGraph::new();
        g.register_node(id("root"), NodeConfig::new().with_orientation(Orientation::Horizontal))
            .unwrap();
        for name in ["x", "y"] {
            let (lf, lb) = (Rc::clone(&log), Rc::clone(&log));
            g.register_node(
                id(name),
                leaf("root")
                    .on_focus(move || lf.borrow_mut().push(format!("focus {name}")))
                    .on_blur(move || lb.borrow_mut().push(format!("blur {name}"))),
            )
            .unwrap();
        }

        run(g.handle_key_event(Direction::Right, FORCE));
        run(g.handle_key_event(Direction::Right, FORCE));
        assert_eq!(*log.borrow(), vec!["focus x", "blur x", "focus y"]);
    }

    #[test]
    fn enter_returns_select_hook_without_moving() {
        let selected = Rc::new(RefCell::new(0));
        let mut g = FocusGraph::new();
        g.register_node(id("root"), NodeConfig::new()).unwrap();
        let s = Rc::clone(&selected);
        g.register_node(id("btn"), leaf("root").on_select(move || *s.borrow_mut() += 1))
            .unwrap();
        g.focus_node(&id("btn"));

        run(g.handle_key_event(Direction::Enter, FORCE));
        assert_eq!(*selected.borrow(), 1);
        assert_eq!(g.current_focus_node(), Some(id("btn")));
    }

    #[test]
    fn unregistering_focused_node_clears_focus() {
        let mut g = grid();
        g.focus_node(&id("b"));
        g.unregister_node(&id("b"));
        assert_eq!(g.current_focus_node(), None);

        run(g.handle_key_event(Direction::Right, FORCE));
        assert_eq!(g.current_focus_node(), Some(id("a")));
    }

    #[test]
    fn focus_node_ignores_non_focusable() {
        let mut g = grid();
        assert!(g.focus_node(&id("row1")).is_empty());
        assert_eq!(g.current_focus_node(), None);
    }

    #[test]
    fn clear_empties_graph() {
        let mut g = grid();
        g.focus_node(&id("a"));
        g.clear();
        assert!(g.is_empty());
        assert_eq!(g.current_focus_node(), None);
        assert_eq!(g.root_node(), Err(GraphError::RootNotFound));
    }
}
