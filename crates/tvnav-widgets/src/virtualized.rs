#![forbid(unsafe_code)]

//! Windowed rendering of long lists driven by focus.
//!
//! Only a contiguous window of items around the focused index is handed to
//! the renderer. Each data item gets a non-focusable "virtual parent" node in
//! the focus tree, so navigation order follows data order even while most
//! items are not mounted.
//!
//! # Core pieces
//!
//! - [`compute_range`]: pure window arithmetic.
//! - [`diff_registrations`]: which indices need a new virtual parent after a
//!   data change.
//! - [`scroll_target`]: translation that keeps the focused item centered.
//! - [`VirtualizedList`]: ties the three to a navigation session.
//!
//! # Window arithmetic
//!
//! With window `w`, the window extends `floor((w-1)/2)` items before the
//! focused index and `ceil((w-1)/2)` after it, then is pinned to the data:
//!
//! ```text
//! count 24, window 8
//! focus  0  -> [ 0 ..  7]   pinned to start
//! focus 12  -> [ 9 .. 16]   centered, extra item after
//! focus 23  -> [16 .. 23]   pinned to end
//! ```
//!
//! # Example
//!
//! ```
//! use tvnav_widgets::virtualized::{RenderRange, compute_range};
//!
//! assert_eq!(compute_range(24, 12, 8), RenderRange { start: 9, end: 16 });
//! assert_eq!(compute_range(3, 1, 8), RenderRange { start: 0, end: 2 });
//! ```

use std::cell::RefCell;
use std::fmt;
use std::ops::RangeInclusive;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::focus::{
    ContextError, DirectionalFocusGraph, FocusGraph, FocusTreeManager, NavNode, NavScope,
    NodeCallback, NodeConfig, NodeId, Orientation,
};

/// Default window size.
pub const DEFAULT_RENDERED_ITEMS: usize = 8;

/// Default number of items visible at once.
pub const DEFAULT_VISIBLE_ON_SCREEN: usize = 8;

/// Default distance from the end that triggers `on_end_reached`.
pub const DEFAULT_END_REACHED_THRESHOLD: usize = 3;

/// Item with a stable position in the full dataset.
pub trait IndexedItem {
    fn index(&self) -> usize;
}

impl IndexedItem for usize {
    fn index(&self) -> usize {
        *self
    }
}

/// Inclusive range of item positions to keep mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderRange {
    pub start: usize,
    pub end: usize,
}

impl RenderRange {
    /// Number of positions covered (inclusive on both ends).
    #[must_use]
    pub const fn span(&self) -> usize {
        self.end - self.start + 1
    }

    #[must_use]
    pub const fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }

    #[must_use]
    pub const fn iter(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Compute the inclusive window of positions to render.
///
/// A zero window yields `{0, 0}`, as does an empty dataset. The result never
/// covers more than `window_size` positions and, when the dataset is
/// non-empty, never leaves `0..item_count`.
#[must_use]
pub fn compute_range(item_count: usize, focused_index: usize, window_size: usize) -> RenderRange {
    if window_size == 0 {
        return RenderRange::default();
    }
    let last = item_count.saturating_sub(1);
    let before = (window_size - 1) / 2;

    if focused_index < before {
        return RenderRange {
            start: 0,
            end: (window_size - 1).min(last),
        };
    }

    let start = focused_index - before;
    let end = start.saturating_add(window_size - 1);
    if end > last {
        return RenderRange {
            start: item_count.saturating_sub(window_size),
            end: last,
        };
    }
    RenderRange { start, end }
}

/// Register every index in `current` that is absent from `previous`.
///
/// Calls `register` once per new index, in `current` order, and returns the
/// indices it was called with. Indices that disappeared are left alone.
pub fn diff_registrations<T: IndexedItem>(
    previous: &[T],
    current: &[T],
    mut register: impl FnMut(usize),
) -> Vec<usize> {
    let known: FxHashSet<usize> = previous.iter().map(IndexedItem::index).collect();
    let mut seen = FxHashSet::default();
    let mut added = Vec::new();
    for index in current.iter().map(IndexedItem::index) {
        if !known.contains(&index) && seen.insert(index) {
            register(index);
            added.push(index);
        }
    }
    added
}

/// Translation (along the list axis) that keeps the focused item centered.
///
/// Zero while the focused item sits in the first half screen; otherwise
/// shifts by one `item_size` per item past the half point, plus the header.
#[must_use]
pub fn scroll_target(
    focused_index: usize,
    visible_on_screen: usize,
    item_size: f32,
    header_size: f32,
) -> f32 {
    let half = visible_on_screen / 2;
    if focused_index < half {
        return 0.0;
    }
    -((focused_index - half) as f32 * item_size + header_size)
}

/// Recycled render key for the slot holding `index`.
#[must_use]
pub fn slot_key(index: usize, window_size: usize) -> String {
    format!("recycled_item_{}", index % window_size.max(1))
}

/// Configuration for a [`VirtualizedList`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VirtualizedListConfig {
    /// Window size (default: 8).
    pub number_of_rendered_items: usize,
    /// Items visible at once, for centering (default: 8).
    pub number_of_items_visible_on_screen: usize,
    /// Items left before `on_end_reached` fires (default: 3).
    pub on_end_reached_threshold_items_number: usize,
    /// List axis (default: horizontal).
    pub orientation: Orientation,
    /// Width (horizontal) or height (vertical) of one item.
    pub item_size: f32,
    /// Size of a leading header, added to the scroll offset.
    pub header_size: f32,
}

impl Default for VirtualizedListConfig {
    fn default() -> Self {
        Self {
            number_of_rendered_items: DEFAULT_RENDERED_ITEMS,
            number_of_items_visible_on_screen: DEFAULT_VISIBLE_ON_SCREEN,
            on_end_reached_threshold_items_number: DEFAULT_END_REACHED_THRESHOLD,
            orientation: Orientation::Horizontal,
            item_size: 1.0,
            header_size: 0.0,
        }
    }
}

impl VirtualizedListConfig {
    #[must_use]
    pub fn with_rendered_items(mut self, n: usize) -> Self {
        self.number_of_rendered_items = n;
        self
    }

    #[must_use]
    pub fn with_visible_on_screen(mut self, n: usize) -> Self {
        self.number_of_items_visible_on_screen = n;
        self
    }

    #[must_use]
    pub fn with_end_reached_threshold(mut self, n: usize) -> Self {
        self.on_end_reached_threshold_items_number = n;
        self
    }

    #[must_use]
    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    #[must_use]
    pub fn with_item_size(mut self, size: f32) -> Self {
        self.item_size = size;
        self
    }

    #[must_use]
    pub fn with_header_size(mut self, size: f32) -> Self {
        self.header_size = size;
        self
    }
}

/// One item the renderer should mount.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedItem<T> {
    pub item: T,
    /// Recycling slot (`index % window`).
    pub slot: usize,
    /// Stable render key for the slot.
    pub slot_key: String,
    /// Node the item's own focus nodes must be mounted under.
    pub virtual_parent: NodeId,
    /// Position along the list axis (`index * item_size`).
    pub offset: f32,
}

/// Everything the rendering boundary needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan<T> {
    pub range: RenderRange,
    pub focused_index: usize,
    pub items: Vec<RenderedItem<T>>,
    /// Translation to apply to the whole list.
    pub scroll_offset: f32,
    pub orientation: Orientation,
}

struct ListState<T> {
    data: Vec<T>,
    indices: Vec<usize>,
    registered: FxHashSet<usize>,
    config: VirtualizedListConfig,
    focused_index: usize,
    range: RenderRange,
    end_armed: bool,
    on_end_reached: Option<NodeCallback>,
}

impl<T> ListState<T> {
    /// Recompute the window; returns the end-reached callback if it is due.
    fn refresh(&mut self) -> Option<NodeCallback> {
        let count = self.data.len();
        self.range = compute_range(
            count,
            self.focused_index,
            self.config.number_of_rendered_items,
        );

        if count == 0 || self.range.end == 0 {
            return None;
        }
        // Lists no longer than the threshold never report their end.
        let Some(threshold_index) =
            (count - 1).checked_sub(self.config.on_end_reached_threshold_items_number)
        else {
            return None;
        };
        if self.focused_index < threshold_index {
            self.end_armed = true;
            return None;
        }
        if !self.end_armed {
            return None;
        }
        self.end_armed = false;
        debug!(focused = self.focused_index, count, "end of list reached");
        self.on_end_reached.clone()
    }
}

fn refresh<T>(state: &RefCell<ListState<T>>) {
    let due = state.borrow_mut().refresh();
    if let Some(on_end_reached) = due {
        on_end_reached();
    }
}

fn set_focused<T>(state: &RefCell<ListState<T>>, index: usize) {
    {
        let mut state = state.borrow_mut();
        if state.focused_index == index {
            return;
        }
        trace!(from = state.focused_index, to = index, "focused item changed");
        state.focused_index = index;
    }
    refresh(state);
}

/// Focus-driven virtualized list bound to a navigation session.
///
/// Mounting creates a container node under the scope's parent and registers
/// one virtual parent per data item. Later data changes only register the
/// new indices. Dropping the list unregisters every virtual parent it ever
/// registered, then the container.
pub struct VirtualizedList<T: IndexedItem + 'static, G: DirectionalFocusGraph + 'static = FocusGraph> {
    state: Rc<RefCell<ListState<T>>>,
    container: NavNode<G>,
}

impl<T: IndexedItem + 'static, G: DirectionalFocusGraph + 'static> VirtualizedList<T, G> {
    /// Mount the list and register a virtual parent for every item in `data`.
    pub fn mount(
        scope: &NavScope<G>,
        config: VirtualizedListConfig,
        data: Vec<T>,
    ) -> Result<Self, ContextError> {
        let container = NavNode::mount(
            scope,
            NodeConfig::new().with_orientation(config.orientation),
        )?;

        let indices: Vec<usize> = data.iter().map(IndexedItem::index).collect();
        let mut registered = FxHashSet::default();
        for &index in &indices {
            if registered.insert(index) {
                register_virtual_parent(container.session(), container.id(), index);
            }
        }
        debug!(
            container = %container.id(),
            items = indices.len(),
            "virtualized list mounted"
        );

        let range = compute_range(data.len(), 0, config.number_of_rendered_items);
        Ok(Self {
            state: Rc::new(RefCell::new(ListState {
                data,
                indices,
                registered,
                config,
                focused_index: 0,
                range,
                end_armed: true,
                on_end_reached: None,
            })),
            container,
        })
    }

    /// Builder: callback fired once each time focus crosses into the last
    /// `on_end_reached_threshold_items_number` items.
    ///
    /// The current position is checked right away, so a list that starts
    /// inside the threshold reports its end immediately.
    #[must_use]
    pub fn on_end_reached(self, f: impl Fn() + 'static) -> Self {
        self.state.borrow_mut().on_end_reached = Some(Rc::new(f));
        refresh(&self.state);
        self
    }

    /// Replace the dataset, registering virtual parents for new indices only.
    ///
    /// Returns the newly registered indices.
    pub fn set_data(&self, data: Vec<T>) -> Vec<usize> {
        let added = {
            let mut state = self.state.borrow_mut();
            let current: Vec<usize> = data.iter().map(IndexedItem::index).collect();
            let (session, container) = (self.container.session(), self.container.id());
            let added = diff_registrations(&state.indices, &current, |index| {
                register_virtual_parent(session, container, index);
            });
            state.registered.extend(added.iter().copied());
            state.indices = current;
            state.data = data;
            added
        };
        if !added.is_empty() {
            debug!(added = added.len(), "virtual parents registered");
        }
        refresh(&self.state);
        added
    }

    /// Move the window to `index`.
    pub fn set_focused_index(&self, index: usize) {
        set_focused(&self.state, index);
    }

    /// Replace the configuration and recompute the window.
    ///
    /// Orientation is fixed at mount; a changed orientation is ignored.
    pub fn set_config(&self, mut config: VirtualizedListConfig) {
        {
            let mut state = self.state.borrow_mut();
            if config.orientation != state.config.orientation {
                debug!("orientation change ignored after mount");
                config.orientation = state.config.orientation;
            }
            state.config = config;
        }
        refresh(&self.state);
    }

    #[must_use]
    pub fn focused_index(&self) -> usize {
        self.state.borrow().focused_index
    }

    #[must_use]
    pub fn range(&self) -> RenderRange {
        self.state.borrow().range
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().data.is_empty()
    }

    #[must_use]
    pub fn config(&self) -> VirtualizedListConfig {
        self.state.borrow().config.clone()
    }

    #[must_use]
    pub fn container_id(&self) -> &NodeId {
        self.container.id()
    }

    #[must_use]
    pub fn session(&self) -> &FocusTreeManager<G> {
        self.container.session()
    }

    /// Virtual parents registered so far, including ones for items that
    /// have since left the dataset.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.state.borrow().registered.len()
    }

    /// Id of the virtual parent for `index`.
    #[must_use]
    pub fn virtual_parent_id(&self, index: usize) -> NodeId {
        virtual_parent_id(self.container.id(), index)
    }

    /// Scope for mounting the focus nodes of item `index`.
    ///
    /// Any node mounted below it, however deep, moves the window to `index`
    /// when focused. Enclosing lists are notified first.
    #[must_use]
    pub fn item_scope(&self, index: usize) -> NavScope<G> {
        self.container
            .scope()
            .child(self.virtual_parent_id(index))
            .with_focus_listener(self.focus_callback(index))
    }

    /// Callback that moves the window to `index`. A no-op once the list is gone.
    #[must_use]
    pub fn focus_callback(&self, index: usize) -> NodeCallback {
        let weak: Weak<RefCell<ListState<T>>> = Rc::downgrade(&self.state);
        Rc::new(move || {
            if let Some(state) = weak.upgrade() {
                set_focused(&state, index);
            }
        })
    }

    /// Mount the top node for item `index` under its virtual parent.
    pub fn mount_item(&self, index: usize, config: NodeConfig) -> Result<NavNode<G>, ContextError> {
        NavNode::mount(&self.item_scope(index), config)
    }
}

impl<T: IndexedItem + Clone + 'static, G: DirectionalFocusGraph + 'static> VirtualizedList<T, G> {
    /// Items to mount this frame, with their slots and scroll offset.
    #[must_use]
    pub fn render(&self) -> RenderPlan<T> {
        let state = self.state.borrow();
        let config = &state.config;
        let window = config.number_of_rendered_items;

        let items = if window == 0 || state.data.is_empty() {
            Vec::new()
        } else {
            let end = state.range.end.min(state.data.len() - 1);
            state.data[state.range.start.min(end)..=end]
                .iter()
                .map(|item| {
                    let index = item.index();
                    RenderedItem {
                        item: item.clone(),
                        slot: index % window,
                        slot_key: slot_key(index, window),
                        virtual_parent: virtual_parent_id(self.container.id(), index),
                        offset: index as f32 * config.item_size,
                    }
                })
                .collect()
        };

        RenderPlan {
            range: state.range,
            focused_index: state.focused_index,
            items,
            scroll_offset: scroll_target(
                state.focused_index,
                config.number_of_items_visible_on_screen,
                config.item_size,
                config.header_size,
            ),
            orientation: config.orientation,
        }
    }
}

impl<T: IndexedItem + 'static, G: DirectionalFocusGraph + 'static> fmt::Debug for VirtualizedList<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("VirtualizedList")
            .field("container", self.container.id())
            .field("len", &state.data.len())
            .field("focused_index", &state.focused_index)
            .field("range", &state.range)
            .finish()
    }
}

impl<T: IndexedItem + 'static, G: DirectionalFocusGraph + 'static> Drop for VirtualizedList<T, G> {
    fn drop(&mut self) {
        let state = self.state.borrow();
        for &index in &state.registered {
            self.container
                .session()
                .unregister_node(&virtual_parent_id(self.container.id(), index));
        }
        debug!(
            container = %self.container.id(),
            unregistered = state.registered.len(),
            "virtualized list unmounted"
        );
    }
}

fn virtual_parent_id(container: &NodeId, index: usize) -> NodeId {
    NodeId::new(format!("{container}_virtual_{index}"))
}

fn register_virtual_parent<G: DirectionalFocusGraph + 'static>(
    session: &FocusTreeManager<G>,
    container: &NodeId,
    index: usize,
) {
    session.register_node(
        virtual_parent_id(container, index),
        NodeConfig::new()
            .with_parent(container.clone())
            .with_orientation(Orientation::Vertical),
    );
}
