//! DynamicFragment - The update boundary.
//!
//! A fragment is a placeholder block anchored at a fixed position whose
//! mounted content is replaced in place whenever its controlling value
//! changes. At most one block is mounted per fragment at any time; an update
//! unmounts the old block and mounts the new one atomically with respect to
//! observers, then notifies the registered "content changed" callbacks.
//!
//! # Update contract
//!
//! [`DynamicFragment::update`] runs once per reactive re-evaluation:
//! - An unchanged source value skips producing (no remount).
//! - A produced block identical to the mounted one does not remount.
//! - Callbacks run on every call and re-query [`DynamicFragment::nodes`]
//!   through closure state; ref re-binding is safe to re-run.
//!
//! During hydration the fragment adopts already-present markup: nothing is
//! inserted or removed, and the shared hydration cursor is advanced by the
//! caller once the fragment's subtree is consumed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::block::{self, Block};
use crate::hydration;
use crate::node::{self, NodeId};

/// Identity of the value an update pass was driven by. `Str` for name-resolved
/// content, `Ptr` for definition/vnode identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKey {
    Str(String),
    Ptr(usize),
}

/// Distinguishes ordinary dynamic positions from a teleported subtree's
/// placeholder (refs must not point into the latter).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FragmentKind {
    Dynamic,
    Teleport,
}

thread_local! {
    static FRAGMENT_ID: Cell<u64> = const { Cell::new(0) };
    static CALLBACK_ID: Cell<u64> = const { Cell::new(0) };
}

fn next_id(counter: &'static std::thread::LocalKey<Cell<u64>>) -> u64 {
    counter.with(|cell| {
        let id = cell.get();
        cell.set(id + 1);
        id
    })
}

/// A placeholder block whose mounted content swaps reactively at a fixed
/// anchor.
pub struct DynamicFragment {
    id: u64,
    kind: FragmentKind,
    label: &'static str,
    anchor: Cell<Option<NodeId>>,
    nodes: RefCell<Option<Block>>,
    current: RefCell<Option<SourceKey>>,
    on_updated: RefCell<Vec<(u64, Rc<dyn Fn()>)>>,
}

impl DynamicFragment {
    /// Create a dynamic fragment. The label fixes its display identity for
    /// hydration and diagnostics.
    pub fn new(label: &'static str) -> Rc<Self> {
        Rc::new(Self {
            id: next_id(&FRAGMENT_ID),
            kind: FragmentKind::Dynamic,
            label,
            anchor: Cell::new(None),
            nodes: RefCell::new(None),
            current: RefCell::new(None),
            on_updated: RefCell::new(Vec::new()),
        })
    }

    /// Create a teleport boundary placeholder.
    pub fn new_teleport() -> Rc<Self> {
        Rc::new(Self {
            id: next_id(&FRAGMENT_ID),
            kind: FragmentKind::Teleport,
            label: "teleport",
            anchor: Cell::new(None),
            nodes: RefCell::new(None),
            current: RefCell::new(None),
            on_updated: RefCell::new(Vec::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Currently mounted block, `None` before the first render.
    pub fn nodes(&self) -> Option<Block> {
        self.nodes.borrow().clone()
    }

    /// Anchor node, once placed.
    pub fn anchor(&self) -> Option<NodeId> {
        self.anchor.get()
    }

    /// Anchor node, created on first mount.
    pub fn ensure_anchor(&self) -> NodeId {
        match self.anchor.get() {
            Some(anchor) => anchor,
            None => {
                let anchor = node::create_anchor(self.label);
                self.anchor.set(Some(anchor));
                anchor
            }
        }
    }

    /// Register a content-changed callback. Returns an id for removal.
    pub fn add_on_updated(&self, callback: Rc<dyn Fn()>) -> u64 {
        let id = next_id(&CALLBACK_ID);
        self.on_updated.borrow_mut().push((id, callback));
        id
    }

    /// Remove a previously registered callback.
    pub fn remove_on_updated(&self, id: u64) {
        self.on_updated
            .borrow_mut()
            .retain(|(callback_id, _)| *callback_id != id);
    }

    /// Number of registered callbacks (for testing).
    pub fn on_updated_len(&self) -> usize {
        self.on_updated.borrow().len()
    }

    /// Place the anchor at `old`'s position in the tree, if it has one.
    ///
    /// Content adopted during hydration carries no anchor; the first
    /// non-hydrating swap derives the splice position from the adopted
    /// block before unmounting it.
    fn place_anchor_at(&self, old: &Block) {
        if self.anchor.get().is_some() {
            return;
        }
        if let Some(tail) = block::tail_node(old) {
            if let Some(parent) = node::parent_of(tail) {
                let after = node::next_sibling(tail);
                let anchor = self.ensure_anchor();
                node::insert_node(anchor, parent, after);
            }
        }
    }

    /// Run one update pass; see the module docs for the contract.
    pub fn update(&self, produce: impl FnOnce() -> Block, source: Option<SourceKey>) {
        let same_source =
            source.is_some() && *self.current.borrow() == source && self.nodes.borrow().is_some();

        if !same_source {
            let next = produce();
            let mounted = self.nodes.borrow().clone();
            if mounted.as_ref() != Some(&next) {
                if !hydration::is_hydrating() {
                    if let Some(old) = &mounted {
                        self.place_anchor_at(old);
                        block::remove(old);
                    }
                    if let Some(anchor) = self.anchor.get() {
                        if let Some(parent) = node::parent_of(anchor) {
                            block::insert(&next, parent, Some(anchor));
                        }
                    }
                }
                *self.nodes.borrow_mut() = Some(next);
            }
        }
        *self.current.borrow_mut() = source;

        // Snapshot first: callbacks may re-register themselves.
        let callbacks: Vec<Rc<dyn Fn()>> = self
            .on_updated
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{children_of, create_element, insert_node, reset_nodes, tag_of};
    use std::cell::Cell;

    fn mount_fragment(root: NodeId) -> Rc<DynamicFragment> {
        let frag = DynamicFragment::new("test");
        block::insert(&Block::Fragment(frag.clone()), root, None);
        frag
    }

    #[test]
    fn test_swap_replaces_content_at_anchor() {
        reset_nodes();
        hydration::reset_hydration();

        let root = create_element("root");
        let frag = mount_fragment(root);

        let a = create_element("a");
        frag.update(|| Block::Node(a), None);
        assert_eq!(children_of(root).len(), 2); // content + anchor
        assert_eq!(children_of(root)[0], a);

        let b = create_element("b");
        frag.update(|| Block::Node(b), None);
        let children = children_of(root);
        assert_eq!(children.len(), 2, "old content should be unmounted");
        assert_eq!(children[0], b);
        assert_eq!(tag_of(children[0]), Some("b".to_string()));
        assert_eq!(frag.nodes(), Some(Block::Node(b)));
    }

    #[test]
    fn test_idempotent_update_mounts_once_callbacks_fire_twice() {
        reset_nodes();
        hydration::reset_hydration();

        let root = create_element("root");
        let frag = mount_fragment(root);

        let fired = Rc::new(Cell::new(0));
        let fired_clone = fired.clone();
        frag.add_on_updated(Rc::new(move || fired_clone.set(fired_clone.get() + 1)));

        let a = create_element("a");
        let produced = Rc::new(Cell::new(0));

        for _ in 0..2 {
            let produced = produced.clone();
            frag.update(
                move || {
                    produced.set(produced.get() + 1);
                    Block::Node(a)
                },
                None,
            );
        }

        assert_eq!(produced.get(), 2, "no source key, so produce runs each pass");
        assert_eq!(children_of(root).len(), 2, "identical block must not remount");
        assert_eq!(fired.get(), 2, "callbacks fire on both calls");
    }

    #[test]
    fn test_same_source_skips_produce() {
        reset_nodes();
        hydration::reset_hydration();

        let root = create_element("root");
        let frag = mount_fragment(root);

        let produced = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let produced = produced.clone();
            frag.update(
                move || {
                    produced.set(produced.get() + 1);
                    Block::Node(create_element("a"))
                },
                Some(SourceKey::Str("a".to_string())),
            );
        }

        assert_eq!(produced.get(), 1, "unchanged source should skip produce");
    }

    #[test]
    fn test_callback_removal() {
        reset_nodes();
        hydration::reset_hydration();

        let frag = DynamicFragment::new("test");
        let fired = Rc::new(Cell::new(0));
        let fired_clone = fired.clone();
        let id = frag.add_on_updated(Rc::new(move || fired_clone.set(fired_clone.get() + 1)));

        frag.update(|| Block::Node(create_element("a")), None);
        assert_eq!(fired.get(), 1);

        frag.remove_on_updated(id);
        frag.update(|| Block::Node(create_element("b")), None);
        assert_eq!(fired.get(), 1, "removed callback must not fire");
        assert_eq!(frag.on_updated_len(), 0);
    }

    #[test]
    fn test_hydration_adopts_without_mutating_tree() {
        reset_nodes();
        hydration::reset_hydration();

        // Pre-rendered markup.
        let root = create_element("root");
        let server_node = create_element("server");
        insert_node(server_node, root, None);

        hydration::start_hydration(root);

        let frag = DynamicFragment::new("dynamic-component");
        frag.update(|| Block::Node(server_node), None);

        assert_eq!(
            children_of(root),
            vec![server_node],
            "hydration must not mount from scratch"
        );
        assert_eq!(frag.nodes(), Some(Block::Node(server_node)));

        hydration::stop_hydration();
    }

    #[test]
    fn test_first_swap_after_hydration_splices_in_place() {
        reset_nodes();
        hydration::reset_hydration();

        let root = create_element("root");
        let server = create_element("server");
        let footer = create_element("footer");
        insert_node(server, root, None);
        insert_node(footer, root, None);

        hydration::start_hydration(root);
        let frag = DynamicFragment::new("view");
        frag.update(|| Block::Node(server), Some(SourceKey::Str("a".to_string())));
        hydration::stop_hydration();

        assert_eq!(frag.anchor(), None, "adoption places no anchor");

        let b = create_element("b");
        frag.update(|| Block::Node(b), Some(SourceKey::Str("b".to_string())));

        let children = children_of(root);
        assert_eq!(children.len(), 3, "new content, anchor, untouched sibling");
        assert_eq!(children[0], b);
        assert!(node::is_anchor(children[1]));
        assert_eq!(children[2], footer);
        assert_eq!(node::parent_of(server), None, "the adopted node is unmounted");
        assert_eq!(frag.nodes(), Some(Block::Node(b)));
    }
}
