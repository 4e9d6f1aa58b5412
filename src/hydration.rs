//! Hydration state - Adopting pre-rendered markup.
//!
//! During hydration the tree already exists in the arena; mounting adopts
//! nodes instead of creating them. This module holds the shared cursor that
//! walks the pre-rendered siblings. The core only advances the cursor after
//! confirming it is the last dynamic child needing adoption within its
//! parent - earlier siblings still need the node the cursor points at.

use std::cell::Cell;

use crate::node::{self, NodeId};

thread_local! {
    static HYDRATING: Cell<bool> = const { Cell::new(false) };
    static CURSOR: Cell<Option<NodeId>> = const { Cell::new(None) };
}

/// Whether the renderer is currently replaying pre-rendered markup.
pub fn is_hydrating() -> bool {
    HYDRATING.with(|flag| flag.get())
}

/// Begin hydration with the cursor on `root`'s first child.
pub fn start_hydration(root: NodeId) {
    HYDRATING.with(|flag| flag.set(true));
    CURSOR.with(|cursor| cursor.set(node::children_of(root).first().copied()));
}

/// End hydration and clear the cursor.
pub fn stop_hydration() {
    HYDRATING.with(|flag| flag.set(false));
    CURSOR.with(|cursor| cursor.set(None));
}

/// The pre-rendered node the cursor currently points at.
pub fn current_hydration_node() -> Option<NodeId> {
    CURSOR.with(|cursor| cursor.get())
}

/// Move the cursor to the next sibling within `parent`, or to `None` when
/// the parent's subtree is consumed.
pub fn advance_hydration_node(parent: NodeId) {
    CURSOR.with(|cursor| {
        let next = match cursor.get() {
            Some(current) if node::parent_of(current) == Some(parent) => {
                node::next_sibling(current)
            }
            _ => node::children_of(parent).first().copied(),
        };
        cursor.set(next);
    });
}

/// Reset hydration state (for testing).
pub fn reset_hydration() {
    stop_hydration();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{create_element, insert_node, reset_nodes};

    #[test]
    fn test_cursor_walks_siblings() {
        reset_nodes();
        reset_hydration();

        let root = create_element("root");
        let a = create_element("a");
        let b = create_element("b");
        insert_node(a, root, None);
        insert_node(b, root, None);

        start_hydration(root);
        assert!(is_hydrating());
        assert_eq!(current_hydration_node(), Some(a));

        advance_hydration_node(root);
        assert_eq!(current_hydration_node(), Some(b));

        advance_hydration_node(root);
        assert_eq!(current_hydration_node(), None);

        stop_hydration();
        assert!(!is_hydrating());
    }
}
