//! Insertion state - Where the next dynamic position mounts.
//!
//! Compiled render code sets the insertion state just before creating a
//! dynamic position; the creator captures it, then resets it so nested
//! creations do not inherit a stale position. During hydration the state is
//! left in place - it is still needed to advance the hydration cursor.

use std::cell::Cell;

use crate::node::NodeId;

/// Captured mount position for a dynamic position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InsertionState {
    /// Parent the position mounts under.
    pub parent: NodeId,
    /// Sibling to mount before (append when `None`).
    pub anchor: Option<NodeId>,
    /// Whether this is the last dynamic child needing adoption in `parent`.
    pub is_last: bool,
}

thread_local! {
    static STATE: Cell<Option<InsertionState>> = const { Cell::new(None) };
}

/// Set the insertion state for the next dynamic position.
pub fn set_insertion_state(parent: NodeId, anchor: Option<NodeId>, is_last: bool) {
    STATE.with(|state| {
        state.set(Some(InsertionState {
            parent,
            anchor,
            is_last,
        }))
    });
}

/// Current insertion state, if any.
pub fn insertion_state() -> Option<InsertionState> {
    STATE.with(|state| state.get())
}

/// Clear the insertion state.
pub fn reset_insertion_state() {
    STATE.with(|state| state.set(None));
}
