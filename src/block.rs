//! Block - The opaque renderable unit.
//!
//! A block is whatever a render function hands back: a single host node, an
//! ordered sequence of blocks, a mounted component instance, or a fragment
//! whose content swaps reactively. Blocks compare by identity (node index,
//! `Rc` pointer), never by structure - the update boundary relies on that to
//! tell "same content re-produced" apart from "new content".

use std::rc::Rc;

use crate::component::ComponentInstance;
use crate::fragment::DynamicFragment;
use crate::node::{self, NodeId};

/// An opaque renderable unit. Owned by whichever component or fragment
/// mounted it; exactly one owner at a time.
#[derive(Clone)]
pub enum Block {
    /// A single host node.
    Node(NodeId),
    /// An ordered sequence of blocks.
    Multiple(Vec<Block>),
    /// A mounted component instance.
    Component(Rc<ComponentInstance>),
    /// A fragment with swappable content.
    Fragment(Rc<DynamicFragment>),
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Block::Node(a), Block::Node(b)) => a == b,
            (Block::Multiple(a), Block::Multiple(b)) => a == b,
            (Block::Component(a), Block::Component(b)) => Rc::ptr_eq(a, b),
            (Block::Fragment(a), Block::Fragment(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Block::Node(id) => write!(f, "Block::Node({id})"),
            Block::Multiple(blocks) => write!(f, "Block::Multiple({blocks:?})"),
            Block::Component(instance) => write!(f, "Block::Component(#{})", instance.id()),
            Block::Fragment(fragment) => write!(f, "Block::Fragment(#{})", fragment.id()),
        }
    }
}

/// Splice a block into `parent` before `anchor`.
///
/// Tolerates a fragment whose `nodes` is still unset: only its anchor
/// placeholder is mounted, and content lands at that placeholder later.
pub fn insert(block: &Block, parent: NodeId, anchor: Option<NodeId>) {
    match block {
        Block::Node(id) => node::insert_node(*id, parent, anchor),
        Block::Multiple(blocks) => {
            for child in blocks {
                insert(child, parent, anchor);
            }
        }
        Block::Component(instance) => {
            if let Some(inner) = instance.block() {
                insert(&inner, parent, anchor);
            }
        }
        Block::Fragment(fragment) => {
            if let Some(nodes) = fragment.nodes() {
                insert(&nodes, parent, anchor);
            }
            node::insert_node(fragment.ensure_anchor(), parent, anchor);
        }
    }
}

/// Last host node a mounted block occupies. Used to derive a fragment's
/// splice position when content was adopted without an anchor (hydration).
pub(crate) fn tail_node(block: &Block) -> Option<NodeId> {
    match block {
        Block::Node(id) => Some(*id),
        Block::Multiple(blocks) => blocks.iter().rev().find_map(tail_node),
        Block::Component(instance) => instance.block().as_ref().and_then(tail_node),
        Block::Fragment(fragment) => fragment
            .anchor()
            .or_else(|| fragment.nodes().as_ref().and_then(tail_node)),
    }
}

/// Detach a block from the tree.
///
/// Component state is untouched; destroying instances is the business of
/// scope disposal. Detached keep-alive content stays re-insertable.
pub fn remove(block: &Block) {
    match block {
        Block::Node(id) => node::remove_node(*id),
        Block::Multiple(blocks) => {
            for child in blocks {
                remove(child);
            }
        }
        Block::Component(instance) => {
            if let Some(inner) = instance.block() {
                remove(&inner);
            }
        }
        Block::Fragment(fragment) => {
            if let Some(nodes) = fragment.nodes() {
                remove(&nodes);
            }
            if let Some(anchor) = fragment.anchor() {
                node::remove_node(anchor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{children_of, create_element, reset_nodes};

    #[test]
    fn test_identity_equality() {
        reset_nodes();

        let a = Block::Node(create_element("a"));
        let b = Block::Node(create_element("b"));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        let frag = DynamicFragment::new("test");
        let as_block = Block::Fragment(frag.clone());
        assert_eq!(as_block, Block::Fragment(frag));
    }

    #[test]
    fn test_insert_sequence_preserves_order() {
        reset_nodes();

        let root = create_element("root");
        let a = create_element("a");
        let b = create_element("b");
        let seq = Block::Multiple(vec![Block::Node(a), Block::Node(b)]);

        insert(&seq, root, None);
        assert_eq!(children_of(root), vec![a, b]);

        remove(&seq);
        assert!(children_of(root).is_empty());
    }

    #[test]
    fn test_insert_empty_fragment_mounts_placeholder() {
        reset_nodes();

        let root = create_element("root");
        let frag = DynamicFragment::new("empty");
        insert(&Block::Fragment(frag.clone()), root, None);

        let children = children_of(root);
        assert_eq!(children.len(), 1, "only the anchor should be mounted");
        assert!(node::is_anchor(children[0]));
        assert_eq!(frag.anchor(), Some(children[0]));
    }
}
