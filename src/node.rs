//! Host node arena - The tree that blocks are mounted into.
//!
//! This is the renderer's stand-in for a host tree (a DOM, a terminal cell
//! grid, ...): a thread-local arena of nodes with parent links and ordered
//! sibling lists. Blocks reference nodes by index, never by pointer, so
//! identity checks are plain integer comparisons.
//!
//! Insertion is anchor-based: a node is spliced in before the anchor, or
//! appended when no anchor is given. Removal only detaches; the slot stays
//! allocated so adopted (hydrated) nodes and re-inserted keep-alive content
//! keep their identity.

use std::cell::RefCell;

/// Index of a node in the arena.
pub type NodeId = usize;

/// What a node renders as.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A host element with a tag name.
    Element(String),
    /// A text node.
    Text(String),
    /// An invisible placeholder marking a fragment position.
    Anchor(&'static str),
}

struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

thread_local! {
    static NODES: RefCell<Vec<NodeData>> = const { RefCell::new(Vec::new()) };
}

fn alloc(kind: NodeKind) -> NodeId {
    NODES.with(|nodes| {
        let mut nodes = nodes.borrow_mut();
        nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        nodes.len() - 1
    })
}

/// Create a detached element node.
pub fn create_element(tag: &str) -> NodeId {
    alloc(NodeKind::Element(tag.to_string()))
}

/// Create a detached text node.
pub fn create_text(content: &str) -> NodeId {
    alloc(NodeKind::Text(content.to_string()))
}

/// Create a detached anchor placeholder.
pub fn create_anchor(label: &'static str) -> NodeId {
    alloc(NodeKind::Anchor(label))
}

/// Splice `node` into `parent` before `anchor` (append when `None`).
///
/// Detaches the node from its previous parent first, so moving a node is a
/// single call.
pub fn insert_node(node: NodeId, parent: NodeId, anchor: Option<NodeId>) {
    detach(node);
    NODES.with(|nodes| {
        let mut nodes = nodes.borrow_mut();
        let position = match anchor {
            Some(anchor) => nodes[parent]
                .children
                .iter()
                .position(|&child| child == anchor)
                .unwrap_or(nodes[parent].children.len()),
            None => nodes[parent].children.len(),
        };
        nodes[parent].children.insert(position, node);
        nodes[node].parent = Some(parent);
    });
}

/// Detach `node` from its parent. No-op when already detached.
pub fn remove_node(node: NodeId) {
    detach(node);
}

fn detach(node: NodeId) {
    NODES.with(|nodes| {
        let mut nodes = nodes.borrow_mut();
        if let Some(parent) = nodes[node].parent.take() {
            nodes[parent].children.retain(|&child| child != node);
        }
    });
}

/// Parent of `node`, if attached.
pub fn parent_of(node: NodeId) -> Option<NodeId> {
    NODES.with(|nodes| nodes.borrow()[node].parent)
}

/// Ordered children of `parent`.
pub fn children_of(parent: NodeId) -> Vec<NodeId> {
    NODES.with(|nodes| nodes.borrow()[parent].children.clone())
}

/// The sibling immediately after `node` within its parent.
pub fn next_sibling(node: NodeId) -> Option<NodeId> {
    NODES.with(|nodes| {
        let nodes = nodes.borrow();
        let parent = nodes[node].parent?;
        let siblings = &nodes[parent].children;
        let position = siblings.iter().position(|&child| child == node)?;
        siblings.get(position + 1).copied()
    })
}

/// Kind of `node`.
pub fn kind_of(node: NodeId) -> NodeKind {
    NODES.with(|nodes| nodes.borrow()[node].kind.clone())
}

/// Tag name when `node` is an element.
pub fn tag_of(node: NodeId) -> Option<String> {
    match kind_of(node) {
        NodeKind::Element(tag) => Some(tag),
        _ => None,
    }
}

/// Whether `node` is an anchor placeholder.
pub fn is_anchor(node: NodeId) -> bool {
    matches!(kind_of(node), NodeKind::Anchor(_))
}

/// Reset the arena (for testing).
pub fn reset_nodes() {
    NODES.with(|nodes| nodes.borrow_mut().clear());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_order() {
        reset_nodes();

        let root = create_element("root");
        let a = create_element("a");
        let b = create_element("b");
        let c = create_element("c");

        insert_node(a, root, None);
        insert_node(c, root, None);
        insert_node(b, root, Some(c));

        assert_eq!(children_of(root), vec![a, b, c]);
        assert_eq!(parent_of(b), Some(root));
        assert_eq!(next_sibling(a), Some(b));
        assert_eq!(next_sibling(c), None);
    }

    #[test]
    fn test_remove_detaches_only() {
        reset_nodes();

        let root = create_element("root");
        let a = create_element("a");
        insert_node(a, root, None);

        remove_node(a);
        assert_eq!(children_of(root), Vec::<NodeId>::new());
        assert_eq!(parent_of(a), None);
        // Identity survives detachment.
        assert_eq!(tag_of(a), Some("a".to_string()));
    }

    #[test]
    fn test_reinsert_moves_node() {
        reset_nodes();

        let first = create_element("first");
        let second = create_element("second");
        let child = create_element("child");

        insert_node(child, first, None);
        insert_node(child, second, None);

        assert_eq!(children_of(first), Vec::<NodeId>::new());
        assert_eq!(children_of(second), vec![child]);
    }

    #[test]
    fn test_text_node_kind() {
        reset_nodes();

        let root = create_element("root");
        let text = create_text("hello");
        insert_node(text, root, None);

        assert_eq!(kind_of(text), NodeKind::Text("hello".to_string()));
        assert_eq!(tag_of(text), None);
        assert!(!is_anchor(text));
        assert_eq!(children_of(root), vec![text]);
    }

    #[test]
    fn test_anchor_kind() {
        reset_nodes();

        let anchor = create_anchor("dynamic-component");
        assert!(is_anchor(anchor));
        assert_eq!(tag_of(anchor), None);
    }
}
