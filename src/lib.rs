//! # spark-render
//!
//! Fine-grained reactive renderer core for Rust.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for
//! fine-grained reactivity: there is no virtual tree and no diffing pass.
//! Compiled render code creates host nodes directly and wires individual
//! reactive effects to the positions that can change.
//!
//! ## Architecture
//!
//! Positions whose content swaps wholesale are modeled as dynamic fragments:
//! a placeholder block anchored in the host tree whose mounted content is
//! replaced in place when its controlling value changes.
//! ```text
//! getter → resolve (block | vnode bridge | name/def) → fragment.update → host tree
//! ```
//!
//! Template refs bind rendered output back to user code through a closed set
//! of targets (name, cell, callback), assigned after the post-render flush
//! and cleared exactly once on scope disposal.
//!
//! ## Modules
//!
//! - [`node`] - Host node arena (elements, text, anchors)
//! - [`block`] - The renderable unit (node, list, component, fragment)
//! - [`fragment`] - Dynamic fragments, the update boundary
//! - [`component`] - Definitions, instances, resolution, instantiation
//! - [`dynamic`] - Dynamic component positions driven by getters
//! - [`refs`] - Template ref binding
//! - [`scheduler`] - Post-flush callback queue
//! - [`hydration`] - Adopting pre-rendered markup
//! - [`vdom`] - Legacy virtual-DOM interop seam

pub mod block;
pub mod component;
pub mod dynamic;
pub mod error;
pub mod fragment;
pub mod hydration;
pub mod insertion;
pub mod node;
pub mod props;
pub mod refs;
pub mod scheduler;
pub mod vdom;

// Re-export commonly used items
pub use block::{Block, insert, remove};

pub use component::{
    AppContext, ComponentDef, ComponentFlags, ComponentInstance, DynamicValue, ResolvedComponent,
    create_component_with_fallback, current_instance, empty_context, pop_current_instance,
    push_current_instance, reset_instances, resolve_dynamic_component, with_scope_owner,
};

pub use dynamic::create_dynamic_component;

pub use error::{
    ErrorCode, ErrorHandler, RenderError, call_with_error_handling, clear_error_handler,
    set_error_handler,
};

pub use fragment::{DynamicFragment, FragmentKind, SourceKey};

pub use hydration::{
    advance_hydration_node, current_hydration_node, is_hydrating, reset_hydration,
    start_hydration, stop_hydration,
};

pub use insertion::{InsertionState, insertion_state, reset_insertion_state, set_insertion_state};

pub use node::{
    NodeId, NodeKind, children_of, create_anchor, create_element, create_text, insert_node,
    is_anchor, kind_of, next_sibling, parent_of, remove_node, reset_nodes, tag_of,
};

pub use props::{PropValue, RawProps, RawSlots, SlotFn};

pub use refs::{
    RefBinding, RefCallback, RefEl, RefSetter, RefTarget, RefValue, SharedRef,
    create_template_ref_setter, mark_managed_ref, reset_ref_state,
};

pub use scheduler::{flush_post_cbs, pending_post_cbs, queue_post_flush_cb, reset_scheduler};

pub use vdom::{
    VNode, VdomBridge, clear_vdom_bridge, is_interop_enabled, set_vdom_bridge, vdom_bridge,
};
