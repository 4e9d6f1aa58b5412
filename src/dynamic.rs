//! Dynamic components - A reactive position whose component identity changes.
//!
//! [`create_dynamic_component`] wires a getter to a [`DynamicFragment`]: each
//! reactive re-evaluation resolves the getter's value and swaps the mounted
//! content in place. Three shapes come back from a getter:
//!
//! - an already-renderable [`Block`], used verbatim (router/link integration),
//! - a legacy virtual node, mounted through the installed bridge and cached
//!   on an enclosing keep-alive container,
//! - a definition or a name, resolved against the creation-time lexical
//!   scope and instantiated (unknown names degrade to a literal element tag).
//!
//! The lexical scope is captured once at creation; getter re-runs triggered
//! from arbitrary reactive contexts still resolve names against the scope
//! the template was authored in.

use std::rc::Rc;

use spark_signals::effect;

use crate::block::{self, Block};
use crate::component::{
    AppContext, ComponentInstance, DynamicValue, create_component_with_fallback, current_instance,
    empty_context, resolve_dynamic_component, with_scope_owner,
};
use crate::fragment::{DynamicFragment, SourceKey};
use crate::hydration::{self, advance_hydration_node};
use crate::insertion::{insertion_state, reset_insertion_state};
use crate::props::{RawProps, RawSlots};
use crate::vdom::{VNode, vdom_bridge};

/// Create a dynamic component position driven by `getter`.
///
/// The returned fragment is mounted at the captured insertion state (or
/// adopted in place under hydration). With `once` set the getter is
/// evaluated a single time and never tracked.
pub fn create_dynamic_component(
    getter: impl Fn() -> DynamicValue + 'static,
    props: Option<RawProps>,
    slots: Option<RawSlots>,
    is_single_root: bool,
    once: bool,
) -> Rc<DynamicFragment> {
    // Capture before resetting: nested creations inside the render must not
    // inherit this position.
    let saved_state = insertion_state();
    if !hydration::is_hydrating() {
        reset_insertion_state();
    }

    let frag = DynamicFragment::new("dynamic-component");
    let scope_owner = current_instance();
    let app_context = scope_owner
        .as_ref()
        .map(|instance| instance.app_context())
        .unwrap_or_else(empty_context);

    let render = {
        let frag = frag.clone();
        move || {
            let value = getter();
            let source = source_key(&value);
            let owner = scope_owner.clone();
            let app_context = app_context.clone();
            let props = props.clone();
            let slots = slots.clone();
            frag.update(
                move || produce_block(value, owner, app_context, props, slots, is_single_root, once),
                source,
            );
        }
    };

    if once {
        render();
    } else {
        // The effect lives with the enclosing scope; the stop handle is not
        // needed because scope disposal is the sole cancellation mechanism.
        let _effect_cleanup = effect(render);
    }

    if let Some(state) = saved_state {
        if hydration::is_hydrating() {
            if state.is_last {
                advance_hydration_node(state.parent);
            }
        } else {
            block::insert(&Block::Fragment(frag.clone()), state.parent, state.anchor);
        }
    }

    frag
}

/// Update identity of a dynamic value: resolvable shapes get a key so an
/// unchanged value skips re-instantiation; raw blocks always re-render.
fn source_key(value: &DynamicValue) -> Option<SourceKey> {
    match value {
        DynamicValue::Name(name) => Some(SourceKey::Str(name.clone())),
        DynamicValue::Def(def) => Some(SourceKey::Ptr(Rc::as_ptr(def) as *const () as usize)),
        DynamicValue::VNode(vnode) => Some(SourceKey::Str(format!(
            "vnode:{}:{}",
            vnode.type_name,
            vnode.key.as_deref().unwrap_or("")
        ))),
        DynamicValue::Block(_) => None,
    }
}

fn produce_block(
    value: DynamicValue,
    owner: Option<Rc<ComponentInstance>>,
    app_context: Rc<AppContext>,
    props: Option<RawProps>,
    slots: Option<RawSlots>,
    is_single_root: bool,
    once: bool,
) -> Block {
    if let DynamicValue::Block(block) = value {
        return block;
    }

    if let DynamicValue::VNode(vnode) = &value {
        if let Some(bridge) = vdom_bridge() {
            return mount_legacy_vnode(vnode.as_ref(), &*bridge, owner);
        }
        // No bridge installed: fall through to resolution, which warns and
        // renders a placeholder tag.
    }

    // Hydration adopts the pre-rendered node at the cursor instead of
    // instantiating a fresh tree. Vnode values took the bridge path above:
    // the bridge block hydrates itself.
    if hydration::is_hydrating() {
        if let Some(adopted) = hydration::current_hydration_node() {
            return Block::Node(adopted);
        }
    }

    with_scope_owner(owner, || {
        let resolved = resolve_dynamic_component(&value);
        create_component_with_fallback(resolved, props, slots, is_single_root, once, app_context)
    })
}

/// Mount a legacy vnode through the bridge, reusing (and populating) the
/// enclosing keep-alive container's cache. Cached blocks were detached, not
/// destroyed, so they mount again as-is.
fn mount_legacy_vnode(
    vnode: &VNode,
    bridge: &dyn crate::vdom::VdomBridge,
    owner: Option<Rc<ComponentInstance>>,
) -> Block {
    let keep_alive = owner
        .as_ref()
        .filter(|instance| instance.is_keep_alive())
        .cloned();

    if let Some(container) = &keep_alive {
        if let Some(cached) = container.get_cached_component(vnode) {
            return cached;
        }
    }

    let block = bridge.mount_vnode(vnode, owner);
    if hydration::is_hydrating() {
        bridge.hydrate(&block);
    }
    if let Some(container) = &keep_alive {
        container.cache_component(vnode, block.clone());
    }
    block
}
