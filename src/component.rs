//! Components - Definitions, instances, resolution, instantiation.
//!
//! A component definition is a named render function producing a [`Block`].
//! Resolution of a dynamic value to a definition honors the lexical scope the
//! template was authored in: the per-instance registry of the scope owner is
//! consulted before the shared application context. Unknown names degrade to
//! a literal element tag with a development-time warning.
//!
//! Instances are destroyed by scope disposal, never by content swaps; a
//! detached instance (a deactivated keep-alive child, for example) stays
//! mountable until its owning scope stops.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use bitflags::bitflags;
use spark_signals::on_scope_dispose;

use crate::block::Block;
use crate::node::create_element;
use crate::props::{RawProps, RawSlots};
use crate::refs::RefBinding;
use crate::vdom::VNode;

bitflags! {
    /// Structural facts about an instance, fixed at creation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ComponentFlags: u8 {
        /// Caches deactivated children's blocks for reuse.
        const KEEP_ALIVE = 1 << 0;
        /// Wraps a component that resolves asynchronously; its block is a
        /// dynamic fragment that swaps in the inner component.
        const ASYNC_WRAPPER = 1 << 1;
        /// Renders exactly one root node.
        const SINGLE_ROOT = 1 << 2;
        /// Created by a once-evaluated dynamic position.
        const ONCE = 1 << 3;
    }
}

/// A component definition: a name and a render function.
pub struct ComponentDef {
    name: String,
    render: Rc<dyn Fn(&Rc<ComponentInstance>) -> Block>,
}

impl ComponentDef {
    pub fn new(name: &str, render: impl Fn(&Rc<ComponentInstance>) -> Block + 'static) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            render: Rc::new(render),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Shared application context: the app-level component registry.
#[derive(Default)]
pub struct AppContext {
    components: RefCell<HashMap<String, Rc<ComponentDef>>>,
}

impl AppContext {
    pub fn register_component(&self, def: Rc<ComponentDef>) {
        self.components
            .borrow_mut()
            .insert(def.name().to_string(), def);
    }

    pub fn lookup_component(&self, name: &str) -> Option<Rc<ComponentDef>> {
        self.components.borrow().get(name).cloned()
    }
}

/// Context used when no app is mounted.
pub fn empty_context() -> Rc<AppContext> {
    Rc::new(AppContext::default())
}

thread_local! {
    static INSTANCE_ID: Cell<u64> = const { Cell::new(0) };

    /// Stack of instances being set up.
    static INSTANCE_STACK: RefCell<Vec<Rc<ComponentInstance>>> = const { RefCell::new(Vec::new()) };

    /// Render-scope override; `Some(None)` masks the stack entirely.
    static RENDER_OVERRIDE: RefCell<Option<Option<Rc<ComponentInstance>>>> =
        const { RefCell::new(None) };
}

/// A mounted component's runtime record.
pub struct ComponentInstance {
    id: u64,
    def: Option<Rc<ComponentDef>>,
    flags: ComponentFlags,
    block: RefCell<Option<Block>>,
    props: Option<RawProps>,
    slots: Option<RawSlots>,
    refs: RefCell<HashMap<String, RefBinding>>,
    /// Dev-only diagnostic mirror of string-named ref assignments.
    setup_state: RefCell<HashMap<String, RefBinding>>,
    is_unmounted: Cell<bool>,
    async_resolved: Cell<bool>,
    exposed: RefCell<Option<Rc<dyn Any>>>,
    /// Lexical component registry (where this template was authored).
    components: RefCell<HashMap<String, Rc<ComponentDef>>>,
    app_context: Rc<AppContext>,
    /// Deactivated children, keyed by `(type, key)`. Keep-alive only.
    cache: RefCell<HashMap<(String, Option<String>), Block>>,
    /// String ref keys claimed by another managed mechanism.
    claimed_ref_keys: RefCell<HashSet<String>>,
}

impl ComponentInstance {
    fn build(
        def: Option<Rc<ComponentDef>>,
        props: Option<RawProps>,
        slots: Option<RawSlots>,
        app_context: Rc<AppContext>,
        flags: ComponentFlags,
    ) -> Rc<Self> {
        let id = INSTANCE_ID.with(|cell| {
            let id = cell.get();
            cell.set(id + 1);
            id
        });
        Rc::new(Self {
            id,
            def,
            flags,
            block: RefCell::new(None),
            props,
            slots,
            refs: RefCell::new(HashMap::new()),
            setup_state: RefCell::new(HashMap::new()),
            is_unmounted: Cell::new(false),
            async_resolved: Cell::new(false),
            exposed: RefCell::new(None),
            components: RefCell::new(HashMap::new()),
            app_context,
            cache: RefCell::new(HashMap::new()),
            claimed_ref_keys: RefCell::new(HashSet::new()),
        })
    }

    pub fn new(
        def: Option<Rc<ComponentDef>>,
        app_context: Rc<AppContext>,
        flags: ComponentFlags,
    ) -> Rc<Self> {
        Self::build(def, None, None, app_context, flags)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn def(&self) -> Option<Rc<ComponentDef>> {
        self.def.clone()
    }

    pub fn block(&self) -> Option<Block> {
        self.block.borrow().clone()
    }

    pub fn set_block(&self, block: Block) {
        *self.block.borrow_mut() = Some(block);
    }

    pub fn props(&self) -> Option<RawProps> {
        self.props.clone()
    }

    pub fn slots(&self) -> Option<RawSlots> {
        self.slots.clone()
    }

    pub fn is_unmounted(&self) -> bool {
        self.is_unmounted.get()
    }

    pub fn mark_unmounted(&self) {
        self.is_unmounted.set(true);
    }

    pub fn is_keep_alive(&self) -> bool {
        self.flags.contains(ComponentFlags::KEEP_ALIVE)
    }

    pub fn is_async_wrapper(&self) -> bool {
        self.flags.contains(ComponentFlags::ASYNC_WRAPPER)
    }

    pub fn is_single_root(&self) -> bool {
        self.flags.contains(ComponentFlags::SINGLE_ROOT)
    }

    pub fn is_async_resolved(&self) -> bool {
        self.async_resolved.get()
    }

    pub fn mark_async_resolved(&self) {
        self.async_resolved.set(true);
    }

    /// Public surface offered to refs instead of the instance itself.
    pub fn expose(&self, exposed: Rc<dyn Any>) {
        *self.exposed.borrow_mut() = Some(exposed);
    }

    pub fn exposed(&self) -> Option<Rc<dyn Any>> {
        self.exposed.borrow().clone()
    }

    /// Register a definition in this instance's lexical scope.
    pub fn register_component(&self, def: Rc<ComponentDef>) {
        self.components
            .borrow_mut()
            .insert(def.name().to_string(), def);
    }

    pub fn app_context(&self) -> Rc<AppContext> {
        self.app_context.clone()
    }

    // --- refs map ---------------------------------------------------------

    pub fn get_ref(&self, name: &str) -> RefBinding {
        self.refs
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or(RefBinding::Empty)
    }

    pub fn set_ref_binding(&self, name: &str, binding: RefBinding) {
        self.refs
            .borrow_mut()
            .insert(name.to_string(), binding.clone());
        if cfg!(debug_assertions) {
            let mut mirror = self.setup_state.borrow_mut();
            if mirror.contains_key(name) {
                mirror.insert(name.to_string(), binding);
            }
        }
    }

    pub fn clear_ref(&self, name: &str) {
        self.set_ref_binding(name, RefBinding::Empty);
    }

    /// Declare a setup-state key eligible for dev mirroring.
    pub fn declare_setup_state(&self, name: &str) {
        self.setup_state
            .borrow_mut()
            .insert(name.to_string(), RefBinding::Empty);
    }

    pub fn setup_state_of(&self, name: &str) -> Option<RefBinding> {
        self.setup_state.borrow().get(name).cloned()
    }

    // --- ownership guard ---------------------------------------------------

    /// Claim a string ref key for another managed mechanism; the ref binder
    /// refuses to reassign claimed keys.
    pub fn claim_ref_key(&self, key: &str) {
        self.claimed_ref_keys.borrow_mut().insert(key.to_string());
    }

    pub fn is_ref_key_claimed(&self, key: &str) -> bool {
        self.claimed_ref_keys.borrow().contains(key)
    }

    // --- keep-alive cache ---------------------------------------------------

    /// Previously cached block for `(type, key)`, if any.
    pub fn get_cached_component(&self, vnode: &VNode) -> Option<Block> {
        self.cache
            .borrow()
            .get(&(vnode.type_name.clone(), vnode.key.clone()))
            .cloned()
    }

    pub fn cache_component(&self, vnode: &VNode, block: Block) {
        self.cache
            .borrow_mut()
            .insert((vnode.type_name.clone(), vnode.key.clone()), block);
    }
}

// =============================================================================
// Current instance
// =============================================================================

/// Instance whose template is currently rendering, if any.
pub fn current_instance() -> Option<Rc<ComponentInstance>> {
    RENDER_OVERRIDE.with(|slot| {
        if let Some(overridden) = slot.borrow().clone() {
            return overridden;
        }
        INSTANCE_STACK.with(|stack| stack.borrow().last().cloned())
    })
}

pub fn push_current_instance(instance: Rc<ComponentInstance>) {
    INSTANCE_STACK.with(|stack| stack.borrow_mut().push(instance));
}

pub fn pop_current_instance() {
    INSTANCE_STACK.with(|stack| {
        stack.borrow_mut().pop();
    });
}

/// Run `f` with the render-time lexical scope set to `owner`, masking
/// whatever instance is active when a getter re-runs.
pub fn with_scope_owner<R>(owner: Option<Rc<ComponentInstance>>, f: impl FnOnce() -> R) -> R {
    let previous = RENDER_OVERRIDE.with(|slot| slot.borrow_mut().replace(owner));
    let result = f();
    RENDER_OVERRIDE.with(|slot| *slot.borrow_mut() = previous);
    result
}

/// Reset instance bookkeeping (for testing).
pub fn reset_instances() {
    INSTANCE_STACK.with(|stack| stack.borrow_mut().clear());
    RENDER_OVERRIDE.with(|slot| *slot.borrow_mut() = None);
}

// =============================================================================
// Resolution
// =============================================================================

/// A value a dynamic position's getter can yield.
#[derive(Clone)]
pub enum DynamicValue {
    /// Already renderable; used verbatim (router/link integration).
    Block(Block),
    /// A legacy virtual node; mounted through the installed bridge.
    VNode(Rc<VNode>),
    /// A concrete definition.
    Def(Rc<ComponentDef>),
    /// A name resolved against the authoring scope.
    Name(String),
}

/// Outcome of resolving a dynamic value.
#[derive(Clone)]
pub enum ResolvedComponent {
    Def(Rc<ComponentDef>),
    /// Fallback: render the value as a literal element tag.
    Tag(String),
}

/// Resolve a dynamic value to a definition or a literal tag.
///
/// Lookup order: the current rendering instance's lexical registry, then its
/// application context. Unknown names warn in development builds and fall
/// back to a literal tag.
pub fn resolve_dynamic_component(value: &DynamicValue) -> ResolvedComponent {
    match value {
        DynamicValue::Def(def) => ResolvedComponent::Def(def.clone()),
        DynamicValue::Name(name) => {
            if let Some(instance) = current_instance() {
                if let Some(def) = instance.components.borrow().get(name).cloned() {
                    return ResolvedComponent::Def(def);
                }
                if let Some(def) = instance.app_context.lookup_component(name) {
                    return ResolvedComponent::Def(def);
                }
            }
            if cfg!(debug_assertions) {
                tracing::warn!("failed to resolve dynamic component `{name}`, rendering as element tag");
            }
            ResolvedComponent::Tag(name.clone())
        }
        // Blocks and vnodes never reach resolution; the resolver fast paths
        // consume them first.
        DynamicValue::Block(_) | DynamicValue::VNode(_) => {
            if cfg!(debug_assertions) {
                tracing::warn!("non-component value reached resolution, rendering placeholder tag");
            }
            ResolvedComponent::Tag("unknown".to_string())
        }
    }
}

// =============================================================================
// Instantiation
// =============================================================================

/// Instantiate a resolved definition, or mount a plain element for a tag
/// fallback. The instance is marked unmounted when the enclosing reactive
/// scope disposes.
pub fn create_component_with_fallback(
    resolved: ResolvedComponent,
    props: Option<RawProps>,
    slots: Option<RawSlots>,
    is_single_root: bool,
    once: bool,
    app_context: Rc<AppContext>,
) -> Block {
    let def = match resolved {
        ResolvedComponent::Def(def) => def,
        ResolvedComponent::Tag(tag) => return Block::Node(create_element(&tag)),
    };

    let mut flags = ComponentFlags::empty();
    if is_single_root {
        flags |= ComponentFlags::SINGLE_ROOT;
    }
    if once {
        flags |= ComponentFlags::ONCE;
    }

    let render = def.render.clone();
    let instance = ComponentInstance::build(Some(def), props, slots, app_context, flags);

    push_current_instance(instance.clone());
    let block = render(&instance);
    pop_current_instance();
    instance.set_block(block);

    let for_dispose = instance.clone();
    on_scope_dispose(move || for_dispose.mark_unmounted());

    Block::Component(instance)
}
