//! Template refs - Binding rendered output to user-held references.
//!
//! A template position that declares a ref gets bound once per render pass.
//! The target is a closed variant - a name in the owning instance's refs map,
//! a user-held cell, or a callback - each carrying its own assign/clear
//! behavior behind a single dispatch point.
//!
//! Assignment and clearing of name/cell targets are deferred to the
//! post-flush queue so observers always see a fully-settled tree; callback
//! targets are invoked immediately, routed through the centralized error
//! handler. When the bound position is a dynamic fragment, a re-apply
//! callback registered on the fragment (replaced, never duplicated) recomputes
//! the binding against whatever content the fragment swaps in.
//!
//! Every rendered target has at most one teardown function, replaced on
//! re-bind and run exactly once when the owning reactive scope disposes;
//! entries are removed proactively rather than left to garbage collection.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use spark_signals::{Signal, on_scope_dispose, signal};

use crate::block::Block;
use crate::component::{ComponentInstance, current_instance};
use crate::error::{ErrorCode, call_with_error_handling};
use crate::fragment::{DynamicFragment, FragmentKind};
use crate::node::NodeId;
use crate::scheduler::queue_post_flush_cb;

// =============================================================================
// Ref values and bindings
// =============================================================================

/// The concrete value a ref resolves to. Compares by identity.
#[derive(Clone)]
pub enum RefValue {
    /// A host element.
    Node(NodeId),
    /// A component instance with nothing exposed.
    Instance(Rc<ComponentInstance>),
    /// A component's exposed public surface.
    Exposed(Rc<dyn Any>),
}

impl PartialEq for RefValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RefValue::Node(a), RefValue::Node(b)) => a == b,
            (RefValue::Instance(a), RefValue::Instance(b)) => Rc::ptr_eq(a, b),
            (RefValue::Exposed(a), RefValue::Exposed(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for RefValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefValue::Node(id) => write!(f, "RefValue::Node({id})"),
            RefValue::Instance(instance) => write!(f, "RefValue::Instance(#{})", instance.id()),
            RefValue::Exposed(_) => write!(f, "RefValue::Exposed(..)"),
        }
    }
}

/// What a ref target currently holds.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum RefBinding {
    #[default]
    Empty,
    Value(RefValue),
    /// Ref-for regions accumulate one value per list item, unique by
    /// identity, removed by value.
    List(Vec<RefValue>),
}

// =============================================================================
// Ref targets
// =============================================================================

thread_local! {
    static SHARED_REF_ID: Cell<u64> = const { Cell::new(0) };

    /// Cells claimed by another managed mechanism; the binder refuses to
    /// reassign them.
    static KNOWN_MANAGED_REFS: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
}

/// A user-held mutable ref cell, observable through the signal graph.
#[derive(Clone)]
pub struct SharedRef {
    id: u64,
    value: Signal<RefBinding>,
}

impl SharedRef {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let id = SHARED_REF_ID.with(|cell| {
            let id = cell.get();
            cell.set(id + 1);
            id
        });
        Self {
            id,
            value: signal(RefBinding::Empty),
        }
    }

    pub fn get(&self) -> RefBinding {
        self.value.get()
    }

    pub fn set(&self, binding: RefBinding) {
        self.value.set(binding);
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for SharedRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Claim `cell` for another managed mechanism.
pub fn mark_managed_ref(cell: &SharedRef) {
    KNOWN_MANAGED_REFS.with(|set| {
        set.borrow_mut().insert(cell.id());
    });
}

fn can_set_cell(cell: &SharedRef) -> bool {
    KNOWN_MANAGED_REFS.with(|set| !set.borrow().contains(&cell.id()))
}

/// Callback-style ref target.
pub type RefCallback = Rc<dyn Fn(Option<RefValue>)>;

/// A user-specified ref target. Closed variant; each case carries its own
/// assign/clear behavior.
#[derive(Clone)]
pub enum RefTarget {
    /// A name in the owning instance's refs map.
    Name(String),
    /// A user-held cell.
    Cell(SharedRef),
    /// A callback invoked with the resolved value (or `None` on clear).
    Callback(RefCallback),
}

impl PartialEq for RefTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RefTarget::Name(a), RefTarget::Name(b)) => a == b,
            (RefTarget::Cell(a), RefTarget::Cell(b)) => a == b,
            (RefTarget::Callback(a), RefTarget::Callback(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for RefTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefTarget::Name(name) => write!(f, "RefTarget::Name({name:?})"),
            RefTarget::Cell(cell) => write!(f, "RefTarget::Cell(#{})", cell.id()),
            RefTarget::Callback(_) => write!(f, "RefTarget::Callback(..)"),
        }
    }
}

// =============================================================================
// Ref elements
// =============================================================================

/// A rendered value a ref can be declared on.
#[derive(Clone)]
pub enum RefEl {
    Node(NodeId),
    Component(Rc<ComponentInstance>),
    Fragment(Rc<DynamicFragment>),
}

/// Identity key for per-target state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum RefElKey {
    Node(NodeId),
    Component(u64),
    Fragment(u64),
}

impl RefEl {
    fn key(&self) -> RefElKey {
        match self {
            RefEl::Node(id) => RefElKey::Node(*id),
            RefEl::Component(instance) => RefElKey::Component(instance.id()),
            RefEl::Fragment(fragment) => RefElKey::Fragment(fragment.id()),
        }
    }
}

// =============================================================================
// Cleanup records
// =============================================================================

type CleanupSlot = Rc<RefCell<Box<dyn FnMut()>>>;

thread_local! {
    /// One teardown per rendered target, keyed by identity. Entries are
    /// removed (and run) on scope disposal, never left behind.
    static REF_CLEANUPS: RefCell<HashMap<RefElKey, CleanupSlot>> = RefCell::new(HashMap::new());
}

fn ensure_cleanup(key: RefElKey) -> CleanupSlot {
    let existing = REF_CLEANUPS.with(|map| map.borrow().get(&key).cloned());
    if let Some(slot) = existing {
        return slot;
    }
    let slot: CleanupSlot = Rc::new(RefCell::new(Box::new(|| {})));
    REF_CLEANUPS.with(|map| {
        map.borrow_mut().insert(key.clone(), slot.clone());
    });
    on_scope_dispose(move || {
        let slot = REF_CLEANUPS.with(|map| map.borrow_mut().remove(&key));
        if let Some(slot) = slot {
            (slot.borrow_mut())();
        }
    });
    slot
}

/// Run the current teardown for `key` without unregistering it; the next
/// bind replaces the function. Used when a ref-for position re-binds through
/// a dynamic fragment and must drop only its own previous contribution.
fn run_cleanup(key: &RefElKey) {
    let slot = REF_CLEANUPS.with(|map| map.borrow().get(key).cloned());
    if let Some(slot) = slot {
        (slot.borrow_mut())();
    }
}

/// Reset binder state (for testing).
pub fn reset_ref_state() {
    REF_CLEANUPS.with(|map| map.borrow_mut().clear());
    KNOWN_MANAGED_REFS.with(|set| set.borrow_mut().clear());
}

// =============================================================================
// The setter
// =============================================================================

/// Per-render-pass ref setter bound to the instance whose template declares
/// the refs. Created once per component setup.
pub struct RefSetter {
    instance: Option<Rc<ComponentInstance>>,
    old_refs: Rc<RefCell<HashMap<RefElKey, RefTarget>>>,
    /// Dynamic fragment id -> currently registered re-apply callback id.
    reapply: Rc<RefCell<HashMap<u64, u64>>>,
}

/// Create a ref setter bound to the current instance.
pub fn create_template_ref_setter() -> RefSetter {
    RefSetter {
        instance: current_instance(),
        old_refs: Rc::new(RefCell::new(HashMap::new())),
        reapply: Rc::new(RefCell::new(HashMap::new())),
    }
}

impl RefSetter {
    /// Bind `target` to the rendered value `el`. Returns the previously
    /// applied target for this position, if any.
    pub fn set(
        &self,
        el: &RefEl,
        target: RefTarget,
        ref_for: bool,
        ref_key: Option<&str>,
    ) -> Option<RefTarget> {
        // Dynamic content: re-apply whenever the fragment swaps, so the ref
        // tracks the new concrete content. The registration is replaced, not
        // duplicated, when the same position re-binds.
        if let Some(fragment) = reapply_fragment(el) {
            let previous = self.reapply.borrow().get(&fragment.id()).copied();
            if let Some(callback_id) = previous {
                fragment.remove_on_updated(callback_id);
            }

            let instance = self.instance.clone();
            let old_refs = self.old_refs.clone();
            let el = el.clone();
            let target = target.clone();
            let key = el.key();
            let ref_key = ref_key.map(str::to_string);
            let do_set: Rc<dyn Fn()> = Rc::new(move || {
                let old = old_refs.borrow().get(&key).cloned();
                let applied = set_ref(
                    instance.as_ref(),
                    &el,
                    &target,
                    old,
                    ref_for,
                    ref_key.as_deref(),
                );
                record_applied(&old_refs, &key, applied);
            });
            let callback_id = fragment.add_on_updated(do_set);
            self.reapply.borrow_mut().insert(fragment.id(), callback_id);
        }

        let key = el.key();
        let previous = self.old_refs.borrow().get(&key).cloned();
        let applied = set_ref(
            self.instance.as_ref(),
            el,
            &target,
            previous.clone(),
            ref_for,
            ref_key,
        );
        record_applied(&self.old_refs, &key, applied);
        previous
    }
}

fn record_applied(
    old_refs: &Rc<RefCell<HashMap<RefElKey, RefTarget>>>,
    key: &RefElKey,
    applied: Option<RefTarget>,
) {
    match applied {
        Some(target) => {
            old_refs.borrow_mut().insert(key.clone(), target);
        }
        None => {
            old_refs.borrow_mut().remove(key);
        }
    }
}

/// The fragment whose updates must re-apply this binding: the position
/// itself when it is a dynamic fragment, or the inner fragment of an
/// unresolved async wrapper.
fn reapply_fragment(el: &RefEl) -> Option<Rc<DynamicFragment>> {
    match el {
        RefEl::Fragment(fragment) if fragment.kind() == FragmentKind::Dynamic => {
            Some(fragment.clone())
        }
        RefEl::Component(instance) if instance.is_async_wrapper() => match instance.block() {
            Some(Block::Fragment(fragment)) => Some(fragment),
            _ => None,
        },
        _ => None,
    }
}

// =============================================================================
// Core binding logic
// =============================================================================

fn set_ref(
    instance: Option<&Rc<ComponentInstance>>,
    el: &RefEl,
    target: &RefTarget,
    old: Option<RefTarget>,
    ref_for: bool,
    ref_key: Option<&str>,
) -> Option<RefTarget> {
    let instance = instance?.clone();
    if instance.is_unmounted() {
        // Expected consequence of async unmount ordering; not a warning.
        return None;
    }

    let el = match el {
        RefEl::Component(wrapper) if wrapper.is_async_wrapper() => {
            if !wrapper.is_async_resolved() {
                // Unresolved: the fragment's update hook re-applies later.
                return None;
            }
            // Resolved: bind to the inner component.
            match wrapper.block() {
                Some(Block::Fragment(fragment)) => match fragment.nodes() {
                    Some(Block::Component(inner)) => RefEl::Component(inner),
                    _ => return None,
                },
                _ => return None,
            }
        }
        other => other.clone(),
    };

    let ref_value = get_ref_value(&el);
    let is_dynamic_fragment =
        matches!(&el, RefEl::Fragment(fragment) if fragment.kind() == FragmentKind::Dynamic);

    if let Some(old) = &old {
        if old != target {
            // Target changed: unset the previous one first.
            match old {
                RefTarget::Name(name) => instance.clear_ref(name),
                RefTarget::Cell(cell) => {
                    if can_set_cell(cell) {
                        cell.set(RefBinding::Empty);
                    }
                }
                RefTarget::Callback(callback) if is_dynamic_fragment => {
                    invoke_callback(callback, None);
                }
                RefTarget::Callback(_) => {}
            }
        } else if is_dynamic_fragment {
            match old {
                // Pre-clear before re-resolving against the new content.
                RefTarget::Callback(callback) => invoke_callback(callback, None),
                // Ref-for through a swapped fragment: drop only this
                // position's previous contribution.
                _ if ref_for => run_cleanup(&el.key()),
                _ => {}
            }
        }
    }

    match target {
        RefTarget::Callback(callback) => {
            invoke_callback(callback, ref_value);
            let callback = callback.clone();
            let slot = ensure_cleanup(el.key());
            *slot.borrow_mut() = Box::new(move || invoke_callback(&callback, None));
        }
        RefTarget::Name(_) | RefTarget::Cell(_) => {
            // Deferred so refs settle only after the whole pass is stable.
            let assign = {
                let instance = instance.clone();
                let target = target.clone();
                let value = ref_value.clone();
                let ref_key = ref_key.map(str::to_string);
                move || apply_binding(&instance, &target, value, ref_for, ref_key.as_deref())
            };
            queue_post_flush_cb(assign, -1);

            let slot = ensure_cleanup(el.key());
            let target = target.clone();
            let ref_key = ref_key.map(str::to_string);
            // Same queue and priority as assignment, so clears interleave
            // with other pending assignments in submission order.
            *slot.borrow_mut() = Box::new(move || {
                let instance = instance.clone();
                let target = target.clone();
                let value = ref_value.clone();
                let ref_key = ref_key.clone();
                queue_post_flush_cb(
                    move || clear_binding(&instance, &target, value, ref_for, ref_key.as_deref()),
                    -1,
                );
            });
        }
    }

    Some(target.clone())
}

/// Resolve the concrete value a ref assignment offers.
///
/// Components offer their exposed surface (or the instance); a teleport
/// boundary offers nothing (refs must not point into a relocated subtree's
/// placeholder); a fragment still holding a node list offers nothing;
/// otherwise recurse into the fragment's current content.
fn get_ref_value(el: &RefEl) -> Option<RefValue> {
    match el {
        RefEl::Node(id) => Some(RefValue::Node(*id)),
        RefEl::Component(instance) => Some(match instance.exposed() {
            Some(exposed) => RefValue::Exposed(exposed),
            None => RefValue::Instance(instance.clone()),
        }),
        RefEl::Fragment(fragment) => {
            if fragment.kind() == FragmentKind::Teleport {
                return None;
            }
            match fragment.nodes()? {
                Block::Multiple(_) => None,
                Block::Node(id) => Some(RefValue::Node(id)),
                Block::Component(instance) => get_ref_value(&RefEl::Component(instance)),
                Block::Fragment(inner) => get_ref_value(&RefEl::Fragment(inner)),
            }
        }
    }
}

fn invoke_callback(callback: &RefCallback, value: Option<RefValue>) {
    let callback = callback.clone();
    call_with_error_handling(move || callback(value), ErrorCode::FunctionRef);
}

fn append_unique(current: RefBinding, value: RefValue) -> RefBinding {
    match current {
        RefBinding::List(mut list) => {
            if !list.contains(&value) {
                list.push(value);
            }
            RefBinding::List(list)
        }
        // A stale scalar (or empty slot) is replaced by a fresh list.
        _ => RefBinding::List(vec![value]),
    }
}

fn apply_binding(
    instance: &Rc<ComponentInstance>,
    target: &RefTarget,
    value: Option<RefValue>,
    ref_for: bool,
    ref_key: Option<&str>,
) {
    if ref_for {
        let Some(value) = value else { return };
        match target {
            RefTarget::Name(name) => {
                let next = append_unique(instance.get_ref(name), value);
                instance.set_ref_binding(name, next);
            }
            RefTarget::Cell(cell) => {
                let claimed = ref_key.is_some_and(|key| instance.is_ref_key_claimed(key));
                if can_set_cell(cell) && !claimed {
                    let next = append_unique(cell.get(), value);
                    cell.set(next.clone());
                    if let Some(key) = ref_key {
                        instance.set_ref_binding(key, next);
                    }
                } else if cfg!(debug_assertions) {
                    tracing::warn!("skipped assignment to a ref cell claimed by another mechanism");
                }
            }
            RefTarget::Callback(_) => {}
        }
    } else {
        let binding = value.map(RefBinding::Value).unwrap_or(RefBinding::Empty);
        match target {
            RefTarget::Name(name) => instance.set_ref_binding(name, binding),
            RefTarget::Cell(cell) => {
                let claimed = ref_key.is_some_and(|key| instance.is_ref_key_claimed(key));
                if can_set_cell(cell) && !claimed {
                    cell.set(binding.clone());
                } else if cfg!(debug_assertions) {
                    tracing::warn!("skipped assignment to a ref cell claimed by another mechanism");
                }
                if let Some(key) = ref_key {
                    instance.set_ref_binding(key, binding);
                }
            }
            RefTarget::Callback(_) => {}
        }
    }
}

fn clear_binding(
    instance: &Rc<ComponentInstance>,
    target: &RefTarget,
    value: Option<RefValue>,
    ref_for: bool,
    ref_key: Option<&str>,
) {
    if ref_for {
        let Some(value) = value else { return };
        match target {
            RefTarget::Name(name) => match instance.get_ref(name) {
                RefBinding::List(mut list) => {
                    list.retain(|held| held != &value);
                    instance.set_ref_binding(name, RefBinding::List(list));
                }
                _ => instance.clear_ref(name),
            },
            RefTarget::Cell(cell) => {
                if can_set_cell(cell) {
                    let next = match cell.get() {
                        RefBinding::List(mut list) => {
                            list.retain(|held| held != &value);
                            RefBinding::List(list)
                        }
                        _ => RefBinding::Empty,
                    };
                    cell.set(next.clone());
                    if let Some(key) = ref_key {
                        instance.set_ref_binding(key, next);
                    }
                }
            }
            RefTarget::Callback(_) => {}
        }
    } else {
        match target {
            RefTarget::Name(name) => instance.clear_ref(name),
            RefTarget::Cell(cell) => {
                if can_set_cell(cell) {
                    cell.set(RefBinding::Empty);
                }
                if let Some(key) = ref_key {
                    instance.clear_ref(key);
                }
            }
            RefTarget::Callback(_) => {}
        }
    }
}
