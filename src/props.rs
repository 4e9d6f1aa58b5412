//! Prop and slot payloads handed to component instantiation.
//!
//! Props support static values, signals, and getters; the reactive
//! connection is preserved by passing the wrapper through, not the extracted
//! value. Slots are named block-producing closures.

use std::collections::HashMap;
use std::rc::Rc;

use spark_signals::Signal;

use crate::block::Block;

/// A property value that can be static, a signal, or a getter.
#[derive(Clone)]
pub enum PropValue<T: Clone + PartialEq + 'static> {
    /// Static value (not reactive).
    Static(T),
    /// Reactive signal (changes propagate automatically).
    Signal(Signal<T>),
    /// Getter function (called each time the value is needed).
    Getter(Rc<dyn Fn() -> T>),
}

impl<T: Clone + PartialEq + 'static> PropValue<T> {
    /// Current value (for immediate reads).
    pub fn get(&self) -> T {
        match self {
            PropValue::Static(value) => value.clone(),
            PropValue::Signal(signal) => signal.get(),
            PropValue::Getter(getter) => getter(),
        }
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for PropValue<T> {
    fn default() -> Self {
        PropValue::Static(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> From<T> for PropValue<T> {
    fn from(value: T) -> Self {
        PropValue::Static(value)
    }
}

impl<T: Clone + PartialEq + 'static> From<Signal<T>> for PropValue<T> {
    fn from(signal: Signal<T>) -> Self {
        PropValue::Signal(signal)
    }
}

/// Raw props forwarded to instantiation, keyed by prop name.
pub type RawProps = Rc<HashMap<String, PropValue<String>>>;

/// A named slot: a closure producing the slotted block.
pub type SlotFn = Rc<dyn Fn() -> Block>;

/// Raw slots forwarded to instantiation, keyed by slot name.
pub type RawSlots = Rc<HashMap<String, SlotFn>>;
