//! Legacy virtual-DOM bridge.
//!
//! Dynamic values can be nodes produced by a legacy virtual-DOM renderer.
//! This core never interprets them; an installed [`VdomBridge`] mounts (or
//! adopts, under hydration) the node tree and hands back a block it owns.
//! Interop is enabled exactly when a bridge is installed.

use std::cell::RefCell;
use std::rc::Rc;

use crate::block::Block;
use crate::component::ComponentInstance;

/// A legacy virtual node, identified by type name and optional key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VNode {
    pub type_name: String,
    pub key: Option<String>,
}

impl VNode {
    pub fn new(type_name: &str, key: Option<&str>) -> Rc<Self> {
        Rc::new(Self {
            type_name: type_name.to_string(),
            key: key.map(str::to_string),
        })
    }
}

/// The legacy renderer's side of the interop seam.
pub trait VdomBridge {
    /// Mount (or adopt) a legacy node tree under `owner`, returning a block
    /// the bridge owns.
    fn mount_vnode(&self, vnode: &VNode, owner: Option<Rc<ComponentInstance>>) -> Block;

    /// Hydrate a previously returned block against pre-rendered markup.
    fn hydrate(&self, block: &Block);
}

thread_local! {
    static BRIDGE: RefCell<Option<Rc<dyn VdomBridge>>> = const { RefCell::new(None) };
}

/// Install the legacy bridge, enabling interop.
pub fn set_vdom_bridge(bridge: Rc<dyn VdomBridge>) {
    BRIDGE.with(|slot| *slot.borrow_mut() = Some(bridge));
}

/// Remove the bridge, disabling interop (for testing).
pub fn clear_vdom_bridge() {
    BRIDGE.with(|slot| *slot.borrow_mut() = None);
}

/// Currently installed bridge.
pub fn vdom_bridge() -> Option<Rc<dyn VdomBridge>> {
    BRIDGE.with(|slot| slot.borrow().clone())
}

/// Whether legacy interop is enabled.
pub fn is_interop_enabled() -> bool {
    BRIDGE.with(|slot| slot.borrow().is_some())
}
