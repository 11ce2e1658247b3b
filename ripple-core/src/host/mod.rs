//! Host Adapter
//!
//! The renderer never touches a real tree. Every mutation goes through a
//! [`HostAdapter`], which owns the host nodes and hands out opaque
//! [`HostHandle`]s for them.
//!
//! Anchor semantics throughout are "insert before this node, or append when
//! there is no anchor".

pub mod memory;

use serde::Serialize;

use crate::reactive::Value;

pub use memory::{HostOp, MemoryHost};

/// Opaque identifier of a host node, allocated by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HostHandle(u64);

impl HostHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for HostHandle {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Operations the renderer needs from a host tree.
pub trait HostAdapter {
    /// Create a detached element.
    fn create_node(&mut self, tag: &str) -> HostHandle;

    /// Create a detached text node.
    fn create_text(&mut self, text: &str) -> HostHandle;

    /// Apply one property change. `new` is `None` when the property was removed.
    fn patch_property(&mut self, node: HostHandle, key: &str, old: Option<&Value>, new: Option<&Value>);

    /// Insert `node` into `parent` before `anchor`, moving it if it is
    /// already attached somewhere.
    fn insert(&mut self, node: HostHandle, parent: HostHandle, anchor: Option<HostHandle>);

    /// Detach `node` from its parent.
    fn remove(&mut self, node: HostHandle);

    /// Replace the text of a text node, or every child of an element.
    fn set_text_content(&mut self, node: HostHandle, text: &str);

    /// The node after `node` under the same parent.
    fn next_sibling(&self, node: HostHandle) -> Option<HostHandle>;
}
