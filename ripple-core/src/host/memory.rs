//! In-Memory Host
//!
//! A [`HostAdapter`] backed by a plain node arena. It records every call it
//! receives as a [`HostOp`], which makes it the host of choice for tests and
//! for running components headless.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use super::{HostAdapter, HostHandle};
use crate::component::handler_key;
use crate::reactive::{Callback, Value};

/// One recorded adapter call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    CreateNode {
        node: HostHandle,
        tag: String,
    },
    CreateText {
        node: HostHandle,
        text: String,
    },
    PatchProperty {
        node: HostHandle,
        key: String,
        value: Option<serde_json::Value>,
    },
    Insert {
        node: HostHandle,
        parent: HostHandle,
        anchor: Option<HostHandle>,
        /// The node was attached before this call.
        moved: bool,
    },
    Remove {
        node: HostHandle,
    },
    SetText {
        node: HostHandle,
        text: String,
    },
}

#[derive(Debug)]
enum NodeKind {
    Element {
        tag: String,
        props: IndexMap<String, Value>,
    },
    Text(String),
}

#[derive(Debug)]
struct MemoryNode {
    kind: NodeKind,
    parent: Option<HostHandle>,
    children: Vec<HostHandle>,
}

/// An in-memory host tree with an operation log.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: HashMap<HostHandle, MemoryNode>,
    next_id: u64,
    ops: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, kind: NodeKind) -> HostHandle {
        let handle = HostHandle(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            handle,
            MemoryNode {
                kind,
                parent: None,
                children: Vec::new(),
            },
        );
        handle
    }

    /// Create a container element to render into. Not recorded.
    pub fn create_root(&mut self) -> HostHandle {
        self.alloc(NodeKind::Element {
            tag: "root".to_string(),
            props: IndexMap::new(),
        })
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Number of inserts that moved an already attached node.
    pub fn moves(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::Insert { moved: true, .. }))
            .count()
    }

    /// Number of inserts that attached a fresh node.
    pub fn inserts(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::Insert { moved: false, .. }))
            .count()
    }

    pub fn removals(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::Remove { .. }))
            .count()
    }

    pub fn property_patches(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::PatchProperty { .. }))
            .count()
    }

    pub fn parent(&self, node: HostHandle) -> Option<HostHandle> {
        self.nodes.get(&node).and_then(|n| n.parent)
    }

    pub fn children(&self, node: HostHandle) -> &[HostHandle] {
        self.nodes
            .get(&node)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn tag(&self, node: HostHandle) -> Option<&str> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn property(&self, node: HostHandle, key: &str) -> Option<&Value> {
        match &self.nodes.get(&node)?.kind {
            NodeKind::Element { props, .. } => props.get(key),
            NodeKind::Text(_) => None,
        }
    }

    /// Concatenated text of a node and its descendants.
    pub fn text(&self, node: HostHandle) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: HostHandle, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Serialise the children of `node` as HTML-like markup.
    ///
    /// Callback-valued properties are left out.
    pub fn inner_html(&self, node: HostHandle) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(*child, &mut out);
        }
        out
    }

    /// Serialise `node` itself as HTML-like markup.
    pub fn to_html(&self, node: HostHandle) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: HostHandle, out: &mut String) {
        let Some(n) = self.nodes.get(&node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { tag, props } => {
                out.push('<');
                out.push_str(tag);
                for (key, value) in props {
                    if matches!(value, Value::Func(_)) {
                        continue;
                    }
                    out.push_str(&format!(" {key}=\"{value}\""));
                }
                out.push('>');
                for child in &n.children {
                    self.write_html(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    /// The `on<Event>` callback registered on `node`, if any.
    pub fn handler(&self, node: HostHandle, event: &str) -> Option<Callback> {
        let name = handler_key(event);
        self.property(node, &name).and_then(Value::as_callback).cloned()
    }

    /// Invoke the `on<Event>` callback registered on `node`.
    ///
    /// Returns `false` when no handler is registered.
    pub fn dispatch(&self, node: HostHandle, event: &str, args: &[Value]) -> bool {
        match self.handler(node, event) {
            Some(handler) => {
                handler.call(args);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, node: HostHandle) -> bool {
        let Some(parent) = self.nodes.get_mut(&node).and_then(|n| n.parent.take()) else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|child| *child != node);
        }
        true
    }
}

impl HostAdapter for MemoryHost {
    fn create_node(&mut self, tag: &str) -> HostHandle {
        let node = self.alloc(NodeKind::Element {
            tag: tag.to_string(),
            props: IndexMap::new(),
        });
        self.ops.push(HostOp::CreateNode {
            node,
            tag: tag.to_string(),
        });
        node
    }

    fn create_text(&mut self, text: &str) -> HostHandle {
        let node = self.alloc(NodeKind::Text(text.to_string()));
        self.ops.push(HostOp::CreateText {
            node,
            text: text.to_string(),
        });
        node
    }

    fn patch_property(&mut self, node: HostHandle, key: &str, _old: Option<&Value>, new: Option<&Value>) {
        if let Some(MemoryNode {
            kind: NodeKind::Element { props, .. },
            ..
        }) = self.nodes.get_mut(&node)
        {
            match new {
                Some(value) => {
                    props.insert(key.to_string(), value.clone());
                }
                None => {
                    props.shift_remove(key);
                }
            }
        }
        self.ops.push(HostOp::PatchProperty {
            node,
            key: key.to_string(),
            value: new.map(Value::to_json),
        });
    }

    fn insert(&mut self, node: HostHandle, parent: HostHandle, anchor: Option<HostHandle>) {
        let moved = self.detach(node);

        if let Some(p) = self.nodes.get_mut(&parent) {
            let index = anchor
                .and_then(|a| p.children.iter().position(|child| *child == a))
                .unwrap_or(p.children.len());
            p.children.insert(index, node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = Some(parent);
        }

        self.ops.push(HostOp::Insert {
            node,
            parent,
            anchor,
            moved,
        });
    }

    fn remove(&mut self, node: HostHandle) {
        self.detach(node);
        self.ops.push(HostOp::Remove { node });
    }

    fn set_text_content(&mut self, node: HostHandle, text: &str) {
        let is_text = matches!(self.nodes.get(&node).map(|n| &n.kind), Some(NodeKind::Text(_)));

        if is_text {
            if let Some(n) = self.nodes.get_mut(&node) {
                n.kind = NodeKind::Text(text.to_string());
            }
        } else {
            let children = self
                .nodes
                .get_mut(&node)
                .map(|n| std::mem::take(&mut n.children))
                .unwrap_or_default();
            for child in children {
                if let Some(c) = self.nodes.get_mut(&child) {
                    c.parent = None;
                }
            }
            if !text.is_empty() {
                let child = self.alloc(NodeKind::Text(text.to_string()));
                if let Some(c) = self.nodes.get_mut(&child) {
                    c.parent = Some(node);
                }
                if let Some(n) = self.nodes.get_mut(&node) {
                    n.children.push(child);
                }
            }
        }

        self.ops.push(HostOp::SetText {
            node,
            text: text.to_string(),
        });
    }

    fn next_sibling(&self, node: HostHandle) -> Option<HostHandle> {
        let parent = self.nodes.get(&node)?.parent?;
        let siblings = &self.nodes.get(&parent)?.children;
        let index = siblings.iter().position(|child| *child == node)?;
        siblings.get(index + 1).copied()
    }
}
