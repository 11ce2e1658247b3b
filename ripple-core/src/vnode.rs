//! Virtual Nodes
//!
//! A [`VNode`] describes one piece of the desired host tree. Render functions
//! build a fresh tree on every render; the renderer diffs it against the
//! previous one and fills in the host handles as it goes.
//!
//! # Node kinds
//!
//! The kind is a closed sum type ([`VNodeKind`]), so the renderer matches on
//! it exhaustively. [`ShapeFlags`] are kept alongside as a compact summary of
//! kind and children shape for callers that want to test several facts at
//! once.
//!
//! # Sharing
//!
//! `VNode` is a cheap handle (`Rc`). Cloning it does not copy the node, so
//! the host handle recorded during mount is visible through every clone.
//! A node can appear more than once in a tree; each further mount works on
//! a fresh copy that takes its place in the parent's [`NodeList`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use indexmap::IndexMap;

use crate::component::{Component, ComponentInstance};
use crate::host::HostHandle;
use crate::reactive::{Object, Value};

/// Prop name reserved for the diff key. Never forwarded to the host.
pub const KEY_PROP: &str = "key";

bitflags! {
    /// Kind and children shape of a virtual node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ShapeFlags: u16 {
        const ELEMENT = 1 << 0;
        const STATEFUL_COMPONENT = 1 << 1;
        const TEXT = 1 << 2;
        const FRAGMENT = 1 << 3;
        const TEXT_CHILDREN = 1 << 4;
        const ARRAY_CHILDREN = 1 << 5;
        const SLOTS_CHILDREN = 1 << 6;
    }
}

/// Identity of a node among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
}

impl From<i64> for Key {
    fn from(key: i64) -> Self {
        Key::Int(key)
    }
}

impl From<i32> for Key {
    fn from(key: i32) -> Self {
        Key::Int(i64::from(key))
    }
}

impl From<usize> for Key {
    fn from(key: usize) -> Self {
        Key::Int(key as i64)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Key::Str(Rc::from(key))
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Key::Str(Rc::from(key))
    }
}

impl Key {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Int(n) => Some(Key::Int(*n)),
            Value::Str(s) => Some(Key::Str(Rc::clone(s))),
            other => Some(Key::Str(Rc::from(other.to_string()))),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(n) => write!(f, "{n}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

/// Ordered property map of a node.
#[derive(Clone, Default, PartialEq)]
pub struct Props(IndexMap<String, Value>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The diff key carried in the `key` prop, if any.
    pub fn key(&self) -> Option<Key> {
        self.0.get(KEY_PROP).and_then(Key::from_value)
    }

    /// Copy the props into a raw object, leaving out the diff key.
    pub fn to_object(&self) -> Object {
        self.0
            .iter()
            .filter(|(k, _)| k.as_str() != KEY_PROP)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A slot body: slot props in, nodes out.
pub type SlotFn = Rc<dyn Fn(&Object) -> Vec<VNode>>;

/// Named slots passed to a component.
#[derive(Clone, Default)]
pub struct Slots(IndexMap<String, SlotFn>);

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, slot: impl Fn(&Object) -> Vec<VNode> + 'static) -> Self {
        self.0.insert(name.into(), Rc::new(slot));
        self
    }

    pub fn get(&self, name: &str) -> Option<SlotFn> {
        self.0.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.keys()).finish()
    }
}

/// An ordered list of child nodes.
///
/// The renderer may swap an entry for a fresh copy when the same node is
/// mounted a second time, so the list sits behind a `RefCell`. Cloning
/// copies the list, not the nodes.
#[derive(Clone, Default)]
pub struct NodeList(RefCell<Vec<VNode>>);

impl NodeList {
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<VNode> {
        self.0.borrow().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<VNode> {
        self.0.borrow().clone()
    }

    /// Entry `index`, replaced by a fresh copy first if it is already
    /// mounted.
    pub(crate) fn claim(&self, index: usize) -> Option<VNode> {
        let mut nodes = self.0.borrow_mut();
        let node = nodes.get_mut(index)?;
        if node.is_mounted() {
            *node = node.fresh_copy();
        }
        Some(node.clone())
    }

    /// Every entry, claimed in order.
    pub(crate) fn claim_all(&self) -> Vec<VNode> {
        (0..self.len()).filter_map(|index| self.claim(index)).collect()
    }
}

impl From<Vec<VNode>> for NodeList {
    fn from(nodes: Vec<VNode>) -> Self {
        Self(RefCell::new(nodes))
    }
}

impl fmt::Debug for NodeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.borrow().iter()).finish()
    }
}

/// Children of a node.
#[derive(Clone, Debug, Default)]
pub enum Children {
    #[default]
    None,
    Text(Rc<str>),
    Nodes(NodeList),
    Slots(Slots),
}

impl Children {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Children::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&NodeList> {
        match self {
            Children::Nodes(nodes) => Some(nodes),
            _ => None,
        }
    }

    fn shape(&self) -> ShapeFlags {
        match self {
            Children::None => ShapeFlags::empty(),
            Children::Text(_) => ShapeFlags::TEXT_CHILDREN,
            Children::Nodes(_) => ShapeFlags::ARRAY_CHILDREN,
            Children::Slots(_) => ShapeFlags::SLOTS_CHILDREN,
        }
    }
}

impl From<&str> for Children {
    fn from(text: &str) -> Self {
        Children::Text(Rc::from(text))
    }
}

impl From<String> for Children {
    fn from(text: String) -> Self {
        Children::Text(Rc::from(text))
    }
}

impl From<Vec<VNode>> for Children {
    fn from(nodes: Vec<VNode>) -> Self {
        Children::Nodes(NodeList::from(nodes))
    }
}

impl From<Slots> for Children {
    fn from(slots: Slots) -> Self {
        Children::Slots(slots)
    }
}

impl From<()> for Children {
    fn from(_: ()) -> Self {
        Children::None
    }
}

/// What a node stands for.
#[derive(Clone)]
pub enum VNodeKind {
    /// A host element with the given tag.
    Element(Rc<str>),
    /// An instance of a component.
    Component(Component),
    /// A run of text. The text is stored as the node's text children.
    Text,
    /// A group of siblings with no host node of its own.
    Fragment,
}

impl VNodeKind {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (VNodeKind::Element(a), VNodeKind::Element(b)) => a == b,
            (VNodeKind::Component(a), VNodeKind::Component(b)) => a == b,
            (VNodeKind::Text, VNodeKind::Text) | (VNodeKind::Fragment, VNodeKind::Fragment) => true,
            _ => false,
        }
    }

    fn shape(&self) -> ShapeFlags {
        match self {
            VNodeKind::Element(_) => ShapeFlags::ELEMENT,
            VNodeKind::Component(_) => ShapeFlags::STATEFUL_COMPONENT,
            VNodeKind::Text => ShapeFlags::TEXT,
            VNodeKind::Fragment => ShapeFlags::FRAGMENT,
        }
    }
}

impl fmt::Debug for VNodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VNodeKind::Element(tag) => write!(f, "Element({tag})"),
            VNodeKind::Component(component) => write!(f, "Component({})", component.name()),
            VNodeKind::Text => f.write_str("Text"),
            VNodeKind::Fragment => f.write_str("Fragment"),
        }
    }
}

struct VNodeData {
    kind: VNodeKind,
    key: Option<Key>,
    props: Props,
    children: Children,
    shape: ShapeFlags,
    /// First host node. For fragments, the start anchor.
    el: Cell<Option<HostHandle>>,
    /// Fragment end anchor.
    anchor: Cell<Option<HostHandle>>,
    component: RefCell<Option<Rc<ComponentInstance>>>,
}

/// A node of the virtual tree.
#[derive(Clone)]
pub struct VNode(Rc<VNodeData>);

impl VNode {
    fn new(kind: VNodeKind, props: Props, children: Children) -> Self {
        let shape = kind.shape() | children.shape();
        Self(Rc::new(VNodeData {
            key: props.key(),
            kind,
            props,
            children,
            shape,
            el: Cell::new(None),
            anchor: Cell::new(None),
            component: RefCell::new(None),
        }))
    }

    /// A host element.
    pub fn element(tag: &str, props: Props, children: impl Into<Children>) -> Self {
        Self::new(VNodeKind::Element(Rc::from(tag)), props, children.into())
    }

    /// A component node. Pass [`Slots`] as children to fill named slots.
    pub fn component(component: &Component, props: Props, children: impl Into<Children>) -> Self {
        Self::new(VNodeKind::Component(component.clone()), props, children.into())
    }

    /// A text run.
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Self::new(VNodeKind::Text, Props::new(), Children::Text(text.into()))
    }

    /// A keyless fragment.
    pub fn fragment(children: Vec<VNode>) -> Self {
        Self::new(VNodeKind::Fragment, Props::new(), Children::from(children))
    }

    /// A fragment with a diff key.
    pub fn keyed_fragment(key: impl Into<Key>, children: Vec<VNode>) -> Self {
        let mut node = Self::fragment(children);
        if let Some(data) = Rc::get_mut(&mut node.0) {
            data.key = Some(key.into());
        }
        node
    }

    pub fn kind(&self) -> &VNodeKind {
        &self.0.kind
    }

    pub fn key(&self) -> Option<&Key> {
        self.0.key.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.0.props
    }

    pub fn children(&self) -> &Children {
        &self.0.children
    }

    pub fn shape_flags(&self) -> ShapeFlags {
        self.0.shape
    }

    /// Tag of an element node.
    pub fn tag(&self) -> Option<&str> {
        match &self.0.kind {
            VNodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }

    /// Text of a text node, or text children of an element.
    pub fn text_content(&self) -> Option<&str> {
        self.0.children.as_text()
    }

    /// Whether two nodes can be patched into each other: same kind, same key.
    pub fn same_kind(&self, other: &VNode) -> bool {
        self.0.kind.same(&other.0.kind) && self.0.key == other.0.key
    }

    /// First host node, once mounted.
    pub fn el(&self) -> Option<HostHandle> {
        self.0.el.get()
    }

    pub(crate) fn set_el(&self, el: Option<HostHandle>) {
        self.0.el.set(el);
    }

    /// End anchor of a mounted fragment.
    pub fn anchor(&self) -> Option<HostHandle> {
        self.0.anchor.get()
    }

    pub(crate) fn set_anchor(&self, anchor: Option<HostHandle>) {
        self.0.anchor.set(anchor);
    }

    /// Instance backing a mounted component node.
    pub fn component_instance(&self) -> Option<Rc<ComponentInstance>> {
        self.0.component.borrow().clone()
    }

    pub(crate) fn set_component_instance(&self, instance: Rc<ComponentInstance>) {
        *self.0.component.borrow_mut() = Some(instance);
    }

    pub(crate) fn clear_component_instance(&self) {
        let instance = self.0.component.borrow_mut().take();
        drop(instance);
    }

    /// Whether the node currently stands for host nodes or an instance.
    pub fn is_mounted(&self) -> bool {
        self.el().is_some() || self.0.component.borrow().is_some()
    }

    /// A copy with the same kind, key, props and children but no host
    /// state, so it can be mounted alongside the original.
    pub(crate) fn fresh_copy(&self) -> VNode {
        Self(Rc::new(VNodeData {
            kind: self.0.kind.clone(),
            key: self.0.key.clone(),
            props: self.0.props.clone(),
            children: self.0.children.clone(),
            shape: self.0.shape,
            el: Cell::new(None),
            anchor: Cell::new(None),
            component: RefCell::new(None),
        }))
    }

    /// The node itself, or a fresh copy if it is already mounted somewhere.
    pub(crate) fn claim(&self) -> VNode {
        if self.is_mounted() {
            self.fresh_copy()
        } else {
            self.clone()
        }
    }

    pub fn ptr_eq(&self, other: &VNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("VNode");
        s.field("kind", &self.0.kind);
        if let Some(key) = &self.0.key {
            s.field("key", key);
        }
        if !self.0.props.is_empty() {
            s.field("props", &self.0.props);
        }
        s.field("children", &self.0.children);
        if let Some(el) = self.0.el.get() {
            s.field("el", &el);
        }
        s.finish()
    }
}

/// Shorthand for [`VNode::element`].
pub fn h(tag: &str, props: Props, children: impl Into<Children>) -> VNode {
    VNode::element(tag, props, children)
}
