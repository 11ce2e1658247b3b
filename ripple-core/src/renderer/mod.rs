//! Renderer
//!
//! The renderer turns virtual trees into host mutations. [`Renderer::render`]
//! diffs a new tree against the one previously rendered into the same
//! container and applies the difference through the [`HostAdapter`].
//!
//! # Patch dispatch
//!
//! `patch(old, new)` first checks whether the two nodes are the same kind
//! (kind and key). If not, the old node is unmounted and the new one is
//! mounted where the old one was. Otherwise it dispatches on the new node's
//! kind:
//!
//! | kind      | mount                                  | update                               |
//! |-----------|----------------------------------------|--------------------------------------|
//! | Text      | create text node, insert               | relink, set text if changed          |
//! | Element   | create, props, children, insert        | diff props, diff children            |
//! | Fragment  | start/end anchors, children in between | diff children before the end anchor  |
//! | Component | create instance, setup, render effect  | re-render if props changed           |
//!
//! Children diffs between two node lists go through the keyed algorithm in
//! [`keyed`].
//!
//! # Ownership
//!
//! The host sits behind a `RefCell`. Every host call borrows it for the call
//! only, so user code (render functions, setup, event handlers) never runs
//! while the host is borrowed by the renderer. Callers must likewise not hold
//! [`Renderer::host`] across a flush.

mod component;
mod keyed;
pub mod sequence;

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::component::{Component, ComponentInstance, TemplateCompiler};
use crate::error::Result;
use crate::host::{HostAdapter, HostHandle};
use crate::vnode::{Children, NodeList, Props, VNode, VNodeKind, KEY_PROP};

struct Inner<H> {
    host: RefCell<H>,
    compiler: Option<Rc<dyn TemplateCompiler>>,
    /// Last tree rendered into each container.
    roots: RefCell<HashMap<HostHandle, VNode>>,
}

/// Renders virtual trees into a host. Cheap to clone.
pub struct Renderer<H: HostAdapter + 'static> {
    inner: Rc<Inner<H>>,
}

impl<H: HostAdapter + 'static> Clone for Renderer<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Shorthand for [`Renderer::new`].
pub fn create_renderer<H: HostAdapter + 'static>(host: H) -> Renderer<H> {
    Renderer::new(host)
}

impl<H: HostAdapter + 'static> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self::build(host, None)
    }

    /// A renderer that compiles template-only components with `compiler`.
    pub fn with_compiler(host: H, compiler: impl TemplateCompiler + 'static) -> Self {
        Self::build(host, Some(Rc::new(compiler)))
    }

    fn build(host: H, compiler: Option<Rc<dyn TemplateCompiler>>) -> Self {
        Self {
            inner: Rc::new(Inner {
                host: RefCell::new(host),
                compiler,
                roots: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn host(&self) -> Ref<'_, H> {
        self.inner.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.inner.host.borrow_mut()
    }

    /// Render `vnode` into `container`, patching whatever was rendered there
    /// before.
    pub fn render(&self, vnode: &VNode, container: HostHandle) -> Result<()> {
        let previous = self.inner.roots.borrow().get(&container).cloned();
        let vnode = match &previous {
            Some(previous) if previous.ptr_eq(vnode) => vnode.clone(),
            _ => vnode.claim(),
        };
        self.inner.patch(previous.as_ref(), &vnode, container, None, None)?;
        self.inner.roots.borrow_mut().insert(container, vnode);
        Ok(())
    }

    /// Unmount whatever was rendered into `container`.
    pub fn clear(&self, container: HostHandle) {
        let previous = self.inner.roots.borrow_mut().remove(&container);
        if let Some(previous) = previous {
            self.inner.unmount(&previous, true);
        }
    }

    /// The tree last rendered into `container`.
    pub fn root(&self, container: HostHandle) -> Option<VNode> {
        self.inner.roots.borrow().get(&container).cloned()
    }

    /// Patch `old` into `new` under `container`, inserting before `anchor`
    /// when something has to be mounted.
    pub fn patch(&self, old: Option<&VNode>, new: &VNode, container: HostHandle, anchor: Option<HostHandle>) -> Result<()> {
        self.inner.patch(old, new, container, anchor, None)
    }

    /// Tear down a mounted tree and remove its host nodes.
    pub fn unmount(&self, vnode: &VNode) {
        self.inner.unmount(vnode, true);
    }

    pub fn create_app(&self, root: Component) -> App<H> {
        App {
            renderer: self.clone(),
            root,
            props: Props::new(),
        }
    }
}

/// A root component bound to a renderer.
pub struct App<H: HostAdapter + 'static> {
    renderer: Renderer<H>,
    root: Component,
    props: Props,
}

impl<H: HostAdapter + 'static> App<H> {
    /// Props passed to the root component.
    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Mount the root component into `container` and return its vnode.
    pub fn mount(&self, container: HostHandle) -> Result<VNode> {
        let vnode = VNode::component(&self.root, self.props.clone(), ());
        self.renderer.render(&vnode, container)?;
        Ok(vnode)
    }

    pub fn renderer(&self) -> &Renderer<H> {
        &self.renderer
    }
}

impl<H: HostAdapter + 'static> Inner<H> {
    fn patch(
        self: &Rc<Self>,
        old: Option<&VNode>,
        new: &VNode,
        container: HostHandle,
        anchor: Option<HostHandle>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Result<()> {
        let mut anchor = anchor;
        let old = match old {
            Some(old) if old.ptr_eq(new) => return Ok(()),
            Some(old) if !old.same_kind(new) => {
                anchor = self.next_host_node(old);
                self.unmount(old, true);
                None
            }
            other => other,
        };

        match new.kind() {
            VNodeKind::Text => {
                self.process_text(old, new, container, anchor);
                Ok(())
            }
            VNodeKind::Fragment => self.process_fragment(old, new, container, anchor, parent),
            VNodeKind::Element(tag) => match old {
                Some(old) => self.patch_element(old, new, parent),
                None => self.mount_element(tag, new, container, anchor, parent),
            },
            VNodeKind::Component(component) => {
                self.process_component(old, new, component, container, anchor, parent)
            }
        }
    }

    fn process_text(&self, old: Option<&VNode>, new: &VNode, container: HostHandle, anchor: Option<HostHandle>) {
        let text = new.text_content().unwrap_or_default();
        match old.and_then(|old| old.el().map(|el| (old, el))) {
            Some((old, el)) => {
                new.set_el(Some(el));
                if old.text_content() != Some(text) {
                    self.host.borrow_mut().set_text_content(el, text);
                }
            }
            None => {
                let el = self.host.borrow_mut().create_text(text);
                new.set_el(Some(el));
                self.host.borrow_mut().insert(el, container, anchor);
            }
        }
    }

    fn process_fragment(
        self: &Rc<Self>,
        old: Option<&VNode>,
        new: &VNode,
        container: HostHandle,
        anchor: Option<HostHandle>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Result<()> {
        if let Some(old) = old {
            new.set_el(old.el());
            new.set_anchor(old.anchor());
            return self.patch_children(old, new, container, new.anchor(), parent);
        }

        let (start, end) = {
            let mut host = self.host.borrow_mut();
            let start = host.create_text("");
            let end = host.create_text("");
            host.insert(start, container, anchor);
            host.insert(end, container, anchor);
            (start, end)
        };
        new.set_el(Some(start));
        new.set_anchor(Some(end));

        match new.children() {
            Children::Nodes(children) => self.mount_children(children, container, Some(end), parent),
            _ => Ok(()),
        }
    }

    fn mount_element(
        self: &Rc<Self>,
        tag: &str,
        vnode: &VNode,
        container: HostHandle,
        anchor: Option<HostHandle>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Result<()> {
        let el = self.host.borrow_mut().create_node(tag);
        vnode.set_el(Some(el));

        match vnode.children() {
            Children::Text(text) => self.host.borrow_mut().set_text_content(el, text),
            Children::Nodes(children) => self.mount_children(children, el, None, parent)?,
            Children::None | Children::Slots(_) => {}
        }

        for (key, value) in vnode.props().iter() {
            if key == KEY_PROP {
                continue;
            }
            self.host.borrow_mut().patch_property(el, key, None, Some(value));
        }

        self.host.borrow_mut().insert(el, container, anchor);
        Ok(())
    }

    fn patch_element(self: &Rc<Self>, old: &VNode, new: &VNode, parent: Option<&Rc<ComponentInstance>>) -> Result<()> {
        let Some(el) = old.el() else {
            // Never mounted: nothing to patch against.
            return Ok(());
        };
        new.set_el(Some(el));

        self.patch_props(el, old.props(), new.props());
        self.patch_children(old, new, el, None, parent)
    }

    fn patch_props(&self, el: HostHandle, old: &Props, new: &Props) {
        for (key, next) in new.iter() {
            if key == KEY_PROP {
                continue;
            }
            let prev = old.get(key);
            if prev != Some(next) {
                self.host.borrow_mut().patch_property(el, key, prev, Some(next));
            }
        }

        for (key, prev) in old.iter() {
            if key != KEY_PROP && !new.contains_key(key) {
                self.host.borrow_mut().patch_property(el, key, Some(prev), None);
            }
        }
    }

    fn patch_children(
        self: &Rc<Self>,
        old: &VNode,
        new: &VNode,
        container: HostHandle,
        anchor: Option<HostHandle>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Result<()> {
        match (old.children(), new.children()) {
            (prev, Children::Text(text)) => {
                if let Children::Nodes(prev_nodes) = prev {
                    self.unmount_children(prev_nodes);
                }
                if prev.as_text() != Some(&**text) {
                    self.host.borrow_mut().set_text_content(container, text);
                }
                Ok(())
            }
            (Children::Nodes(prev), Children::Nodes(next)) => {
                self.patch_keyed_children(&prev.to_vec(), next, container, anchor, parent)
            }
            (prev, Children::Nodes(next)) => {
                if prev.as_text().is_some() {
                    self.host.borrow_mut().set_text_content(container, "");
                }
                self.mount_children(next, container, anchor, parent)
            }
            (prev, Children::None | Children::Slots(_)) => {
                match prev {
                    Children::Nodes(prev_nodes) => self.unmount_children(prev_nodes),
                    Children::Text(_) => self.host.borrow_mut().set_text_content(container, ""),
                    Children::None | Children::Slots(_) => {}
                }
                Ok(())
            }
        }
    }

    /// Mount every child in order. A child that is already mounted, such as
    /// a node used twice in one tree, is swapped for a fresh copy first.
    fn mount_children(
        self: &Rc<Self>,
        children: &NodeList,
        container: HostHandle,
        anchor: Option<HostHandle>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Result<()> {
        for index in 0..children.len() {
            if let Some(child) = children.claim(index) {
                self.patch(None, &child, container, anchor, parent)?;
            }
        }
        Ok(())
    }

    fn unmount_children(&self, children: &NodeList) {
        for child in children.to_vec() {
            self.unmount(&child, true);
        }
    }

    /// Tear down `vnode`. With `remove`, its host nodes are detached too;
    /// without, an ancestor's removal is expected to take them along.
    fn unmount(&self, vnode: &VNode, remove: bool) {
        match vnode.kind() {
            VNodeKind::Component(_) => self.unmount_component(vnode, remove),
            VNodeKind::Fragment => {
                if let Children::Nodes(children) = vnode.children() {
                    for child in children.to_vec() {
                        self.unmount(&child, remove);
                    }
                }
                if remove {
                    let mut host = self.host.borrow_mut();
                    for handle in [vnode.el(), vnode.anchor()].into_iter().flatten() {
                        host.remove(handle);
                    }
                }
            }
            VNodeKind::Element(_) => {
                if let Children::Nodes(children) = vnode.children() {
                    for child in children.to_vec() {
                        self.unmount(&child, false);
                    }
                }
                if remove {
                    if let Some(el) = vnode.el() {
                        self.host.borrow_mut().remove(el);
                    }
                }
            }
            VNodeKind::Text => {
                if remove {
                    if let Some(el) = vnode.el() {
                        self.host.borrow_mut().remove(el);
                    }
                }
            }
        }
    }

    /// Move every host node of `vnode` before `anchor`.
    fn move_node(&self, vnode: &VNode, container: HostHandle, anchor: Option<HostHandle>) {
        match vnode.kind() {
            VNodeKind::Component(_) => {
                let subtree = vnode.component_instance().and_then(|instance| instance.subtree());
                if let Some(subtree) = subtree {
                    self.move_node(&subtree, container, anchor);
                }
            }
            VNodeKind::Fragment => {
                if let Some(start) = vnode.el() {
                    self.host.borrow_mut().insert(start, container, anchor);
                }
                if let Children::Nodes(children) = vnode.children() {
                    for child in children.to_vec() {
                        self.move_node(&child, container, anchor);
                    }
                }
                if let Some(end) = vnode.anchor() {
                    self.host.borrow_mut().insert(end, container, anchor);
                }
            }
            VNodeKind::Element(_) | VNodeKind::Text => {
                if let Some(el) = vnode.el() {
                    self.host.borrow_mut().insert(el, container, anchor);
                }
            }
        }
    }

    /// The host node right after everything `vnode` rendered.
    fn next_host_node(&self, vnode: &VNode) -> Option<HostHandle> {
        match vnode.kind() {
            VNodeKind::Component(_) => vnode
                .component_instance()
                .and_then(|instance| instance.subtree())
                .and_then(|subtree| self.next_host_node(&subtree)),
            VNodeKind::Fragment => vnode.anchor().and_then(|end| self.host.borrow().next_sibling(end)),
            VNodeKind::Element(_) | VNodeKind::Text => {
                vnode.el().and_then(|el| self.host.borrow().next_sibling(el))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostOp, MemoryHost};
    use crate::vnode::h;

    fn setup() -> (Renderer<MemoryHost>, HostHandle) {
        let renderer = Renderer::new(MemoryHost::new());
        let root = renderer.host_mut().create_root();
        (renderer, root)
    }

    #[test]
    fn mounts_elements_with_props_and_text() {
        let (renderer, root) = setup();
        renderer
            .render(&h("div", Props::new().with("id", "app").with("key", 1), "hello"), root)
            .unwrap();

        assert_eq!(renderer.host().inner_html(root), "<div id=\"app\">hello</div>");
        assert!(!renderer
            .host()
            .ops()
            .iter()
            .any(|op| matches!(op, HostOp::PatchProperty { key, .. } if key == "key")));
    }

    #[test]
    fn equal_props_cause_no_property_patches() {
        let (renderer, root) = setup();
        let props = || Props::new().with("id", "a").with("class", "b");
        renderer.render(&h("div", props(), "x"), root).unwrap();
        renderer.host_mut().clear_ops();

        renderer.render(&h("div", props(), "x"), root).unwrap();
        assert_eq!(renderer.host().property_patches(), 0);
        assert!(renderer.host().ops().is_empty());
    }

    #[test]
    fn changed_and_removed_props_are_patched() {
        let (renderer, root) = setup();
        renderer
            .render(&h("div", Props::new().with("id", "a").with("title", "t"), ()), root)
            .unwrap();
        renderer.host_mut().clear_ops();

        renderer
            .render(&h("div", Props::new().with("id", "b").with("lang", "en"), ()), root)
            .unwrap();

        let host = renderer.host();
        assert_eq!(host.property_patches(), 3);
        let el = host.children(root)[0];
        assert_eq!(host.property(el, "id"), Some(&crate::reactive::Value::from("b")));
        assert_eq!(host.property(el, "title"), None);
    }

    #[test]
    fn text_children_switch_to_nodes_and_back() {
        let (renderer, root) = setup();
        renderer.render(&h("p", Props::new(), "plain"), root).unwrap();

        renderer
            .render(&h("p", Props::new(), vec![h("b", Props::new(), "bold")]), root)
            .unwrap();
        assert_eq!(renderer.host().inner_html(root), "<p><b>bold</b></p>");

        renderer.render(&h("p", Props::new(), "plain again"), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), "<p>plain again</p>");
    }

    #[test]
    fn unchanged_text_is_not_rewritten() {
        let (renderer, root) = setup();
        renderer.render(&VNode::fragment(vec![VNode::text("same")]), root).unwrap();
        renderer.host_mut().clear_ops();

        renderer.render(&VNode::fragment(vec![VNode::text("same")]), root).unwrap();
        assert!(renderer.host().ops().is_empty());

        renderer.render(&VNode::fragment(vec![VNode::text("new")]), root).unwrap();
        assert_eq!(renderer.host().ops().len(), 1);
        assert_eq!(renderer.host().text(root), "new");
    }

    #[test]
    fn kind_change_replaces_in_place() {
        let (renderer, root) = setup();
        let list = |middle: VNode| {
            h(
                "ul",
                Props::new(),
                vec![h("li", Props::new(), "a"), middle, h("li", Props::new(), "c")],
            )
        };

        renderer.render(&list(h("li", Props::new(), "b")), root).unwrap();
        renderer.render(&list(h("span", Props::new(), "b")), root).unwrap();

        assert_eq!(
            renderer.host().inner_html(root),
            "<ul><li>a</li><span>b</span><li>c</li></ul>"
        );
    }

    #[test]
    fn fragments_stay_between_their_anchors() {
        let (renderer, root) = setup();
        let tree = |items: &[&str]| {
            h(
                "div",
                Props::new(),
                vec![
                    VNode::fragment(items.iter().map(|i| h("i", Props::new().with("key", *i), *i)).collect()),
                    h("hr", Props::new(), ()),
                ],
            )
        };

        renderer.render(&tree(&["a"]), root).unwrap();
        renderer.render(&tree(&["a", "b"]), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), "<div><i>a</i><i>b</i><hr></hr></div>");

        renderer.render(&tree(&[]), root).unwrap();
        assert_eq!(renderer.host().inner_html(root), "<div><hr></hr></div>");
    }

    #[test]
    fn clear_removes_the_root() {
        let (renderer, root) = setup();
        renderer.render(&h("div", Props::new(), "x"), root).unwrap();
        renderer.clear(root);

        assert_eq!(renderer.host().inner_html(root), "");
        assert!(renderer.root(root).is_none());
    }
}
