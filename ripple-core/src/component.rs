//! Components
//!
//! A [`Component`] is an immutable definition: a name plus any of a setup
//! function, a render function and a template. Mounting a component node
//! creates a [`ComponentInstance`] that owns the per-mount state: props,
//! setup state, slots, provided values and the last rendered subtree.
//!
//! # Resolving the render function
//!
//! In order of precedence:
//!
//! 1. `setup` returning [`SetupResult::Render`]
//! 2. the definition's `render`
//! 3. the definition's `template`, compiled by the renderer's
//!    [`TemplateCompiler`]
//!
//! A component with none of these fails to mount with
//! [`RuntimeError::MissingRender`].
//!
//! # Provide / inject
//!
//! Each instance owns a map of the values it provides. `inject` looks the
//! key up in the parent's map, then the grandparent's, and so on. A child
//! providing a key therefore shadows it for its own descendants without
//! touching any ancestor's map.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::{CompileError, Result, RuntimeError};
use crate::host::HostHandle;
use crate::reactive::{
    proxy_refs, shallow_readonly, untrack, Effect, Object, ProxyRefs, Reactive, Value,
};
use crate::scheduler::Job;
use crate::vnode::{Children, Slots, VNode};

/// Builds a component's virtual tree.
pub type RenderFn = Rc<dyn Fn(&RenderContext) -> VNode>;

type SetupFn = Rc<dyn Fn(&Reactive, &SetupContext) -> SetupResult>;

/// Turns a template into a render function.
///
/// The renderer holds at most one compiler and uses it for components that
/// only declare a template.
pub trait TemplateCompiler {
    fn compile(&self, template: &str) -> std::result::Result<RenderFn, CompileError>;
}

/// What a setup function hands back.
pub enum SetupResult {
    /// Use this as the render function.
    Render(RenderFn),
    /// Expose these bindings to the render function. Refs inside unwrap on
    /// access.
    State(Object),
    Empty,
}

impl SetupResult {
    pub fn render(render: impl Fn(&RenderContext) -> VNode + 'static) -> Self {
        SetupResult::Render(Rc::new(render))
    }
}

impl From<Object> for SetupResult {
    fn from(state: Object) -> Self {
        SetupResult::State(state)
    }
}

impl From<()> for SetupResult {
    fn from(_: ()) -> Self {
        SetupResult::Empty
    }
}

struct ComponentDef {
    name: String,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
    template: Option<String>,
}

/// A component definition. Cheap to clone; equality is identity.
#[derive(Clone)]
pub struct Component(Rc<ComponentDef>);

impl Component {
    pub fn builder(name: impl Into<String>) -> ComponentBuilder {
        ComponentBuilder {
            name: name.into(),
            setup: None,
            render: None,
            template: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn template(&self) -> Option<&str> {
        self.0.template.as_deref()
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.0.name)
            .field("setup", &self.0.setup.is_some())
            .field("render", &self.0.render.is_some())
            .field("template", &self.0.template)
            .finish()
    }
}

pub struct ComponentBuilder {
    name: String,
    setup: Option<SetupFn>,
    render: Option<RenderFn>,
    template: Option<String>,
}

impl ComponentBuilder {
    /// `setup(props, ctx)` runs once per mount, untracked.
    pub fn setup<R: Into<SetupResult>>(mut self, setup: impl Fn(&Reactive, &SetupContext) -> R + 'static) -> Self {
        self.setup = Some(Rc::new(move |props, ctx| setup(props, ctx).into()));
        self
    }

    pub fn render(mut self, render: impl Fn(&RenderContext) -> VNode + 'static) -> Self {
        self.render = Some(Rc::new(render));
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn build(self) -> Component {
        Component(Rc::new(ComponentDef {
            name: self.name,
            setup: self.setup,
            render: self.render,
            template: self.template,
        }))
    }
}

thread_local! {
    static CURRENT_INSTANCE: RefCell<Vec<Rc<ComponentInstance>>> = const { RefCell::new(Vec::new()) };
    static NEXT_UID: Cell<u64> = const { Cell::new(0) };
}

struct CurrentInstanceGuard;

impl CurrentInstanceGuard {
    fn enter(instance: Rc<ComponentInstance>) -> Self {
        CURRENT_INSTANCE.with(|stack| stack.borrow_mut().push(instance));
        Self
    }
}

impl Drop for CurrentInstanceGuard {
    fn drop(&mut self) {
        CURRENT_INSTANCE.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The instance whose setup function is running, if any.
pub fn current_instance() -> Option<Rc<ComponentInstance>> {
    CURRENT_INSTANCE.with(|stack| stack.borrow().last().cloned())
}

/// Provide a value to descendants of the component being set up.
pub fn provide(key: &str, value: impl Into<Value>) {
    match current_instance() {
        Some(instance) => instance.provide(key, value),
        None => tracing::warn!(target: "ripple::component", key, "provide() called outside of setup"),
    }
}

/// Look up a value provided by an ancestor of the component being set up.
pub fn inject(key: &str) -> Option<Value> {
    match current_instance() {
        Some(instance) => instance.inject(key),
        None => {
            tracing::warn!(target: "ripple::component", key, "inject() called outside of setup");
            None
        }
    }
}

/// Like [`inject`], falling back to `default` when nothing is provided.
pub fn inject_or(key: &str, default: impl Into<Value>) -> Value {
    inject(key).unwrap_or_else(|| default.into())
}

/// Event handler prop for an emitted event: `my-event` -> `onMyEvent`.
pub fn handler_key(event: &str) -> String {
    let mut out = String::with_capacity(event.len() + 2);
    out.push_str("on");
    let mut upper = true;
    for c in event.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Second argument of a setup function.
pub struct SetupContext {
    instance: Weak<ComponentInstance>,
}

impl SetupContext {
    /// Call the parent's handler for `event`, if it passed one.
    pub fn emit(&self, event: &str, args: &[Value]) {
        if let Some(instance) = self.instance.upgrade() {
            instance.emit(event, args);
        }
    }

    pub fn slots(&self) -> Slots {
        self.instance
            .upgrade()
            .map(|instance| instance.slots())
            .unwrap_or_default()
    }
}

/// Per-mount state of a component.
pub struct ComponentInstance {
    uid: u64,
    component: Component,
    vnode: RefCell<VNode>,
    /// Incoming vnode of a parent-forced update.
    pub(crate) next: RefCell<Option<VNode>>,
    props: Object,
    props_view: Reactive,
    slots: RefCell<Slots>,
    setup_state: RefCell<ProxyRefs>,
    render: RefCell<Option<RenderFn>>,
    parent: Option<Weak<ComponentInstance>>,
    provides: RefCell<IndexMap<String, Value>>,
    pub(crate) subtree: RefCell<Option<VNode>>,
    pub(crate) is_mounted: Cell<bool>,
    pub(crate) is_unmounted: Cell<bool>,
    pub(crate) update: RefCell<Option<Effect<Result<()>>>>,
    pub(crate) job: RefCell<Option<Job>>,
    /// Host parent the subtree was mounted into.
    pub(crate) container: Cell<Option<HostHandle>>,
}

fn slots_of(vnode: &VNode) -> Slots {
    match vnode.children() {
        Children::Slots(slots) => slots.clone(),
        _ => Slots::new(),
    }
}

impl ComponentInstance {
    pub(crate) fn new(vnode: &VNode, component: Component, parent: Option<&Rc<ComponentInstance>>) -> Rc<Self> {
        let uid = NEXT_UID.with(|next| {
            let uid = next.get();
            next.set(uid + 1);
            uid
        });
        let props = vnode.props().to_object();

        Rc::new(Self {
            uid,
            component,
            vnode: RefCell::new(vnode.clone()),
            next: RefCell::new(None),
            props_view: shallow_readonly(&props),
            props,
            slots: RefCell::new(slots_of(vnode)),
            setup_state: RefCell::new(proxy_refs(&Object::new())),
            render: RefCell::new(None),
            parent: parent.map(Rc::downgrade),
            provides: RefCell::new(IndexMap::new()),
            subtree: RefCell::new(None),
            is_mounted: Cell::new(false),
            is_unmounted: Cell::new(false),
            update: RefCell::new(None),
            job: RefCell::new(None),
            container: Cell::new(None),
        })
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn vnode(&self) -> VNode {
        self.vnode.borrow().clone()
    }

    /// Read-only view of the current props.
    pub fn props(&self) -> Reactive {
        self.props_view.clone()
    }

    pub fn slots(&self) -> Slots {
        self.slots.borrow().clone()
    }

    pub fn parent(&self) -> Option<Rc<ComponentInstance>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Last rendered subtree.
    pub fn subtree(&self) -> Option<VNode> {
        self.subtree.borrow().clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.is_mounted.get()
    }

    pub fn is_unmounted(&self) -> bool {
        self.is_unmounted.get()
    }

    /// First host node of the rendered subtree.
    pub fn el(&self) -> Option<HostHandle> {
        self.vnode.borrow().el()
    }

    pub fn provide(&self, key: &str, value: impl Into<Value>) {
        self.provides.borrow_mut().insert(key.to_string(), value.into());
    }

    /// Look `key` up in the provides of the ancestors, nearest first.
    pub fn inject(&self, key: &str) -> Option<Value> {
        let mut ancestor = self.parent();
        while let Some(instance) = ancestor {
            if let Some(value) = instance.provides.borrow().get(key) {
                return Some(value.clone());
            }
            ancestor = instance.parent();
        }
        None
    }

    /// Call the `on<Event>` callback prop for `event`, if present.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let key = handler_key(event);
        match self.props.get(&key) {
            Some(Value::Func(handler)) => {
                handler.call(args);
            }
            _ => tracing::trace!(target: "ripple::component", component = self.name(), event, "no handler for emitted event"),
        }
    }

    /// Run setup and resolve the render function.
    pub(crate) fn setup(self: &Rc<Self>, compiler: Option<&dyn TemplateCompiler>) -> Result<()> {
        let def = Rc::clone(&self.component.0);

        if let Some(setup) = &def.setup {
            let ctx = SetupContext {
                instance: Rc::downgrade(self),
            };
            let result = {
                let _current = CurrentInstanceGuard::enter(Rc::clone(self));
                untrack(|| setup(&self.props_view, &ctx))
            };
            match result {
                SetupResult::Render(render) => *self.render.borrow_mut() = Some(render),
                SetupResult::State(state) => *self.setup_state.borrow_mut() = proxy_refs(&state),
                SetupResult::Empty => {}
            }
        }

        if self.render.borrow().is_some() {
            return Ok(());
        }

        let render = match (&def.render, &def.template, compiler) {
            (Some(render), _, _) => Rc::clone(render),
            (None, Some(template), Some(compiler)) => {
                compiler
                    .compile(template)
                    .map_err(|source| RuntimeError::Compile {
                        component: def.name.clone(),
                        source,
                    })?
            }
            _ => {
                return Err(RuntimeError::MissingRender {
                    component: def.name.clone(),
                })
            }
        };
        *self.render.borrow_mut() = Some(render);
        Ok(())
    }

    /// Run the render function. Reads are tracked by whatever is running.
    pub(crate) fn render_subtree(self: &Rc<Self>) -> Result<VNode> {
        let render = self.render.borrow().clone();
        let render = render.ok_or_else(|| RuntimeError::MissingRender {
            component: self.name().to_string(),
        })?;
        Ok(render(&RenderContext {
            instance: Rc::clone(self),
        }))
    }

    /// Adopt the vnode of a parent-forced update before re-rendering.
    pub(crate) fn apply_next(&self, next: VNode) {
        next.set_el(self.vnode.borrow().el());
        self.props.replace_all(next.props().to_object().entries());
        *self.slots.borrow_mut() = slots_of(&next);
        *self.vnode.borrow_mut() = next;
    }

    pub(crate) fn relink(&self, vnode: VNode) {
        *self.vnode.borrow_mut() = vnode;
    }

    /// Let go of everything an unmounted instance still holds, including the
    /// vnode that points back at it.
    pub(crate) fn release(&self) {
        let subtree = self.subtree.borrow_mut().take();
        let update = self.update.borrow_mut().take();
        let job = self.job.borrow_mut().take();
        let next = self.next.borrow_mut().take();
        let render = self.render.borrow_mut().take();
        let state = std::mem::replace(&mut *self.setup_state.borrow_mut(), proxy_refs(&Object::new()));
        self.vnode.borrow().clear_component_instance();
        drop((subtree, update, job, next, render, state));
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("uid", &self.uid)
            .field("name", &self.name())
            .field("props", &self.props)
            .field("is_mounted", &self.is_mounted.get())
            .field("is_unmounted", &self.is_unmounted.get())
            .finish()
    }
}

/// Argument of a render function.
///
/// Name lookups check setup state first, then props.
pub struct RenderContext {
    instance: Rc<ComponentInstance>,
}

impl RenderContext {
    pub fn instance(&self) -> &Rc<ComponentInstance> {
        &self.instance
    }

    /// Read a binding. Refs in setup state unwrap; props read through the
    /// read-only view.
    pub fn get(&self, key: &str) -> Value {
        let state = self.instance.setup_state.borrow().clone();
        if state.contains_key(key) {
            return state.get(key);
        }
        if self.instance.props.contains_key(key) {
            return self.instance.props_view.get(key);
        }
        Value::Null
    }

    /// Write a setup-state binding. Props cannot be written.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        if self.instance.props.contains_key(key) && !self.instance.setup_state.borrow().contains_key(key) {
            tracing::warn!(target: "ripple::component", key, "props are read-only");
            return;
        }
        let state = self.instance.setup_state.borrow().clone();
        state.set(key, value);
    }

    pub fn props(&self) -> Reactive {
        self.instance.props()
    }

    pub fn slots(&self) -> Slots {
        self.instance.slots()
    }

    /// First host node of the component, once mounted.
    pub fn el(&self) -> Option<HostHandle> {
        self.instance.el()
    }

    pub fn emit(&self, event: &str, args: &[Value]) {
        self.instance.emit(event, args);
    }

    /// Render a named slot into a fragment. Missing slots render empty.
    pub fn render_slot(&self, name: &str, slot_props: &Object) -> VNode {
        let slot = self.instance.slots.borrow().get(name);
        match slot {
            Some(slot) => VNode::fragment(slot(slot_props)),
            None => VNode::fragment(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::{h, Props};

    #[test]
    fn handler_key_camelizes_and_capitalizes() {
        assert_eq!(handler_key("add"), "onAdd");
        assert_eq!(handler_key("add-foo"), "onAddFoo");
        assert_eq!(handler_key("update-model-value"), "onUpdateModelValue");
    }

    #[test]
    fn setup_render_takes_precedence() {
        let component = Component::builder("Both")
            .setup(|_, _| SetupResult::render(|_| VNode::text("from setup")))
            .render(|_| VNode::text("from render"))
            .build();
        let vnode = VNode::component(&component, Props::new(), ());
        let instance = ComponentInstance::new(&vnode, component, None);

        instance.setup(None).unwrap();
        let tree = instance.render_subtree().unwrap();
        assert_eq!(tree.text_content(), Some("from setup"));
    }

    #[test]
    fn missing_render_is_an_error() {
        let component = Component::builder("Empty").build();
        let vnode = VNode::component(&component, Props::new(), ());
        let instance = ComponentInstance::new(&vnode, component, None);

        let err = instance.setup(None).unwrap_err();
        assert!(matches!(err, RuntimeError::MissingRender { ref component } if component == "Empty"));
    }

    #[test]
    fn template_is_compiled_when_nothing_else_renders() {
        struct Echo;
        impl TemplateCompiler for Echo {
            fn compile(&self, template: &str) -> std::result::Result<RenderFn, CompileError> {
                if template.starts_with('<') {
                    return Err(CompileError::new("markup is not supported"));
                }
                let text = template.to_string();
                Ok(Rc::new(move |_: &RenderContext| VNode::text(text.as_str())))
            }
        }

        let ok = Component::builder("Echo").template("hi").build();
        let instance = ComponentInstance::new(&VNode::component(&ok, Props::new(), ()), ok, None);
        instance.setup(Some(&Echo)).unwrap();
        assert_eq!(instance.render_subtree().unwrap().text_content(), Some("hi"));

        let bad = Component::builder("Bad").template("<div>").build();
        let instance = ComponentInstance::new(&VNode::component(&bad, Props::new(), ()), bad, None);
        let err = instance.setup(Some(&Echo)).unwrap_err();
        assert!(matches!(err, RuntimeError::Compile { ref component, .. } if component == "Bad"));
    }

    #[test]
    fn render_context_reads_state_then_props() {
        let component = Component::builder("Greeting")
            .setup(|_, _| Object::new().with("greeting", crate::reactive::Ref::new("hello")))
            .render(|ctx| h("p", Props::new(), format!("{} {}", ctx.get("greeting"), ctx.get("name"))))
            .build();
        let vnode = VNode::component(&component, Props::new().with("name", "ada"), ());
        let instance = ComponentInstance::new(&vnode, component, None);
        instance.setup(None).unwrap();

        let tree = instance.render_subtree().unwrap();
        assert_eq!(tree.text_content(), Some("hello ada"));
    }

    #[test]
    fn emit_calls_the_matching_handler_prop() {
        use std::cell::Cell;

        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        let on_add = Value::func(move |args| {
            s.set(args.iter().filter_map(Value::as_int).sum());
            Value::Null
        });

        let component = Component::builder("Adder")
            .setup(|_, ctx| {
                ctx.emit("add-one", &[Value::Int(1), Value::Int(4)]);
            })
            .render(|_| VNode::text(""))
            .build();
        let vnode = VNode::component(&component, Props::new().with("onAddOne", on_add), ());
        let instance = ComponentInstance::new(&vnode, component, None);
        instance.setup(None).unwrap();

        assert_eq!(seen.get(), 5);
    }
}
