//! Boxed References
//!
//! A [`Ref`] is a single reactive slot. It carries its own dependency set
//! instead of living in the dependency map, but subscribes and notifies
//! effects exactly like an observed object's key does.
//!
//! A ref remembers the raw value it was given next to the value it hands
//! out. When the raw value is an object the handed-out value is its reactive
//! wrapper, and change detection always compares against the raw value so
//! that re-assigning the same object is not mistaken for a change.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::object::{reactive, Reactive};
use super::runtime::Dep;
use super::value::{has_changed, Object, Value};

struct RefData {
    raw: RefCell<Value>,
    value: RefCell<Value>,
    dep: Dep,
}

/// A reactive single-value cell.
///
/// ```rust,ignore
/// let count = Ref::new(1);
/// let c = count.clone();
/// let _e = effect(move || println!("{}", c.get()));
/// count.set(2);   // prints "2"
/// count.set(2);   // unchanged: nothing printed
/// ```
#[derive(Clone)]
pub struct Ref(Rc<RefData>);

fn convert(value: &Value) -> Value {
    match value {
        Value::Object(raw) => Value::Reactive(reactive(raw)),
        other => other.clone(),
    }
}

impl Ref {
    pub fn new(value: impl Into<Value>) -> Self {
        let raw = value.into();
        Self(Rc::new(RefData {
            value: RefCell::new(convert(&raw)),
            raw: RefCell::new(raw),
            dep: Dep::new(),
        }))
    }

    /// Read the value, subscribing the running effect.
    pub fn get(&self) -> Value {
        self.0.dep.track();
        self.0.value.borrow().clone()
    }

    /// Read the value without subscribing anything.
    pub fn get_untracked(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Write the value. Subscribers run only if the raw value changed.
    pub fn set(&self, value: impl Into<Value>) {
        let new_raw = value.into();
        if !has_changed(&self.0.raw.borrow(), &new_raw) {
            return;
        }

        *self.0.value.borrow_mut() = convert(&new_raw);
        *self.0.raw.borrow_mut() = new_raw;
        self.0.dep.trigger();
    }

    /// Number of effects subscribed to this ref.
    pub fn subscriber_count(&self) -> usize {
        self.0.dep.len()
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("value", &*self.0.value.borrow())
            .field("subscribers", &self.0.dep.len())
            .finish()
    }
}

/// Whether `value` is a ref.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// Read through a ref (tracking it); other values pass through.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(cell) => cell.get(),
        other => other.clone(),
    }
}

/// A new ref initialised from `object[key]`.
pub fn to_ref(object: &Reactive, key: &str) -> Ref {
    Ref::new(object.get(key))
}

/// One ref per key of `object`, initialised from its current values.
pub fn to_refs(object: &Reactive) -> Object {
    object
        .keys()
        .into_iter()
        .map(|key| {
            let cell = to_ref(object, &key);
            (key, Value::Ref(cell))
        })
        .collect()
}

/// A view over an object whose refs read and write as plain values.
///
/// Component setup state is exposed to render functions through this view.
#[derive(Clone, Debug)]
pub struct ProxyRefs {
    target: Object,
}

impl ProxyRefs {
    pub fn target(&self) -> &Object {
        &self.target
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.target.contains_key(key)
    }

    /// Read a key, unwrapping a ref (and tracking it).
    pub fn get(&self, key: &str) -> Value {
        unref(&self.target.get(key).unwrap_or_default())
    }

    /// Write a key. A plain value written over a ref goes into the ref.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if let Some(Value::Ref(cell)) = self.target.get(key) {
            if !is_ref(&value) {
                cell.set(value);
                return;
            }
        }
        self.target.insert(key, value);
    }
}

/// Wrap an object holding refs so that they unwrap on access.
pub fn proxy_refs(target: &Object) -> ProxyRefs {
    ProxyRefs {
        target: target.clone(),
    }
}
