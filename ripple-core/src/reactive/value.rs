//! Dynamic Values
//!
//! Observed state is plain structured data: objects whose fields hold
//! primitives, other objects, boxed references or callbacks. [`Value`] is
//! that data model, and [`Object`] is the raw, unobserved map that reactive
//! wrappers sit on top of.
//!
//! Equality follows identity semantics for everything that has identity:
//! two objects are equal only if they are the same object, two callbacks only
//! if they are the same closure. Primitives compare by value; floats compare
//! like `Object.is` (NaN equals NaN, `0.0` differs from `-0.0`).

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::object::Reactive;
use super::reference::Ref;
use super::runtime;

/// Identity of a raw object; the first half of a dependency-map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn new() -> Self {
        thread_local! {
            static COUNTER: Cell<u64> = const { Cell::new(0) };
        }
        COUNTER.with(|counter| {
            let id = counter.get();
            counter.set(id + 1);
            Self(id)
        })
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

/// A dynamically typed value held in observed state or passed as a prop.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    /// A raw object. Reading it through a reactive wrapper wraps it.
    Object(Object),
    /// An observed object.
    Reactive(Reactive),
    /// A boxed reactive reference.
    Ref(Ref),
    /// A callable, e.g. an event handler prop.
    Func(Callback),
}

impl Value {
    /// Build a callback value from a closure.
    pub fn func(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Value::Func(Callback::new(f))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value; integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_ref_cell(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_callback(&self) -> Option<&Callback> {
        match self {
            Value::Func(f) => Some(f),
            _ => None,
        }
    }

    /// The raw object behind an object-like value (raw or wrapped).
    pub fn raw_object(&self) -> Option<Object> {
        match self {
            Value::Object(o) => Some(o.clone()),
            Value::Reactive(r) => Some(r.to_raw()),
            _ => None,
        }
    }

    /// Convert to JSON without tracking. Refs are read through, callbacks
    /// become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null | Value::Func(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::Str(s) => Json::String(s.to_string()),
            Value::Object(o) => o.to_json(),
            Value::Reactive(r) => r.to_raw().to_json(),
            Value::Ref(r) => r.get_untracked().to_json(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                (a.is_nan() && b.is_nan())
                    || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => a == b,
            _ => false,
        }
    }
}

/// Whether a write of `new` over `old` is an actual change.
pub fn has_changed(old: &Value, new: &Value) -> bool {
    old != new
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Object(o) => write!(f, "Object(#{})", o.id().raw()),
            Value::Reactive(r) => write!(f, "Reactive(#{}, {:?})", r.to_raw().id().raw(), r.mode()),
            Value::Ref(_) => f.write_str("Ref(..)"),
            Value::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// Text form used when a value is interpolated into a text run.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::Func(_) => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Object(_) | Value::Reactive(_) => write!(f, "{}", self.to_json()),
            Value::Ref(r) => write!(f, "{}", r.get_untracked()),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int as i64,
    i64 => Int,
    u32 => Int as i64,
    f64 => Float,
    Object => Object,
    Reactive => Reactive,
    Ref => Ref,
    Callback => Func,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::Str(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// JSON arrays become objects keyed by index, the same shape observed
/// arrays have.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::Object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (i.to_string(), Value::from(item)))
                    .collect(),
            ),
            Json::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// ----------------------------------------------------------------------------
// Raw objects
// ----------------------------------------------------------------------------

struct ObjectData {
    id: ObjectId,
    fields: RefCell<IndexMap<String, Value>>,
}

impl Drop for ObjectData {
    fn drop(&mut self) {
        runtime::forget_target(self.id);
    }
}

/// A raw, unobserved object. Cloning shares the underlying storage.
///
/// Reads and writes on a raw object never track or trigger; wrap it with
/// [`reactive`](super::reactive) to observe it.
#[derive(Clone)]
pub struct Object(Rc<ObjectData>);

impl Object {
    pub fn new() -> Self {
        Self(Rc::new(ObjectData {
            id: ObjectId::new(),
            fields: RefCell::new(IndexMap::new()),
        }))
    }

    /// Builder-style insert.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.fields.borrow().get(key).cloned()
    }

    /// Raw write; returns the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.fields.borrow_mut().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.fields.borrow_mut().shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.fields.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.fields.borrow().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .fields
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.fields.borrow().is_empty()
    }

    /// Replace every field with `entries`, keeping the object's identity.
    pub fn replace_all(&self, entries: impl IntoIterator<Item = (String, Value)>) {
        let mut fields = self.0.fields.borrow_mut();
        fields.clear();
        fields.extend(entries);
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .fields
                .borrow()
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        for (key, value) in iter {
            object.insert(key, value);
        }
        object
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

// ----------------------------------------------------------------------------
// Callbacks
// ----------------------------------------------------------------------------

/// A shared closure. Equality is identity.
#[derive(Clone)]
pub struct Callback(Rc<dyn Fn(&[Value]) -> Value>);

impl Callback {
    pub fn new(f: impl Fn(&[Value]) -> Value + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_compare_by_identity() {
        let a = Object::new().with("x", 1);
        let b = Object::new().with("x", 1);

        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn primitives_compare_by_value() {
        assert_eq!(Value::from("hi"), Value::from(String::from("hi")));
        assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
        assert_ne!(Value::from(0.0), Value::from(-0.0));
        assert_ne!(Value::from(1), Value::from(1.0));
    }

    #[test]
    fn callbacks_compare_by_identity() {
        let cb = Callback::new(|_| Value::Null);
        let other = Callback::new(|_| Value::Null);

        assert_eq!(cb, cb.clone());
        assert_ne!(cb, other);
    }

    #[test]
    fn json_round_trip_keeps_shape() {
        let json = serde_json::json!({ "user": { "name": "ada", "age": 36 }, "tags": ["a", "b"] });
        let value = Value::from(json);

        let user = value.as_object().unwrap().get("user").unwrap();
        assert_eq!(user.as_object().unwrap().get("age"), Some(Value::Int(36)));

        let tags = value.as_object().unwrap().get("tags").unwrap();
        assert_eq!(tags.as_object().unwrap().get("1"), Some(Value::from("b")));
    }

    #[test]
    fn display_is_text_interpolation() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(3).to_string(), "3");
        assert_eq!(Value::from("x").to_string(), "x");
    }
}
