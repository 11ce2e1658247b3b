//! Observed Objects
//!
//! A [`Reactive`] wraps a raw [`Object`] and intercepts every read and
//! write made through it:
//!
//! - A read of a reserved flag key answers the flag.
//! - Any other read subscribes the running effect (unless the wrapper is
//!   read-only) and wraps nested objects on demand in the same mode (unless
//!   the wrapper is shallow).
//! - A write stores the raw value and triggers the key's subscribers.
//!   Read-only wrappers refuse the write according to the configured
//!   [`ReadonlyWritePolicy`].
//!
//! Wrapping is identity-cached: wrapping the same raw object twice in the
//! same mode yields the same wrapper, so wrapper equality is meaningful.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime;
use super::value::{Object, ObjectId, Value};
use crate::config::{ReadonlyWritePolicy, RuntimeConfig};
use crate::error::{Result, RuntimeError};

/// Reserved key answering whether a wrapper is mutable-reactive.
pub const IS_REACTIVE: &str = "__v_isReactive";

/// Reserved key answering whether a wrapper is read-only.
pub const IS_READONLY: &str = "__v_isReadonly";

/// Pseudo key tracked by key enumeration and triggered by key-set changes.
const ITERATE_KEY: &str = "__v_iterate";

/// How a wrapper treats reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Reads track, writes trigger, nested objects come back mutable.
    Mutable,
    /// Reads do not track, writes are refused, nested objects come back
    /// read-only.
    ReadOnly,
    /// Like `ReadOnly`, but nested objects are returned raw.
    ShallowReadOnly,
}

impl Mode {
    pub fn is_readonly(self) -> bool {
        !matches!(self, Mode::Mutable)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Mode::ShallowReadOnly)
    }
}

struct ReactiveData {
    raw: Object,
    mode: Mode,
}

impl Drop for ReactiveData {
    fn drop(&mut self) {
        let key = (self.raw.id(), self.mode);
        let _ = WRAPPER_CACHE.try_with(|cache| {
            if let Ok(mut cache) = cache.try_borrow_mut() {
                if cache.get(&key).is_some_and(|weak| weak.strong_count() == 0) {
                    cache.remove(&key);
                }
            }
        });
    }
}

thread_local! {
    static WRAPPER_CACHE: RefCell<HashMap<(ObjectId, Mode), Weak<ReactiveData>>> =
        RefCell::new(HashMap::new());
}

/// An observed view of a raw object.
///
/// Cloning yields the same wrapper; equality is wrapper identity.
#[derive(Clone)]
pub struct Reactive(Rc<ReactiveData>);

impl Reactive {
    fn wrap(raw: Object, mode: Mode) -> Self {
        let key = (raw.id(), mode);

        let cached = WRAPPER_CACHE.with(|cache| cache.borrow().get(&key).and_then(Weak::upgrade));
        if let Some(existing) = cached {
            return Self(existing);
        }

        let data = Rc::new(ReactiveData { raw, mode });
        WRAPPER_CACHE.with(|cache| {
            cache.borrow_mut().insert(key, Rc::downgrade(&data));
        });
        Self(data)
    }

    pub fn mode(&self) -> Mode {
        self.0.mode
    }

    pub fn is_readonly(&self) -> bool {
        self.0.mode.is_readonly()
    }

    /// The raw object behind this wrapper.
    pub fn to_raw(&self) -> Object {
        self.0.raw.clone()
    }

    /// Read a key.
    pub fn get(&self, key: &str) -> Value {
        let mode = self.0.mode;
        match key {
            IS_REACTIVE => return Value::Bool(!mode.is_readonly()),
            IS_READONLY => return Value::Bool(mode.is_readonly()),
            _ => {}
        }

        if !mode.is_readonly() {
            runtime::track(self.0.raw.id(), key);
        }

        let value = self.0.raw.get(key).unwrap_or_default();
        match value {
            Value::Object(nested) if !mode.is_shallow() => Value::Reactive(Self::wrap(nested, mode)),
            other => other,
        }
    }

    /// Whether the key is present. Tracks like a read.
    pub fn has(&self, key: &str) -> bool {
        if !self.0.mode.is_readonly() {
            runtime::track(self.0.raw.id(), key);
        }
        self.0.raw.contains_key(key)
    }

    /// Enumerate keys. Subscribes to additions and removals.
    pub fn keys(&self) -> Vec<String> {
        if !self.0.mode.is_readonly() {
            runtime::track(self.0.raw.id(), ITERATE_KEY);
        }
        self.0.raw.keys()
    }

    /// Write a key and trigger its subscribers.
    ///
    /// On a read-only wrapper nothing is written or triggered; the result
    /// depends on the configured [`ReadonlyWritePolicy`].
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if self.0.mode.is_readonly() {
            return refuse_write(key);
        }

        // Store raw objects; reads re-wrap them on demand.
        let value = match value.into() {
            Value::Reactive(wrapper) => Value::Object(wrapper.to_raw()),
            other => other,
        };

        let target = self.0.raw.id();
        let added = self.0.raw.insert(key, value).is_none();

        runtime::trigger(target, key);
        if added {
            runtime::trigger(target, ITERATE_KEY);
        }
        Ok(())
    }

    /// Remove a key and trigger its subscribers.
    pub fn remove(&self, key: &str) -> Result<Option<Value>> {
        if self.0.mode.is_readonly() {
            return refuse_write(key).map(|()| None);
        }

        let target = self.0.raw.id();
        let removed = self.0.raw.remove(key);
        if removed.is_some() {
            runtime::trigger(target, key);
            runtime::trigger(target, ITERATE_KEY);
        }
        Ok(removed)
    }
}

fn refuse_write(key: &str) -> Result<()> {
    match RuntimeConfig::current().readonly_writes {
        ReadonlyWritePolicy::Warn => {
            tracing::warn!(target: "ripple::reactive", key, "read-only target cannot be modified");
            Ok(())
        }
        ReadonlyWritePolicy::Error => Err(RuntimeError::ReadonlyWrite {
            key: key.to_string(),
        }),
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Reactive {}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("mode", &self.0.mode)
            .field("raw", &self.0.raw)
            .finish()
    }
}

/// Wrap an object so that reads track and writes trigger.
pub fn reactive(target: &Object) -> Reactive {
    Reactive::wrap(target.clone(), Mode::Mutable)
}

/// Wrap an object so that it cannot be written through, at any depth.
pub fn readonly(target: &Object) -> Reactive {
    Reactive::wrap(target.clone(), Mode::ReadOnly)
}

/// Wrap an object read-only at the top level only.
pub fn shallow_readonly(target: &Object) -> Reactive {
    Reactive::wrap(target.clone(), Mode::ShallowReadOnly)
}

/// Whether `value` is a mutable reactive wrapper.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Reactive(wrapper) => wrapper.get(IS_REACTIVE) == Value::Bool(true),
        _ => false,
    }
}

/// Whether `value` is a read-only wrapper.
pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Reactive(wrapper) => wrapper.get(IS_READONLY) == Value::Bool(true),
        _ => false,
    }
}

/// Whether `value` is any kind of wrapper.
pub fn is_proxy(value: &Value) -> bool {
    is_reactive(value) || is_readonly(value)
}

/// Strip a wrapper, returning the raw object; other values pass through.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Reactive(wrapper) => Value::Object(wrapper.to_raw()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_is_identity_cached_per_mode() {
        let raw = Object::new().with("a", 1);

        assert_eq!(reactive(&raw), reactive(&raw));
        assert_eq!(readonly(&raw), readonly(&raw));
        assert_ne!(reactive(&raw), readonly(&raw));
        assert_ne!(readonly(&raw), shallow_readonly(&raw));
    }

    #[test]
    fn nested_objects_are_wrapped_in_the_same_mode() {
        let raw = Object::new().with("inner", Object::new().with("x", 1));

        let state = reactive(&raw);
        let inner = state.get("inner");
        assert!(is_reactive(&inner));
        assert_eq!(inner, state.get("inner"));

        let frozen = readonly(&raw);
        assert!(is_readonly(&frozen.get("inner")));

        let shallow = shallow_readonly(&raw);
        assert!(!is_proxy(&shallow.get("inner")));
    }

    #[test]
    fn flags_answer_without_touching_the_target() {
        let raw = Object::new();
        let state = reactive(&raw);

        assert_eq!(state.get(IS_REACTIVE), Value::Bool(true));
        assert_eq!(state.get(IS_READONLY), Value::Bool(false));
        assert!(raw.is_empty());
    }

    #[test]
    fn writes_store_raw_objects() {
        let nested = Object::new().with("x", 1);
        let state = reactive(&Object::new());

        state.set("nested", reactive(&nested)).unwrap();

        assert!(matches!(state.to_raw().get("nested"), Some(Value::Object(o)) if o.ptr_eq(&nested)));
    }

    #[test]
    fn readonly_write_is_swallowed_by_default() {
        let raw = Object::new().with("a", 1);
        let frozen = readonly(&raw);

        assert!(frozen.set("a", 2).is_ok());
        assert_eq!(raw.get("a"), Some(Value::Int(1)));
    }

    #[test]
    fn readonly_write_errors_under_strict_policy() {
        RuntimeConfig {
            readonly_writes: ReadonlyWritePolicy::Error,
            ..RuntimeConfig::default()
        }
        .install();

        let raw = Object::new().with("a", 1);
        let result = readonly(&raw).set("a", 2);

        RuntimeConfig::default().install();

        assert!(matches!(result, Err(RuntimeError::ReadonlyWrite { ref key }) if key == "a"));
        assert_eq!(raw.get("a"), Some(Value::Int(1)));
    }
}
