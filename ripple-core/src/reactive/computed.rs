//! Computed Values
//!
//! A computed value is a cached, lazily recomputed derivation.
//!
//! # How Computed Values Work
//!
//! 1. Construction runs nothing. The value starts out dirty.
//!
//! 2. The first read runs the getter inside an effect, caches the result
//!    and marks the value clean.
//!
//! 3. When a dependency changes, the effect's scheduler only marks the value
//!    dirty (and notifies whoever read the computed). Nothing is recomputed.
//!
//! 4. The next read sees the dirty flag and recomputes once.
//!
//! So N reads with no writes in between cost exactly one getter call, and
//! a burst of writes between two reads costs one getter call as well.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::effect::{Effect, EffectOptions};
use super::runtime::Dep;

/// Cache state of a computed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up to date.
    Clean,

    /// A dependency changed (or nothing was computed yet).
    Dirty,
}

struct ComputedInner<T: 'static> {
    effect: Effect<T>,
    value: RefCell<Option<T>>,
    state: Rc<Cell<ComputedState>>,
    /// Effects that read this computed.
    dep: Dep,
}

/// A lazily evaluated, cached derived value.
///
/// # Example
///
/// ```rust,ignore
/// let user = reactive(&Object::new().with("age", 1));
/// let u = user.clone();
/// let next_age = Computed::new(move || u.get("age").as_int().unwrap() + 1);
///
/// assert_eq!(next_age.get(), 2);
/// user.set("age", 2)?;
/// assert_eq!(next_age.get(), 3);
/// ```
pub struct Computed<T: Clone + 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Create a computed value. The getter does not run until the first read.
    pub fn new(getter: impl Fn() -> T + 'static) -> Self {
        let state = Rc::new(Cell::new(ComputedState::Dirty));
        let dep = Dep::new();

        let scheduler = {
            let state = Rc::clone(&state);
            let dep = dep.clone();
            move || {
                if state.replace(ComputedState::Dirty) == ComputedState::Clean {
                    dep.trigger();
                }
            }
        };

        let effect = Effect::with_options(getter, EffectOptions::new().scheduler(scheduler).lazy());

        Self {
            inner: Rc::new(ComputedInner {
                effect,
                value: RefCell::new(None),
                state,
                dep,
            }),
        }
    }

    /// Read the value, recomputing if a dependency changed since last time.
    pub fn get(&self) -> T {
        self.inner.dep.track();

        if self.inner.state.get() == ComputedState::Clean {
            if let Some(value) = self.inner.value.borrow().as_ref() {
                return value.clone();
            }
        }

        let value = self.inner.effect.run();
        *self.inner.value.borrow_mut() = Some(value.clone());
        self.inner.state.set(ComputedState::Clean);
        value
    }

    pub fn state(&self) -> ComputedState {
        self.inner.state.get()
    }

    /// Whether a value has been computed at least once.
    pub fn has_value(&self) -> bool {
        self.inner.value.borrow().is_some()
    }

    /// Stop tracking dependencies. The last cached value stays readable.
    pub fn stop(&self) {
        self.inner.effect.stop();
    }
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("state", &self.state())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// Shorthand for [`Computed::new`].
pub fn computed<T: Clone + 'static>(getter: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::new(getter)
}
