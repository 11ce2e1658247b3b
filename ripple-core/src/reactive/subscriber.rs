//! Subscriber types for the reactive system.
//!
//! A subscriber is anything that can sit in a dependency set: plain effects,
//! the effect behind a computed value, a component's render effect.

use std::cell::Cell;
use std::rc::Rc;

use super::runtime::Dep;

/// Unique identifier for a subscriber.
///
/// Dependency sets are keyed by this ID, so the same effect is never
/// subscribed twice to one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
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

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// The graph-facing side of an effect.
///
/// Dependency sets hold `Rc<dyn Subscriber>` so that effects with different
/// result types can share one set.
pub(crate) trait Subscriber {
    fn id(&self) -> SubscriberId;

    /// Called by `trigger`: invoke the custom scheduler if there is one,
    /// otherwise re-run the computation.
    fn notify(self: Rc<Self>);

    /// Remember a dependency set this subscriber was added to, for teardown.
    fn record_dep(&self, dep: Dep);
}
