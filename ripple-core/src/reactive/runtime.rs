//! Reactive Runtime
//!
//! The runtime owns the dependency map that connects observed state to the
//! effects that read it.
//!
//! # How It Works
//!
//! 1. When an observed object's key is read inside a running effect,
//!    [`track`] adds that effect to the dependency set for
//!    `(object, key)` and records the set on the effect for later teardown.
//!
//! 2. When the key is written, [`trigger`] notifies every effect in the set,
//!    in subscription order. Effects with a custom scheduler hand the work to
//!    it; the others re-run on the spot.
//!
//! Dependency sets are created lazily on the first tracked read. The map
//! entry for an object is dropped when the object itself is dropped.
//!
//! # Threading
//!
//! Everything here is thread-local. Re-entrant writes during a trigger are
//! safe as long as no map borrow is held while calling out into an effect.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};
use super::value::ObjectId;

/// The set of effects subscribed to one state location.
///
/// Iteration order is subscription order.
#[derive(Clone, Default)]
pub struct Dep {
    subscribers: Rc<RefCell<IndexMap<SubscriberId, Rc<dyn Subscriber>>>>,
}

impl Dep {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscribed effects.
    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    /// Whether the given effect is subscribed.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.borrow().contains_key(&id)
    }

    /// Subscribe the currently running effect, if reads are being tracked.
    pub fn track(&self) {
        let Some(subscriber) = ReactiveContext::current() else {
            return;
        };

        let inserted = {
            let mut subscribers = self.subscribers.borrow_mut();
            let id = subscriber.id();
            if subscribers.contains_key(&id) {
                false
            } else {
                subscribers.insert(id, Rc::clone(&subscriber));
                true
            }
        };

        if inserted {
            subscriber.record_dep(self.clone());
        }
    }

    /// Notify every subscribed effect.
    pub fn trigger(&self) {
        // Snapshot first: subscribers may unsubscribe or resubscribe while
        // they run.
        let snapshot: Vec<Rc<dyn Subscriber>> =
            self.subscribers.borrow().values().cloned().collect();

        for subscriber in snapshot {
            subscriber.notify();
        }
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("subscribers", &self.subscribers.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

// Dependency map: observed object -> key -> dependency set.
thread_local! {
    static TARGET_MAP: RefCell<HashMap<ObjectId, HashMap<String, Dep>>> =
        RefCell::new(HashMap::new());
}

/// Record that the running effect read `key` on `target`.
///
/// No-op outside of a tracking context.
pub fn track(target: ObjectId, key: &str) {
    if !ReactiveContext::is_tracking() {
        return;
    }

    let dep = TARGET_MAP.with(|map| {
        map.borrow_mut()
            .entry(target)
            .or_default()
            .entry(key.to_string())
            .or_default()
            .clone()
    });

    dep.track();
}

/// Notify every effect that read `key` on `target`.
pub fn trigger(target: ObjectId, key: &str) {
    let dep = TARGET_MAP.with(|map| {
        map.borrow()
            .get(&target)
            .and_then(|deps| deps.get(key))
            .cloned()
    });

    if let Some(dep) = dep {
        dep.trigger();
    }
}

/// Number of effects subscribed to `(target, key)`.
pub fn subscriber_count(target: ObjectId, key: &str) -> usize {
    TARGET_MAP.with(|map| {
        map.borrow()
            .get(&target)
            .and_then(|deps| deps.get(key))
            .map_or(0, Dep::len)
    })
}

/// Drop every dependency set of an object that no longer exists.
pub(crate) fn forget_target(target: ObjectId) {
    // The map may already be gone during thread teardown.
    let _ = TARGET_MAP.try_with(|map| {
        if let Ok(mut map) = map.try_borrow_mut() {
            map.remove(&target);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Recorder {
        id: SubscriberId,
        notified: Cell<usize>,
        deps: RefCell<Vec<Dep>>,
    }

    impl Recorder {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId::new(),
                notified: Cell::new(0),
                deps: RefCell::new(Vec::new()),
            })
        }
    }

    impl Subscriber for Recorder {
        fn id(&self) -> SubscriberId {
            self.id
        }

        fn notify(self: Rc<Self>) {
            self.notified.set(self.notified.get() + 1);
        }

        fn record_dep(&self, dep: Dep) {
            self.deps.borrow_mut().push(dep);
        }
    }

    #[test]
    fn track_outside_context_is_noop() {
        let target = ObjectId::new();
        track(target, "count");
        assert_eq!(subscriber_count(target, "count"), 0);
    }

    #[test]
    fn track_registers_both_directions_once() {
        let target = ObjectId::new();
        let recorder = Recorder::new();

        {
            let _ctx = ReactiveContext::enter(recorder.clone());
            track(target, "count");
            track(target, "count");
        }

        assert_eq!(subscriber_count(target, "count"), 1);
        assert_eq!(recorder.deps.borrow().len(), 1);
    }

    #[test]
    fn trigger_notifies_only_the_written_key() {
        let target = ObjectId::new();
        let recorder = Recorder::new();

        {
            let _ctx = ReactiveContext::enter(recorder.clone());
            track(target, "a");
        }

        trigger(target, "b");
        assert_eq!(recorder.notified.get(), 0);

        trigger(target, "a");
        trigger(target, "a");
        assert_eq!(recorder.notified.get(), 2);
    }

    #[test]
    fn forget_target_drops_dependency_sets() {
        let target = ObjectId::new();
        let recorder = Recorder::new();

        {
            let _ctx = ReactiveContext::enter(recorder.clone());
            track(target, "a");
        }
        forget_target(target);

        assert_eq!(subscriber_count(target, "a"), 0);
        trigger(target, "a");
        assert_eq!(recorder.notified.get(), 0);
    }
}
