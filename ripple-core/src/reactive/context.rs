//! Reactive Context
//!
//! The reactive context tracks which effect is currently running, so that
//! reads performed by that effect can subscribe it automatically.
//!
//! # Implementation
//!
//! Instead of a bare global "active effect" pointer, each thread keeps a
//! stack of context entries. Running an effect pushes an entry and the
//! returned guard pops it again, so a nested run (a computed read inside a
//! render effect, for example) restores the outer effect when it finishes,
//! even if the computation panics.
//!
//! An entry can also be pushed with tracking disabled. Reads performed under
//! such an entry subscribe nobody, which is how stopped effects run and how
//! [`untrack`] works.

use std::cell::RefCell;
use std::rc::Rc;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The effect that is running, if any.
    subscriber: Option<Rc<dyn Subscriber>>,
    /// Whether reads should subscribe `subscriber`.
    should_track: bool,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking context for the given subscriber.
    pub(crate) fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        let subscriber_id = subscriber.id();
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|entry| entry.should_track) {
                tracing::trace!(
                    target: "ripple::reactive",
                    depth = stack.len(),
                    subscriber = subscriber_id.raw(),
                    "nested effect run"
                );
            }
            stack.push(ContextEntry {
                subscriber: Some(subscriber),
                should_track: true,
            });
        });

        Self {
            subscriber_id: Some(subscriber_id),
        }
    }

    /// Enter a context in which reads are not tracked.
    pub fn untracked() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber: None,
                should_track: false,
            });
        });

        Self {
            subscriber_id: None,
        }
    }

    /// Check whether a read right now would subscribe an effect.
    pub fn is_tracking() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.should_track && entry.subscriber.is_some())
        })
    }

    /// Get the ID of the effect that reads would subscribe, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        Self::current().map(|subscriber| subscriber.id())
    }

    /// Number of entries on this thread's context stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    pub(crate) fn current() -> Option<Rc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .filter(|entry| entry.should_track)
                .and_then(|entry| entry.subscriber.clone())
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK
            .try_with(|stack| stack.borrow_mut().pop())
            .ok()
            .flatten();

        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.subscriber.as_ref().map(|s| s.id()),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }
    }
}

/// Run `f` without subscribing the current effect to anything it reads.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::runtime::Dep;

    struct Recorder(SubscriberId);

    impl Subscriber for Recorder {
        fn id(&self) -> SubscriberId {
            self.0
        }

        fn notify(self: Rc<Self>) {}

        fn record_dep(&self, _dep: Dep) {}
    }

    fn recorder() -> Rc<Recorder> {
        Rc::new(Recorder(SubscriberId::new()))
    }

    #[test]
    fn context_tracks_subscriber() {
        let sub = recorder();
        let id = sub.0;

        assert!(!ReactiveContext::is_tracking());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(sub);
            assert!(ReactiveContext::is_tracking());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        assert!(!ReactiveContext::is_tracking());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_contexts_restore_outer() {
        let outer = recorder();
        let inner = recorder();
        let (outer_id, inner_id) = (outer.0, inner.0);

        let _ctx1 = ReactiveContext::enter(outer);
        {
            let _ctx2 = ReactiveContext::enter(inner);
            assert_eq!(ReactiveContext::current_subscriber(), Some(inner_id));
        }
        assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));
    }

    #[test]
    fn untracked_hides_the_running_effect() {
        let _ctx = ReactiveContext::enter(recorder());
        assert!(ReactiveContext::is_tracking());

        let tracking_inside = untrack(ReactiveContext::is_tracking);
        assert!(!tracking_inside);
        assert!(ReactiveContext::is_tracking());
    }
}
