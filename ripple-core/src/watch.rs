//! Watchers
//!
//! [`watch_effect`] runs a side effect immediately and re-runs it whenever
//! something it read changes. Re-runs are not synchronous: they are queued
//! as pre-flush callbacks, so a watcher sees the latest state once per
//! flush and always before components re-render.

use std::cell::RefCell;
use std::rc::Rc;

use crate::reactive::{Effect, EffectOptions};
use crate::scheduler::queue_pre_flush_cb;

type Cleanup = Rc<RefCell<Option<Box<dyn FnOnce()>>>>;

/// Passed to the watcher body to register a cleanup for the current run.
///
/// The cleanup runs before the next run and when the watcher is stopped.
pub struct OnCleanup {
    slot: Cleanup,
}

impl OnCleanup {
    pub fn register(&self, cleanup: impl FnOnce() + 'static) {
        *self.slot.borrow_mut() = Some(Box::new(cleanup));
    }
}

fn run_cleanup(slot: &Cleanup) {
    let cleanup = slot.borrow_mut().take();
    if let Some(cleanup) = cleanup {
        cleanup();
    }
}

/// Handle returned by [`watch_effect`].
#[derive(Clone, Debug)]
pub struct WatchHandle {
    effect: Effect,
}

impl WatchHandle {
    /// Stop watching. Runs the pending cleanup, if any. Idempotent.
    pub fn stop(&self) {
        self.effect.stop();
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }
}

/// Run `body` now and again (before the next flush) whenever its reads change.
pub fn watch_effect(body: impl Fn(&OnCleanup) + 'static) -> WatchHandle {
    let slot: Cleanup = Rc::new(RefCell::new(None));

    let compute = {
        let slot = Rc::clone(&slot);
        move || {
            run_cleanup(&slot);
            body(&OnCleanup {
                slot: Rc::clone(&slot),
            });
        }
    };

    // The scheduler needs the effect it belongs to, which does not exist yet.
    let this: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
    let scheduler = {
        let this = Rc::clone(&this);
        move || {
            let this = Rc::clone(&this);
            queue_pre_flush_cb(move || {
                let effect = this.borrow().clone();
                if let Some(effect) = effect.filter(|e| e.is_active()) {
                    effect.run();
                }
            });
        }
    };

    let on_stop = {
        let slot = Rc::clone(&slot);
        let this = Rc::clone(&this);
        move || {
            run_cleanup(&slot);
            this.borrow_mut().take();
        }
    };

    let effect = Effect::with_options(
        compute,
        EffectOptions::new().scheduler(scheduler).on_stop(on_stop).lazy(),
    );
    *this.borrow_mut() = Some(effect.clone());
    effect.run();

    WatchHandle { effect }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Ref;
    use crate::scheduler::flush_jobs;
    use std::cell::Cell;

    #[test]
    fn reruns_are_deferred_to_the_flush() {
        let count = Ref::new(0);
        let seen = Rc::new(Cell::new(-1));

        let (c, s) = (count.clone(), seen.clone());
        let _handle = watch_effect(move |_| s.set(c.get().as_int().unwrap()));
        assert_eq!(seen.get(), 0);

        count.set(1);
        count.set(2);
        assert_eq!(seen.get(), 0);

        flush_jobs();
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_stop() {
        let count = Ref::new(0);
        let cleanups = Rc::new(Cell::new(0));

        let (c, k) = (count.clone(), cleanups.clone());
        let handle = watch_effect(move |on_cleanup| {
            c.get();
            let k = k.clone();
            on_cleanup.register(move || k.set(k.get() + 1));
        });
        assert_eq!(cleanups.get(), 0);

        count.set(1);
        flush_jobs();
        assert_eq!(cleanups.get(), 1);

        handle.stop();
        handle.stop();
        assert_eq!(cleanups.get(), 2);
        assert!(!handle.is_active());
    }

    #[test]
    fn stopped_watchers_ignore_queued_reruns() {
        let count = Ref::new(0);
        let runs = Rc::new(Cell::new(0));

        let (c, r) = (count.clone(), runs.clone());
        let handle = watch_effect(move |_| {
            r.set(r.get() + 1);
            c.get();
        });

        count.set(1);
        handle.stop();
        flush_jobs();
        assert_eq!(runs.get(), 1);
    }
}
