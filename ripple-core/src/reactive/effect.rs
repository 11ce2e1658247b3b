//! Effect Implementation
//!
//! An Effect is a re-runnable computation that subscribes to the reactive
//! state it reads and is notified when that state changes.
//!
//! # Lifecycle
//!
//! ```text
//!   Idle --run()--> Running --done--> Idle      (repeatable)
//!     \
//!      stop() --> Stopped                       (terminal)
//! ```
//!
//! - `run()` on an active effect drops the memberships from its previous
//!   run, enters a tracking context and executes the computation, so the
//!   effect ends up subscribed to exactly what this run read.
//! - `run()` on a stopped effect still executes the computation, but
//!   nothing it reads is tracked.
//! - `stop()` removes the effect from every dependency set, invokes the
//!   teardown hook, and is a no-op on every call after the first.
//!
//! # Scheduling
//!
//! When a dependency changes, an effect with a custom scheduler calls the
//! scheduler instead of re-running. That is how computed values stay lazy
//! and how component renders are deferred to the job queue.
//!
//! An effect is never re-triggered by its own writes while it is running.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::runtime::Dep;
use super::subscriber::{Subscriber, SubscriberId};

/// Options accepted by [`Effect::with_options`].
#[derive(Default)]
pub struct EffectOptions {
    /// Called instead of re-running when a dependency changes.
    pub scheduler: Option<Rc<dyn Fn()>>,
    /// Called once, on the first `stop()`.
    pub on_stop: Option<Box<dyn FnOnce()>>,
    /// Do not run on creation.
    pub lazy: bool,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduler(mut self, scheduler: impl Fn() + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    pub fn on_stop(mut self, on_stop: impl FnOnce() + 'static) -> Self {
        self.on_stop = Some(Box::new(on_stop));
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }
}

struct EffectInner<T> {
    id: SubscriberId,
    compute: Rc<dyn Fn() -> T>,
    /// Dependency sets this effect is currently a member of.
    deps: RefCell<SmallVec<[Dep; 4]>>,
    active: Cell<bool>,
    /// Re-entrancy depth of `run`.
    running: Cell<usize>,
    scheduler: Option<Rc<dyn Fn()>>,
    on_stop: RefCell<Option<Box<dyn FnOnce()>>>,
    run_count: Cell<usize>,
}

struct RunningGuard<'a>(&'a Cell<usize>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl<T: 'static> EffectInner<T> {
    fn run(self: &Rc<Self>) -> T {
        self.run_count.set(self.run_count.get() + 1);
        let compute = Rc::clone(&self.compute);

        if !self.active.get() {
            let _ctx = ReactiveContext::untracked();
            return compute();
        }

        self.cleanup();

        let _ctx = ReactiveContext::enter(Rc::clone(self) as Rc<dyn Subscriber>);
        self.running.set(self.running.get() + 1);
        let _running = RunningGuard(&self.running);

        compute()
    }

    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            dep.remove(self.id);
        }
    }

    fn stop(&self) {
        if !self.active.replace(false) {
            return;
        }

        self.cleanup();

        let on_stop = self.on_stop.borrow_mut().take();
        if let Some(on_stop) = on_stop {
            on_stop();
        }
    }
}

impl<T: 'static> Subscriber for EffectInner<T> {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn notify(self: Rc<Self>) {
        if !self.active.get() || self.running.get() > 0 {
            return;
        }

        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => {
                self.run();
            }
        }
    }

    fn record_dep(&self, dep: Dep) {
        self.deps.borrow_mut().push(dep);
    }
}

/// A re-runnable computation that tracks what it reads.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(&Object::new().with("count", 0));
///
/// let s = state.clone();
/// let effect = Effect::new(move || {
///     println!("count is {}", s.get("count"));
/// });
///
/// state.set("count", 5)?;  // prints "count is 5"
/// effect.stop();
/// state.set("count", 6)?;  // prints nothing
/// ```
pub struct Effect<T: 'static = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    /// Create an effect and run it once to establish its dependencies.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        Self::with_options(compute, EffectOptions::default())
    }

    /// Create an effect without running it.
    pub fn new_lazy(compute: impl Fn() -> T + 'static) -> Self {
        Self::with_options(compute, EffectOptions::new().lazy())
    }

    pub fn with_options(compute: impl Fn() -> T + 'static, options: EffectOptions) -> Self {
        let EffectOptions {
            scheduler,
            on_stop,
            lazy,
        } = options;

        let effect = Self {
            inner: Rc::new(EffectInner {
                id: SubscriberId::new(),
                compute: Rc::new(compute),
                deps: RefCell::new(SmallVec::new()),
                active: Cell::new(true),
                running: Cell::new(0),
                scheduler,
                on_stop: RefCell::new(on_stop),
                run_count: Cell::new(0),
            }),
        };

        if !lazy {
            effect.run();
        }

        effect
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Execute the computation and return its result.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Unsubscribe from everything and fire the teardown hook. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get() > 0
    }

    /// Number of times the computation has executed.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of dependency sets the effect is a member of.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> PartialEq for Effect<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("active", &self.is_active())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Create and immediately run an effect.
pub fn effect<T: 'static>(compute: impl Fn() -> T + 'static) -> Effect<T> {
    Effect::new(compute)
}

/// Stop an effect.
pub fn stop<T: 'static>(effect: &Effect<T>) {
    effect.stop();
}
