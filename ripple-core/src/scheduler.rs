//! Job Scheduler
//!
//! The scheduler batches deferred work so that many writes in one
//! synchronous turn produce at most one re-render per component.
//!
//! # Queues
//!
//! - **Jobs**: order-preserving and duplicate-suppressing. A job already in
//!   the queue is not queued again. Component update jobs live here.
//! - **Pre-flush callbacks**: order-preserving, no dedup. Watchers use this
//!   queue so they observe new state before the view repaints.
//!
//! # Flushing
//!
//! The first request in a tick schedules one flush; later requests in the
//! same tick are no-ops. A flush:
//!
//! 1. Runs every pending pre-flush callback in insertion order
//! 2. Drains the job queue front to back, removing each job before it runs
//! 3. Repeats while either queue received new work
//! 4. Wakes everything waiting on [`next_tick`]
//!
//! A job that re-queues itself while running is legal and runs again in the
//! same flush, up to the configured recursion limit.
//!
//! # Timing
//!
//! With a current-thread tokio runtime on this thread the flush is spawned
//! as a task, so it runs once the synchronous code yields. Without one the
//! flush stays pending until [`flush_jobs`] is called or a [`next_tick`]
//! future is awaited.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;

use crate::config::RuntimeConfig;

/// Identity of a job, used for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        thread_local! {
            static COUNTER: std::cell::Cell<u64> = const { std::cell::Cell::new(0) };
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

/// A unit of deferred work with a stable identity.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    run: Rc<dyn Fn()>,
}

impl Job {
    pub fn new(run: impl Fn() + 'static) -> Self {
        Self {
            id: JobId::next(),
            run: Rc::new(run),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn run(&self) {
        (self.run)()
    }
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Job").field(&self.id.0).finish()
    }
}

#[derive(Default)]
struct SchedulerState {
    jobs: VecDeque<Job>,
    pre_flush: VecDeque<Rc<dyn Fn()>>,
    /// A flush has been requested and has not completed yet.
    pending: bool,
    /// The pending flush was handed to a tokio runtime.
    spawned: bool,
    flushing: bool,
    waiters: Vec<oneshot::Sender<()>>,
    after_flush: Vec<Box<dyn FnOnce()>>,
}

thread_local! {
    static SCHEDULER: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

/// Queue a job unless it is already queued, then request a flush.
pub fn queue_job(job: &Job) {
    let queued = SCHEDULER.with(|s| {
        let mut s = s.borrow_mut();
        if s.jobs.iter().any(|queued| queued.id == job.id) {
            false
        } else {
            s.jobs.push_back(job.clone());
            true
        }
    });

    if queued {
        request_flush();
    }
}

/// Drop a queued job without running it.
pub fn invalidate_job(job: &Job) {
    SCHEDULER.with(|s| s.borrow_mut().jobs.retain(|queued| queued.id != job.id));
}

/// Queue a callback to run before the next batch of jobs.
pub fn queue_pre_flush_cb(cb: impl Fn() + 'static) {
    SCHEDULER.with(|s| s.borrow_mut().pre_flush.push_back(Rc::new(cb)));
    request_flush();
}

fn request_flush() {
    let spawn = SCHEDULER.with(|s| {
        let mut s = s.borrow_mut();
        if s.pending {
            return false;
        }
        s.pending = true;
        true
    });

    if !spawn {
        return;
    }

    // Thread-local queues can only be drained on this thread.
    if let Ok(handle) = Handle::try_current() {
        if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
            SCHEDULER.with(|s| s.borrow_mut().spawned = true);
            handle.spawn(async { flush_jobs() });
            return;
        }
    }
    tracing::trace!(target: "ripple::scheduler", "flush requested without a current-thread runtime");
}

/// Whether a flush has been requested and not yet run.
pub fn is_flush_pending() -> bool {
    SCHEDULER.with(|s| s.borrow().pending)
}

/// Number of jobs waiting in the queue.
pub fn pending_jobs() -> usize {
    SCHEDULER.with(|s| s.borrow().jobs.len())
}

/// Run pending pre-flush callbacks and jobs now.
///
/// Re-entrant calls made from inside a flush return immediately; the outer
/// flush picks up whatever they would have run.
pub fn flush_jobs() {
    let Some(guard) = FlushGuard::enter() else {
        return;
    };

    tracing::debug!(target: "ripple::scheduler", jobs = pending_jobs(), "flush start");

    let limit = RuntimeConfig::current().recursion_limit;
    let mut runs: HashMap<JobId, usize> = HashMap::new();

    loop {
        while let Some(cb) = SCHEDULER.with(|s| s.borrow_mut().pre_flush.pop_front()) {
            cb();
        }

        let Some(job) = SCHEDULER.with(|s| s.borrow_mut().jobs.pop_front()) else {
            if SCHEDULER.with(|s| s.borrow().pre_flush.is_empty()) {
                break;
            }
            continue;
        };

        let count = runs.entry(job.id).or_insert(0);
        *count += 1;
        if *count > limit {
            tracing::error!(
                target: "ripple::scheduler",
                job = job.id.0,
                limit,
                "maximum recursive updates exceeded; dropping job"
            );
            continue;
        }

        job.run();
    }

    drop(guard);
    let (waiters, after_flush) = SCHEDULER.with(|s| {
        let mut s = s.borrow_mut();
        (std::mem::take(&mut s.waiters), std::mem::take(&mut s.after_flush))
    });

    tracing::debug!(target: "ripple::scheduler", "flush end");

    for waiter in waiters {
        let _ = waiter.send(());
    }
    for cb in after_flush {
        cb();
    }
}

/// Marks a flush in progress. Dropping it, on return or unwind, leaves the
/// scheduler ready for the next request.
struct FlushGuard;

impl FlushGuard {
    fn enter() -> Option<Self> {
        SCHEDULER.with(|s| {
            let mut s = s.borrow_mut();
            if s.flushing {
                return None;
            }
            s.flushing = true;
            Some(Self)
        })
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        SCHEDULER.with(|s| {
            if let Ok(mut s) = s.try_borrow_mut() {
                s.flushing = false;
                s.pending = false;
                s.spawned = false;
            }
        });
    }
}

/// A future that resolves after the next flush completes.
///
/// If no runtime picked the flush up, awaiting the future runs it inline.
pub fn next_tick() -> impl Future<Output = ()> {
    let (tx, rx) = oneshot::channel();
    SCHEDULER.with(|s| s.borrow_mut().waiters.push(tx));
    request_flush();

    async move {
        let inline = SCHEDULER.with(|s| {
            let s = s.borrow();
            s.pending && !s.spawned && !s.flushing
        });
        if inline {
            flush_jobs();
        }
        let _ = rx.await;
    }
}

/// Run `cb` once the next flush completes.
pub fn next_tick_then(cb: impl FnOnce() + 'static) {
    SCHEDULER.with(|s| s.borrow_mut().after_flush.push(Box::new(cb)));
    request_flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn log() -> Rc<RefCell<Vec<&'static str>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn duplicate_jobs_run_once() {
        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        let job = Job::new(move || r.set(r.get() + 1));

        queue_job(&job);
        queue_job(&job);
        assert_eq!(pending_jobs(), 1);
        assert!(is_flush_pending());

        flush_jobs();
        assert_eq!(runs.get(), 1);
        assert!(!is_flush_pending());
    }

    #[test]
    fn pre_flush_callbacks_run_before_jobs() {
        let events = log();

        let e = events.clone();
        let job = Job::new(move || e.borrow_mut().push("job"));
        queue_job(&job);

        let e = events.clone();
        queue_pre_flush_cb(move || e.borrow_mut().push("pre-1"));
        let e = events.clone();
        queue_pre_flush_cb(move || e.borrow_mut().push("pre-2"));

        flush_jobs();
        assert_eq!(*events.borrow(), vec!["pre-1", "pre-2", "job"]);
    }

    #[test]
    fn jobs_may_requeue_themselves_during_a_flush() {
        let runs = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Job>>> = Rc::new(RefCell::new(None));

        let (r, s) = (runs.clone(), slot.clone());
        let job = Job::new(move || {
            r.set(r.get() + 1);
            if r.get() < 3 {
                if let Some(job) = s.borrow().as_ref() {
                    queue_job(job);
                }
            }
        });
        *slot.borrow_mut() = Some(job.clone());

        queue_job(&job);
        flush_jobs();
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn runaway_jobs_are_cut_at_the_recursion_limit() {
        RuntimeConfig {
            recursion_limit: 5,
            ..RuntimeConfig::default()
        }
        .install();

        let runs = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Job>>> = Rc::new(RefCell::new(None));
        let (r, s) = (runs.clone(), slot.clone());
        let job = Job::new(move || {
            r.set(r.get() + 1);
            if let Some(job) = s.borrow().as_ref() {
                queue_job(job);
            }
        });
        *slot.borrow_mut() = Some(job.clone());

        queue_job(&job);
        flush_jobs();
        RuntimeConfig::default().install();

        assert_eq!(runs.get(), 5);
        assert_eq!(pending_jobs(), 0);
    }

    #[test]
    fn next_tick_then_runs_after_the_flush() {
        let events = log();

        let e = events.clone();
        next_tick_then(move || e.borrow_mut().push("tick"));
        let e = events.clone();
        queue_job(&Job::new(move || e.borrow_mut().push("job")));

        assert!(events.borrow().is_empty());
        flush_jobs();
        assert_eq!(*events.borrow(), vec!["job", "tick"]);
    }

    /// Test that a panicking job does not wedge the scheduler.
    #[test]
    fn a_panicking_job_leaves_the_scheduler_usable() {
        queue_job(&Job::new(|| panic!("job failed")));
        let result = std::panic::catch_unwind(flush_jobs);
        assert!(result.is_err());
        assert!(!is_flush_pending());

        let runs = Rc::new(Cell::new(0));
        let r = runs.clone();
        queue_job(&Job::new(move || r.set(r.get() + 1)));
        assert!(is_flush_pending());

        flush_jobs();
        assert_eq!(runs.get(), 1);
        assert!(!is_flush_pending());
    }
}
