//! Integration Tests for Tick Scheduling
//!
//! These tests run under tokio. On a current-thread runtime the flush is a
//! spawned task; on any other runtime awaiting `next_tick` flushes inline.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ripple_core::prelude::*;
use ripple_core::scheduler::is_flush_pending;

fn mount_counter(count: &Ref, renders: &Rc<Cell<usize>>) -> (Renderer<MemoryHost>, HostHandle) {
    let (c, r) = (count.clone(), renders.clone());
    let counter = Component::builder("Counter")
        .render(move |_| {
            r.set(r.get() + 1);
            h("p", Props::new(), c.get().to_string())
        })
        .build();

    let renderer = Renderer::new(MemoryHost::new());
    let root = renderer.host_mut().create_root();
    renderer.create_app(counter).mount(root).unwrap();
    (renderer, root)
}

/// Test that awaiting the next tick observes a single batched re-render.
#[tokio::test]
async fn next_tick_sees_one_batched_render() {
    let count = Ref::new(0);
    let renders = Rc::new(Cell::new(0));
    let (renderer, root) = mount_counter(&count, &renders);

    for n in 1..=10 {
        count.set(n);
    }
    assert!(is_flush_pending());
    assert_eq!(renderer.host().inner_html(root), "<p>0</p>");

    next_tick().await;
    assert_eq!(renderer.host().inner_html(root), "<p>10</p>");
    assert_eq!(renders.get(), 2);
    assert!(!is_flush_pending());
}

/// Test that the spawned flush runs as soon as the test yields.
#[tokio::test]
async fn flush_runs_when_the_task_yields() {
    let count = Ref::new(0);
    let renders = Rc::new(Cell::new(0));
    let (renderer, root) = mount_counter(&count, &renders);

    count.set(1);
    tokio::task::yield_now().await;

    assert_eq!(renderer.host().inner_html(root), "<p>1</p>");
}

/// Test that next_tick with nothing queued still resolves.
#[tokio::test]
async fn empty_next_tick_resolves() {
    next_tick().await;
    next_tick().await;
    assert!(!is_flush_pending());
}

/// Test that watchers observe new state before components repaint.
#[tokio::test]
async fn watchers_run_before_component_updates() {
    let count = Ref::new(0);
    let renders = Rc::new(Cell::new(0));
    let (renderer, root) = mount_counter(&count, &renders);

    let renderer = Rc::new(renderer);
    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let (c, s, r) = (count.clone(), seen.clone(), renderer.clone());
    let _watch = watch_effect(move |_| {
        let value = c.get();
        s.borrow_mut()
            .push(format!("{value} {}", r.host().inner_html(root)));
    });

    count.set(5);
    next_tick().await;

    assert_eq!(*seen.borrow(), vec!["0 <p>0</p>", "5 <p>0</p>"]);
    assert_eq!(renderer.host().inner_html(root), "<p>5</p>");
}

/// Test that after-flush callbacks run once the DOM is updated.
#[tokio::test]
async fn next_tick_then_sees_the_updated_tree() {
    let count = Ref::new(0);
    let renders = Rc::new(Cell::new(0));
    let (renderer, root) = mount_counter(&count, &renders);

    let renderer = Rc::new(renderer);
    let seen = Rc::new(RefCell::new(String::new()));
    let (r, s) = (renderer.clone(), seen.clone());

    count.set(3);
    next_tick_then(move || *s.borrow_mut() = r.host().inner_html(root));
    next_tick().await;

    assert_eq!(*seen.borrow(), "<p>3</p>");
}

/// Test that a job queued twice in a tick runs once.
#[tokio::test]
async fn jobs_are_deduplicated_within_a_tick() {
    let runs = Rc::new(Cell::new(0));
    let r = runs.clone();
    let job = Job::new(move || r.set(r.get() + 1));

    queue_job(&job);
    queue_job(&job);
    next_tick().await;
    assert_eq!(runs.get(), 1);

    queue_job(&job);
    next_tick().await;
    assert_eq!(runs.get(), 2);
}

/// Test that without a current-thread runtime awaiting next_tick flushes inline.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn multi_thread_runtime_flushes_on_await() {
    let count = Ref::new(0);
    let renders = Rc::new(Cell::new(0));
    let (renderer, root) = mount_counter(&count, &renders);

    count.set(7);
    assert!(is_flush_pending());
    assert_eq!(renderer.host().inner_html(root), "<p>0</p>");

    next_tick().await;
    assert_eq!(renderer.host().inner_html(root), "<p>7</p>");
}
