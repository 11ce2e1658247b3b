//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (observed objects, refs, computed values, effects)
//! - A batched job scheduler with pre-flush watchers
//! - Virtual nodes and a keyed reconciler over a pluggable host
//! - Components with setup, slots, emit and provide/inject
//!
//! # Architecture
//!
//! - `reactive`: dependency tracking and the effect lifecycle
//! - `scheduler`: per-tick job queue, `next_tick`
//! - `watch`: `watch_effect`
//! - `vnode`: the virtual tree
//! - `component`: component definitions and instances
//! - `host`: the host adapter trait and an in-memory host
//! - `renderer`: patching, the keyed diff and app mounting
//!
//! Everything runs on one thread. Reactive state, queues and component
//! instances are thread-local and reference counted.
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::prelude::*;
//!
//! let counter = Component::builder("Counter")
//!     .setup(|_, _| Object::new().with("count", Ref::new(0)))
//!     .render(|ctx| h("p", Props::new(), format!("count: {}", ctx.get("count"))))
//!     .build();
//!
//! let renderer = Renderer::new(MemoryHost::new());
//! let root = renderer.host_mut().create_root();
//! renderer.create_app(counter).mount(root)?;
//!
//! assert_eq!(renderer.host().inner_html(root), "<p>count: 0</p>");
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod host;
pub mod reactive;
pub mod renderer;
pub mod scheduler;
pub mod vnode;
pub mod watch;

pub use error::{CompileError, Result, RuntimeError};

/// The names most applications need.
pub mod prelude {
    pub use crate::component::{
        current_instance, inject, inject_or, provide, Component, ComponentInstance, RenderContext,
        RenderFn, SetupContext, SetupResult, TemplateCompiler,
    };
    pub use crate::config::{ReadonlyWritePolicy, RuntimeConfig};
    pub use crate::error::{CompileError, Result, RuntimeError};
    pub use crate::host::{HostAdapter, HostHandle, MemoryHost};
    pub use crate::reactive::{
        computed, effect, is_proxy, is_reactive, is_readonly, is_ref, proxy_refs, reactive,
        readonly, shallow_readonly, stop, to_raw, to_ref, to_refs, unref, Callback, Computed,
        Effect, EffectOptions, Object, Reactive, Ref, Value,
    };
    pub use crate::renderer::{create_renderer, App, Renderer};
    pub use crate::scheduler::{
        flush_jobs, next_tick, next_tick_then, queue_job, queue_pre_flush_cb, Job,
    };
    pub use crate::vnode::{h, Children, Key, NodeList, Props, Slots, VNode};
    pub use crate::watch::{watch_effect, OnCleanup, WatchHandle};
}
