//! Reactive Primitives
//!
//! This module implements the dependency-tracking core: observed objects,
//! boxed references, computed values and the effects that consume them.
//!
//! # Concepts
//!
//! ## Observed objects
//!
//! [`reactive`] wraps a raw [`Object`] so that every read made by a running
//! effect is recorded in the dependency map under `(object, key)`, and every
//! write notifies the effects recorded there.
//!
//! ## Refs
//!
//! A [`Ref`] is a single reactive slot with its own dependency set.
//!
//! ## Effects
//!
//! An [`Effect`] is the subscriber type of the graph. It re-runs (or calls
//! its scheduler) when something it read during its last run changes.
//!
//! ## Computed values
//!
//! A [`Computed`] is an effect whose scheduler only marks a cache dirty; the
//! getter runs again on the next read.
//!
//! # Implementation Notes
//!
//! The "currently running effect" lives on a thread-local context stack
//! (see [`ReactiveContext`]) rather than in a bare global, so nested runs
//! restore the outer effect and reads can be explicitly untracked.

mod computed;
mod context;
mod effect;
mod object;
mod reference;
mod runtime;
mod subscriber;
mod value;

pub use computed::{computed, Computed, ComputedState};
pub use context::{untrack, ReactiveContext};
pub use effect::{effect, stop, Effect, EffectOptions};
pub use object::{
    is_proxy, is_reactive, is_readonly, reactive, readonly, shallow_readonly, to_raw, Mode,
    Reactive, IS_REACTIVE, IS_READONLY,
};
pub use reference::{is_ref, proxy_refs, to_ref, to_refs, unref, ProxyRefs, Ref};
pub use runtime::{subscriber_count, track, trigger, Dep};
pub use subscriber::SubscriberId;
pub use value::{has_changed, Callback, Object, ObjectId, Value};
