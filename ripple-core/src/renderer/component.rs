//! Component mounting, updating and teardown.
//!
//! Each mounted component owns one update effect. The effect renders the
//! component and patches the result against the previous subtree; its
//! scheduler queues the component's job instead of re-rendering inline, so
//! any number of writes in one tick cost one render.

use std::cell::Cell;
use std::rc::Rc;

use super::Inner;
use crate::component::{Component, ComponentInstance};
use crate::error::Result;
use crate::host::{HostAdapter, HostHandle};
use crate::reactive::{Effect, EffectOptions};
use crate::scheduler::{invalidate_job, queue_job, Job};
use crate::vnode::{Children, VNode, KEY_PROP};

impl<H: HostAdapter + 'static> Inner<H> {
    pub(super) fn process_component(
        self: &Rc<Self>,
        old: Option<&VNode>,
        new: &VNode,
        component: &Component,
        container: HostHandle,
        anchor: Option<HostHandle>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Result<()> {
        match old.and_then(|old| old.component_instance().map(|instance| (old, instance))) {
            Some((old, instance)) => self.update_component(old, new, instance),
            None => self.mount_component(new, component, container, anchor, parent),
        }
    }

    fn mount_component(
        self: &Rc<Self>,
        vnode: &VNode,
        component: &Component,
        container: HostHandle,
        anchor: Option<HostHandle>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Result<()> {
        let instance = ComponentInstance::new(vnode, component.clone(), parent);
        vnode.set_component_instance(Rc::clone(&instance));
        tracing::debug!(target: "ripple::renderer", component = instance.name(), uid = instance.uid(), "mount");

        instance.setup(self.compiler.as_deref())?;
        instance.container.set(Some(container));
        self.setup_render_effect(&instance, anchor)
    }

    fn setup_render_effect(self: &Rc<Self>, instance: &Rc<ComponentInstance>, anchor: Option<HostHandle>) -> Result<()> {
        let compute = {
            let renderer = Rc::downgrade(self);
            let instance = Rc::downgrade(instance);
            // Only the first render inserts; later ones patch in place.
            let anchor = Cell::new(anchor);
            move || match (renderer.upgrade(), instance.upgrade()) {
                (Some(renderer), Some(instance)) => renderer.render_component(&instance, anchor.take()),
                _ => Ok(()),
            }
        };

        let job = {
            let instance = Rc::downgrade(instance);
            Job::new(move || {
                if let Some(instance) = instance.upgrade() {
                    run_update(&instance);
                }
            })
        };

        let scheduler = {
            let job = job.clone();
            move || queue_job(&job)
        };

        let effect = Effect::with_options(compute, EffectOptions::new().scheduler(scheduler).lazy());
        *instance.update.borrow_mut() = Some(effect.clone());
        *instance.job.borrow_mut() = Some(job);

        effect.run()
    }

    /// Body of a component's update effect.
    fn render_component(self: &Rc<Self>, instance: &Rc<ComponentInstance>, anchor: Option<HostHandle>) -> Result<()> {
        let Some(container) = instance.container.get() else {
            return Ok(());
        };

        if !instance.is_mounted() {
            let subtree = instance.render_subtree()?.claim();
            self.patch(None, &subtree, container, anchor, Some(instance))?;
            instance.vnode().set_el(subtree.el());
            *instance.subtree.borrow_mut() = Some(subtree);
            instance.is_mounted.set(true);
            return Ok(());
        }

        tracing::debug!(target: "ripple::renderer", component = instance.name(), uid = instance.uid(), "update");

        let next = instance.next.borrow_mut().take();
        if let Some(next) = next {
            instance.apply_next(next);
        }

        let rendered = instance.render_subtree()?;
        let previous = instance.subtree();
        let next_tree = match &previous {
            Some(previous) if previous.ptr_eq(&rendered) => rendered,
            _ => rendered.claim(),
        };
        *instance.subtree.borrow_mut() = Some(next_tree.clone());
        self.patch(previous.as_ref(), &next_tree, container, None, Some(instance))?;
        instance.vnode().set_el(next_tree.el());
        Ok(())
    }

    fn update_component(self: &Rc<Self>, old: &VNode, new: &VNode, instance: Rc<ComponentInstance>) -> Result<()> {
        new.set_component_instance(Rc::clone(&instance));

        if !should_update_component(old, new) {
            new.set_el(old.el());
            instance.relink(new.clone());
            return Ok(());
        }

        *instance.next.borrow_mut() = Some(new.clone());
        // The forced run below covers any update already queued.
        if let Some(job) = instance.job.borrow().as_ref() {
            invalidate_job(job);
        }

        let effect = instance.update.borrow().clone();
        match effect {
            Some(effect) => effect.run(),
            None => Ok(()),
        }
    }

    pub(super) fn unmount_component(&self, vnode: &VNode, remove: bool) {
        let Some(instance) = vnode.component_instance() else {
            return;
        };
        tracing::debug!(target: "ripple::renderer", component = instance.name(), uid = instance.uid(), "unmount");

        let effect = instance.update.borrow().clone();
        if let Some(effect) = effect {
            effect.stop();
        }
        if let Some(job) = instance.job.borrow().as_ref() {
            invalidate_job(job);
        }
        instance.is_unmounted.set(true);

        let subtree = instance.subtree();
        if let Some(subtree) = subtree {
            self.unmount(&subtree, remove);
        }

        vnode.clear_component_instance();
        instance.release();
    }
}

fn run_update(instance: &Rc<ComponentInstance>) {
    if instance.is_unmounted() {
        return;
    }
    let effect = instance.update.borrow().clone();
    if let Some(effect) = effect {
        if let Err(err) = effect.run() {
            tracing::error!(
                target: "ripple::renderer",
                component = instance.name(),
                uid = instance.uid(),
                error = %err,
                "component update failed"
            );
        }
    }
}

/// A parent re-render updates a child only when its props changed (or it
/// takes slots, which are rebuilt on every parent render).
fn should_update_component(old: &VNode, new: &VNode) -> bool {
    if matches!(old.children(), Children::Slots(_)) || matches!(new.children(), Children::Slots(_)) {
        return true;
    }

    let (prev, next) = (old.props(), new.props());
    let count = |props: &crate::vnode::Props| props.iter().filter(|(k, _)| *k != KEY_PROP).count();
    if count(prev) != count(next) {
        return true;
    }

    next.iter()
        .filter(|(k, _)| *k != KEY_PROP)
        .any(|(k, v)| prev.get(k) != Some(v))
}
