//! Keyed Children Diff
//!
//! Reconciles two ordered child lists, classifying every node as kept,
//! moved, inserted or removed, and issuing as few host moves as possible.
//!
//! # Algorithm
//!
//! 1. **Prefix.** Walk forward from the start while the nodes are the same
//!    kind and key, patching them in place.
//! 2. **Suffix.** Walk backward from both ends the same way.
//! 3. **Pure insert.** If the old list is used up, mount what is left of the
//!    new one before the node following it.
//! 4. **Pure remove.** If the new list is used up, unmount what is left of
//!    the old one.
//! 5. **Middle.** Otherwise map the remaining new keys to their positions
//!    and walk the remaining old nodes. Each one is either removed or
//!    patched in place, and its old position is recorded at its new
//!    position (`0` meaning "no old node, mount fresh"). If the recorded new
//!    positions ever go backwards, something moved.
//! 6. **Moves.** Nodes on the longest increasing subsequence of old
//!    positions are already in relative order and stay put. Walking the new
//!    middle range back to front, everything else is mounted (position `0`)
//!    or moved in front of the node after it.

use std::collections::HashMap;
use std::rc::Rc;

use super::sequence::longest_increasing_subsequence;
use super::Inner;
use crate::component::ComponentInstance;
use crate::error::Result;
use crate::host::{HostAdapter, HostHandle};
use crate::vnode::{Key, NodeList, VNode};

impl<H: HostAdapter + 'static> Inner<H> {
    pub(super) fn patch_keyed_children(
        self: &Rc<Self>,
        old: &[VNode],
        list: &NodeList,
        container: HostHandle,
        parent_anchor: Option<HostHandle>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Result<()> {
        // New nodes that are already mounted elsewhere get fresh copies, so
        // patching never steals another node's host handles.
        let mut new = list.claim_all();
        let new_len = new.len();
        let mut i = 0usize;
        // Inclusive ends; -1 means the list is used up from the back.
        let mut old_end = old.len() as isize - 1;
        let mut new_end = new_len as isize - 1;

        // 1. Prefix
        while (i as isize) <= old_end && (i as isize) <= new_end && old[i].same_kind(&new[i]) {
            tracing::trace!(target: "ripple::diff", index = i, "patch prefix");
            self.patch(Some(&old[i]), &new[i], container, None, parent)?;
            i += 1;
        }

        // 2. Suffix
        while (i as isize) <= old_end && (i as isize) <= new_end {
            let (o, n) = (&old[old_end as usize], &new[new_end as usize]);
            if !o.same_kind(n) {
                break;
            }
            tracing::trace!(target: "ripple::diff", old = old_end, new = new_end, "patch suffix");
            self.patch(Some(o), n, container, None, parent)?;
            old_end -= 1;
            new_end -= 1;
        }

        let start = i as isize;

        // 3. Pure insert
        if start > old_end {
            if start <= new_end {
                let next = new_end as usize + 1;
                let anchor = if next < new_len { new[next].el() } else { parent_anchor };
                for index in i..=new_end as usize {
                    tracing::trace!(target: "ripple::diff", new = index, "mount");
                    self.mount_claimed(list, &mut new, index, container, anchor, parent)?;
                }
            }
            return Ok(());
        }

        // 4. Pure remove
        if start > new_end {
            for node in &old[i..=old_end as usize] {
                tracing::trace!(target: "ripple::diff", "remove");
                self.unmount(node, true);
            }
            return Ok(());
        }

        // 5. Middle
        let (old_start, new_start) = (i, i);
        let (old_end, new_end) = (old_end as usize, new_end as usize);

        let key_to_new_index: HashMap<&Key, usize> = (new_start..=new_end)
            .filter_map(|j| new[j].key().map(|key| (key, j)))
            .collect();

        let to_be_patched = new_end - new_start + 1;
        let mut new_to_old = vec![0usize; to_be_patched];
        let mut patched = 0usize;
        let mut moved = false;
        let mut max_new_index_so_far = 0usize;

        for (old_index, prev) in old.iter().enumerate().take(old_end + 1).skip(old_start) {
            if patched >= to_be_patched {
                // Every new node has its match; the rest can only go.
                tracing::trace!(target: "ripple::diff", old = old_index, "remove surplus");
                self.unmount(prev, true);
                continue;
            }

            let new_index = match prev.key() {
                Some(key) => key_to_new_index.get(key).copied(),
                None => (new_start..=new_end)
                    .find(|&j| new_to_old[j - new_start] == 0 && prev.same_kind(&new[j])),
            };

            let Some(new_index) = new_index else {
                tracing::trace!(target: "ripple::diff", old = old_index, "remove");
                self.unmount(prev, true);
                continue;
            };

            new_to_old[new_index - new_start] = old_index + 1;
            if new_index >= max_new_index_so_far {
                max_new_index_so_far = new_index;
            } else {
                moved = true;
            }
            self.patch(Some(prev), &new[new_index], container, None, parent)?;
            patched += 1;
        }

        // 6. Moves and mounts
        let stable = if moved {
            longest_increasing_subsequence(&new_to_old)
        } else {
            Vec::new()
        };
        let mut stable_rev = stable.iter().rev().peekable();

        for offset in (0..to_be_patched).rev() {
            let index = new_start + offset;
            let anchor = if index + 1 < new_len {
                new[index + 1].el()
            } else {
                parent_anchor
            };

            if new_to_old[offset] == 0 {
                tracing::trace!(target: "ripple::diff", new = index, "mount");
                self.mount_claimed(list, &mut new, index, container, anchor, parent)?;
            } else if moved {
                if stable_rev.peek() == Some(&&offset) {
                    stable_rev.next();
                } else {
                    tracing::trace!(target: "ripple::diff", new = index, "move");
                    self.move_node(&new[index], container, anchor);
                }
            }
        }

        Ok(())
    }

    /// Mount entry `index`. An earlier mount in this pass may have used the
    /// same node deeper in the tree, so it is claimed again first.
    fn mount_claimed(
        self: &Rc<Self>,
        list: &NodeList,
        new: &mut [VNode],
        index: usize,
        container: HostHandle,
        anchor: Option<HostHandle>,
        parent: Option<&Rc<ComponentInstance>>,
    ) -> Result<()> {
        if let Some(node) = list.claim(index) {
            new[index] = node;
        }
        self.patch(None, &new[index], container, anchor, parent)
    }
}
