//! Keyed children diff.
//!
//! # How It Works
//!
//! 1. Patch the common prefix, then the common suffix, while keys match.
//! 2. If only new nodes remain, mount them. If only old nodes remain,
//!    unmount them.
//! 3. Otherwise match the remaining new nodes to old nodes by key. Each new
//!    position records the old index it came from, or `-1` if it is new.
//!    Old nodes nobody claimed are unmounted.
//! 4. The longest increasing subsequence of the recorded indices is the
//!    largest set of nodes already in the right relative order. Walking the
//!    new range backwards, everything outside it is moved before its right
//!    neighbour, and every `-1` is mounted there.

use std::collections::HashMap;

use tracing::trace;

use super::Renderer;
use crate::host::HostNode;
use crate::vnode::{VKey, VNode};

fn same_node(a: &VNode, b: &VNode) -> bool {
    a.key == b.key && a.ty.is_same(&b.ty)
}

impl Renderer {
    pub(super) fn patch_keyed_children(
        &self,
        old: &mut [VNode],
        new: &mut [VNode],
        container: HostNode,
        parent_anchor: Option<HostNode>,
    ) {
        let new_len = new.len();
        let mut start = 0usize;
        let mut old_end = old.len() as isize - 1;
        let mut new_end = new_len as isize - 1;

        while (start as isize) <= old_end && (start as isize) <= new_end {
            if !same_node(&old[start], &new[start]) {
                break;
            }
            self.patch(Some(&mut old[start]), &mut new[start], container, None);
            start += 1;
        }

        while (start as isize) <= old_end && (start as isize) <= new_end {
            let (o, n) = (old_end as usize, new_end as usize);
            if !same_node(&old[o], &new[n]) {
                break;
            }
            self.patch(Some(&mut old[o]), &mut new[n], container, None);
            old_end -= 1;
            new_end -= 1;
        }

        if start as isize > old_end {
            if start as isize <= new_end {
                let next_pos = (new_end + 1) as usize;
                let anchor = if next_pos < new_len {
                    self.first_host_node(&new[next_pos])
                } else {
                    parent_anchor
                };
                for child in &mut new[start..next_pos] {
                    self.patch(None, child, container, anchor);
                }
            }
            return;
        }

        if start as isize > new_end {
            for child in &mut old[start..=old_end as usize] {
                self.unmount(child, true);
            }
            return;
        }

        let (old_end, new_end) = (old_end as usize, new_end as usize);
        let mut key_to_old: HashMap<VKey, usize> = HashMap::new();
        for (index, child) in old.iter().enumerate().take(old_end + 1).skip(start) {
            if let Some(key) = &child.key {
                key_to_old.entry(key.clone()).or_insert(index);
            }
        }

        let to_patch = new_end - start + 1;
        let mut sources = vec![-1isize; to_patch];
        let mut claimed = vec![false; old.len()];
        let mut moved = false;
        let mut max_old_so_far = 0usize;

        for new_index in start..=new_end {
            let Some(old_index) = new[new_index]
                .key
                .as_ref()
                .and_then(|key| key_to_old.remove(key))
            else {
                continue;
            };

            sources[new_index - start] = old_index as isize;
            claimed[old_index] = true;
            if old_index >= max_old_so_far {
                max_old_so_far = old_index;
            } else {
                moved = true;
            }
            self.patch(Some(&mut old[old_index]), &mut new[new_index], container, None);
        }

        for index in start..=old_end {
            if !claimed[index] {
                trace!(index, "unmount unmatched keyed child");
                self.unmount(&mut old[index], true);
            }
        }

        let stable = if moved {
            longest_increasing_subsequence(&sources)
        } else {
            Vec::new()
        };
        let mut stable = stable.iter().rev().peekable();

        for offset in (0..to_patch).rev() {
            let index = start + offset;
            let anchor = if index + 1 < new_len {
                self.first_host_node(&new[index + 1])
            } else {
                parent_anchor
            };

            if sources[offset] == -1 {
                trace!(index, "mount keyed child");
                self.patch(None, &mut new[index], container, anchor);
            } else if moved {
                if stable.peek() == Some(&&offset) {
                    stable.next();
                } else {
                    trace!(index, key = ?new[index].key, "move keyed child");
                    self.move_vnode(&new[index], container, anchor);
                }
            }
        }
    }
}

/// Positions forming a longest strictly increasing subsequence of `seq`.
///
/// Negative entries mark slots with no predecessor and are never part of the
/// result. Runs in O(n log n).
///
/// ```
/// use ripple_core::renderer::longest_increasing_subsequence;
///
/// assert_eq!(longest_increasing_subsequence(&[2, 0, 1]), vec![1, 2]);
/// assert_eq!(longest_increasing_subsequence(&[3, -1, 1, 2]), vec![2, 3]);
/// ```
pub fn longest_increasing_subsequence(seq: &[isize]) -> Vec<usize> {
    let mut predecessor: Vec<Option<usize>> = vec![None; seq.len()];
    // tails[k]: position of the smallest tail of an increasing run of k + 1.
    let mut tails: Vec<usize> = Vec::new();

    for (i, &value) in seq.iter().enumerate() {
        if value < 0 {
            continue;
        }
        let k = tails.partition_point(|&t| seq[t] < value);
        if k > 0 {
            predecessor[i] = Some(tails[k - 1]);
        }
        if k == tails.len() {
            tails.push(i);
        } else {
            tails[k] = i;
        }
    }

    let mut result = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        result.push(i);
        cursor = predecessor[i];
    }
    result.reverse();
    result
}
