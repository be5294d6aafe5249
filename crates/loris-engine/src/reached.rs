//! Reached set: the frontier waitlist, the per-location index, and the
//! per-node precision map.
//!
//! The ARG owns the states; the reached set only holds indices into it.
//! Covered nodes are never indexed here, so coverage checks scan real
//! reached states only.

use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use loris_cfa::NodeId;

use crate::arg::ArgId;
use crate::composite::CompositePrecision;
use crate::config::TraversalOrder;

/// Waitlist plus location index plus precision map.
#[derive(Default)]
pub struct ReachedSet {
    waitlist: VecDeque<(ArgId, NodeId)>,
    by_location: IndexMap<NodeId, Vec<ArgId>>,
    precisions: HashMap<ArgId, CompositePrecision>,
}

impl ReachedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node as reached and put it on the waitlist.
    pub fn add(&mut self, id: ArgId, location: NodeId, precision: CompositePrecision) {
        self.by_location.entry(location).or_default().push(id);
        self.precisions.insert(id, precision);
        self.waitlist.push_back((id, location));
    }

    /// Put an already-reached node back on the waitlist (after uncovering or
    /// losing a child).
    pub fn re_add_to_waitlist(&mut self, id: ArgId, location: NodeId) {
        if !self.waitlist.iter().any(|(w, _)| *w == id) {
            self.waitlist.push_back((id, location));
        }
    }

    /// Pop the next frontier node per the traversal order. Popped ids may be
    /// stale (node removed or covered since enqueueing); the caller skips
    /// those.
    pub fn pop_frontier(&mut self, order: TraversalOrder) -> Option<ArgId> {
        match order {
            TraversalOrder::DepthFirst => self.waitlist.pop_back().map(|(id, _)| id),
            TraversalOrder::BreadthFirst => self.waitlist.pop_front().map(|(id, _)| id),
            TraversalOrder::LocationOrder => {
                let pos = self
                    .waitlist
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, (_, loc))| *loc)
                    .map(|(i, _)| i)?;
                self.waitlist.remove(pos).map(|(id, _)| id)
            }
        }
    }

    pub fn waitlist_is_empty(&self) -> bool {
        self.waitlist.is_empty()
    }

    /// Drop a node from the index and precision map (and the waitlist, where
    /// it may still be queued).
    pub fn remove(&mut self, id: ArgId, location: NodeId) {
        if let Some(ids) = self.by_location.get_mut(&location) {
            ids.retain(|r| *r != id);
        }
        self.precisions.remove(&id);
        self.waitlist.retain(|(w, _)| *w != id);
    }

    /// [`ReachedSet::remove`] without a known location, for nodes already
    /// deleted from the ARG. Scans every location bucket.
    pub fn forget(&mut self, id: ArgId) {
        for ids in self.by_location.values_mut() {
            ids.retain(|r| *r != id);
        }
        self.precisions.remove(&id);
        self.waitlist.retain(|(w, _)| *w != id);
    }

    /// Reached (non-covered) nodes at a location.
    pub fn reached_at(&self, location: NodeId) -> &[ArgId] {
        self.by_location.get(&location).map_or(&[], Vec::as_slice)
    }

    pub fn precision(&self, id: ArgId) -> &CompositePrecision {
        &self.precisions[&id]
    }

    pub fn set_precision(&mut self, id: ArgId, precision: CompositePrecision) {
        self.precisions.insert(id, precision);
    }

    /// Replace every occurrence of `old` by `new` (merge replaced the node).
    pub fn replace(&mut self, old: ArgId, new: ArgId, location: NodeId) {
        if let Some(ids) = self.by_location.get_mut(&location) {
            for r in ids.iter_mut() {
                if *r == old {
                    *r = new;
                }
            }
        }
        if let Some(p) = self.precisions.remove(&old) {
            self.precisions.insert(new, p);
        }
        for entry in self.waitlist.iter_mut() {
            if entry.0 == old {
                entry.0 = new;
            }
        }
    }

    pub fn iter_reached(&self) -> impl Iterator<Item = ArgId> + '_ {
        self.by_location.values().flatten().copied()
    }
}
