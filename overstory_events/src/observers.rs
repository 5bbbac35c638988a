// Copyright 2025 the Overstory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node observer registry: ordered publish/subscribe, independent of tree structure.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::event::Event;

/// Handle identifying a subscription within one [`Observers`] registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// A registered observer.
pub enum Observer<K> {
    /// A plain callback invoked with each dispatched event.
    Callback(Box<dyn FnMut(&mut Event<K>)>),
    /// Another dispatch-capable node, notified through its own handler hook.
    ///
    /// The registry itself cannot reach into a scene; [`Observers::notify`]
    /// hands these keys to the caller-supplied delivery closure.
    Node(K),
}

impl<K: core::fmt::Debug> core::fmt::Debug for Observer<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Callback(_) => f.write_str("Observer::Callback(..)"),
            Self::Node(k) => f.debug_tuple("Observer::Node").field(k).finish(),
        }
    }
}

/// An ordered list of observers attached to one node's dispatch point.
///
/// Subscription order is delivery order. Notification runs synchronously with
/// no re-entrancy guard: an observer may dispatch further events, and those
/// are delivered immediately rather than queued. The registry is designed to
/// be taken out of its owning node for the duration of a notification, so
/// subscriptions added from within an observer land on the node's fresh list
/// and take effect from the next dispatch.
pub struct Observers<K> {
    entries: Vec<(ObserverId, Observer<K>)>,
    next_id: u64,
}

impl<K: core::fmt::Debug> core::fmt::Debug for Observers<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl<K> Default for Observers<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Observers<K> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Number of current subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no observer is subscribed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register an observer; returns the handle used to remove it.
    pub fn subscribe(&mut self, observer: Observer<K>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    /// Register a plain callback.
    pub fn subscribe_fn(&mut self, f: impl FnMut(&mut Event<K>) + 'static) -> ObserverId {
        self.subscribe(Observer::Callback(Box::new(f)))
    }

    /// Register another node as an observer.
    pub fn subscribe_node(&mut self, node: K) -> ObserverId {
        self.subscribe(Observer::Node(node))
    }

    /// Remove a subscription by handle. Returns whether anything was removed.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(eid, _)| *eid != id);
        self.entries.len() != before
    }

    /// Remove every observer.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Current subscription handles, in subscription order.
    ///
    /// Callers that must tolerate re-entrant mutation iterate a collected
    /// snapshot of these and re-look up each entry with
    /// [`Observers::entry_mut`], skipping handles that have since gone.
    pub fn ids(&self) -> impl Iterator<Item = ObserverId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Mutable access to one subscription by handle.
    pub fn entry_mut(&mut self, id: ObserverId) -> Option<&mut Observer<K>> {
        self.entries
            .iter_mut()
            .find(|(eid, _)| *eid == id)
            .map(|(_, o)| o)
    }

    /// Notify every current observer, in subscription order.
    ///
    /// Callback observers are invoked directly; node observers are handed to
    /// `deliver`, which is responsible for routing the event into that node's
    /// handler hook. Propagation stoppage is a between-steps concern and is
    /// not consulted here: all observers of this dispatch point see the event.
    pub fn notify(&mut self, event: &mut Event<K>, mut deliver: impl FnMut(K, &mut Event<K>))
    where
        K: Copy,
    {
        for (_, observer) in &mut self.entries {
            match observer {
                Observer::Callback(f) => f(event),
                Observer::Node(k) => deliver(*k, event),
            }
        }
    }
}

impl<K: PartialEq> Observers<K> {
    /// Remove every subscription pointing at the given node observer.
    ///
    /// Returns whether anything was removed.
    pub fn unsubscribe_node(&mut self, node: &K) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|(_, o)| !matches!(o, Observer::Node(k) if k == node));
        self.entries.len() != before
    }
}
