//! Per-object invalidation fan-out (pull model).
//!
//! Listeners register under an [`ObjectId`]. After every applied frame the
//! hub drains the ids the core reports invalidated and calls exactly the
//! listeners registered under each one, passing only the id. Listeners
//! re-materialize whatever they need themselves.
//!
//! Callbacks run with no lock held, so a listener may add or remove
//! listeners (itself included) while being notified. A listener removed
//! mid-pass is not called afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use canvas_core::{Core, ObjectId};

use crate::lock;

/// Handle returned by `add_listener`, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn next(source: &AtomicU64) -> Self {
        Self(source.fetch_add(1, Ordering::Relaxed))
    }
}

pub type InvalidationListener = Arc<dyn Fn(&ObjectId) + Send + Sync>;

#[derive(Default)]
pub struct InvalidationHub {
    listeners: Mutex<HashMap<ObjectId, BTreeMap<ListenerId, InvalidationListener>>>,
    next_id: AtomicU64,
}

impl InvalidationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&self, object_id: impl Into<ObjectId>, listener: F) -> ListenerId
    where
        F: Fn(&ObjectId) + Send + Sync + 'static,
    {
        let id = ListenerId::next(&self.next_id);
        lock(&self.listeners)
            .entry(object_id.into())
            .or_default()
            .insert(id, Arc::new(listener));
        id
    }

    /// Remove a listener. Effective immediately, also mid-notification.
    pub fn remove_listener(&self, object_id: &ObjectId, listener: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let Some(set) = listeners.get_mut(object_id) else {
            return false;
        };
        let removed = set.remove(&listener).is_some();
        if set.is_empty() {
            listeners.remove(object_id);
        }
        removed
    }

    pub fn listener_count(&self, object_id: &ObjectId) -> usize {
        lock(&self.listeners).get(object_id).map_or(0, BTreeMap::len)
    }

    /// Drain invalidated ids from the core and notify. Returns the number of
    /// callbacks made.
    pub fn publish<C: Core>(&self, core: &Mutex<C>) -> usize {
        let invalidated = lock(core).drain_invalidated_object_ids();
        self.notify(&invalidated)
    }

    /// Call every listener registered under each id, with that id.
    pub fn notify(&self, object_ids: &[ObjectId]) -> usize {
        let mut calls = 0;
        for object_id in object_ids {
            let snapshot: Vec<(ListenerId, InvalidationListener)> = match lock(&self.listeners)
                .get(object_id)
            {
                Some(set) => set.iter().map(|(id, l)| (*id, Arc::clone(l))).collect(),
                None => continue,
            };
            for (listener_id, listener) in snapshot {
                if !self.is_registered(object_id, listener_id) {
                    continue;
                }
                listener(object_id);
                calls += 1;
            }
        }
        if calls > 0 {
            log::trace!("Invalidated {} object(s), {calls} listener call(s)", object_ids.len());
        }
        calls
    }

    fn is_registered(&self, object_id: &ObjectId, listener: ListenerId) -> bool {
        lock(&self.listeners)
            .get(object_id)
            .is_some_and(|set| set.contains_key(&listener))
    }
}
