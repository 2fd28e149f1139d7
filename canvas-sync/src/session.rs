//! Session roster fan-out (push model).
//!
//! Unlike [`crate::InvalidationHub`], listeners here receive the full
//! [`SessionSnapshot`] on every change and must treat it as replacing all
//! prior state.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};

use canvas_core::{Core, SessionSnapshot};

use crate::invalidation::ListenerId;
use crate::lock;

pub type SessionSnapshotListener = Arc<dyn Fn(&SessionSnapshot) + Send + Sync>;

#[derive(Default)]
pub struct SessionSnapshotHub {
    listeners: Mutex<BTreeMap<ListenerId, SessionSnapshotListener>>,
    next_id: AtomicU64,
}

impl SessionSnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&SessionSnapshot) + Send + Sync + 'static,
    {
        let id = ListenerId::next(&self.next_id);
        lock(&self.listeners).insert(id, Arc::new(listener));
        id
    }

    pub fn remove_listener(&self, listener: ListenerId) -> bool {
        lock(&self.listeners).remove(&listener).is_some()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Notify listeners if the core reports a changed roster.
    pub fn publish<C: Core>(&self, core: &Mutex<C>) -> Option<SessionSnapshot> {
        let snapshot = lock(core).drain_changed_session_snapshot()?;
        self.notify(&snapshot);
        Some(snapshot)
    }

    pub fn notify(&self, snapshot: &SessionSnapshot) {
        log::debug!("Session roster: {:?}", snapshot.connections);
        let listeners: Vec<(ListenerId, SessionSnapshotListener)> = lock(&self.listeners)
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();
        for (id, listener) in listeners {
            if lock(&self.listeners).contains_key(&id) {
                listener(snapshot);
            }
        }
    }
}
