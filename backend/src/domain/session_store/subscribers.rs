//! Listener registry and the handle returned by `subscribe`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use super::{AuthState, lock};

/// Callback receiving state snapshots.
pub type Listener = Arc<dyn Fn(&AuthState) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    listeners: BTreeMap<u64, Listener>,
}

impl Subscribers {
    pub(crate) fn add(&mut self, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.listeners.insert(id, listener);
        id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Listeners in registration order, cloned so they run unlocked.
    pub(crate) fn snapshot(&self) -> Vec<Listener> {
        self.listeners.values().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

/// Registration handle; the listener is removed when this is dropped.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, registry: &Arc<Mutex<Subscribers>>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
