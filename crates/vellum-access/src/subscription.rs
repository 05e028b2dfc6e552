//! Change notification for cached grants.

use crate::cache::CacheKey;
use crate::grant::GrantState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Callback = Arc<dyn Fn(GrantState) + Send + Sync>;

/// Registry of callbacks keyed by cache key.
#[derive(Default)]
pub(crate) struct SubscriberHub {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<CacheKey, HashMap<u64, Callback>>>,
}

impl SubscriberHub {
    pub(crate) fn subscribe(self: &Arc<Self>, key: CacheKey, callback: Callback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .entry(key.clone())
            .or_default()
            .insert(id, callback);

        Subscription {
            hub: Arc::downgrade(self),
            key,
            id,
        }
    }

    fn remove(&self, key: &CacheKey, id: u64) {
        let mut subscribers = self.subscribers.lock();
        if let Some(callbacks) = subscribers.get_mut(key) {
            callbacks.remove(&id);
            if callbacks.is_empty() {
                subscribers.remove(key);
            }
        }
    }

    /// Invoke every callback registered for `key`.
    ///
    /// Callbacks run outside the lock, so they may subscribe or unsubscribe.
    pub(crate) fn notify(&self, key: &CacheKey, state: GrantState) {
        let callbacks: Vec<Callback> = match self.subscribers.lock().get(key) {
            Some(callbacks) => callbacks.values().cloned().collect(),
            None => return,
        };
        for callback in callbacks {
            callback(state);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.subscribers.lock().values().map(HashMap::len).sum()
    }
}

/// Handle returned by `subscribe`. Dropping it detaches the callback.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    hub: Weak<SubscriberHub>,
    key: CacheKey,
    id: u64,
}

impl Subscription {
    /// Detach the callback now.
    pub fn unsubscribe(self) {}

    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(&self.key, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}
