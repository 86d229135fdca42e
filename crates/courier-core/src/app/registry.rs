//! SubscriberRegistry - 購読者 ID → 購読者
//!
//! 1 つの Mutex で保護する。ロック中に await しない（取り出して離す）。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::{SubscriberId, Topic};
use crate::ports::Subscriber;

type Entries = HashMap<SubscriberId, Arc<dyn Subscriber>>;

/// At most one handle per subscriber id.
#[derive(Default)]
pub struct SubscriberRegistry {
    entries: Mutex<Entries>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `subscriber.id()`.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        let id = subscriber.id().clone();
        self.lock().insert(id, subscriber);
    }

    /// Remove the entry if present. Returns whether something was removed.
    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn get(&self, id: &SubscriberId) -> Option<Arc<dyn Subscriber>> {
        self.lock().get(id).cloned()
    }

    /// Snapshot of every subscriber whose current topic equals `topic`,
    /// taken under a single hold of the lock.
    pub fn matching(&self, topic: &Topic) -> Vec<Arc<dyn Subscriber>> {
        self.lock()
            .values()
            .filter(|s| &s.topic() == topic)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // 購読者の topic() が panic しても registry 自体は使い続ける
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
