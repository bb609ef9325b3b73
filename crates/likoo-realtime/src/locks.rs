//! Per-key async locks serializing persist-then-broadcast.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;

/// Idle lock entries are pruned once the map grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// Hands out one async mutex per key.
///
/// Holding the guard across "persist, then broadcast" means every member of
/// a room observes messages in the order they were persisted. Different
/// keys never contend.
#[derive(Clone, Default)]
pub struct ChannelLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl ChannelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = lock_map(&self.inner);
            if map.len() > PRUNE_THRESHOLD {
                // Entries only referenced by the map are neither held nor awaited.
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(map.entry(key.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        lock_map(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_map(inner: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
