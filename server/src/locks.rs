//! Per-room mutual exclusion.
//!
//! Every engine operation that reads and then writes a room's session runs
//! while holding that room's mutex. Rooms never share a lock, so unrelated
//! games do not contend.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct RoomLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RoomLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Returns the mutex for `room_id`, creating it on first use.
    pub fn lock_for(&self, room_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.get(room_id) {
            return Arc::clone(lock.value());
        }
        Arc::clone(
            self.locks
                .entry(room_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Waits for exclusive access to `room_id`.
    pub async fn acquire(&self, room_id: &str) -> OwnedMutexGuard<()> {
        self.lock_for(room_id).lock_owned().await
    }

    /// Drops the mutex for a torn-down room. Tasks already holding or
    /// waiting on it keep their `Arc` and finish normally.
    pub fn forget(&self, room_id: &str) {
        self.locks.remove(room_id);
    }

    /// Drops the mutex for `room_id` only if nobody holds, awaits or has
    /// fetched it. Returns true when an entry was removed.
    pub fn release_idle(&self, room_id: &str) -> bool {
        self.locks
            .remove_if(room_id, |_, lock| Arc::strong_count(lock) == 1)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
