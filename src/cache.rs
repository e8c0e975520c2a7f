use crate::store::{Snapshot, StoreError, TableStore};
use std::time::Duration;
use tokio::{sync::Mutex, time::Instant};

struct CachedSnapshot {
    fetched_at: Instant,
    snapshot: Snapshot,
}

/// Short-lived read cache in front of a [`TableStore`].
pub struct TableCache {
    ttl: Duration,
    slot: Mutex<Option<CachedSnapshot>>,
}

impl TableCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached snapshot while it is younger than the ttl, otherwise reads the store.
    /// Failed reads are not cached.
    pub async fn read(&self, store: &dyn TableStore) -> Result<Snapshot, StoreError> {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.snapshot.clone());
            }
        }

        let snapshot = store.read().await?;
        *slot = Some(CachedSnapshot {
            fetched_at: Instant::now(),
            snapshot: snapshot.clone(),
        });
        Ok(snapshot)
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
