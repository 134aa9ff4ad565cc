//! TTL-bound cache over fetched page snapshots.
//!
//! Keys are normalized URLs so two spellings of the same page share an
//! entry. Writes are best-effort: a failing cache write is logged and
//! swallowed, never surfaced to the enclosing request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::store::SnapshotStore;
use crate::types::PageSnapshot;

/// Snapshot cache with a fixed TTL.
pub struct FetchCache<S> {
    store: Arc<S>,
    ttl: Duration,
}

impl<S: SnapshotStore> FetchCache<S> {
    pub fn new(store: Arc<S>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Return the cached snapshot for `key`, or produce one via `fetch`.
    ///
    /// A hit within the TTL short-circuits without invoking `fetch`; a
    /// stale hit is deleted and treated as a miss. The boolean is true when
    /// the snapshot came from cache. Store read/delete/write failures are
    /// logged and treated as misses -- only `fetch` errors propagate.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Result<(PageSnapshot, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PageSnapshot>>,
    {
        match self.store.get_snapshot(key).await {
            Ok(Some(snapshot)) if !snapshot.is_stale(self.ttl) => {
                debug!(key = %key, "snapshot cache hit");
                return Ok((snapshot, true));
            }
            Ok(Some(_)) => {
                debug!(key = %key, "snapshot cache stale, evicting");
                if let Err(e) = self.store.delete_snapshot(key).await {
                    warn!(key = %key, error = %e, "failed to evict stale snapshot");
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "snapshot cache read failed");
            }
        }

        let snapshot = fetch().await?;
        if let Err(e) = self.store.put_snapshot(&snapshot).await {
            warn!(key = %key, error = %e, "failed to write snapshot cache");
        }
        Ok((snapshot, false))
    }

    /// Delete all entries past the TTL; returns the count removed.
    pub async fn evict_expired(&self) -> Result<usize> {
        self.store.delete_expired(self.ttl).await
    }

    /// Delete everything (testing/admin).
    pub async fn clear(&self) -> Result<()> {
        self.store.clear_snapshots().await
    }
}
