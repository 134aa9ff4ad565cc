//! Background enrichment worker.
//!
//! Enrichment runs as a best-effort continuation after bookmark creation,
//! decoupled through a bounded queue so a slow model call never blocks the
//! submitting request. Overflow is logged and dropped; a job lost to a
//! crash leaves its bookmark `Pending` until a client retries.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::enrich::EnrichmentService;
use crate::traits::{model::LanguageModel, store::BookmarkStore};

/// A queued enrichment request.
#[derive(Debug, Clone)]
pub struct EnrichJob {
    pub bookmark_id: Uuid,
    pub owner_id: Uuid,
}

/// Handle for enqueueing enrichment jobs.
#[derive(Clone)]
pub struct EnrichmentQueue {
    tx: mpsc::Sender<EnrichJob>,
}

impl EnrichmentQueue {
    /// Enqueue a job, dropping it (with a log line) when the queue is full
    /// or the worker has stopped. Never blocks the caller.
    pub fn enqueue(&self, job: EnrichJob) {
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(
                    bookmark = %job.bookmark_id,
                    "enrichment queue full, dropping job"
                );
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(
                    bookmark = %job.bookmark_id,
                    "enrichment worker stopped, dropping job"
                );
            }
        }
    }
}

/// Spawn the single enrichment worker over a bounded queue.
pub fn spawn_worker<S, M>(
    service: Arc<EnrichmentService<S, M>>,
    queue_depth: usize,
    cancel: CancellationToken,
) -> (EnrichmentQueue, JoinHandle<()>)
where
    S: BookmarkStore + 'static,
    M: LanguageModel + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EnrichJob>(queue_depth.max(1));

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("enrichment worker shutting down");
                    break;
                }
                job = rx.recv() => {
                    let Some(job) = job else { break };
                    debug!(bookmark = %job.bookmark_id, "processing enrichment job");
                    if let Err(e) = service.enrich(job.bookmark_id, job.owner_id).await {
                        warn!(
                            bookmark = %job.bookmark_id,
                            error = %e,
                            "background enrichment failed"
                        );
                    }
                }
            }
        }
    });

    (EnrichmentQueue { tx }, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::SlidingWindowLimiter;
    use crate::stores::MemoryStore;
    use crate::testing::MockModel;
    use crate::types::{BookmarkRecord, EnrichConfig, EnrichmentStatus};
    use crate::traits::store::BookmarkStore as _;

    const VALID_RESPONSE: &str = r#"{"summary": "A long enough background summary of the page.", "tags": ["a"], "language": "en"}"#;

    fn service(store: Arc<MemoryStore>) -> Arc<EnrichmentService<MemoryStore, MockModel>> {
        Arc::new(EnrichmentService::new(
            store,
            Arc::new(MockModel::with_response(VALID_RESPONSE)),
            Arc::new(SlidingWindowLimiter::new()),
            EnrichConfig::default(),
        ))
    }

    #[tokio::test]
    async fn worker_drains_jobs() {
        let store = Arc::new(MemoryStore::new());
        let mut record =
            BookmarkRecord::new(Uuid::new_v4(), "https://example.com/a", "example.com");
        record.description = Some("A page about things worth reading.".to_string());
        store.insert_bookmark(&record).await.unwrap();

        let cancel = CancellationToken::new();
        let (queue, handle) = spawn_worker(service(Arc::clone(&store)), 4, cancel.clone());

        queue.enqueue(EnrichJob {
            bookmark_id: record.id,
            owner_id: record.owner_id,
        });

        // Poll until the background continuation lands
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
        loop {
            let status = store.get_bookmark(record.id).await.unwrap().unwrap().status;
            if status == EnrichmentStatus::Completed {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "worker never completed job");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_is_dropped_not_panicked() {
        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        let (queue, handle) = spawn_worker(service(store), 1, cancel.clone());

        cancel.cancel();
        handle.await.unwrap();

        // Worker is gone; enqueue must not block or panic
        queue.enqueue(EnrichJob {
            bookmark_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
        });
    }
}
