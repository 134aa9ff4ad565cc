//! The ingestion entry point.
//!
//! `submit_url` is request-synchronous through record creation (validate ->
//! dedupe -> fetch/cache -> persist) and schedules enrichment as a
//! background continuation afterward, so a slow or failing model call never
//! blocks the user-visible create.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::cache::FetchCache;
use crate::enrich::EnrichmentService;
use crate::error::{IngestError, Result};
use crate::extractor;
use crate::fetcher::MetadataFetcher;
use crate::limiter::{RatePolicy, SlidingWindowLimiter};
use crate::pipeline::worker::{spawn_worker, EnrichJob, EnrichmentQueue};
use crate::security::{self, UrlValidator};
use crate::traits::{fetch::PageFetcher, model::LanguageModel, store::{BookmarkStore, SnapshotStore}};
use crate::types::{
    BookmarkRecord, EnrichmentResult, EnrichmentStatusReport, PageSnapshot, PipelineConfig,
};

/// Orchestrates the full ingestion path over injected ports.
pub struct IngestionPipeline<S, M, F = MetadataFetcher> {
    store: Arc<S>,
    fetcher: Arc<F>,
    cache: FetchCache<S>,
    limiter: Arc<SlidingWindowLimiter>,
    enricher: Arc<EnrichmentService<S, M>>,
    queue: EnrichmentQueue,
    validator: UrlValidator,
    create_policy: RatePolicy,
    cancel: CancellationToken,
    _worker: JoinHandle<()>,
}

impl<S, M, F> IngestionPipeline<S, M, F>
where
    S: BookmarkStore + SnapshotStore + 'static,
    M: LanguageModel + 'static,
    F: PageFetcher,
{
    /// Build a pipeline and spawn its background worker.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(store: Arc<S>, model: Arc<M>, fetcher: Arc<F>, config: PipelineConfig) -> Self {
        let limiter = Arc::new(SlidingWindowLimiter::new());
        let enricher = Arc::new(EnrichmentService::new(
            Arc::clone(&store),
            model,
            Arc::clone(&limiter),
            config.enrich.clone(),
        ));
        let cancel = CancellationToken::new();
        let (queue, worker) = spawn_worker(
            Arc::clone(&enricher),
            config.worker_queue_depth,
            cancel.clone(),
        );

        Self {
            cache: FetchCache::new(Arc::clone(&store), config.cache_ttl),
            store,
            fetcher,
            limiter,
            enricher,
            queue,
            validator: UrlValidator::new(),
            create_policy: RatePolicy {
                action: "bookmark_create",
                limit: config.create_limit,
                window: config.create_window,
            },
            cancel,
            _worker: worker,
        }
    }

    /// Replace the default URL validator (e.g. to allow a test host).
    pub fn with_validator(mut self, validator: UrlValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Submit a URL for ingestion.
    ///
    /// Returns the created record in `Pending` state, or the existing record
    /// when the owner already saved this URL (no second fetch or model call).
    /// Upstream fetch failures are swallowed: the bookmark is still created,
    /// just without metadata.
    pub async fn submit_url(&self, owner_id: Uuid, raw_url: &str) -> Result<BookmarkRecord> {
        let decision = self.limiter.check(&owner_id.to_string(), &self.create_policy);
        if !decision.allowed {
            return Err(IngestError::RateLimited {
                action: self.create_policy.action,
                limit: self.create_policy.limit,
                remaining: 0,
                reset_at: decision.reset_at,
            });
        }

        let parsed = self.validator.validate(raw_url)?;
        let normalized = security::normalize(&parsed);

        if let Some(existing) = self
            .store
            .find_by_owner_and_url(owner_id, &normalized)
            .await?
        {
            info!(
                owner = %owner_id,
                url = %normalized,
                bookmark = %existing.id,
                "duplicate submission, returning existing bookmark"
            );
            return Ok(existing);
        }

        let snapshot = match self
            .cache
            .get_or_fetch(&normalized, || self.fetch_and_extract(&parsed, &normalized))
            .await
        {
            Ok((snapshot, from_cache)) => {
                debug!(url = %normalized, from_cache, "page snapshot ready");
                Some(snapshot)
            }
            Err(IngestError::Fetch(e)) => {
                warn!(
                    url = %normalized,
                    error = %e,
                    "metadata fetch failed, creating bookmark without metadata"
                );
                None
            }
            Err(e) => return Err(e),
        };

        let domain = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        let mut record = BookmarkRecord::new(owner_id, &normalized, domain);
        if let Some(snapshot) = &snapshot {
            record = record.with_snapshot(snapshot);
        }

        self.store.insert_bookmark(&record).await?;

        self.queue.enqueue(EnrichJob {
            bookmark_id: record.id,
            owner_id,
        });
        info!(
            bookmark = %record.id,
            url = %normalized,
            "bookmark created, enrichment scheduled"
        );
        Ok(record)
    }

    /// Poll target: enrichment state plus machine-readable quota numbers.
    pub async fn enrichment_status(
        &self,
        bookmark_id: Uuid,
        owner_id: Uuid,
    ) -> Result<EnrichmentStatusReport> {
        let record = self
            .store
            .get_bookmark(bookmark_id)
            .await?
            .filter(|r| r.owner_id == owner_id)
            .ok_or(IngestError::NotFound { id: bookmark_id })?;

        let policy = self.enricher.quota_policy();
        let quota = self.limiter.peek(&owner_id.to_string(), &policy);
        Ok(EnrichmentStatusReport {
            status: record.status,
            summary: record.ai_summary,
            quota_limit: policy.limit,
            quota_remaining: quota.remaining,
            quota_reset_at: quota.reset_at,
        })
    }

    /// Synchronous retry of a failed or stuck enrichment.
    pub async fn retry_enrichment(
        &self,
        bookmark_id: Uuid,
        owner_id: Uuid,
    ) -> Result<EnrichmentResult> {
        self.enricher.retry(bookmark_id, owner_id).await
    }

    /// Maintenance sweep: drop snapshots past the TTL.
    pub async fn evict_expired_snapshots(&self) -> Result<usize> {
        self.cache.evict_expired().await
    }

    /// Maintenance sweep: drop empty rate-limit windows.
    pub fn prune_rate_windows(&self) -> usize {
        self.limiter.prune()
    }

    /// Stop the background worker. Queued jobs are abandoned; their
    /// bookmarks stay `Pending` until a client retries.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn fetch_and_extract(&self, url: &Url, key: &str) -> Result<PageSnapshot> {
        let page = self.fetcher.fetch_page(url).await?;

        let mut snapshot = PageSnapshot::new(key, page.metadata, &page.html);
        if extractor::is_extractable(&page.html) {
            let content = extractor::extract(&page.html, &page.final_url);
            snapshot = snapshot.with_text(&content);
        } else {
            debug!(url = %key, "page not extractable, snapshot has metadata only");
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::testing::{sample_article_html, MockFetcher, MockModel};
    use std::time::Duration;

    const VALID_RESPONSE: &str = r#"{"summary": "A thorough model-written summary of the article, long enough to validate.", "tags": ["rust"], "language": "en"}"#;

    fn pipeline(
        fetcher: MockFetcher,
    ) -> IngestionPipeline<MemoryStore, MockModel, MockFetcher> {
        IngestionPipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockModel::with_response(VALID_RESPONSE)),
            Arc::new(fetcher),
            PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn security_rejection_creates_nothing() {
        let p = pipeline(MockFetcher::new());
        let err = p
            .submit_url(Uuid::new_v4(), "http://192.168.1.5/admin")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Security(_)));
        assert_eq!(p.store.bookmark_count(), 0);
        assert!(p.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_still_creates_bookmark() {
        let p = pipeline(MockFetcher::failing());
        let record = p
            .submit_url(Uuid::new_v4(), "https://example.com/dead")
            .await
            .unwrap();
        assert!(record.title.is_none());
        assert_eq!(p.store.bookmark_count(), 1);
    }

    #[tokio::test]
    async fn create_rate_limit_surfaces_reset() {
        let p = IngestionPipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockModel::with_response(VALID_RESPONSE)),
            Arc::new(MockFetcher::new().with_page(
                "https://example.com/a",
                sample_article_html(),
            )),
            PipelineConfig::default().with_create_limit(2, Duration::from_secs(60)),
        );

        let owner = Uuid::new_v4();
        p.submit_url(owner, "https://example.com/a?n=1").await.unwrap();
        p.submit_url(owner, "https://example.com/a?n=2").await.unwrap();
        let err = p
            .submit_url(owner, "https://example.com/a?n=3")
            .await
            .unwrap_err();
        match err {
            IngestError::RateLimited {
                limit, reset_at, ..
            } => {
                assert_eq!(limit, 2);
                assert!(reset_at > 0);
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn normalized_url_is_stored() {
        let p = pipeline(MockFetcher::new());
        let record = p
            .submit_url(Uuid::new_v4(), "HTTPS://Example.com:443/Path/?b=2&a=1#frag")
            .await
            .unwrap();
        assert_eq!(record.url, "https://example.com/Path?a=1&b=2");
        assert_eq!(record.domain, "example.com");
    }
}
